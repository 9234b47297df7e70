//! Zonal statistics over polygons
//!
//! A cell contributes to a zone when its centre lies inside the polygon
//! and its value is neither NaN nor the band's no-data value.

use geo_types::Geometry;
use geoverlay_core::{Error, GeoTransform, Raster, RasterElement, Result};
use ndarray::ArrayView2;

use super::mask::{polygon_rings, scanline_fill};
use crate::maybe_rayon::*;

/// Something that reduces the cells of a grid under a geometry to one number.
pub trait ZonalAggregator {
    fn aggregate(&self, grid: &Raster<f64>, geometry: &Geometry<f64>) -> Result<f64>;
}

/// Arithmetic mean over cell centres, see [`zonal_mean`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CellCenterMean;

impl ZonalAggregator for CellCenterMean {
    fn aggregate(&self, grid: &Raster<f64>, geometry: &Geometry<f64>) -> Result<f64> {
        zonal_mean(grid.view(), geometry, grid.transform(), grid.nodata())
    }
}

/// Summary statistics for one zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalResult {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub median: f64,
}

impl ZonalResult {
    /// Statistics of a set of values; `None` when it is empty.
    pub fn from_values(mut vals: Vec<f64>) -> Option<Self> {
        if vals.is_empty() {
            return None;
        }

        let count = vals.len();
        let sum: f64 = vals.iter().sum();
        let mean = sum / count as f64;
        let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

        vals.sort_by(f64::total_cmp);
        let min = vals[0];
        let max = vals[count - 1];

        let median = if count % 2 == 0 {
            (vals[count / 2 - 1] + vals[count / 2]) / 2.0
        } else {
            vals[count / 2]
        };

        Some(Self {
            count,
            sum,
            mean,
            std_dev: var.sqrt(),
            min,
            max,
            range: max - min,
            median,
        })
    }
}

/// Valid values of the cells whose centre is inside `geometry`.
pub fn zonal_values(
    band: ArrayView2<'_, f64>,
    geometry: &Geometry<f64>,
    transform: &GeoTransform,
    nodata: Option<f64>,
) -> Result<Vec<f64>> {
    let rings = polygon_rings(geometry)?;
    let (rows, cols) = band.dim();

    let mut values = Vec::new();
    scanline_fill(&rings, transform, rows, cols, |row, col| {
        let v = band[(row, col)];
        if !v.is_nodata(nodata) {
            values.push(v);
        }
    });
    Ok(values)
}

/// Mean of the valid cells of `band` whose centre lies inside `geometry`
/// under `transform`.
///
/// # Errors
/// [`Error::EmptyClipResult`] when no cell contributes, which keeps "no
/// data" apart from a mean of exactly zero.
pub fn zonal_mean(
    band: ArrayView2<'_, f64>,
    geometry: &Geometry<f64>,
    transform: &GeoTransform,
    nodata: Option<f64>,
) -> Result<f64> {
    let values = zonal_values(band, geometry, transform, nodata)?;
    if values.is_empty() {
        return Err(Error::EmptyClipResult(
            "no valid cell centre inside the geometry".into(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// [`ZonalResult`] for each geometry, in order. Zones without valid cells
/// give `None`.
pub fn zonal_stats(
    band: ArrayView2<'_, f64>,
    geometries: &[Geometry<f64>],
    transform: &GeoTransform,
    nodata: Option<f64>,
) -> Result<Vec<Option<ZonalResult>>> {
    geometries
        .into_par_iter()
        .map(|g| zonal_values(band, g, transform, nodata).map(ZonalResult::from_values))
        .collect()
}
