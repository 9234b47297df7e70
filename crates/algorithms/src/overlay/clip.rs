//! Clip a raster to a polygon.

use geo::BoundingRect;
use geo_types::Geometry;
use geoverlay_core::{Error, Raster, Result, CRS};
use tracing::debug;

use super::mask::cell_mask;

/// Something that can restrict a grid to a geometry.
pub trait RasterClipper {
    fn clip(&self, grid: &Raster<f64>, geometry: &Geometry<f64>, crs: &CRS) -> Result<Raster<f64>>;
}

/// Crop-and-mask clipper backed by [`clip_raster`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskClipper;

impl RasterClipper for MaskClipper {
    fn clip(&self, grid: &Raster<f64>, geometry: &Geometry<f64>, crs: &CRS) -> Result<Raster<f64>> {
        clip_raster(grid, geometry, crs)
    }
}

/// Clip `grid` to `geometry`, whose coordinates are in `crs`.
///
/// The output covers the cells of `grid` touched by the geometry's bounding
/// box, so its extent never exceeds the input's. Cells whose centre lies
/// outside the geometry are set to the grid's no-data value, or NaN when it
/// has none; the output's no-data is set accordingly.
///
/// # Errors
/// - [`Error::CrsMismatch`] if `crs` differs from the grid's CRS
/// - [`Error::EmptyClipResult`] if the geometry misses the grid or covers no
///   cell centre
pub fn clip_raster(grid: &Raster<f64>, geometry: &Geometry<f64>, crs: &CRS) -> Result<Raster<f64>> {
    if let Some(grid_crs) = grid.crs() {
        if !grid_crs.is_equivalent(crs) {
            return Err(Error::CrsMismatch(grid_crs.to_string(), crs.to_string()));
        }
    }

    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| Error::EmptyClipResult("geometry is empty".into()))?;
    let bounds = (rect.min().x, rect.min().y, rect.max().x, rect.max().y);

    let window = grid
        .transform()
        .window_for_bounds(bounds, grid.cols(), grid.rows())
        .ok_or_else(|| {
            Error::EmptyClipResult(format!(
                "geometry bounds {:?} do not intersect raster bounds {:?}",
                bounds,
                grid.bounds()
            ))
        })?;

    let mut clipped = grid.window(window)?;
    let (rows, cols) = clipped.shape();
    let mask = cell_mask(geometry, clipped.transform(), rows, cols)?;

    let inside = mask.iter().filter(|&&m| m).count();
    if inside == 0 {
        return Err(Error::EmptyClipResult(
            "no cell centre falls inside the geometry".into(),
        ));
    }

    let fill = grid.nodata().unwrap_or(f64::NAN);
    clipped
        .data_mut()
        .zip_mut_with(&mask, |value, &keep| {
            if !keep {
                *value = fill;
            }
        });
    clipped.set_nodata(Some(fill));

    debug!(?window, inside, "raster clipped");
    Ok(clipped)
}
