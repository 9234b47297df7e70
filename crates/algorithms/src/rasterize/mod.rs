//! Burn vector features into a new raster.
//!
//! The output grid comes from a template (`like`), or from an extent plus
//! either a resolution or an output shape. Every feature contributes one
//! value (from an attribute, a constant, or 1) to the cells it covers;
//! cells hit by several features combine them with a [`MergeFunction`].

mod burn;

use std::str::FromStr;

use geoverlay_core::{
    Algorithm, DataType, Error, FeatureSet, GeoTransform, Raster, RasterElement, Result,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use burn::burn_cells;

/// How values landing on the same cell are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeFunction {
    Sum,
    /// Keep the value of the first feature in order
    First,
    /// Keep the value of the last feature in order
    #[default]
    Last,
    Min,
    Max,
    /// Number of features covering the cell
    Count,
    /// 1 where any feature covers the cell
    Any,
}

impl MergeFunction {
    fn init(self, value: f64) -> f64 {
        match self {
            MergeFunction::Count | MergeFunction::Any => 1.0,
            _ => value,
        }
    }

    fn merge(self, current: f64, value: f64) -> f64 {
        match self {
            MergeFunction::Sum => current + value,
            MergeFunction::First => current,
            MergeFunction::Last => value,
            MergeFunction::Min => current.min(value),
            MergeFunction::Max => current.max(value),
            MergeFunction::Count => current + 1.0,
            MergeFunction::Any => 1.0,
        }
    }
}

impl FromStr for MergeFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(MergeFunction::Sum),
            "first" => Ok(MergeFunction::First),
            "last" => Ok(MergeFunction::Last),
            "min" => Ok(MergeFunction::Min),
            "max" => Ok(MergeFunction::Max),
            "count" => Ok(MergeFunction::Count),
            "any" => Ok(MergeFunction::Any),
            _ => Err(Error::InvalidParameter {
                name: "fun",
                value: s.to_string(),
                reason: "expected sum, first, last, min, max, count or any".into(),
            }),
        }
    }
}

/// Shape and georeferencing of an output grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn of<T: RasterElement>(raster: &Raster<T>) -> Self {
        Self {
            transform: *raster.transform(),
            rows: raster.rows(),
            cols: raster.cols(),
        }
    }
}

/// Parameters for rasterization
#[derive(Debug, Clone)]
pub struct RasterizeParams {
    /// Template grid; overrides `extent`, `resolution` and `out_shape`
    pub like: Option<GridSpec>,
    /// (min_x, min_y, max_x, max_y); defaults to the features' bounds
    pub extent: Option<(f64, f64, f64, f64)>,
    /// Cell size (x, y), both positive
    pub resolution: Option<(f64, f64)>,
    /// (rows, cols)
    pub out_shape: Option<(usize, usize)>,
    /// Numeric attribute to burn
    pub field: Option<String>,
    /// Constant to burn when `field` is not set
    pub burn: Option<f64>,
    pub fun: MergeFunction,
    /// Value of cells no feature touches
    pub background: f64,
    /// Sample type the grid is meant to be stored as; values are rounded
    /// and saturated to it
    pub dtype: DataType,
}

impl Default for RasterizeParams {
    fn default() -> Self {
        Self {
            like: None,
            extent: None,
            resolution: None,
            out_shape: None,
            field: None,
            burn: None,
            fun: MergeFunction::Last,
            background: f64::NAN,
            dtype: DataType::Float64,
        }
    }
}

impl RasterizeParams {
    /// Resolve the output grid for `features`.
    pub fn grid(&self, features: &FeatureSet) -> Result<GridSpec> {
        if let Some(like) = self.like {
            return Ok(like);
        }

        let (min_x, min_y, max_x, max_y) = match self.extent.or_else(|| features.bounds()) {
            Some(extent) => extent,
            None => {
                return Err(Error::InvalidParameter {
                    name: "extent",
                    value: "none".into(),
                    reason: "no extent given and the features have no geometry".into(),
                })
            }
        };
        let (width, height) = (max_x - min_x, max_y - min_y);
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::InvalidParameter {
                name: "extent",
                value: format!("{:?}", (min_x, min_y, max_x, max_y)),
                reason: "extent must have positive width and height".into(),
            });
        }

        let (rows, cols, x_res, y_res) = match (self.resolution, self.out_shape) {
            (Some((x_res, y_res)), None) => {
                if !(x_res > 0.0 && y_res > 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "resolution",
                        value: format!("{},{}", x_res, y_res),
                        reason: "resolution must be positive".into(),
                    });
                }
                let cols = (width / x_res).ceil().max(1.0) as usize;
                let rows = (height / y_res).ceil().max(1.0) as usize;
                (rows, cols, x_res, y_res)
            }
            (None, Some((rows, cols))) if rows > 0 && cols > 0 => {
                (rows, cols, width / cols as f64, height / rows as f64)
            }
            (None, Some((rows, cols))) => {
                return Err(Error::InvalidDimensions { width: cols, height: rows })
            }
            _ => {
                return Err(Error::InvalidParameter {
                    name: "resolution",
                    value: format!("{:?} / {:?}", self.resolution, self.out_shape),
                    reason: "give exactly one of resolution or out_shape".into(),
                })
            }
        };

        Ok(GridSpec {
            transform: GeoTransform::new(min_x, max_y, x_res, -y_res),
            rows,
            cols,
        })
    }
}

/// Rasterize `features` into a new `f64` grid in the features' CRS.
///
/// With an integer `dtype` every cell holds a value that type can store,
/// and the background must be finite.
pub fn rasterize(features: &FeatureSet, params: &RasterizeParams) -> Result<Raster<f64>> {
    let background = params.dtype.quantize(params.background).ok_or_else(|| Error::InvalidParameter {
        name: "background",
        value: params.background.to_string(),
        reason: format!("not representable as {}", params.dtype),
    })?;
    let GridSpec { transform, rows, cols } = params.grid(features)?;

    let mut values = Array2::from_elem((rows, cols), background);
    let mut touched = Array2::from_elem((rows, cols), false);
    let mut cells: Vec<(usize, usize)> = Vec::new();
    let mut skipped = 0usize;

    for feature in features.iter() {
        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let value = match &params.field {
            Some(field) => match feature.get_property(field).and_then(|v| v.as_f64()) {
                Some(v) => v,
                None => {
                    skipped += 1;
                    continue;
                }
            },
            None => params.burn.unwrap_or(1.0),
        };

        cells.clear();
        burn_cells(geometry, &transform, rows, cols, &mut cells);
        cells.sort_unstable();
        cells.dedup();

        for &cell in &cells {
            if touched[cell] {
                values[cell] = params.fun.merge(values[cell], value);
            } else {
                values[cell] = params.fun.init(value);
                touched[cell] = true;
            }
        }
    }

    if skipped > 0 {
        warn!(
            skipped,
            field = params.field.as_deref().unwrap_or_default(),
            "features without a numeric value were not burned"
        );
    }
    if params.dtype != DataType::Float64 {
        values.mapv_inplace(|v| params.dtype.quantize(v).unwrap_or(background));
    }
    debug!(rows, cols, fun = ?params.fun, dtype = %params.dtype, "rasterized {} features", features.len());

    Ok(Raster::from_array(values)
        .with_transform(transform)
        .with_crs(features.crs().clone())
        .with_nodata(Some(background)))
}

/// Rasterization as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Rasterize;

impl Algorithm for Rasterize {
    type Input = FeatureSet;
    type Output = Raster<f64>;
    type Params = RasterizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Rasterize"
    }

    fn description(&self) -> &'static str {
        "Burn point, line and polygon features into a raster grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        rasterize(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, Geometry, Rect};
    use geoverlay_core::{Feature, CRS};

    /// Two overlapping 2x2 squares on a 4x4 unit grid over (0,0)-(4,4)
    fn overlapping() -> FeatureSet {
        FeatureSet::from_features(
            vec![
                Feature::new(Geometry::Rect(Rect::new((0.0, 0.0), (2.0, 2.0))))
                    .with_property("code", 3i64),
                Feature::new(Geometry::Rect(Rect::new((1.0, 1.0), (3.0, 3.0))))
                    .with_property("code", "5"),
                Feature::new(Geometry::Point(point!(x: 3.5, y: 3.5))).with_property("code", "n/a"),
            ],
            CRS::from_epsg(32632),
        )
    }

    fn params(fun: MergeFunction) -> RasterizeParams {
        RasterizeParams {
            extent: Some((0.0, 0.0, 4.0, 4.0)),
            resolution: Some((1.0, 1.0)),
            field: Some("code".into()),
            fun,
            background: 0.0,
            ..Default::default()
        }
    }

    // Cell (row 2, col 1) lies in both squares, (3, 0) only in the first,
    // (1, 2) only in the second, (0, 3) in neither.

    #[test]
    fn test_merge_functions() {
        let cases = [
            (MergeFunction::Sum, 8.0),
            (MergeFunction::First, 3.0),
            (MergeFunction::Last, 5.0),
            (MergeFunction::Min, 3.0),
            (MergeFunction::Max, 5.0),
            (MergeFunction::Count, 2.0),
            (MergeFunction::Any, 1.0),
        ];
        for (fun, expected) in cases {
            let out = rasterize(&overlapping(), &params(fun)).unwrap();
            assert_eq!(out.get(2, 1).unwrap(), expected, "{:?}", fun);
            assert_eq!(out.get(0, 3).unwrap(), 0.0, "{:?}", fun);
        }

        let sum = rasterize(&overlapping(), &params(MergeFunction::Sum)).unwrap();
        assert_eq!(sum.get(3, 0).unwrap(), 3.0);
        assert_eq!(sum.get(1, 2).unwrap(), 5.0);
    }

    #[test]
    fn test_grid_metadata() {
        let out = rasterize(&overlapping(), &params(MergeFunction::Last)).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.transform(), &GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        assert_eq!(out.crs().and_then(CRS::epsg), Some(32632));
        assert_eq!(out.nodata(), Some(0.0));
    }

    #[test]
    fn test_burn_constant_and_default() {
        let p = RasterizeParams {
            field: None,
            burn: Some(7.0),
            ..params(MergeFunction::Max)
        };
        let out = rasterize(&overlapping(), &p).unwrap();
        assert_eq!(out.get(0, 3).unwrap(), 7.0);

        let p = RasterizeParams { field: None, ..params(MergeFunction::Sum) };
        let out = rasterize(&overlapping(), &p).unwrap();
        assert_eq!(out.get(2, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_out_shape_and_default_extent() {
        let p = RasterizeParams {
            out_shape: Some((2, 2)),
            fun: MergeFunction::Count,
            ..Default::default()
        };
        let grid = p.grid(&overlapping()).unwrap();
        // bounds of the features: (0,0)-(3.5,3.5)
        assert_eq!((grid.rows, grid.cols), (2, 2));
        assert_eq!(grid.transform.pixel_width, 1.75);
        assert_eq!(grid.transform.origin_y, 3.5);

        // the point sits on the east edge and falls outside the last column
        let out = rasterize(&overlapping(), &p).unwrap();
        assert_eq!(out.get(1, 0).unwrap(), 1.0);
        assert_eq!(out.get(0, 1).unwrap(), 1.0);
        assert!(out.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_like_template() {
        let template = Raster::<f64>::new(3, 5).with_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        let p = RasterizeParams { like: Some(GridSpec::of(&template)), ..Default::default() };
        let lines = FeatureSet::from_features(
            vec![Feature::new(Geometry::LineString(line_string![
                (x: 0.5, y: 2.5),
                (x: 4.5, y: 2.5)
            ]))],
            CRS::wgs84(),
        );
        let out = rasterize(&lines, &p).unwrap();
        assert_eq!(out.shape(), (3, 5));
        assert!((0..5).all(|c| out.get(0, c).unwrap() == 1.0));
        assert!(out.get(1, 0).unwrap().is_nan());
    }

    #[test]
    fn test_bad_parameters() {
        let p = RasterizeParams {
            resolution: Some((1.0, 1.0)),
            out_shape: Some((4, 4)),
            ..Default::default()
        };
        assert!(p.grid(&overlapping()).is_err());
        assert!(RasterizeParams::default().grid(&overlapping()).is_err());
        assert!("median".parse::<MergeFunction>().is_err());
        assert_eq!("SUM".parse::<MergeFunction>().unwrap(), MergeFunction::Sum);
    }

    #[test]
    fn test_integer_dtype() {
        let p = RasterizeParams {
            burn: Some(2.6),
            field: None,
            dtype: DataType::Uint16,
            ..params(MergeFunction::Sum)
        };
        let out = rasterize(&overlapping(), &p).unwrap();
        // 2.6 + 2.6 = 5.2 in the overlap
        assert_eq!(out.get(2, 1).unwrap(), 5.0);
        assert_eq!(out.get(3, 0).unwrap(), 3.0);
        assert_eq!(out.get(0, 0).unwrap(), 0.0);

        let nan_background = RasterizeParams {
            background: f64::NAN,
            ..p
        };
        let err = rasterize(&overlapping(), &nan_background).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "background", .. }));
    }

    #[test]
    fn test_algorithm_trait() {
        let out = Rasterize.execute(overlapping(), params(MergeFunction::Max)).unwrap();
        assert_eq!(out.get(2, 1).unwrap(), 5.0);
        assert_eq!(Rasterize.name(), "Rasterize");
    }
}
