//! Raster grid, cell types and the affine transform

mod element;
mod geotransform;
mod grid;

pub use element::{DataType, RasterElement};
pub use geotransform::{GeoTransform, PixelWindow};
pub use grid::{Raster, RasterStatistics};
