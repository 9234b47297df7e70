//! # geoverlay core
//!
//! Core types, traits and I/O for the geoverlay toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced single-band grid
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS` and the `Reproject` seam
//! - `Feature` / `FeatureSet`: vector features sharing one CRS
//! - I/O for GeoTIFF, Shapefile, GeoJSON and zip archives
//! - The `Algorithm` trait shared by the algorithm crate

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{ProjReprojector, Reproject, CRS};
pub use error::{Error, Result};
pub use raster::{DataType, GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Feature, FeatureSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{ProjReprojector, Reproject, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{DataType, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureSet};
    pub use crate::Algorithm;
}

/// Common shape for algorithms with tunable parameters.
pub trait Algorithm {
    type Input;
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
