//! Reading and writing rasters and vector features

mod archive;
#[cfg(feature = "remote")]
mod fetch;
mod native;
mod vector;

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::Raster;

pub use archive::extract_single;
#[cfg(feature = "remote")]
pub use fetch::download;
pub use native::{read_geotiff, write_geotiff, write_geotiff_as};
pub use vector::{crs_from_prj, open_vector, write_geojson, VectorSourceOptions};

/// Load one band (1-based) of a GeoTIFF as `f64`.
///
/// Every failure is reported as [`Error::SourceUnavailable`] naming `path`.
pub fn open_raster<P: AsRef<Path>>(path: P, band: usize) -> Result<Raster<f64>> {
    let path = path.as_ref();
    let location = path.display().to_string();
    if !path.is_file() {
        return Err(Error::unavailable(location, "no such file"));
    }

    let raster: Raster<f64> =
        read_geotiff(path, Some(band)).map_err(|e| Error::unavailable(&location, e))?;
    debug!(
        path = %location,
        rows = raster.rows(),
        cols = raster.cols(),
        crs = ?raster.crs().map(|c| c.identifier()),
        "raster loaded"
    );
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_raster_missing() {
        let err = open_raster("/nonexistent/dem.tif", 1).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn test_open_raster_not_a_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        let err = open_raster(&path, 1).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
