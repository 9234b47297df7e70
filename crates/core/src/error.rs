//! Error types for geoverlay

use thiserror::Error;

/// Main error type for geoverlay operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A raster or vector source could not be fetched, opened or decoded.
    #[error("source unavailable: {location} ({reason})")]
    SourceUnavailable { location: String, reason: String },

    /// An archive did not contain exactly one file with the wanted extension.
    #[error("archive {archive} contains {matches} '.{extension}' files, expected exactly one")]
    AmbiguousArchive {
        archive: String,
        extension: String,
        matches: usize,
    },

    /// The geometry selects no raster cell.
    #[error("empty clip result: {0}")]
    EmptyClipResult(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("unknown CRS for {0}")]
    UnknownCrs(String),

    #[error("reprojection failed: {0}")]
    Reprojection(String),

    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::SourceUnavailable`].
    pub fn unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for geoverlay operations
pub type Result<T> = std::result::Result<T, Error>;
