//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Wraps the per-stage errors (binary format, metadata, geocoding, calibration,
//! stretch, raster I/O) and provides semantic variants for argument validation.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(#[from] crate::io::FormatError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] crate::metadata::MetadataError),

    #[error("Geocoding error: {0}")]
    Geocoding(#[from] crate::core::geocoding::GeocodingError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] crate::core::processing::calibrate::CalibrationError),

    #[error("Stretch configuration error: {0}")]
    Stretch(#[from] crate::core::processing::stretch::StretchConfigError),

    #[error("Raster error: {0}")]
    Raster(#[from] crate::io::RasterError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Processing error: {0}")]
    Processing(String),
}
