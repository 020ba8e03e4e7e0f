//! Output writers: metadata sidecars (JSON, delimited) and chunked GeoTIFF.
pub mod metadata;
#[cfg(feature = "gdal")]
pub mod tiff;
