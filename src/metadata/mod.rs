//! Dialect-independent scene metadata and the pure helpers the per-dialect
//! normalizers share: beam-mode derivation, timestamp layouts, look-up-table
//! expansion, canonical product naming and the produced metadata record.
use thiserror::Error;

use crate::io::ceos::FormatError;
use crate::types::Dialect;

pub mod beam;
pub mod lut;
pub mod naming;
pub mod record;
pub mod scene;
pub mod time;

pub use record::MetadataRecord;
pub use scene::{
    CalibrationOffset, CalibrationVectors, CornerPolygon, Ellipsoid, Gcp, SceneBuilder,
    SceneMetadata,
};

/// Errors raised while turning raw fields into `SceneMetadata`.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Missing required field `{field}` for {dialect} product")]
    MissingField {
        dialect: Dialect,
        field: &'static str,
    },
    #[error("Invalid value for `{field}` in {dialect} product: {value}")]
    InvalidField {
        dialect: Dialect,
        field: &'static str,
        value: String,
    },
    #[error("Malformed timestamp {0:?}")]
    Timestamp(String),
    #[error("No beam-mode rule matches beam codes {0:?}")]
    UnknownBeam(String),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
}
