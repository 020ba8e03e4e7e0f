use serde::{Deserialize, Serialize};

use crate::core::processing::calibrate::DEFAULT_CHUNK_ROWS;
use crate::core::processing::stretch::DEFAULT_STD_MULTIPLIER;
use crate::types::{
    BitDepthArg, GcpFlipPolicy, MetadataFormat, OutputKind, StretchPolicy, StretchProcedure,
};

/// Histogram stretch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchParams {
    pub enabled: bool,
    pub procedure: StretchProcedure,
    pub policy: StretchPolicy,
    pub bit_depth: BitDepthArg,
    /// Multiplier of the standard deviation for the `StdDev` procedure
    pub std_multiplier: f64,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            enabled: false,
            procedure: StretchProcedure::StdDev,
            policy: StretchPolicy::Separate,
            bit_depth: BitDepthArg::U8,
            std_multiplier: DEFAULT_STD_MULTIPLIER,
        }
    }
}

/// Processing parameters suitable for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParams {
    pub outputs: Vec<OutputKind>,
    /// Rows per calibration chunk; the last chunk holds the remainder
    pub chunk_rows: usize,
    pub stretch: StretchParams,
    pub flip_policy: GcpFlipPolicy,
    pub metadata_format: MetadataFormat,
    /// Polarization to pick among SAFE measurement files; None takes the first
    pub polarization: Option<String>,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            outputs: vec![OutputKind::Sigma],
            chunk_rows: DEFAULT_CHUNK_ROWS,
            stretch: StretchParams::default(),
            flip_policy: GcpFlipPolicy::Never,
            metadata_format: MetadataFormat::Json,
            polarization: None,
        }
    }
}

impl ProcessingParams {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn from_json_file(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&text)?)
    }
}
