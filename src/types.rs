//! Shared types and enums used across SARCAL.
//! Includes `Dialect`, `OutputKind`, `SampleType`, `PixelOrder`, `PassDirection`,
//! stretch selectors (`StretchProcedure`, `StretchPolicy`), bit depths
//! (`BitDepth`, `BitDepthArg`) and the raster `DataType`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Raw product format a scene was delivered in.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum Dialect {
    /// Legacy CEOS leader/trailer binary set (dialect "A")
    Ceos,
    /// Legacy flat binary CDPF product (dialect "B")
    Cdpf,
    /// RADARSAT-2 vendor `product.xml` (dialect "C")
    Rs2,
    /// Sentinel-1 SAFE manifest and annotation XML (dialect "D")
    Safe,
}

impl Dialect {
    /// Half-pixel offset `o` in the extrema check `max + 0.5 == n - o`.
    /// It is 0.5 where GCPs address pixel centres by zero-based index (the
    /// XML dialects, first centre at 0.0). It is 0 where GCP coordinates sit on
    /// the pixel-corner grid (the binary dialects, first centre at 0.5).
    pub fn gcp_offset(self) -> f64 {
        match self {
            Dialect::Ceos | Dialect::Cdpf => 0.0,
            Dialect::Rs2 | Dialect::Safe => 0.5,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dialect::Ceos => "CEOS",
            Dialect::Cdpf => "CDPF",
            Dialect::Rs2 => "RS2",
            Dialect::Safe => "SAFE",
        };
        write!(f, "{}", s)
    }
}

/// Calibrated product written for one output band.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum OutputKind {
    Amplitude,
    Sigma,
    Phase,
    Noise,
    Theta,
}

impl OutputKind {
    /// Noise and theta are broadcast from per-column vectors and never touch the source raster.
    pub fn reads_source(self) -> bool {
        !matches!(self, OutputKind::Noise | OutputKind::Theta)
    }
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::Amplitude => write!(f, "amplitude"),
            OutputKind::Sigma => write!(f, "sigma"),
            OutputKind::Phase => write!(f, "phase"),
            OutputKind::Noise => write!(f, "noise"),
            OutputKind::Theta => write!(f, "theta"),
        }
    }
}

/// Layout of the source samples.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SampleType {
    /// Detected magnitude, one real value per pixel
    Real,
    /// In-phase/quadrature pair per pixel
    Complex,
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleType::Real => write!(f, "Real"),
            SampleType::Complex => write!(f, "Complex"),
        }
    }
}

/// Direction in which source samples run across a line.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PixelOrder {
    Increasing,
    Decreasing,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PassDirection {
    Ascending,
    Descending,
}

impl PassDirection {
    /// Accepts the spellings used across dialects ("A", "ASCENDING", "Ascending", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().chars().next()? {
            'A' => Some(PassDirection::Ascending),
            'D' => Some(PassDirection::Descending),
            _ => None,
        }
    }
}

impl std::fmt::Display for PassDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassDirection::Ascending => write!(f, "Ascending"),
            PassDirection::Descending => write!(f, "Descending"),
        }
    }
}

/// How per-band statistics become a stretch window.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum StretchProcedure {
    MinMax,
    StdDev,
}

impl std::str::FromStr for StretchProcedure {
    type Err = crate::core::processing::stretch::StretchConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minmax" | "min-max" | "min_max" => Ok(StretchProcedure::MinMax),
            "std" | "stddev" | "std-dev" | "sd" => Ok(StretchProcedure::StdDev),
            other => Err(Self::Err::UnknownProcedure(other.to_string())),
        }
    }
}

impl std::fmt::Display for StretchProcedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StretchProcedure::MinMax => write!(f, "MinMax"),
            StretchProcedure::StdDev => write!(f, "StdDev"),
        }
    }
}

/// Cross-band stretch policy.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum StretchPolicy {
    Separate,
    Together,
}

impl std::str::FromStr for StretchPolicy {
    type Err = crate::core::processing::stretch::StretchConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "separate" => Ok(StretchPolicy::Separate),
            "together" => Ok(StretchPolicy::Together),
            other => Err(Self::Err::UnknownPolicy(other.to_string())),
        }
    }
}

impl std::fmt::Display for StretchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StretchPolicy::Separate => write!(f, "Separate"),
            StretchPolicy::Together => write!(f, "Together"),
        }
    }
}

/// What to do with GCP pixel coordinates on descending passes.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default, Serialize, Deserialize)]
pub enum GcpFlipPolicy {
    #[default]
    Never,
    DescendingPass,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum BitDepthArg {
    U8,
    U16,
}

#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
pub enum BitDepth {
    U8,
    U16,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::U8 => 8,
            BitDepth::U16 => 16,
        }
    }
}

impl From<BitDepthArg> for BitDepth {
    fn from(arg: BitDepthArg) -> Self {
        match arg {
            BitDepthArg::U8 => BitDepth::U8,
            BitDepthArg::U16 => BitDepth::U16,
        }
    }
}

/// Storage type of a raster band, as reported by the raster collaborator.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    UInt16,
    Int16,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Representable range for integer types; `None` for floats.
    pub fn integer_limits(self) -> Option<(f64, f64)> {
        match self {
            DataType::UInt8 => Some((0.0, u8::MAX as f64)),
            DataType::UInt16 => Some((0.0, u16::MAX as f64)),
            DataType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            DataType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            DataType::Float32 | DataType::Float64 => None,
        }
    }
}

/// Sidecar format for the produced metadata record.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Serialize, Deserialize)]
pub enum MetadataFormat {
    Json,
    Delimited,
    None,
}
