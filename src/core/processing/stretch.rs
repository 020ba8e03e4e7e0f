use ndarray::{Array2, Zip};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::raster::BandStatistics;
use crate::types::{BitDepth, DataType, StretchPolicy, StretchProcedure};

/// Default multiplier of the standard deviation for `StretchProcedure::StdDev`.
pub const DEFAULT_STD_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Error, PartialEq)]
pub enum StretchConfigError {
    #[error("Unknown stretch procedure {0:?} (expected minmax or stddev)")]
    UnknownProcedure(String),
    #[error("Unknown stretch policy {0:?} (expected separate or together)")]
    UnknownPolicy(String),
    #[error("No band statistics to stretch")]
    EmptyBands,
}

/// Linear mapping of one band onto `[1, scale_range + 1]`.
#[derive(Copy, Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
pub struct StretchParameters {
    /// Largest stretched code before the +1 shift: `2^bits - 2`.
    pub scale_range: f64,
    pub dyn_range: f64,
    pub min_val: f64,
    /// Shift applied to samples before scaling.
    pub offset: f64,
}

impl StretchParameters {
    pub fn identity(scale_range: f64) -> Self {
        Self {
            scale_range,
            dyn_range: scale_range,
            min_val: 0.0,
            offset: 0.0,
        }
    }
}

/// Parameters for every band plus the bit depth actually produced.
#[derive(Clone, PartialEq, Debug)]
pub struct StretchPlan {
    pub bit_depth: BitDepth,
    pub bands: Vec<StretchParameters>,
}

impl StretchPlan {
    pub fn data_type(&self) -> DataType {
        match self.bit_depth {
            BitDepth::U8 => DataType::UInt8,
            BitDepth::U16 => DataType::UInt16,
        }
    }
}

pub fn scale_range(bit_depth: BitDepth) -> f64 {
    (2f64).powi(bit_depth.bits() as i32) - 2.0
}

/// Bit depth a stretch will actually produce: 8-bit sources are never
/// stretched to 16 bits.
pub fn effective_bit_depth(requested: BitDepth, source_bits: Option<u32>) -> BitDepth {
    match (requested, source_bits) {
        (BitDepth::U16, Some(bits)) if bits <= 8 => {
            warn!("Source has {} bits per sample; stretching to 8 bits instead of 16", bits);
            BitDepth::U8
        }
        (requested, _) => requested,
    }
}

/// Stretch window of one band before any cross-band harmonization.
pub fn band_window(stats: &BandStatistics, procedure: StretchProcedure, sd: f64) -> (f64, f64) {
    match procedure {
        StretchProcedure::MinMax => (stats.min, stats.max),
        StretchProcedure::StdDev => {
            let mut lo = stats.mean - sd * stats.std;
            let mut hi = stats.mean + sd * stats.std;
            match stats.data_type.integer_limits() {
                Some((tmin, tmax)) => {
                    lo = lo.max(tmin);
                    hi = hi.min(tmax);
                }
                None => {
                    // Float bands of one sign never get a bound of the other sign.
                    if stats.min >= 0.0 {
                        lo = lo.max(stats.min);
                    }
                    if stats.max <= 0.0 {
                        hi = hi.min(stats.max);
                    }
                }
            }
            (lo, hi.max(lo))
        }
    }
}

/// Compute per-band stretch parameters.
///
/// An 8-bit source asked for a 16-bit stretch is stretched to 8 bits instead.
pub fn compute_stretch(
    stats: &[BandStatistics],
    procedure: StretchProcedure,
    policy: StretchPolicy,
    bit_depth: BitDepth,
    sd: f64,
    source_bits: Option<u32>,
) -> Result<StretchPlan, StretchConfigError> {
    if stats.is_empty() {
        return Err(StretchConfigError::EmptyBands);
    }
    let bit_depth = effective_bit_depth(bit_depth, source_bits);
    let scale = scale_range(bit_depth);

    let windows: Vec<(f64, f64)> = stats
        .iter()
        .map(|s| band_window(s, procedure, sd))
        .collect();

    let bands = match policy {
        StretchPolicy::Separate => windows
            .iter()
            .map(|&(lo, hi)| StretchParameters {
                scale_range: scale,
                dyn_range: hi - lo,
                min_val: lo,
                offset: 0.0,
            })
            .collect(),
        StretchPolicy::Together => {
            let (lo_m, hi_m) = windows.iter().copied().fold(windows[0], |best, w| {
                if w.1 - w.0 > best.1 - best.0 { w } else { best }
            });
            debug!("Together stretch: master window [{:.4}, {:.4}]", lo_m, hi_m);
            windows
                .iter()
                .map(|&(lo, hi)| {
                    let offset = if lo < lo_m {
                        lo_m - lo
                    } else if hi > hi_m {
                        hi_m - hi
                    } else {
                        0.0
                    };
                    StretchParameters {
                        scale_range: scale,
                        dyn_range: hi_m - lo_m,
                        min_val: lo_m,
                        offset,
                    }
                })
                .collect()
        }
    };

    info!(
        "Stretch: {} / {} to {} bits over {} band(s)",
        procedure,
        policy,
        bit_depth.bits(),
        stats.len()
    );
    Ok(StretchPlan { bit_depth, bands })
}

/// Mask no-data, shift, rescale to `[0, scale_range]`, round, clip, add 1.
/// Masked samples become 0.
pub fn apply_stretch(
    chunk: &Array2<f64>,
    params: &StretchParameters,
    nodata: Option<f64>,
) -> Array2<f64> {
    let factor = if params.dyn_range > 0.0 {
        params.scale_range / params.dyn_range
    } else {
        0.0
    };
    let mut out = Array2::zeros(chunk.dim());
    Zip::from(&mut out).and(chunk).par_for_each(|o, &v| {
        *o = if v.is_nan() || nodata == Some(v) {
            0.0
        } else {
            let scaled = ((v + params.offset - params.min_val) * factor).round();
            scaled.clamp(0.0, params.scale_range) + 1.0
        };
    });
    out
}
