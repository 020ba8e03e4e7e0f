//! Chunked radiometric calibration.
//!
//! The engine walks every output band in declared order and every chunk of
//! `chunk_rows` rows in increasing row order:
//! `Open -> (per band: per chunk: Read -> Calibrate -> Write) -> Finalize -> Closed`.
//! Kernels run in parallel over the samples of a chunk; writes are issued one
//! chunk at a time, in row order.
use ndarray::{Array1, Array2, Zip};
use num_complex::Complex;
use thiserror::Error;
use tracing::{debug, info};

use crate::io::raster::{RasterError, RasterSink, RasterSource, SampleChunk, chunk_ranges};
use crate::metadata::{CalibrationOffset, SceneMetadata};
use crate::types::{OutputKind, SampleType};

pub const DEFAULT_CHUNK_ROWS: usize = 300;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("{kind} output is not defined for {sample} source samples")]
    UnsupportedSampleType { kind: OutputKind, sample: SampleType },
    #[error("Reading band {band} at row {first_row} failed: {source}")]
    Read {
        band: usize,
        first_row: usize,
        #[source]
        source: RasterError,
    },
    #[error("Writing band {band} at row {first_row} failed: {source}")]
    Write {
        band: usize,
        first_row: usize,
        #[source]
        source: RasterError,
    },
    #[error("{vector} vector has {found} entries but the raster has {expected} columns")]
    VectorLength {
        vector: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Scene has no {0} vector")]
    MissingVector(&'static str),
    #[error("Source raster has no bands")]
    NoBands,
    #[error("Calibration engine is {state:?}; cannot {action}")]
    InvalidState {
        state: EngineState,
        action: &'static str,
    },
}

/// Per-column vector as a row that broadcasts over a chunk.
fn column_row(values: &[f64]) -> Array1<f64> {
    Array1::from(values.to_vec())
}

fn offset_row(offset: &CalibrationOffset, columns: usize) -> Array1<f64> {
    Array1::from_iter((0..columns).map(|c| offset.at(c)))
}

/// `|z|^2 / gain^2`
pub fn complex_sigma(chunk: &Array2<Complex<f64>>, gain: &[f64]) -> Array2<f64> {
    let gain = column_row(gain);
    let mut out = Array2::zeros(chunk.dim());
    Zip::from(&mut out)
        .and(chunk)
        .and_broadcast(&gain)
        .par_for_each(|o, z, g| *o = z.norm_sqr() / (g * g));
    out
}

/// `ceil(sqrt(|z|^2))`
pub fn complex_amplitude(chunk: &Array2<Complex<f64>>) -> Array2<f64> {
    let mut out = Array2::zeros(chunk.dim());
    Zip::from(&mut out)
        .and(chunk)
        .par_for_each(|o, z| *o = z.norm_sqr().sqrt().ceil());
    out
}

/// Phase angle in radians, `atan2(imag, real)`.
pub fn complex_phase(chunk: &Array2<Complex<f64>>) -> Array2<f64> {
    let mut out = Array2::zeros(chunk.dim());
    Zip::from(&mut out)
        .and(chunk)
        .par_for_each(|o, z| *o = z.im.atan2(z.re));
    out
}

/// `(dn^2 - offset) / gain`, squared in floating point.
pub fn real_sigma(chunk: &Array2<f64>, gain: &[f64], offset: &CalibrationOffset) -> Array2<f64> {
    let gain = column_row(gain);
    let offset = offset_row(offset, chunk.ncols());
    let mut out = Array2::zeros(chunk.dim());
    Zip::from(&mut out)
        .and(chunk)
        .and_broadcast(&gain)
        .and_broadcast(&offset)
        .par_for_each(|o, &dn, g, b| *o = (dn * dn - b) / g);
    out
}

/// `clip(dn, 0, 2^bits - 2) + 1`; 0 stays free for no-data and the top code
/// guards against overflow.
pub fn real_amplitude(chunk: &Array2<f64>, bits_per_sample: u32) -> Array2<f64> {
    let top = ((2f64).powi(bits_per_sample as i32) - 2.0).max(0.0);
    chunk.mapv(|dn| dn.clamp(0.0, top) + 1.0)
}

/// Repeat a per-column vector over `rows` rows.
pub fn broadcast_columns(values: &[f64], rows: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, values.len()), |(_, c)| values[c])
}

/// One output band: what it holds and which source band feeds it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BandPlan {
    pub kind: OutputKind,
    /// `None` for outputs broadcast from per-column vectors.
    pub source_band: Option<usize>,
}

/// Output bands in write order: every source band gets each sample-derived
/// kind; noise and theta are written once.
pub fn plan_bands(outputs: &[OutputKind], source_bands: usize) -> Vec<BandPlan> {
    let mut plan = Vec::new();
    for band in 0..source_bands {
        plan.extend(outputs.iter().filter(|k| k.reads_source()).map(|&kind| BandPlan {
            kind,
            source_band: Some(band),
        }));
    }
    plan.extend(outputs.iter().filter(|k| !k.reads_source()).map(|&kind| BandPlan {
        kind,
        source_band: None,
    }));
    plan
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EngineState {
    Open,
    Running { band: usize, next_row: usize },
    Finalized,
    Closed,
}

#[derive(Clone, PartialEq, Debug)]
pub struct CalibrationSummary {
    pub bands: Vec<BandPlan>,
    pub chunks_written: usize,
}

/// Calibration pass over one image.
pub struct CalibrationEngine<'a> {
    scene: &'a SceneMetadata,
    outputs: Vec<OutputKind>,
    chunk_rows: usize,
    state: EngineState,
}

impl<'a> CalibrationEngine<'a> {
    /// Validate the requested outputs against the scene's sample type and
    /// vectors.
    pub fn open(
        scene: &'a SceneMetadata,
        outputs: &[OutputKind],
        chunk_rows: usize,
    ) -> Result<Self, CalibrationError> {
        for &kind in outputs {
            if kind == OutputKind::Phase && scene.sample_type == SampleType::Real {
                return Err(CalibrationError::UnsupportedSampleType {
                    kind,
                    sample: scene.sample_type,
                });
            }
            match kind {
                OutputKind::Sigma if scene.calibration.gain.is_empty() => {
                    return Err(CalibrationError::MissingVector("gain"));
                }
                OutputKind::Noise if scene.noise.is_empty() => {
                    return Err(CalibrationError::MissingVector("noise"));
                }
                OutputKind::Theta if scene.incidence.is_empty() => {
                    return Err(CalibrationError::MissingVector("incidence"));
                }
                _ => {}
            }
        }
        Ok(Self {
            scene,
            outputs: outputs.to_vec(),
            chunk_rows: chunk_rows.max(1),
            state: EngineState::Open,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    fn vector(&self, kind: OutputKind) -> Option<(&'static str, &[f64])> {
        match kind {
            OutputKind::Sigma => Some(("gain", &self.scene.calibration.gain)),
            OutputKind::Noise => Some(("noise", &self.scene.noise)),
            OutputKind::Theta => Some(("incidence", &self.scene.incidence)),
            OutputKind::Amplitude | OutputKind::Phase => None,
        }
    }

    fn check_lengths(&self, columns: usize) -> Result<(), CalibrationError> {
        for &kind in &self.outputs {
            if let Some((vector, values)) = self.vector(kind) {
                if values.len() != columns {
                    return Err(CalibrationError::VectorLength {
                        vector,
                        expected: columns,
                        found: values.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Calibrate one chunk. `samples` is ignored for broadcast outputs.
    pub fn calibrate_chunk(
        &self,
        kind: OutputKind,
        samples: Option<&SampleChunk>,
        rows: usize,
    ) -> Result<Array2<f64>, CalibrationError> {
        let scene = self.scene;
        let unsupported = |sample| CalibrationError::UnsupportedSampleType { kind, sample };
        match (kind, samples) {
            (OutputKind::Noise, _) => Ok(broadcast_columns(&scene.noise, rows)),
            (OutputKind::Theta, _) => Ok(broadcast_columns(&scene.incidence, rows)),
            (OutputKind::Sigma, Some(SampleChunk::Complex(z))) => {
                Ok(complex_sigma(z, &scene.calibration.gain))
            }
            (OutputKind::Sigma, Some(SampleChunk::Real(dn))) => Ok(real_sigma(
                dn,
                &scene.calibration.gain,
                &scene.calibration.offset,
            )),
            (OutputKind::Amplitude, Some(SampleChunk::Complex(z))) => Ok(complex_amplitude(z)),
            (OutputKind::Amplitude, Some(SampleChunk::Real(dn))) => {
                Ok(real_amplitude(dn, scene.bits_per_sample))
            }
            (OutputKind::Phase, Some(SampleChunk::Complex(z))) => Ok(complex_phase(z)),
            (OutputKind::Phase, Some(SampleChunk::Real(_))) => Err(unsupported(SampleType::Real)),
            (_, None) => Err(unsupported(scene.sample_type)),
        }
    }

    /// Run every band and chunk, then finalize the sink.
    pub fn run<S, W>(
        &mut self,
        source: &mut S,
        sink: &mut W,
    ) -> Result<CalibrationSummary, CalibrationError>
    where
        S: RasterSource + ?Sized,
        W: RasterSink + ?Sized,
    {
        if self.state != EngineState::Open {
            return Err(CalibrationError::InvalidState {
                state: self.state,
                action: "run",
            });
        }
        let size = source.size();
        if size.bands == 0 {
            return Err(CalibrationError::NoBands);
        }
        self.check_lengths(size.columns)?;

        let plan = plan_bands(&self.outputs, size.bands);
        info!(
            "Calibrating {} output band(s) over {}x{} raster in chunks of {} rows",
            plan.len(),
            size.columns,
            size.rows,
            self.chunk_rows
        );

        let mut chunks_written = 0;
        for (out_band, entry) in plan.iter().enumerate() {
            debug!("Band {}: {} from {:?}", out_band, entry.kind, entry.source_band);
            for (first_row, rows) in chunk_ranges(size.rows, self.chunk_rows) {
                self.state = EngineState::Running {
                    band: out_band,
                    next_row: first_row,
                };
                let samples = match entry.source_band {
                    Some(band) => {
                        let chunk = source.read_chunk(band, first_row, rows).map_err(|source| {
                            CalibrationError::Read {
                                band,
                                first_row,
                                source,
                            }
                        })?;
                        if chunk.is_empty() {
                            return Err(CalibrationError::Read {
                                band,
                                first_row,
                                source: RasterError::EmptyRead { band, first_row },
                            });
                        }
                        Some(chunk)
                    }
                    None => None,
                };
                let out = self.calibrate_chunk(entry.kind, samples.as_ref(), rows)?;
                sink.write_chunk(out_band, first_row, &out)
                    .map_err(|source| CalibrationError::Write {
                        band: out_band,
                        first_row,
                        source,
                    })?;
                chunks_written += 1;
            }
        }

        self.finalize(sink)?;
        Ok(CalibrationSummary {
            bands: plan,
            chunks_written,
        })
    }

    fn finalize<W: RasterSink + ?Sized>(&mut self, sink: &mut W) -> Result<(), CalibrationError> {
        sink.flush().map_err(|source| CalibrationError::Write {
            band: 0,
            first_row: 0,
            source,
        })?;
        self.state = EngineState::Finalized;
        Ok(())
    }

    pub fn close(mut self) -> EngineState {
        self.state = EngineState::Closed;
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn real_sigma_squares_then_divides_by_gain() {
        let out = real_sigma(&array![[8.0]], &[2.0], &CalibrationOffset::Scalar(0.0));
        assert_eq!(out[[0, 0]], 32.0);
        let out = real_sigma(&array![[8.0, 8.0]], &[2.0, 4.0], &CalibrationOffset::Scalar(4.0));
        assert_eq!(out.row(0).to_vec(), vec![30.0, 15.0]);
    }

    #[test]
    fn real_amplitude_reserves_zero_and_top_code() {
        let out = real_amplitude(&array![[300.0, 0.0, -5.0, 10.0]], 8);
        assert_eq!(out.row(0).to_vec(), vec![255.0, 1.0, 1.0, 11.0]);
    }

    #[test]
    fn complex_kernels() {
        let z = array![[Complex::new(3.0, 4.0), Complex::new(1.0, 1.0)]];
        assert_eq!(complex_sigma(&z, &[5.0, 1.0]).row(0).to_vec(), vec![1.0, 2.0]);
        assert_eq!(complex_amplitude(&z).row(0).to_vec(), vec![5.0, 2.0]);
        let phase = complex_phase(&z);
        assert_abs_diff_eq!(phase[[0, 1]], std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn broadcast_repeats_each_column() {
        let out = broadcast_columns(&[1.0, 2.0, 3.0], 2);
        assert_eq!(out, array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]]);
    }

    #[test]
    fn plan_writes_broadcast_outputs_once() {
        let plan = plan_bands(&[OutputKind::Theta, OutputKind::Sigma], 2);
        assert_eq!(
            plan,
            vec![
                BandPlan { kind: OutputKind::Sigma, source_band: Some(0) },
                BandPlan { kind: OutputKind::Sigma, source_band: Some(1) },
                BandPlan { kind: OutputKind::Theta, source_band: None },
            ]
        );
    }
}
