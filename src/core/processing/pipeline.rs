use tracing::{debug, info};

use crate::core::params::ProcessingParams;
use crate::core::processing::calibrate::{BandPlan, CalibrationEngine};
use crate::core::processing::stretch::{StretchPlan, apply_stretch, compute_stretch};
use crate::io::raster::{BandStatistics, RasterSink, RasterSource, SampleChunk, chunk_ranges};
use crate::metadata::SceneMetadata;

/// What one image pass produced.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSummary {
    pub bands: Vec<BandPlan>,
    pub chunks_written: usize,
    /// Statistics of the unstretched bands; empty when no stretch was applied.
    pub statistics: Vec<BandStatistics>,
    pub stretch: Option<StretchPlan>,
}

/// Calibrate `source` straight into `output`.
pub fn calibrate_to<S, W>(
    scene: &SceneMetadata,
    source: &mut S,
    output: &mut W,
    params: &ProcessingParams,
) -> crate::Result<PipelineSummary>
where
    S: RasterSource + ?Sized,
    W: RasterSink + ?Sized,
{
    let mut engine = CalibrationEngine::open(scene, &params.outputs, params.chunk_rows)?;
    let summary = engine.run(source, output)?;
    engine.close();
    Ok(PipelineSummary {
        bands: summary.bands,
        chunks_written: summary.chunks_written,
        statistics: Vec::new(),
        stretch: None,
    })
}

/// Calibrate into `intermediate`, gather per-band statistics over the
/// unstretched result, then stretch every chunk into `output`.
pub fn calibrate_and_stretch<S, I, W>(
    scene: &SceneMetadata,
    source: &mut S,
    intermediate: &mut I,
    output: &mut W,
    params: &ProcessingParams,
) -> crate::Result<PipelineSummary>
where
    S: RasterSource + ?Sized,
    I: RasterSource + RasterSink + ?Sized,
    W: RasterSink + ?Sized,
{
    let calibrated = calibrate_to(scene, source, intermediate, params)?;

    let size = intermediate.size();
    let statistics = calibrated
        .bands
        .iter()
        .enumerate()
        .map(|(band, _)| intermediate.band_statistics(band, params.chunk_rows))
        .collect::<Result<Vec<_>, _>>()?;
    for (band, s) in statistics.iter().enumerate() {
        debug!(
            "Band {} statistics: min={:.4} max={:.4} mean={:.4} std={:.4}",
            band, s.min, s.max, s.mean, s.std
        );
    }

    let stretch = compute_stretch(
        &statistics,
        params.stretch.procedure,
        params.stretch.policy,
        params.stretch.bit_depth.into(),
        params.stretch.std_multiplier,
        Some(scene.bits_per_sample),
    )?;

    let mut chunks_written = 0;
    for (band, (band_params, stats)) in stretch.bands.iter().zip(&statistics).enumerate() {
        for (first_row, rows) in chunk_ranges(size.rows, params.chunk_rows) {
            let chunk = match intermediate.read_chunk(band, first_row, rows)? {
                SampleChunk::Real(a) => a,
                SampleChunk::Complex(_) => {
                    return Err(crate::Error::Processing(
                        "calibrated band holds complex samples".to_string(),
                    ));
                }
            };
            output.write_chunk(band, first_row, &apply_stretch(&chunk, band_params, stats.nodata))?;
            chunks_written += 1;
        }
    }
    output.flush()?;
    info!(
        "Stretched {} band(s) to {} bits",
        stretch.bands.len(),
        stretch.bit_depth.bits()
    );

    Ok(PipelineSummary {
        bands: calibrated.bands,
        chunks_written: calibrated.chunks_written + chunks_written,
        statistics,
        stretch: Some(stretch),
    })
}
