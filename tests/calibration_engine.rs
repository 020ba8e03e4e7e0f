use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::{Array2, array};
use num_complex::Complex;

use sarcal::core::processing::calibrate::{CalibrationEngine, CalibrationError, EngineState};
use sarcal::core::processing::stretch::{
    StretchParameters, apply_stretch, band_window, compute_stretch,
};
use sarcal::io::raster::{
    BandStatistics, Georeference, RasterError, RasterSink, RasterSize, RasterSource, SampleChunk,
};
use sarcal::io::MemoryRaster;
use sarcal::metadata::SceneBuilder;
use sarcal::{
    BitDepth, DataType, Dialect, OutputKind, SampleType, SceneMetadata, StretchPolicy,
    StretchProcedure,
};

fn scene(sample_type: SampleType, columns: usize, rows: usize) -> SceneMetadata {
    let mut b = SceneBuilder::new(Dialect::Rs2);
    b.acquisition = NaiveDate::from_ymd_opt(2008, 3, 12).and_then(|d| d.and_hms_opt(14, 15, 2));
    b.satellite = Some("RADARSAT-2".into());
    b.beam_mode = Some("F2".into());
    b.polarizations = vec!["HH".into(), "HV".into()];
    b.bits_per_sample = Some(16);
    b.sample_type = Some(sample_type);
    b.columns = Some(columns);
    b.rows = Some(rows);
    b.gain = Some(vec![2.0; columns]);
    b.noise = (0..columns).map(|c| c as f64 * 0.001).collect();
    b.incidence = (0..columns).map(|c| 20.0 + c as f64).collect();
    b.build().unwrap()
}

/// Records the row spans written per band.
#[derive(Default)]
struct RecordingSink {
    writes: Vec<(usize, usize, usize)>,
    flushed: bool,
}

impl RasterSink for RecordingSink {
    fn write_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        data: &Array2<f64>,
    ) -> Result<(), RasterError> {
        self.writes.push((band, first_row, data.nrows()));
        Ok(())
    }

    fn set_georeference(&mut self, _georef: &Georeference) -> Result<(), RasterError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RasterError> {
        self.flushed = true;
        Ok(())
    }
}

/// A source whose reads succeed but return nothing.
struct EmptySource;

impl RasterSource for EmptySource {
    fn size(&self) -> RasterSize {
        RasterSize {
            columns: 3,
            rows: 5,
            bands: 1,
        }
    }

    fn data_type(&self) -> DataType {
        DataType::UInt16
    }

    fn sample_type(&self) -> SampleType {
        SampleType::Real
    }

    fn read_chunk(
        &mut self,
        _band: usize,
        _first_row: usize,
        _rows: usize,
    ) -> Result<SampleChunk, RasterError> {
        Ok(SampleChunk::Real(Array2::zeros((0, 3))))
    }
}

#[test]
fn chunks_run_in_row_order_with_a_truncated_tail() {
    let scene = scene(SampleType::Real, 3, 7);
    let mut source = MemoryRaster::from_real(
        vec![Array2::from_elem((7, 3), 4.0), Array2::from_elem((7, 3), 6.0)],
        DataType::UInt16,
    )
    .unwrap();
    let mut sink = RecordingSink::default();
    let mut engine =
        CalibrationEngine::open(&scene, &[OutputKind::Sigma, OutputKind::Noise], 3).unwrap();
    let summary = engine.run(&mut source, &mut sink).unwrap();
    assert_eq!(engine.state(), EngineState::Finalized);
    assert_eq!(engine.close(), EngineState::Closed);

    // two sigma bands (one per source band), then the noise band once
    assert_eq!(summary.bands.len(), 3);
    assert_eq!(summary.chunks_written, 9);
    assert!(sink.flushed);
    let spans: Vec<(usize, usize)> = sink
        .writes
        .iter()
        .filter(|w| w.0 == 2)
        .map(|w| (w.1, w.2))
        .collect();
    assert_eq!(spans, vec![(0, 3), (3, 3), (6, 1)]);
}

#[test]
fn empty_read_is_fatal() {
    let scene = scene(SampleType::Real, 3, 5);
    let mut sink = RecordingSink::default();
    let mut engine = CalibrationEngine::open(&scene, &[OutputKind::Sigma], 2).unwrap();
    let err = engine.run(&mut EmptySource, &mut sink).unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::Read {
            band: 0,
            first_row: 0,
            source: RasterError::EmptyRead { .. }
        }
    ));
    assert!(sink.writes.is_empty());
}

#[test]
fn vector_length_is_checked_against_the_raster() {
    let scene = scene(SampleType::Real, 3, 2);
    let mut source = MemoryRaster::from_real(vec![Array2::zeros((2, 4))], DataType::UInt16).unwrap();
    let mut sink = RecordingSink::default();
    let mut engine = CalibrationEngine::open(&scene, &[OutputKind::Theta], 300).unwrap();
    assert!(matches!(
        engine.run(&mut source, &mut sink),
        Err(CalibrationError::VectorLength {
            vector: "incidence",
            expected: 4,
            found: 3
        })
    ));
}

#[test]
fn complex_source_feeds_every_kind() {
    let scene = scene(SampleType::Complex, 2, 1);
    let z = array![[Complex::new(3.0, 4.0), Complex::new(0.0, -2.0)]];
    let mut source = MemoryRaster::from_complex(vec![z], DataType::Int16).unwrap();
    let mut output = MemoryRaster::zeros(2, 1, 3, DataType::Float32);
    let kinds = [OutputKind::Sigma, OutputKind::Amplitude, OutputKind::Phase];
    let mut engine = CalibrationEngine::open(&scene, &kinds, 300).unwrap();
    engine.run(&mut source, &mut output).unwrap();

    assert_eq!(output.band(0).unwrap().row(0).to_vec(), vec![6.25, 1.0]);
    assert_eq!(output.band(1).unwrap().row(0).to_vec(), vec![5.0, 2.0]);
    let phase = output.band(2).unwrap();
    assert_abs_diff_eq!(phase[[0, 1]], -std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
}

#[test]
fn phase_needs_complex_samples() {
    let scene = scene(SampleType::Real, 2, 1);
    assert!(matches!(
        CalibrationEngine::open(&scene, &[OutputKind::Phase], 300),
        Err(CalibrationError::UnsupportedSampleType { .. })
    ));
}

fn stats(min: f64, max: f64, mean: f64, std: f64) -> BandStatistics {
    BandStatistics {
        min,
        max,
        mean,
        std,
        data_type: DataType::Float32,
        nodata: None,
    }
}

#[test]
fn identity_stretch_is_stable_and_masks_nodata() {
    let identity = StretchParameters::identity(254.0);
    let chunk = array![[0.0, 17.0, 254.0, -9999.0]];
    let once = apply_stretch(&chunk, &identity, Some(-9999.0));
    assert_eq!(once.row(0).to_vec(), vec![1.0, 18.0, 255.0, 0.0]);

    let unshifted = once.mapv(|v| if v == 0.0 { -9999.0 } else { v - 1.0 });
    let twice = apply_stretch(&unshifted, &identity, Some(-9999.0));
    assert_eq!(twice, once);
}

#[test]
fn together_policy_shifts_the_narrow_band_without_clipping() {
    let wide = stats(0.0, 1000.0, 500.0, 200.0);
    let narrow = stats(1050.0, 1300.0, 1150.0, 40.0);
    let bands = [wide, narrow];
    let plan = compute_stretch(
        &bands,
        StretchProcedure::StdDev,
        StretchPolicy::Together,
        BitDepth::U8,
        2.0,
        Some(16),
    )
    .unwrap();

    let (lo, hi) = band_window(&narrow, StretchProcedure::StdDev, 2.0);
    let p = plan.bands[1];
    let shifted_lo = lo + p.offset;
    let shifted_hi = hi + p.offset;
    assert!(shifted_lo >= p.min_val - 1e-9);
    assert!(shifted_hi <= p.min_val + p.dyn_range + 1e-9);
    assert_eq!(plan.bands[0].offset, 0.0);

    // both ends of the narrow window land strictly inside the code range
    let codes = apply_stretch(&array![[lo, hi]], &p, None);
    assert!(codes[[0, 0]] >= 1.0 && codes[[0, 1]] <= 255.0);
    assert!(codes[[0, 1]] - codes[[0, 0]] > 0.0);
}

#[test]
fn sixteen_bit_request_on_eight_bit_source_downgrades() {
    let plan = compute_stretch(
        &[stats(0.0, 10.0, 5.0, 1.0)],
        StretchProcedure::MinMax,
        StretchPolicy::Separate,
        BitDepth::U16,
        2.0,
        Some(8),
    )
    .unwrap();
    assert_eq!(plan.bit_depth, BitDepth::U8);
    assert_eq!(plan.bands[0].scale_range, 254.0);
    assert_eq!(plan.data_type(), DataType::UInt8);
}
