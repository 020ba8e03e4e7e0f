//! High-level library API: read and normalize a scene, validate its geocoding,
//! calibrate (and optionally stretch) it into any raster sink, or run the whole
//! chain from product files to a GeoTIFF plus metadata sidecar. Batch helpers
//! report per-scene failures through a `Diagnostics` sink and never let one
//! scene's error stop the others.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::geocoding::{GeometryService, geocode, geotransform};
use crate::core::params::ProcessingParams;
use crate::core::processing::calibrate::plan_bands;
use crate::core::processing::pipeline::{PipelineSummary, calibrate_and_stretch, calibrate_to};
use crate::error::{Error, Result};
use crate::io::product::{load_source, normalize};
use crate::io::raster::{MemoryRaster, RasterSink, RasterSource};
use crate::metadata::{MetadataRecord, SceneMetadata};
use crate::types::{DataType, Dialect, GcpFlipPolicy};

/// Surfaces per-scene progress and failures. The core never prints; callers
/// decide where outcomes go.
pub trait Diagnostics {
    fn scene_started(&self, _input: &Path) {}

    fn scene_succeeded(&self, _input: &Path, _report: &SceneReport) {}

    fn scene_failed(&self, input: &Path, error: &Error);
}

/// Reports through `tracing`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn scene_started(&self, input: &Path) {
        info!("Processing: {:?}", input);
    }

    fn scene_succeeded(&self, input: &Path, report: &SceneReport) {
        info!(
            "Successfully processed: {:?} -> {:?} ({})",
            input, report.output, report.product_name
        );
    }

    fn scene_failed(&self, input: &Path, error: &Error) {
        warn!("Error processing {:?}: {}", input, error);
    }
}

/// Outcome of one processed scene.
#[derive(Clone, Debug)]
pub struct SceneReport {
    pub product_name: String,
    pub output: PathBuf,
    pub sidecar: Option<PathBuf>,
    pub record: MetadataRecord,
    pub summary: PipelineSummary,
}

/// Batch processing report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub errors: usize,
}

/// Read a product's raw metadata and normalize it.
pub fn read_scene(
    dialect: Dialect,
    inputs: &[PathBuf],
    polarization: Option<&str>,
) -> Result<SceneMetadata> {
    let raw = load_source(dialect, inputs, polarization)?;
    Ok(normalize(&raw)?)
}

/// Validate GCPs against a `columns` x `rows` raster and attach corners.
pub fn geocode_scene(
    scene: SceneMetadata,
    columns: usize,
    rows: usize,
    geometry: &dyn GeometryService,
    policy: GcpFlipPolicy,
) -> Result<SceneMetadata> {
    Ok(geocode(scene, columns, rows, geometry, policy)?)
}

/// Produced metadata record, with a geotransform when the scene is geocoded.
pub fn scene_record(scene: &SceneMetadata) -> MetadataRecord {
    let gt = scene
        .corners
        .as_ref()
        .map(|c| geotransform(c, scene.dialect));
    MetadataRecord::from_scene(scene, gt)
}

/// Calibrate `source` into `output`, stretching through an in-memory
/// intermediate when the parameters ask for it.
pub fn calibrate_scene<S, W>(
    scene: &SceneMetadata,
    source: &mut S,
    output: &mut W,
    params: &ProcessingParams,
) -> Result<PipelineSummary>
where
    S: RasterSource + ?Sized,
    W: RasterSink + ?Sized,
{
    if !params.stretch.enabled {
        return calibrate_to(scene, source, output, params);
    }
    let size = source.size();
    let bands = plan_bands(&params.outputs, size.bands).len();
    let mut intermediate = MemoryRaster::zeros(size.columns, size.rows, bands, DataType::Float64);
    calibrate_and_stretch(scene, source, &mut intermediate, output, params)
}

/// Raster file GDAL should open for a product when none is given explicitly.
pub fn default_image_path(dialect: Dialect, inputs: &[PathBuf]) -> Option<PathBuf> {
    let first = inputs.first()?;
    match dialect {
        Dialect::Ceos => inputs
            .iter()
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_ascii_uppercase().starts_with("DAT"))
            })
            .cloned(),
        Dialect::Cdpf => Some(first.clone()),
        Dialect::Rs2 => Some(first.join("product.xml")),
        Dialect::Safe => Some(first.join("manifest.safe")),
    }
}

#[cfg(feature = "gdal")]
pub use self::gdal_api::{SceneJob, process_scene_to_path, process_scenes};

#[cfg(feature = "gdal")]
mod gdal_api {
    use super::*;
    use crate::core::processing::stretch::effective_bit_depth;
    use crate::io::gdal::{GdalGeometry, GdalRaster};
    use crate::io::raster::Georeference;
    use crate::io::writers::metadata::handle_metadata;
    use crate::io::writers::tiff::GeoTiffWriter;
    use crate::types::BitDepth;

    /// One product to process in a batch.
    #[derive(Clone, Debug)]
    pub struct SceneJob {
        pub dialect: Dialect,
        pub inputs: Vec<PathBuf>,
        /// Raster to calibrate; `default_image_path` when `None`
        pub image: Option<PathBuf>,
    }

    /// Read, geocode, calibrate and write one scene to `output` as GeoTIFF,
    /// with the metadata record embedded and written as a sidecar.
    pub fn process_scene_to_path(
        job: &SceneJob,
        output: &Path,
        params: &ProcessingParams,
    ) -> Result<SceneReport> {
        let mut scene = read_scene(job.dialect, &job.inputs, params.polarization.as_deref())?;
        let image = job
            .image
            .clone()
            .or_else(|| default_image_path(job.dialect, &job.inputs))
            .ok_or_else(|| Error::MissingArgument {
                arg: "--image".to_string(),
            })?;
        let mut source = GdalRaster::open(&image)?;
        if scene.gcp_srs.is_none() {
            scene.gcp_srs = source.gcp_projection();
        }
        let size = source.size();
        let scene = geocode_scene(
            scene,
            size.columns,
            size.rows,
            &GdalGeometry,
            params.flip_policy,
        )?;

        let bands = plan_bands(&params.outputs, size.bands).len();
        let summary = if params.stretch.enabled {
            let bit_depth = effective_bit_depth(
                params.stretch.bit_depth.into(),
                Some(scene.bits_per_sample),
            );
            let data_type = match bit_depth {
                BitDepth::U8 => DataType::UInt8,
                BitDepth::U16 => DataType::UInt16,
            };
            let tmp = tempfile::tempdir()?;
            let mut intermediate = GeoTiffWriter::create(
                &tmp.path().join("calibrated.tif"),
                size.columns,
                size.rows,
                bands,
                DataType::Float32,
            )?;
            let mut writer =
                GeoTiffWriter::create(output, size.columns, size.rows, bands, data_type)?;
            let summary =
                calibrate_and_stretch(&scene, &mut source, &mut intermediate, &mut writer, params)?;
            finish_output(&mut writer, &scene)?;
            summary
        } else {
            let mut writer =
                GeoTiffWriter::create(output, size.columns, size.rows, bands, DataType::Float32)?;
            let summary = calibrate_to(&scene, &mut source, &mut writer, params)?;
            finish_output(&mut writer, &scene)?;
            summary
        };

        let record = scene_record(&scene);
        let sidecar = handle_metadata(&record, params.metadata_format, output)?;
        Ok(SceneReport {
            product_name: scene.product_name.clone(),
            output: output.to_path_buf(),
            sidecar,
            record,
            summary,
        })
    }

    fn finish_output(writer: &mut GeoTiffWriter, scene: &SceneMetadata) -> Result<()> {
        if let Some(corners) = &scene.corners {
            writer.set_georeference(&Georeference::Corners {
                corners: *corners,
                dialect: scene.dialect,
            })?;
        }
        writer.set_metadata(&scene_record(scene).items())?;
        writer.flush()?;
        Ok(())
    }

    /// Process every job into `output_dir`, naming outputs by canonical
    /// product name. Failures are reported to `diagnostics` and counted.
    pub fn process_scenes(
        jobs: &[SceneJob],
        output_dir: &Path,
        params: &ProcessingParams,
        diagnostics: &dyn Diagnostics,
    ) -> Result<BatchReport> {
        std::fs::create_dir_all(output_dir)?;
        let mut report = BatchReport::default();
        for job in jobs {
            let label = job.inputs.first().cloned().unwrap_or_default();
            diagnostics.scene_started(&label);
            let outcome = read_scene(job.dialect, &job.inputs, params.polarization.as_deref())
                .and_then(|scene| {
                    let output = output_dir.join(format!("{}.tif", scene.product_name));
                    process_scene_to_path(job, &output, params)
                });
            match outcome {
                Ok(scene_report) => {
                    diagnostics.scene_succeeded(&label, &scene_report);
                    report.processed += 1;
                }
                Err(e) => {
                    diagnostics.scene_failed(&label, &e);
                    report.errors += 1;
                }
            }
        }
        info!(
            "Batch complete: processed={} errors={}",
            report.processed, report.errors
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geocoding::NamedGeometry;
    use crate::io::product::fixtures::CdpfFixture;
    use crate::types::{BitDepthArg, OutputKind, StretchProcedure};
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::fs;

    fn synthetic_scene(dir: &Path) -> SceneMetadata {
        let path = dir.join("product.cdpf");
        fs::write(&path, CdpfFixture::default().bytes()).unwrap();
        read_scene(Dialect::Cdpf, &[path], None).unwrap()
    }

    fn samples(dn: f64) -> MemoryRaster {
        let band = Array2::from_elem((CdpfFixture::ROWS, CdpfFixture::COLUMNS), dn);
        MemoryRaster::from_real(vec![band], DataType::UInt16).unwrap()
    }

    #[test]
    fn scene_is_read_geocoded_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let scene = synthetic_scene(dir.path());
        assert!(scene_record(&scene).geotransform.is_none());

        let scene = geocode_scene(scene, 4, 3, &NamedGeometry, GcpFlipPolicy::Never).unwrap();
        assert_eq!(scene.spatial_reference.as_deref(), Some("EPSG:4326"));
        let record = scene_record(&scene);
        assert_eq!(record.product_name, "19980704_010203_r1_s3_hh");
        assert!(record.footprint.unwrap().starts_with("POLYGON ((-75 45.5, -74 45.5"));
        let gt = record.geotransform.unwrap();
        assert_relative_eq!(gt[1], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(gt[5], -0.25, epsilon = 1e-12);
        assert_relative_eq!(gt[0], -75.0 - 0.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(gt[3], 45.625, epsilon = 1e-12);
    }

    #[test]
    fn geocoding_rejects_a_mismatched_raster() {
        let dir = tempfile::tempdir().unwrap();
        let scene = synthetic_scene(dir.path());
        let err = geocode_scene(scene, 5, 3, &NamedGeometry, GcpFlipPolicy::Never).unwrap_err();
        assert!(matches!(err, Error::Geocoding(_)));
    }

    #[test]
    fn calibrates_sigma_and_broadcasts_theta() {
        let dir = tempfile::tempdir().unwrap();
        let scene = synthetic_scene(dir.path());
        let mut source = samples(4.0);
        let mut output = MemoryRaster::zeros(4, 3, 2, DataType::Float32);
        let params = ProcessingParams {
            outputs: vec![OutputKind::Theta, OutputKind::Sigma],
            chunk_rows: 2,
            ..ProcessingParams::default()
        };
        let summary = calibrate_scene(&scene, &mut source, &mut output, &params).unwrap();
        assert_eq!(summary.chunks_written, 4);
        assert!(summary.stretch.is_none());
        for row in output.band(0).unwrap().rows() {
            assert_eq!(row.to_vec(), vec![8.0, 8.0, 4.0, 4.0]);
        }
        for row in output.band(1).unwrap().rows() {
            assert_eq!(row.to_vec(), vec![20.0, 25.0, 30.0, 35.0]);
        }
    }

    #[test]
    fn stretched_output_spans_the_code_range() {
        let dir = tempfile::tempdir().unwrap();
        let scene = synthetic_scene(dir.path());
        let mut source = samples(4.0);
        let mut output = MemoryRaster::zeros(4, 3, 2, DataType::UInt8);
        let mut params = ProcessingParams {
            outputs: vec![OutputKind::Sigma, OutputKind::Theta],
            chunk_rows: 2,
            ..ProcessingParams::default()
        };
        params.stretch.enabled = true;
        params.stretch.procedure = StretchProcedure::MinMax;
        params.stretch.bit_depth = BitDepthArg::U8;

        let summary = calibrate_scene(&scene, &mut source, &mut output, &params).unwrap();
        assert_eq!(summary.chunks_written, 8);
        assert_eq!(summary.statistics[0].min, 4.0);
        assert_eq!(summary.statistics[0].max, 8.0);
        assert_eq!(output.band(0).unwrap().row(2).to_vec(), vec![255.0, 255.0, 1.0, 1.0]);
        assert_eq!(output.band(1).unwrap().row(0).to_vec(), vec![1.0, 86.0, 170.0, 255.0]);
    }

    #[test]
    fn phase_of_real_samples_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let scene = synthetic_scene(dir.path());
        let mut source = samples(1.0);
        let mut output = MemoryRaster::zeros(4, 3, 1, DataType::Float32);
        let params = ProcessingParams {
            outputs: vec![OutputKind::Phase],
            ..ProcessingParams::default()
        };
        let err = calibrate_scene(&scene, &mut source, &mut output, &params).unwrap_err();
        assert!(matches!(err, Error::Calibration(_)));
    }

    #[test]
    fn default_image_paths_follow_product_layout() {
        let ceos = vec![
            PathBuf::from("/p/LEA_01.001"),
            PathBuf::from("/p/DAT_01.001"),
            PathBuf::from("/p/TRA_01.001"),
        ];
        assert_eq!(
            default_image_path(Dialect::Ceos, &ceos),
            Some(PathBuf::from("/p/DAT_01.001"))
        );
        assert_eq!(
            default_image_path(Dialect::Safe, &[PathBuf::from("/p/S1A.SAFE")]),
            Some(PathBuf::from("/p/S1A.SAFE/manifest.safe"))
        );
        assert_eq!(default_image_path(Dialect::Rs2, &[]), None);
    }
}
