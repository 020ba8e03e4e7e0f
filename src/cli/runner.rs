use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::EnvFilter;

use sarcal::ProcessingParams;
use sarcal::api::{read_scene, scene_record};
use sarcal::types::Dialect;

use super::args::CliArgs;
use super::errors::AppError;

/// Start from `--config` (or defaults) and apply every flag that was given.
fn resolve_params(args: &CliArgs) -> Result<ProcessingParams, AppError> {
    let mut params = match &args.config {
        Some(path) => ProcessingParams::from_json_file(path)?,
        None => ProcessingParams::default(),
    };
    if !args.outputs.is_empty() {
        params.outputs = args.outputs.clone();
    }
    if let Some(rows) = args.chunk_rows {
        if rows == 0 {
            return Err(AppError::ZeroChunkRows { rows });
        }
        params.chunk_rows = rows;
    }
    if args.stretch {
        params.stretch.enabled = true;
    }
    if let Some(p) = args.stretch_procedure {
        params.stretch.procedure = p;
    }
    if let Some(p) = args.stretch_policy {
        params.stretch.policy = p;
    }
    if let Some(b) = args.bit_depth {
        params.stretch.bit_depth = b;
    }
    if let Some(sd) = args.std_multiplier {
        params.stretch.std_multiplier = sd;
    }
    if let Some(f) = args.flip_policy {
        params.flip_policy = f;
    }
    if let Some(m) = args.metadata {
        params.metadata_format = m;
    }
    if args.polarization.is_some() {
        params.polarization = args.polarization.clone();
    }
    Ok(params)
}

/// Inputs of one product stored in `dir`: every file for CEOS volumes, the
/// first file for CDPF, the directory itself otherwise.
fn product_inputs(dialect: Dialect, dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    match dialect {
        Dialect::Rs2 | Dialect::Safe => Ok(vec![dir.to_path_buf()]),
        Dialect::Ceos | Dialect::Cdpf => {
            let mut files: Vec<PathBuf> = fs::read_dir(dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            if dialect == Dialect::Cdpf {
                files.truncate(1);
            }
            Ok(files)
        }
    }
}

fn print_metadata(args: &CliArgs, params: &ProcessingParams) -> Result<(), AppError> {
    if args.input.is_empty() {
        return Err(AppError::MissingArgument {
            arg: "--input".to_string(),
        });
    }
    let scene = read_scene(args.dialect, &args.input, params.polarization.as_deref())?;
    let json = scene_record(&scene)
        .to_json()
        .map_err(sarcal::Error::from)?;
    println!("{}", json);
    Ok(())
}

#[cfg(feature = "gdal")]
fn process(args: &CliArgs, params: &ProcessingParams) -> Result<(), AppError> {
    use sarcal::api::{SceneJob, TracingDiagnostics, process_scene_to_path, process_scenes};

    if let Some(input_dir) = &args.input_dir {
        let output_dir = args.output_dir.clone().ok_or(AppError::MissingArgument {
            arg: "--output-dir".to_string(),
        })?;
        info!("Starting batch processing from directory: {:?}", input_dir);
        info!("Output directory: {:?}", output_dir);

        let mut jobs = Vec::new();
        for entry in fs::read_dir(input_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                jobs.push(SceneJob {
                    dialect: args.dialect,
                    inputs: product_inputs(args.dialect, &path)?,
                    image: None,
                });
            } else {
                info!("Skipping non-directory: {:?}", path);
            }
        }
        jobs.sort_by(|a, b| a.inputs.cmp(&b.inputs));

        let report = process_scenes(&jobs, &output_dir, params, &TracingDiagnostics)?;
        info!("Processed: {}", report.processed);
        info!("Errors: {}", report.errors);
    } else {
        if args.input.is_empty() {
            return Err(AppError::MissingArgument {
                arg: "--input".to_string(),
            });
        }
        let output = args.output.clone().ok_or(AppError::MissingArgument {
            arg: "--output".to_string(),
        })?;
        let job = SceneJob {
            dialect: args.dialect,
            inputs: args.input.clone(),
            image: args.image.clone(),
        };
        let report = process_scene_to_path(&job, &output, params)?;
        info!(
            "Successfully processed: {} -> {:?}",
            report.product_name, report.output
        );
    }
    Ok(())
}

#[cfg(not(feature = "gdal"))]
fn process(_args: &CliArgs, _params: &ProcessingParams) -> Result<(), AppError> {
    Err(AppError::GdalDisabled)
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if args.log {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let params = resolve_params(&args)?;
    if args.metadata_only {
        print_metadata(&args, &params)?;
    } else {
        process(&args, &params)?;
    }
    Ok(())
}
