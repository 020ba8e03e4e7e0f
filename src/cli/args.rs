use clap::Parser;
use std::path::PathBuf;

use sarcal::types::{
    BitDepthArg, Dialect, GcpFlipPolicy, MetadataFormat, OutputKind, StretchPolicy,
    StretchProcedure,
};

#[derive(Parser)]
#[command(name = "sarcal", version, about = "SAR product calibration CLI")]
pub struct CliArgs {
    /// Raw product format (ceos, cdpf, rs2, safe)
    #[arg(short, long, value_enum)]
    pub dialect: Dialect,

    /// Product input(s), single file mode: every CEOS volume file, the CDPF
    /// file, or the RS2/SAFE product directory
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Directory of products, one per entry (batch mode)
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Raster to calibrate, when it cannot be inferred from the inputs
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Output GeoTIFF (single file mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (batch mode)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// JSON file with processing parameters; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Calibrated outputs, comma separated (amplitude, sigma, phase, noise, theta)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub outputs: Vec<OutputKind>,

    /// Rows per calibration chunk
    #[arg(long)]
    pub chunk_rows: Option<usize>,

    /// Stretch calibrated bands to a fixed bit depth
    #[arg(long, default_value_t = false)]
    pub stretch: bool,

    /// Stretch procedure (min-max or std-dev)
    #[arg(long, value_enum)]
    pub stretch_procedure: Option<StretchProcedure>,

    /// Cross-band stretch policy (separate or together)
    #[arg(long, value_enum)]
    pub stretch_policy: Option<StretchPolicy>,

    /// Stretch bit depth (8 or 16)
    #[arg(long, value_enum)]
    pub bit_depth: Option<BitDepthArg>,

    /// Standard deviations on each side of the mean for std-dev stretching
    #[arg(long)]
    pub std_multiplier: Option<f64>,

    /// GCP pixel flipping on descending passes
    #[arg(long, value_enum)]
    pub flip_policy: Option<GcpFlipPolicy>,

    /// Metadata sidecar format (json, delimited, none)
    #[arg(long, value_enum)]
    pub metadata: Option<MetadataFormat>,

    /// Polarization of the SAFE measurement to calibrate (e.g. vv)
    #[arg(long)]
    pub polarization: Option<String>,

    /// Only read and print the scene's metadata record as JSON
    #[arg(long, default_value_t = false)]
    pub metadata_only: bool,

    /// Enable logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
