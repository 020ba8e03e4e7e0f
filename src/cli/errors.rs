use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Chunk rows must be greater than 0, got: {rows}")]
    ZeroChunkRows { rows: usize },

    #[error("Raster processing needs the `gdal` feature; rebuild with it or use --metadata-only")]
    GdalDisabled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sarcal(#[from] sarcal::Error),
}
