//! I/O layer: the CEOS binary record reader, per-dialect product loaders and
//! normalizers, the raster collaborator interface with its in-memory and
//! GDAL implementations, and `writers` for GeoTIFF outputs and metadata
//! sidecars.
pub mod ceos;
pub use ceos::{FormatError, MetadataFields};

pub mod product;
pub use product::{RawSource, load_source, normalize};

pub mod raster;
pub use raster::{
    BandStatistics, Georeference, MemoryRaster, RasterError, RasterSink, RasterSource,
    SampleChunk,
};

#[cfg(feature = "gdal")]
pub mod gdal;
#[cfg(feature = "gdal")]
pub use gdal::{GdalGeometry, GdalRaster};

pub mod writers;
