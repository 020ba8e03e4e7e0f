#![doc = r#"
SARCAL: calibration of raw spaceborne SAR products into GIS-ready rasters.

This crate reads the metadata of four raw product formats (legacy CEOS
leader/trailer volumes, flat CDPF binary products, RADARSAT-2 `product.xml`
and Sentinel-1 SAFE), normalizes it into one `SceneMetadata`, validates the
ground control points against the raster, and converts raw samples into
calibrated amplitude, sigma-naught, phase, noise-floor or incidence-angle
bands, optionally stretched to 8 or 16 bits. It powers the SARCAL CLI and can
be embedded in your own Rust applications.

Requirements
------------
- Rust 2024 edition toolchain.
- With the default `gdal` feature: GDAL development headers and runtime.
  Without it, metadata decoding, geocoding checks and the in-memory
  calibration path remain available.

Quick start: one product to a GeoTIFF
-------------------------------------
```rust,no_run
# #[cfg(feature = "gdal")]
# fn main() -> sarcal::Result<()> {
use std::path::{Path, PathBuf};
use sarcal::api::{SceneJob, process_scene_to_path};
use sarcal::{Dialect, OutputKind, ProcessingParams};

let mut params = ProcessingParams::default();
params.outputs = vec![OutputKind::Sigma, OutputKind::Theta];
params.stretch.enabled = true;

let job = SceneJob {
    dialect: Dialect::Rs2,
    inputs: vec![PathBuf::from("/data/RS2_OK1234_PK5678_DK9012_SCWA_20080312_141502_HH_HV_SGF")],
    image: None,
};
let report = process_scene_to_path(&job, Path::new("/out/scene.tif"), &params)?;
println!("{} -> {:?}", report.product_name, report.output);
# Ok(())
# }
# #[cfg(not(feature = "gdal"))]
# fn main() {}
```

Metadata only
-------------
```rust,no_run
use std::path::PathBuf;
use sarcal::api::{read_scene, scene_record};
use sarcal::Dialect;

fn main() -> sarcal::Result<()> {
    let files = vec![
        PathBuf::from("/data/scene/LEA_01.001"),
        PathBuf::from("/data/scene/DAT_01.001"),
        PathBuf::from("/data/scene/TRA_01.001"),
    ];
    let scene = read_scene(Dialect::Ceos, &files, None)?;
    println!("{}", scene_record(&scene).delimited_row(','));
    Ok(())
}
```

Calibrating in memory
---------------------
```rust
use ndarray::Array2;
use sarcal::api::calibrate_scene;
use sarcal::io::{MemoryRaster, RasterSource};
use sarcal::{DataType, ProcessingParams, SceneMetadata};

fn sigma(scene: &SceneMetadata, samples: Array2<f64>) -> sarcal::Result<MemoryRaster> {
    let mut source = MemoryRaster::from_real(vec![samples], DataType::UInt16)?;
    let size = source.size();
    let mut output = MemoryRaster::zeros(size.columns, size.rows, 1, DataType::Float32);
    calibrate_scene(scene, &mut source, &mut output, &ProcessingParams::default())?;
    Ok(output)
}
```

Error handling
--------------
All public functions return `sarcal::Result<T>`; match on `sarcal::Error` to handle
specific stages (binary format, metadata, geocoding, calibration, stretch, raster I/O).

Useful modules
--------------
- [`api`]: high-level entry points and the diagnostics sink.
- [`metadata`]: `SceneMetadata`, GCPs, corners and the produced metadata record.
- [`core`]: geocoding checks, processing parameters, calibration and stretch engines.
- [`io`]: CEOS record reader, dialect normalizers, raster collaborators and writers.
- [`types`]: shared enums (`Dialect`, `OutputKind`, stretch selectors, bit depths).
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod metadata;
pub mod types;

// Curated public API surface
pub use core::params::{ProcessingParams, StretchParams};
pub use error::{Error, Result};
pub use metadata::{CornerPolygon, Gcp, MetadataRecord, SceneMetadata};
pub use types::{
    BitDepth, BitDepthArg, DataType, Dialect, GcpFlipPolicy, MetadataFormat, OutputKind,
    PassDirection, SampleType, StretchPolicy, StretchProcedure,
};

// High-level API re-exports
pub use api::{
    BatchReport, Diagnostics, SceneReport, TracingDiagnostics, calibrate_scene, geocode_scene,
    read_scene, scene_record,
};
#[cfg(feature = "gdal")]
pub use api::{SceneJob, process_scene_to_path, process_scenes};
