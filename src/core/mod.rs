//! Core building blocks: GCP geocoding checks, processing parameters and the
//! calibration/stretch engines. These are internal primitives consumed by the
//! high-level `api` module.
pub mod geocoding;
pub mod params;
pub mod processing;
