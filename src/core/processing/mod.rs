//! Per-image processing: the chunked calibration engine, the histogram
//! stretch engine and the pipeline that chains them.
pub mod calibrate;
pub mod pipeline;
pub mod stretch;
