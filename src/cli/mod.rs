//! Command Line Interface (CLI) layer for SARCAL.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for single-product and batch
//! flows. It wires user-provided options to `sarcal::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
