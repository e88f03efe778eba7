// THEORY:
// This file is the main entry point for the `vigil` library crate. It follows the
// standard Rust convention of using `lib.rs` to define the public API that will
// be exposed to external consumers (like the `vigil_replay` driver).
//
// The primary goal is to export the `VigilPipeline` and its associated data
// structures (`PipelineConfig`, `TickReport`, etc.) as the high-level interface
// for the engine. The building blocks in `core_modules` (the tracking registry,
// the escalation policy and the alert store) stay public so applications with
// their own tick loop can drive them directly.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::{Result, VigilError};
pub use pipeline::{PipelineConfig, TickReport, VigilPipeline};
