//! Estimation engine layer.
//!
//! Wires the sensor processing stages together.
//!
//! # Contents
//!
//! - [`pipeline`]: Per-sample streaming pipeline with statistics
//! - [`batch`]: Whole-trial dead reckoning (`compute_position`)

pub mod batch;
pub mod pipeline;

pub use batch::{BatchProcessor, BatchTrajectory, compute_position};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, PipelineStats};
