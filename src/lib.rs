//! Disha - IMU orientation fusion and dead reckoning
//!
//! Fuses 9-DOF IMU samples (gyroscope, accelerometer, magnetometer) into a
//! quaternion attitude and integrates that attitude into a world-frame
//! position.
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Edges
//! │       (line protocol, csv, latest cell, reader)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │               (pipeline, batch)                     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   sensors/                          │  ← Sensor processing
//! │        (calibration, fusion, integrator)            │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Per sample: calibrate magnetometer → estimator update → integrate.
//! The core is single-threaded; only the edge line reader owns a thread.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Sensor processing (depends on core)
// ============================================================================
pub mod sensors;

// ============================================================================
// Layer 3: Engine (depends on core, sensors)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 4: I/O edges (depends on all layers)
// ============================================================================
pub mod io;

pub mod config;
pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

pub use error::{Error, Result};

// Core types
pub use crate::core::math;
pub use crate::core::types::{EulerAngles, Quaternion, SAMPLE_ROW_WIDTH, SensorSample};

// Sensors
pub use sensors::{
    BiasEkf, DynEstimator, DynEstimatorConfig, EkfConfig, EstimatorType, GradientDescentAhrs,
    MadgwickConfig, MagCalibrationConfig, MagnetometerCalibrator, MotionConfig, MotionIntegrator,
    MotionState,
};

// Engine
pub use engine::{
    BatchProcessor, BatchTrajectory, Pipeline, PipelineConfig, PipelineOutput, PipelineStats,
    compute_position,
};

// Config
pub use config::AppConfig;
