//! Core foundation layer.
//!
//! This is the bottom layer of the stack with no internal dependencies.
//! All other layers depend on core.
//!
//! # Contents
//!
//! - [`types`]: Quaternion, Euler angles, sensor samples
//! - [`math`]: Vector aliases, angle wrapping, degenerate vectors

pub mod math;
pub mod types;
