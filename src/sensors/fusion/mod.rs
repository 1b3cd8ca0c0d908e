//! Orientation estimators.
//!
//! # Components
//!
//! - [`GradientDescentAhrs`]: Madgwick MARG filter (gyro + accel + mag)
//! - [`BiasEkf`]: Quaternion + gyro bias EKF with a heading correction
//! - [`DynEstimator`]: Runtime selection between the two
//!
//! Both filters keep the quaternion unit-norm after every update and leave
//! their state untouched when a reading is degenerate (zero accel or mag).

mod bias_ekf;
mod dynamic;
mod madgwick;

pub use bias_ekf::{BiasEkf, EkfConfig};
pub use dynamic::{DynEstimator, DynEstimatorConfig, EstimatorType};
pub use madgwick::{GradientDescentAhrs, MadgwickConfig};
