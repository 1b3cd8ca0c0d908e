//! Sensor processing layer.
//!
//! Everything that turns one IMU sample into orientation and motion.
//!
//! # Contents
//!
//! - [`calibration`]: Magnetometer hard/soft-iron correction
//! - [`fusion`]: Orientation estimators (Madgwick AHRS, bias EKF)
//! - [`integrator`]: Gravity-compensated double integration

pub mod calibration;
pub mod fusion;
pub mod integrator;

pub use calibration::{MagCalibrationConfig, MagnetometerCalibrator};
pub use fusion::{
    BiasEkf, DynEstimator, DynEstimatorConfig, EkfConfig, EstimatorType, GradientDescentAhrs,
    MadgwickConfig,
};
pub use integrator::{MotionConfig, MotionIntegrator, MotionState};
