//! Runtime estimator selection.
//!
//! [`DynEstimator`] wraps both orientation filters behind one per-sample
//! interface so the pipeline can pick an algorithm from configuration or the
//! command line.
//!
//! # Estimator Types
//!
//! - **Madgwick**: Gradient-descent AHRS, one gain, no bias state
//! - **BiasEkf**: 7-state EKF with gyro bias and a heading correction

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::core::math::{Mat3, Vec3};
use crate::core::types::{EulerAngles, Quaternion};
use crate::sensors::fusion::{BiasEkf, EkfConfig, GradientDescentAhrs, MadgwickConfig};

/// Available orientation estimators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorType {
    /// Gradient-descent (Madgwick) AHRS.
    ///
    /// Cheap and robust; gyro bias shows up as slow drift.
    #[default]
    Madgwick,

    /// Extended Kalman Filter with gyro bias estimation.
    ///
    /// Tracks a per-axis bias and corrects heading separately.
    BiasEkf,
}

impl std::fmt::Display for EstimatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorType::Madgwick => write!(f, "Madgwick"),
            EstimatorType::BiasEkf => write!(f, "BiasEKF"),
        }
    }
}

/// Settings for every estimator; only the selected one is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynEstimatorConfig {
    pub madgwick: MadgwickConfig,
    pub ekf: EkfConfig,
}

/// Runtime-selectable orientation estimator.
#[derive(Debug, Clone)]
pub enum DynEstimator {
    Madgwick(Box<GradientDescentAhrs>),
    BiasEkf(Box<BiasEkf>),
}

impl DynEstimator {
    /// Create the estimator named by `kind`.
    pub fn new(kind: EstimatorType, config: DynEstimatorConfig) -> Self {
        match kind {
            EstimatorType::Madgwick => {
                DynEstimator::Madgwick(Box::new(GradientDescentAhrs::new(config.madgwick)))
            }
            EstimatorType::BiasEkf => DynEstimator::BiasEkf(Box::new(BiasEkf::new(config.ekf))),
        }
    }

    /// Which estimator this is.
    pub fn kind(&self) -> EstimatorType {
        match self {
            DynEstimator::Madgwick(_) => EstimatorType::Madgwick,
            DynEstimator::BiasEkf(_) => EstimatorType::BiasEkf,
        }
    }

    /// Fuse one reading taken `dt` seconds after the previous one.
    ///
    /// `mag` must already be calibrated.
    pub fn step(&mut self, gyro: &Vec3, accel: &Vec3, mag: &Vec3, dt: f64) -> Result<Quaternion> {
        match self {
            DynEstimator::Madgwick(ahrs) => {
                ahrs.set_sample_period(dt);
                ahrs.update(gyro, accel, mag)
            }
            DynEstimator::BiasEkf(ekf) => {
                ekf.predict(gyro, dt)?;
                ekf.update(accel, mag)
            }
        }
    }

    /// Current orientation.
    pub fn quaternion(&self) -> Quaternion {
        match self {
            DynEstimator::Madgwick(ahrs) => ahrs.quaternion(),
            DynEstimator::BiasEkf(ekf) => ekf.quaternion(),
        }
    }

    /// Euler angles in radians.
    pub fn euler(&self) -> EulerAngles {
        self.quaternion().to_euler()
    }

    /// Rotation matrix (body → world).
    pub fn rotation_matrix(&self) -> Mat3 {
        self.quaternion().rotation_matrix()
    }

    /// Reset orientation (and bias, for the EKF).
    pub fn reset(&mut self) {
        match self {
            DynEstimator::Madgwick(ahrs) => ahrs.reset(),
            DynEstimator::BiasEkf(ekf) => ekf.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_estimator_type_display() {
        assert_eq!(format!("{}", EstimatorType::Madgwick), "Madgwick");
        assert_eq!(format!("{}", EstimatorType::BiasEkf), "BiasEKF");
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [EstimatorType::Madgwick, EstimatorType::BiasEkf] {
            let est = DynEstimator::new(kind, DynEstimatorConfig::default());
            assert_eq!(est.kind(), kind);
        }
    }

    #[test]
    fn test_both_estimators_track_yaw() {
        let dt = 0.01;
        for kind in [EstimatorType::Madgwick, EstimatorType::BiasEkf] {
            let mut est = DynEstimator::new(kind, DynEstimatorConfig::default());
            for i in 1..=100 {
                let truth = Quaternion::from_axis_angle(&Vec3::z(), 0.1 * dt * i as f64);
                let mag = truth.rotation_matrix().transpose() * Vec3::new(20.0, 0.0, 0.0);
                let q = est
                    .step(&Vec3::new(0.0, 0.0, 0.1), &Vec3::new(0.0, 0.0, 9.81), &mag, dt)
                    .unwrap();
                assert!((q.norm() - 1.0).abs() < 1e-9);
            }
            assert_relative_eq!(est.euler().yaw, 0.1, epsilon = 2e-3);
        }
    }

    #[test]
    fn test_reset() {
        let mut est = DynEstimator::new(EstimatorType::BiasEkf, DynEstimatorConfig::default());
        est.step(
            &Vec3::new(0.5, 0.0, 0.0),
            &Vec3::new(0.0, 0.0, 9.81),
            &Vec3::new(20.0, 0.0, 0.0),
            0.1,
        )
        .unwrap();
        est.reset();
        assert_eq!(est.quaternion(), Quaternion::identity());
    }
}
