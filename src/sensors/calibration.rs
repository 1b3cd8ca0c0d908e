//! Magnetometer hard/soft-iron correction.
//!
//! Applies fixed calibration constants to raw magnetometer readings:
//!
//! ```text
//! calibrated = (raw − B) · A⁻¹
//! ```
//!
//! where `B` is the hard-iron offset (constant field from magnetized parts
//! near the sensor) and `A⁻¹` the soft-iron correction (direction-dependent
//! distortion). The constants are supplied by configuration; deriving them
//! is done offline.
//!
//! # Hardware Constants
//!
//! - [`DEFAULT_HARD_IRON`]: Hard-iron offset of the reference sensor board (µT)
//! - [`DEFAULT_SOFT_IRON`]: Soft-iron correction of the reference sensor board

use serde::{Deserialize, Serialize};

use crate::core::math::{Mat3, Vec3, vec3_from_slice};

/// Hard-iron offset of the reference sensor board, in µT.
pub const DEFAULT_HARD_IRON: [f64; 3] = [109.06238802, 37.90448955, 125.2127988];

/// Soft-iron correction matrix of the reference sensor board (row-major).
pub const DEFAULT_SOFT_IRON: [[f64; 3]; 3] = [
    [2.58891148, 0.03830976, -0.05865281],
    [0.03830976, 2.79695092, 0.03519644],
    [-0.05865281, 0.03519644, 2.72060039],
];

/// Magnetometer calibration constants as stored in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MagCalibrationConfig {
    /// Hard-iron offset `B` (µT)
    pub hard_iron: [f64; 3],
    /// Soft-iron correction `A⁻¹`, row-major
    pub soft_iron: [[f64; 3]; 3],
}

impl Default for MagCalibrationConfig {
    fn default() -> Self {
        Self {
            hard_iron: DEFAULT_HARD_IRON,
            soft_iron: DEFAULT_SOFT_IRON,
        }
    }
}

impl MagCalibrationConfig {
    /// Calibration that leaves readings untouched.
    pub fn identity() -> Self {
        Self {
            hard_iron: [0.0; 3],
            soft_iron: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

/// Stateless hard/soft-iron corrector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnetometerCalibrator {
    hard_iron: Vec3,
    soft_iron: Mat3,
}

impl MagnetometerCalibrator {
    /// Create a calibrator from an offset and a correction matrix.
    pub fn new(hard_iron: Vec3, soft_iron: Mat3) -> Self {
        Self {
            hard_iron,
            soft_iron,
        }
    }

    /// Create a calibrator from configuration constants.
    pub fn from_config(config: &MagCalibrationConfig) -> Self {
        let s = &config.soft_iron;
        Self {
            hard_iron: Vec3::from(config.hard_iron),
            soft_iron: Mat3::new(
                s[0][0], s[0][1], s[0][2], //
                s[1][0], s[1][1], s[1][2], //
                s[2][0], s[2][1], s[2][2],
            ),
        }
    }

    /// Hard-iron offset.
    pub fn hard_iron(&self) -> &Vec3 {
        &self.hard_iron
    }

    /// Soft-iron correction matrix.
    pub fn soft_iron(&self) -> &Mat3 {
        &self.soft_iron
    }

    /// Apply `(raw − B) · A⁻¹`, treating the reading as a row vector.
    pub fn calibrate(&self, raw: &Vec3) -> Vec3 {
        self.soft_iron.tr_mul(&(raw - self.hard_iron))
    }

    /// Slice variant of [`MagnetometerCalibrator::calibrate`].
    ///
    /// Fails with `DimensionMismatch` unless the slice holds exactly 3 values.
    pub fn calibrate_slice(&self, raw: &[f64]) -> crate::Result<Vec3> {
        let raw = vec3_from_slice(raw)?;
        Ok(self.calibrate(&raw))
    }
}

impl Default for MagnetometerCalibrator {
    fn default() -> Self {
        Self::from_config(&MagCalibrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hard_iron_only() {
        let cal = MagnetometerCalibrator::new(Vec3::new(1.0, 0.0, 0.0), Mat3::identity());
        let out = cal.calibrate(&Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(out, Vec3::zeros());
    }

    #[test]
    fn test_affine() {
        let cal = MagnetometerCalibrator::default();
        let a = Vec3::new(10.0, -20.0, 30.0);
        let b = Vec3::new(-5.0, 7.0, 1.0);

        // Affine map: f(a) - f(b) is linear in (a - b)
        let lhs = cal.calibrate(&a) - cal.calibrate(&b);
        let rhs = cal.soft_iron().transpose() * (a - b);
        assert_relative_eq!(lhs, rhs, epsilon = 1e-9);
    }

    #[test]
    fn test_row_vector_convention() {
        // Non-symmetric matrix distinguishes v·A from A·v
        let a_inv = Mat3::new(1.0, 2.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let cal = MagnetometerCalibrator::new(Vec3::zeros(), a_inv);
        let out = cal.calibrate(&Vec3::new(1.0, 1.0, 0.0));
        // [1, 1, 0] · A = [1, 3, 0]
        assert_relative_eq!(out, Vec3::new(1.0, 3.0, 0.0));
    }

    #[test]
    fn test_default_constants() {
        let cal = MagnetometerCalibrator::default();
        let out = cal.calibrate(&Vec3::from(DEFAULT_HARD_IRON));
        assert_relative_eq!(out, Vec3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(cal.soft_iron()[(1, 1)], 2.79695092);
    }

    #[test]
    fn test_calibrate_slice_dimension_mismatch() {
        let cal = MagnetometerCalibrator::default();
        assert!(cal.calibrate_slice(&[1.0, 2.0, 3.0]).is_ok());
        assert!(matches!(
            cal.calibrate_slice(&[1.0, 2.0, 3.0, 4.0]),
            Err(crate::Error::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_identity_config() {
        let cal = MagnetometerCalibrator::from_config(&MagCalibrationConfig::identity());
        let raw = Vec3::new(12.0, -3.0, 45.0);
        assert_eq!(cal.calibrate(&raw), raw);
    }
}
