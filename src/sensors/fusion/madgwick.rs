//! Gradient-descent AHRS (Madgwick MARG filter).
//!
//! Maintains a unit quaternion that is propagated by gyroscope integration
//! and pulled towards the orientation that best aligns the measured gravity
//! and magnetic field directions with their earth-frame references.
//!
//! # Algorithm
//!
//! 1. Normalize accelerometer and magnetometer (zero-norm readings skip the
//!    whole update and keep the previous orientation)
//! 2. Rotate the measured field into the earth frame with the current
//!    estimate to get the reference field `b = [bx, 0, bz]`
//! 3. Take the gradient of the gravity + field alignment error with respect
//!    to the quaternion, normalized
//! 4. `q̇ = ½·q⊗[0, ω] − β·∇f`, integrate over `dt`, renormalize
//!
//! `β` trades gyro trust (drifts) against accel/mag evidence (noisy but
//! drift-free).
//!
//! # Example
//!
//! ```
//! use disha::core::math::Vec3;
//! use disha::sensors::fusion::{GradientDescentAhrs, MadgwickConfig};
//!
//! let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
//! let q = ahrs
//!     .update(
//!         &Vec3::new(0.0, 0.0, 0.1),
//!         &Vec3::new(0.0, 0.0, 9.81),
//!         &Vec3::new(20.0, 0.0, 0.0),
//!     )
//!     .unwrap();
//! assert!((q.norm() - 1.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::math::{Mat3, Vec3, try_normalize};
use crate::core::types::{EulerAngles, Quaternion};
use crate::{Error, Result};

/// Configuration for the gradient-descent AHRS.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MadgwickConfig {
    /// Filter gain β.
    /// Higher values = faster convergence towards accel/mag, more noise.
    /// Typical range: 0.01 - 0.5
    pub beta: f64,

    /// Initial sample period in seconds (overridden per call for
    /// variable-rate input).
    pub sample_period: f64,
}

impl Default for MadgwickConfig {
    fn default() -> Self {
        Self {
            beta: 0.1,
            sample_period: 0.01,
        }
    }
}

/// Madgwick-style gradient-descent AHRS.
#[derive(Debug, Clone)]
pub struct GradientDescentAhrs {
    /// Quaternion orientation (body → world).
    q: Quaternion,

    /// Filter gain.
    beta: f64,

    /// Integration step in seconds.
    sample_period: f64,
}

impl GradientDescentAhrs {
    /// Create a new filter at the identity orientation.
    pub fn new(config: MadgwickConfig) -> Self {
        Self {
            q: Quaternion::identity(),
            beta: config.beta,
            sample_period: config.sample_period,
        }
    }

    /// Get the current quaternion orientation.
    pub fn quaternion(&self) -> Quaternion {
        self.q
    }

    /// Filter gain β.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Change the filter gain.
    pub fn set_beta(&mut self, beta: f64) {
        self.beta = beta;
    }

    /// Current integration step in seconds.
    pub fn sample_period(&self) -> f64 {
        self.sample_period
    }

    /// Set the integration step used by the next [`update`](Self::update).
    pub fn set_sample_period(&mut self, dt: f64) {
        self.sample_period = dt;
    }

    /// Reset orientation to identity.
    pub fn reset(&mut self) {
        self.q = Quaternion::identity();
    }

    /// Euler angles in radians.
    pub fn euler(&self) -> EulerAngles {
        self.q.to_euler()
    }

    /// Euler angles as `(yaw, pitch, roll)` in degrees.
    pub fn euler_degrees(&self) -> (f64, f64, f64) {
        let e = self.q.to_euler().to_degrees();
        (e.yaw, e.pitch, e.roll)
    }

    /// Rotation matrix (body → world) of the current estimate.
    pub fn rotation_matrix(&self) -> Mat3 {
        self.q.rotation_matrix()
    }

    /// Fuse one gyro/accel/mag reading.
    ///
    /// # Arguments
    ///
    /// * `gyro` - Angular rate in rad/s
    /// * `accel` - Specific force in any unit (only the direction is used)
    /// * `mag` - Magnetic field in any unit (only the direction is used)
    ///
    /// # Returns
    ///
    /// The updated quaternion. A zero-norm `accel` or `mag` returns the
    /// previous quaternion untouched.
    ///
    /// # Errors
    ///
    /// `NumericInstability` for a non-finite accel/mag reading or if the
    /// integrated quaternion is not finite; the stored state is left as it
    /// was.
    pub fn update(&mut self, gyro: &Vec3, accel: &Vec3, mag: &Vec3) -> Result<Quaternion> {
        if !accel.iter().chain(mag.iter()).all(|v| v.is_finite()) {
            return Err(Error::NumericInstability(format!(
                "non-finite accel/mag reading (accel={:?}, mag={:?})",
                accel, mag
            )));
        }

        let (Some(a), Some(m)) = (try_normalize(accel), try_normalize(mag)) else {
            log::trace!("Degenerate accel/mag reading, keeping orientation");
            return Ok(self.q);
        };

        let (q0, q1, q2, q3) = (self.q.w, self.q.x, self.q.y, self.q.z);
        let (ax, ay, az) = (a.x, a.y, a.z);
        let (mx, my, mz) = (m.x, m.y, m.z);

        // Auxiliary variables to avoid repeated arithmetic
        let _2q0mx = 2.0 * q0 * mx;
        let _2q0my = 2.0 * q0 * my;
        let _2q0mz = 2.0 * q0 * mz;
        let _2q1mx = 2.0 * q1 * mx;
        let _2q0 = 2.0 * q0;
        let _2q1 = 2.0 * q1;
        let _2q2 = 2.0 * q2;
        let _2q3 = 2.0 * q3;
        let _2q0q2 = 2.0 * q0 * q2;
        let _2q2q3 = 2.0 * q2 * q3;
        let q0q0 = q0 * q0;
        let q0q1 = q0 * q1;
        let q0q2 = q0 * q2;
        let q0q3 = q0 * q3;
        let q1q1 = q1 * q1;
        let q1q2 = q1 * q2;
        let q1q3 = q1 * q3;
        let q2q2 = q2 * q2;
        let q2q3 = q2 * q3;
        let q3q3 = q3 * q3;

        // Reference direction of the earth's magnetic field
        let hx = mx * q0q0 - _2q0my * q3 + _2q0mz * q2 + mx * q1q1 + _2q1 * my * q2
            + _2q1 * mz * q3
            - mx * q2q2
            - mx * q3q3;
        let hy = _2q0mx * q3 + my * q0q0 - _2q0mz * q1 + _2q1mx * q2 - my * q1q1
            + my * q2q2
            + _2q2 * mz * q3
            - my * q3q3;
        let _2bx = (hx * hx + hy * hy).sqrt();
        let _2bz = -_2q0mx * q2 + _2q0my * q1 + mz * q0q0 + _2q1mx * q3 - mz * q1q1
            + _2q2 * my * q3
            - mz * q2q2
            + mz * q3q3;
        let _4bx = 2.0 * _2bx;
        let _4bz = 2.0 * _2bz;

        // Objective function residuals (gravity, then field)
        let fg_x = 2.0 * q1q3 - _2q0q2 - ax;
        let fg_y = 2.0 * q0q1 + _2q2q3 - ay;
        let fg_z = 1.0 - 2.0 * q1q1 - 2.0 * q2q2 - az;
        let fb_x = _2bx * (0.5 - q2q2 - q3q3) + _2bz * (q1q3 - q0q2) - mx;
        let fb_y = _2bx * (q1q2 - q0q3) + _2bz * (q0q1 + q2q3) - my;
        let fb_z = _2bx * (q0q2 + q1q3) + _2bz * (0.5 - q1q1 - q2q2) - mz;

        // Gradient descent corrective step (Jᵀ·f)
        let s0 = -_2q2 * fg_x + _2q1 * fg_y - _2bz * q2 * fb_x
            + (-_2bx * q3 + _2bz * q1) * fb_y
            + _2bx * q2 * fb_z;
        let s1 = _2q3 * fg_x + _2q0 * fg_y - 4.0 * q1 * fg_z
            + _2bz * q3 * fb_x
            + (_2bx * q2 + _2bz * q0) * fb_y
            + (_2bx * q3 - _4bz * q1) * fb_z;
        let s2 = -_2q0 * fg_x + _2q3 * fg_y - 4.0 * q2 * fg_z
            + (-_4bx * q2 - _2bz * q0) * fb_x
            + (_2bx * q1 + _2bz * q3) * fb_y
            + (_2bx * q0 - _4bz * q2) * fb_z;
        let s3 = _2q1 * fg_x + _2q2 * fg_y
            + (-_4bx * q3 + _2bz * q1) * fb_x
            + (-_2bx * q0 + _2bz * q2) * fb_y
            + _2bx * q1 * fb_z;

        // Zero gradient means no correction this step
        let s_norm = (s0 * s0 + s1 * s1 + s2 * s2 + s3 * s3).sqrt();
        let (s0, s1, s2, s3) = if s_norm > 0.0 {
            (s0 / s_norm, s1 / s_norm, s2 / s_norm, s3 / s_norm)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };

        // Rate of change of quaternion from gyroscope, minus correction
        let (gx, gy, gz) = (gyro.x, gyro.y, gyro.z);
        let dq0 = 0.5 * (-q1 * gx - q2 * gy - q3 * gz) - self.beta * s0;
        let dq1 = 0.5 * (q0 * gx + q2 * gz - q3 * gy) - self.beta * s1;
        let dq2 = 0.5 * (q0 * gy - q1 * gz + q3 * gx) - self.beta * s2;
        let dq3 = 0.5 * (q0 * gz + q1 * gy - q2 * gx) - self.beta * s3;

        // Integrate
        let dt = self.sample_period;
        let mut q = Quaternion::new(q0 + dq0 * dt, q1 + dq1 * dt, q2 + dq2 * dt, q3 + dq3 * dt);
        q.normalize();

        if !q.is_finite() || !q.is_unit(1e-9) {
            return Err(Error::NumericInstability(format!(
                "Madgwick quaternion diverged: {:?}",
                q
            )));
        }

        self.q = q;
        Ok(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gravity() -> Vec3 {
        Vec3::new(0.0, 0.0, 9.81)
    }

    fn north() -> Vec3 {
        Vec3::new(20.0, 0.0, 0.0)
    }

    #[test]
    fn test_stationary_level_stays_identity() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
        for _ in 0..100 {
            ahrs.update(&Vec3::zeros(), &gravity(), &north()).unwrap();
        }
        let e = ahrs.euler();
        assert_relative_eq!(e.roll, 0.0, epsilon = 1e-9);
        assert_relative_eq!(e.pitch, 0.0, epsilon = 1e-9);
        assert_relative_eq!(e.yaw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_accel_is_bit_for_bit_noop() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
        ahrs.update(&Vec3::new(0.1, 0.2, 0.3), &gravity(), &north()).unwrap();
        let before = ahrs.quaternion();

        let q = ahrs
            .update(&Vec3::new(1.0, 1.0, 1.0), &Vec3::zeros(), &north())
            .unwrap();
        assert_eq!(q, before);
        assert_eq!(ahrs.quaternion(), before);
    }

    #[test]
    fn test_zero_mag_is_noop() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
        let q = ahrs
            .update(&Vec3::new(1.0, 0.0, 0.0), &gravity(), &Vec3::zeros())
            .unwrap();
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn test_unit_norm_after_every_update() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig {
            beta: 0.3,
            sample_period: 0.02,
        });
        for i in 0..500 {
            let t = i as f64 * 0.02;
            let gyro = Vec3::new(t.sin(), 0.5 * t.cos(), 0.2);
            let accel = Vec3::new(0.3 * t.cos(), 0.1, 9.7);
            let mag = Vec3::new(18.0, 3.0 * t.sin(), -40.0);
            let q = ahrs.update(&gyro, &accel, &mag).unwrap();
            assert!((q.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_converges_from_tilt() {
        // Body pitched by 0.3 rad: gravity appears rotated in the body frame
        let truth = Quaternion::from_axis_angle(&Vec3::y(), 0.3);
        let r = truth.rotation_matrix();
        let accel = r.transpose() * gravity();
        let mag = r.transpose() * north();

        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig {
            beta: 0.1,
            sample_period: 0.01,
        });
        for _ in 0..3000 {
            ahrs.update(&Vec3::zeros(), &accel, &mag).unwrap();
        }
        let e = ahrs.euler();
        assert_relative_eq!(e.pitch, 0.3, epsilon = 0.01);
        assert_relative_eq!(e.roll, 0.0, epsilon = 0.01);
        assert_relative_eq!(e.yaw, 0.0, epsilon = 0.01);
    }

    #[test]
    fn test_non_finite_gyro_reports_instability() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
        let before = ahrs.quaternion();
        let err = ahrs
            .update(&Vec3::new(f64::NAN, 0.0, 0.0), &gravity(), &north())
            .unwrap_err();
        assert!(matches!(err, Error::NumericInstability(_)));
        assert_eq!(ahrs.quaternion(), before);
    }

    #[test]
    fn test_non_finite_reading_reports_instability() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
        let before = ahrs.quaternion();
        assert!(matches!(
            ahrs.update(&Vec3::zeros(), &Vec3::new(0.0, f64::NAN, 9.81), &north()),
            Err(Error::NumericInstability(_))
        ));
        assert!(matches!(
            ahrs.update(&Vec3::zeros(), &gravity(), &Vec3::new(f64::INFINITY, 0.0, 0.0)),
            Err(Error::NumericInstability(_))
        ));
        assert_eq!(ahrs.quaternion(), before);
    }

    #[test]
    fn test_reset() {
        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig::default());
        ahrs.update(&Vec3::new(0.0, 0.0, 1.0), &gravity(), &north()).unwrap();
        assert_ne!(ahrs.quaternion(), Quaternion::identity());
        ahrs.reset();
        assert_eq!(ahrs.quaternion(), Quaternion::identity());
    }
}
