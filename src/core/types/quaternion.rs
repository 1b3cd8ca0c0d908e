//! Unit quaternion and Euler angle types.

use nalgebra::Vector4;

use crate::core::math::{Mat3, Vec3};

/// Quaternion representation [w, x, y, z].
///
/// Orientations are body → world: rotating a body-frame vector by the
/// quaternion yields its world-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion from components.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Create identity quaternion (no rotation).
    pub fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotation of `angle` radians about a unit `axis`.
    pub fn from_axis_angle(axis: &Vec3, angle: f64) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        Self {
            w: c,
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
        }
    }

    /// Euclidean norm of the four components.
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Normalize the quaternion to unit length.
    ///
    /// Near-zero quaternions are left untouched; callers detect that case
    /// through [`Quaternion::is_unit`].
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 1e-12 {
            self.w /= norm;
            self.x /= norm;
            self.y /= norm;
            self.z /= norm;
        }
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// True when the norm is within `tolerance` of 1.
    pub fn is_unit(&self, tolerance: f64) -> bool {
        (self.norm() - 1.0).abs() <= tolerance
    }

    /// Conjugate (inverse for unit quaternions).
    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Hamilton product `self ⊗ other`.
    pub fn multiply(&self, other: &Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    /// Rotate a body-frame vector into the world frame.
    pub fn rotate_vector(&self, v: &Vec3) -> Vec3 {
        self.rotation_matrix() * v
    }

    /// 3×3 rotation matrix (body → world).
    pub fn rotation_matrix(&self) -> Mat3 {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        Mat3::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        )
    }

    /// Convert to Euler angles (ZYX convention), radians.
    pub fn to_euler(&self) -> EulerAngles {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);

        // Roll (X axis rotation)
        let sinr_cosp = 2.0 * (w * x + y * z);
        let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        // Pitch (Y axis rotation), clamped at the poles
        let sinp = 2.0 * (w * y - z * x);
        let pitch = sinp.clamp(-1.0, 1.0).asin();

        // Yaw (Z axis rotation)
        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        EulerAngles { yaw, pitch, roll }
    }

    /// Components as a column vector [w, x, y, z].
    pub fn as_vector(&self) -> Vector4<f64> {
        Vector4::new(self.w, self.x, self.y, self.z)
    }

    /// Build from a column vector [w, x, y, z].
    pub fn from_vector(v: &Vector4<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// Euler angles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl EulerAngles {
    /// Convert radians to degrees.
    pub fn to_degrees(&self) -> EulerAngles {
        EulerAngles {
            yaw: self.yaw.to_degrees(),
            pitch: self.pitch.to_degrees(),
            roll: self.roll.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_quaternion_identity() {
        let q = Quaternion::identity();
        assert_eq!(q.w, 1.0);
        assert_eq!(q.x, 0.0);
        assert_eq!(q.y, 0.0);
        assert_eq!(q.z, 0.0);
        assert_relative_eq!(q.rotation_matrix(), Mat3::identity());
    }

    #[test]
    fn test_to_euler_yaw_only() {
        let q = Quaternion::from_axis_angle(&Vec3::z(), 0.3);
        let e = q.to_euler();
        assert_relative_eq!(e.yaw, 0.3, epsilon = 1e-12);
        assert_relative_eq!(e.pitch, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.roll, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_to_euler_roll_pitch() {
        let roll = Quaternion::from_axis_angle(&Vec3::x(), 0.2).to_euler();
        assert_relative_eq!(roll.roll, 0.2, epsilon = 1e-12);

        let pitch = Quaternion::from_axis_angle(&Vec3::y(), -0.4).to_euler();
        assert_relative_eq!(pitch.pitch, -0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_vector_matches_sandwich_product() {
        let q = Quaternion::from_axis_angle(&Vec3::new(1.0, 2.0, 3.0).normalize(), 0.7);
        let v = Vec3::new(0.5, -1.0, 2.0);

        let pure = Quaternion::new(0.0, v.x, v.y, v.z);
        let sandwich = q.multiply(&pure).multiply(&q.conjugate());

        let rotated = q.rotate_vector(&v);
        assert_relative_eq!(rotated.x, sandwich.x, epsilon = 1e-12);
        assert_relative_eq!(rotated.y, sandwich.y, epsilon = 1e-12);
        assert_relative_eq!(rotated.z, sandwich.z, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_x_into_y() {
        let q = Quaternion::from_axis_angle(&Vec3::z(), FRAC_PI_2);
        let r = q.rotate_vector(&Vec3::x());
        assert_relative_eq!(r, Vec3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_normalize() {
        let mut q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        q.normalize();
        assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-15);
        assert!(q.is_unit(1e-12));

        // Degenerate quaternion is left alone
        let mut zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        zero.normalize();
        assert!(!zero.is_unit(1e-9));
    }

    #[test]
    fn test_euler_to_degrees() {
        let e = EulerAngles {
            yaw: std::f64::consts::PI,
            pitch: FRAC_PI_2 / 2.0,
            roll: FRAC_PI_2,
        };
        let d = e.to_degrees();
        assert_relative_eq!(d.yaw, 180.0, epsilon = 1e-9);
        assert_relative_eq!(d.pitch, 45.0, epsilon = 1e-9);
        assert_relative_eq!(d.roll, 90.0, epsilon = 1e-9);
    }
}
