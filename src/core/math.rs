//! Mathematical primitives shared by the estimators.
//!
//! Vector aliases, angle wrapping and degenerate-vector handling.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};

/// 3-vector in `f64` (accel, gyro, mag, position, velocity).
pub type Vec3 = Vector3<f64>;

/// 3×3 matrix in `f64` (rotation, soft-iron correction).
pub type Mat3 = Matrix3<f64>;

/// Standard gravity used for world-frame compensation (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Normalize angle to [-π, π].
///
/// # Example
/// ```
/// use disha::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
/// assert!((normalize_angle(-3.0 * PI) - (-PI)).abs() < 1e-9);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Shortest signed angular difference from `a` to `b`.
#[inline]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_angle(b - a)
}

/// Build a vector from a slice, checking that it has exactly 3 elements.
pub fn vec3_from_slice(values: &[f64]) -> crate::Result<Vec3> {
    if values.len() != 3 {
        return Err(crate::Error::DimensionMismatch {
            expected: 3,
            actual: values.len(),
        });
    }
    Ok(Vec3::new(values[0], values[1], values[2]))
}

/// Normalize a vector, returning `None` for a zero-norm (degenerate) reading.
#[inline]
pub fn try_normalize(v: &Vec3) -> Option<Vec3> {
    let norm = v.norm();
    if norm > 0.0 && norm.is_finite() {
        Some(v / norm)
    } else {
        None
    }
}
