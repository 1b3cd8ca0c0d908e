//! Sensor sample record.

use crate::core::math::Vec3;

/// Width of one flattened sample row: dt, accel₃, gyro₃, mag₃.
pub const SAMPLE_ROW_WIDTH: usize = 10;

/// One 9-DOF IMU reading in physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Seconds since the previous sample
    pub dt: f64,
    /// Accelerometer (m/s²)
    pub accel: Vec3,
    /// Gyroscope (rad/s)
    pub gyro: Vec3,
    /// Magnetometer (µT)
    pub mag: Vec3,
}

impl SensorSample {
    /// Create a new sample.
    pub fn new(dt: f64, accel: Vec3, gyro: Vec3, mag: Vec3) -> Self {
        Self {
            dt,
            accel,
            gyro,
            mag,
        }
    }

    /// All-zero sample, used as the fallback for malformed input.
    pub fn zero() -> Self {
        Self {
            dt: 0.0,
            accel: Vec3::zeros(),
            gyro: Vec3::zeros(),
            mag: Vec3::zeros(),
        }
    }

    /// Build from one flattened row `[dt, ax, ay, az, gx, gy, gz, mx, my, mz]`.
    pub fn from_row(row: &[f64]) -> crate::Result<Self> {
        if row.len() != SAMPLE_ROW_WIDTH {
            return Err(crate::Error::DimensionMismatch {
                expected: SAMPLE_ROW_WIDTH,
                actual: row.len(),
            });
        }
        Ok(Self {
            dt: row[0],
            accel: Vec3::new(row[1], row[2], row[3]),
            gyro: Vec3::new(row[4], row[5], row[6]),
            mag: Vec3::new(row[7], row[8], row[9]),
        })
    }

    /// Flatten into one row, the inverse of [`SensorSample::from_row`].
    pub fn to_row(&self) -> [f64; SAMPLE_ROW_WIDTH] {
        [
            self.dt,
            self.accel.x,
            self.accel.y,
            self.accel.z,
            self.gyro.x,
            self.gyro.y,
            self.gyro.z,
            self.mag.x,
            self.mag.y,
            self.mag.z,
        ]
    }
}

impl Default for SensorSample {
    fn default() -> Self {
        Self::zero()
    }
}
