//! Batch dead reckoning over a recorded trial.
//!
//! Input is a flat slice of rows `[dt, ax, ay, az, gx, gy, gz, mx, my, mz]`.
//! Every row is run through the Madgwick AHRS and the offset-corrected
//! acceleration is double integrated in the world frame:
//!
//! ```text
//! v[i] = v[i−1] + a[i]·dt
//! p[i] = p[i−1] + v[i−1]·dt + ½·a[i]·dt²      (v[−1] = p[−1] = 0)
//! tip[i] = p[i] + R[i]·[0, 0, rod_length]
//! ```
//!
//! The first row's accelerometer reading is subtracted from every row
//! (including a lone row). This removes gravity and any static offset as
//! long as the trial starts at rest; it is a heuristic, not a calibration.

use crate::core::math::Vec3;
use crate::core::types::{Quaternion, SAMPLE_ROW_WIDTH, SensorSample};
use crate::sensors::calibration::MagnetometerCalibrator;
use crate::sensors::fusion::{GradientDescentAhrs, MadgwickConfig};
use crate::{Error, Result};

/// Per-row output of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTrajectory {
    /// Orientation after each row
    pub quaternions: Vec<Quaternion>,
    /// World-frame position after each row (m)
    pub positions: Vec<Vec3>,
    /// Rod tip position after each row (m)
    pub rod_tips: Vec<Vec3>,
}

impl BatchTrajectory {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position after the last row.
    pub fn final_position(&self) -> Vec3 {
        self.positions.last().copied().unwrap_or_else(Vec3::zeros)
    }
}

/// Runs recorded trials through calibration, AHRS and integration.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    calibrator: MagnetometerCalibrator,
    beta: f64,
    rod_length: f64,
}

impl BatchProcessor {
    pub fn new(calibrator: MagnetometerCalibrator, beta: f64, rod_length: f64) -> Self {
        Self {
            calibrator,
            beta,
            rod_length,
        }
    }

    /// Final position of the trial.
    pub fn compute_position(&self, samples: &[f64]) -> Result<Vec3> {
        Ok(self.trace(samples)?.final_position())
    }

    /// Full per-row trajectory.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` unless `samples.len()` is a positive multiple of 10
    /// - `NumericInstability` if the AHRS diverges
    pub fn trace(&self, samples: &[f64]) -> Result<BatchTrajectory> {
        let rows = split_rows(samples)?;

        // Rows with a non-positive dt use the mean of the valid ones
        let valid: Vec<f64> = rows
            .iter()
            .map(|r| r.dt)
            .filter(|dt| *dt > 0.0 && dt.is_finite())
            .collect();
        let fallback_dt = if valid.is_empty() {
            0.0
        } else {
            valid.iter().sum::<f64>() / valid.len() as f64
        };

        let accel_offset = rows[0].accel;
        let rod = Vec3::new(0.0, 0.0, self.rod_length);

        let mut ahrs = GradientDescentAhrs::new(MadgwickConfig {
            beta: self.beta,
            sample_period: fallback_dt,
        });

        let mut out = BatchTrajectory {
            quaternions: Vec::with_capacity(rows.len()),
            positions: Vec::with_capacity(rows.len()),
            rod_tips: Vec::with_capacity(rows.len()),
        };

        let mut velocity = Vec3::zeros();
        let mut position = Vec3::zeros();

        for (i, row) in rows.iter().enumerate() {
            let dt = if row.dt > 0.0 && row.dt.is_finite() {
                row.dt
            } else {
                log::debug!("Row {}: dt={} replaced by {:.6}", i, row.dt, fallback_dt);
                fallback_dt
            };

            let accel = row.accel - accel_offset;
            let mag = self.calibrator.calibrate(&row.mag);

            ahrs.set_sample_period(dt);
            let q = ahrs.update(&row.gyro, &accel, &mag)?;

            let r = q.rotation_matrix();
            let a_world = r * accel;

            position += velocity * dt + a_world * (0.5 * dt * dt);
            velocity += a_world * dt;

            out.quaternions.push(q);
            out.positions.push(position);
            out.rod_tips.push(position + r * rod);
        }

        log::debug!(
            "Batch of {} rows, final position [{:.4}, {:.4}, {:.4}]",
            rows.len(),
            position.x,
            position.y,
            position.z
        );

        Ok(out)
    }
}

/// Final position of a trial using the default magnetometer calibration.
///
/// See [`BatchProcessor::compute_position`].
pub fn compute_position(samples: &[f64], beta: f64, rod_length: f64) -> Result<Vec3> {
    BatchProcessor::new(MagnetometerCalibrator::default(), beta, rod_length)
        .compute_position(samples)
}

fn split_rows(samples: &[f64]) -> Result<Vec<SensorSample>> {
    if samples.is_empty() || samples.len() % SAMPLE_ROW_WIDTH != 0 {
        return Err(Error::DimensionMismatch {
            expected: SAMPLE_ROW_WIDTH * (samples.len() / SAMPLE_ROW_WIDTH).max(1),
            actual: samples.len(),
        });
    }
    samples
        .chunks_exact(SAMPLE_ROW_WIDTH)
        .map(SensorSample::from_row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(dt: f64, accel: [f64; 3], gyro: [f64; 3], mag: [f64; 3]) -> [f64; 10] {
        [
            dt, accel[0], accel[1], accel[2], gyro[0], gyro[1], gyro[2], mag[0], mag[1], mag[2],
        ]
    }

    #[test]
    fn test_static_one_g_stays_put() {
        let samples: Vec<f64> = (0..50)
            .flat_map(|_| row(0.01, [0.0, 0.0, 9.81], [0.0; 3], [30.0, 5.0, -20.0]))
            .collect();
        let p = compute_position(&samples, 0.1, 0.0).unwrap();
        assert_relative_eq!(p, Vec3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_single_sample_is_origin() {
        let samples = row(0.01, [1.0, 2.0, 9.0], [0.1, 0.2, 0.3], [10.0, 0.0, 0.0]);
        let p = compute_position(&samples, 0.1, 0.0).unwrap();
        assert_eq!(p, Vec3::zeros());
    }

    #[test]
    fn test_bad_length() {
        let err = compute_position(&[0.0; 15], 0.1, 0.0).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 10,
                actual: 15
            }
        ));
        assert!(matches!(
            compute_position(&[], 0.1, 0.0),
            Err(Error::DimensionMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn test_coherent_recurrence() {
        let processor = BatchProcessor::new(
            MagnetometerCalibrator::from_config(
                &crate::sensors::calibration::MagCalibrationConfig::identity(),
            ),
            0.0,
            0.0,
        );
        // Start at rest, then a steady +X push of 1 m/s² (level, no rotation)
        let mut samples = row(0.1, [0.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]).to_vec();
        for _ in 0..10 {
            samples.extend(row(0.1, [1.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]));
        }
        let traj = processor.trace(&samples).unwrap();
        assert_eq!(traj.len(), 11);
        // Exact kinematics for constant acceleration: ½·a·t²
        assert_relative_eq!(traj.final_position().x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(traj.positions[1].x, 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_rod_tip_offset() {
        let samples = row(0.01, [0.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]);
        let traj = BatchProcessor::new(MagnetometerCalibrator::default(), 0.1, 0.25)
            .trace(&samples)
            .unwrap();
        assert_relative_eq!(traj.rod_tips[0], Vec3::new(0.0, 0.0, 0.25), epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_dt_uses_mean() {
        let processor = BatchProcessor::new(MagnetometerCalibrator::default(), 0.1, 0.0);
        let mut a = row(0.0, [0.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]).to_vec();
        a.extend(row(0.02, [1.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]));
        a.extend(row(-1.0, [1.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]));

        let mut b = row(0.02, [0.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]).to_vec();
        b.extend(row(0.02, [1.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]));
        b.extend(row(0.02, [1.0, 0.0, 9.81], [0.0; 3], [20.0, 0.0, 0.0]));

        let pa = processor.compute_position(&a).unwrap();
        let pb = processor.compute_position(&b).unwrap();
        assert_relative_eq!(pa, pb, epsilon = 1e-12);
    }
}
