//! Streaming estimation pipeline.
//!
//! Feeds samples one at a time through
//! calibration → orientation estimator → motion integrator.
//!
//! ```ignore
//! let mut pipeline = Pipeline::new(&PipelineConfig::default(), ...);
//! for sample in source {
//!     let out = pipeline.process(&sample)?;
//!     writer.write(t, &out)?;
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::core::math::try_normalize;
use crate::core::types::{Quaternion, SensorSample};
use crate::sensors::calibration::{MagCalibrationConfig, MagnetometerCalibrator};
use crate::sensors::fusion::{DynEstimator, DynEstimatorConfig, EstimatorType};
use crate::sensors::integrator::{MotionConfig, MotionIntegrator, MotionState};

/// Configuration for the pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Orientation estimator to run.
    pub estimator: EstimatorType,

    /// Step used when a sample carries a non-positive or non-finite dt (s).
    pub default_dt: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorType::Madgwick,
            default_dt: 0.01,
        }
    }
}

/// Result of processing one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOutput {
    /// Orientation after the update
    pub quaternion: Quaternion,
    /// Motion state after integration
    pub motion: MotionState,
    /// Step actually used (s)
    pub dt: f64,
}

/// Counters over the samples seen since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Samples processed
    pub samples: u64,
    /// Samples whose accel or calibrated mag had zero norm
    pub degenerate: u64,
    /// Samples that fell back to the default dt
    pub dt_fallbacks: u64,
}

/// Sequential calibrate → estimate → integrate pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    calibrator: MagnetometerCalibrator,
    estimator: DynEstimator,
    integrator: MotionIntegrator,
    default_dt: f64,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(
        config: &PipelineConfig,
        calibration: &MagCalibrationConfig,
        estimators: DynEstimatorConfig,
        motion: MotionConfig,
    ) -> Self {
        log::info!(
            "Pipeline: estimator={}, default_dt={}s",
            config.estimator,
            config.default_dt
        );
        Self {
            calibrator: MagnetometerCalibrator::from_config(calibration),
            estimator: DynEstimator::new(config.estimator, estimators),
            integrator: MotionIntegrator::new(motion),
            default_dt: config.default_dt,
            stats: PipelineStats::default(),
        }
    }

    /// Process one sample.
    ///
    /// # Errors
    ///
    /// `NumericInstability` from the estimator or integrator. The pipeline
    /// should be [`reset`](Self::reset) before reuse.
    pub fn process(&mut self, sample: &SensorSample) -> Result<PipelineOutput> {
        self.stats.samples += 1;

        let dt = if sample.dt > 0.0 && sample.dt.is_finite() {
            sample.dt
        } else {
            self.stats.dt_fallbacks += 1;
            log::trace!("Sample dt={} replaced by {}", sample.dt, self.default_dt);
            self.default_dt
        };

        let mag = self.calibrator.calibrate(&sample.mag);

        if try_normalize(&sample.accel).is_none() || try_normalize(&mag).is_none() {
            self.stats.degenerate += 1;
            log::trace!("Degenerate sample #{}", self.stats.samples);
        }

        let quaternion = self
            .estimator
            .step(&sample.gyro, &sample.accel, &mag, dt)?;
        let motion = self.integrator.step(&quaternion, &sample.accel, dt)?;

        Ok(PipelineOutput {
            quaternion,
            motion,
            dt,
        })
    }

    /// Process a sequence of samples, stopping at the first error.
    pub fn run<I>(&mut self, samples: I) -> Result<Vec<PipelineOutput>>
    where
        I: IntoIterator<Item = SensorSample>,
    {
        samples.into_iter().map(|s| self.process(&s)).collect()
    }

    /// Start a new trial: identity orientation, zero motion, cleared stats.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.integrator.reset();
        self.stats = PipelineStats::default();
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn estimator(&self) -> &DynEstimator {
        &self.estimator
    }

    pub fn motion(&self) -> &MotionState {
        self.integrator.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::Vec3;
    use approx::assert_relative_eq;

    fn pipeline(kind: EstimatorType) -> Pipeline {
        Pipeline::new(
            &PipelineConfig {
                estimator: kind,
                default_dt: 0.01,
            },
            &MagCalibrationConfig::identity(),
            DynEstimatorConfig::default(),
            MotionConfig::default(),
        )
    }

    fn level_sample(dt: f64) -> SensorSample {
        SensorSample::new(
            dt,
            Vec3::new(0.0, 0.0, 9.81),
            Vec3::zeros(),
            Vec3::new(20.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_static_trial_stays_at_origin() {
        for kind in [EstimatorType::Madgwick, EstimatorType::BiasEkf] {
            let mut p = pipeline(kind);
            let out = p.run((0..200).map(|_| level_sample(0.01))).unwrap();
            assert_eq!(out.len(), 200);
            let last = out[199];
            assert_relative_eq!(last.motion.position, Vec3::zeros(), epsilon = 1e-9);
            assert!((last.quaternion.norm() - 1.0).abs() < 1e-9);
            assert_eq!(p.stats().samples, 200);
            assert_eq!(p.stats().degenerate, 0);
        }
    }

    #[test]
    fn test_zero_sample_counted_as_degenerate() {
        let mut p = pipeline(EstimatorType::Madgwick);
        p.process(&level_sample(0.01)).unwrap();
        let before = p.estimator().quaternion();

        let out = p.process(&SensorSample::zero()).unwrap();
        assert_eq!(out.quaternion, before);
        assert_eq!(out.dt, 0.01);
        assert_eq!(p.stats().degenerate, 1);
        assert_eq!(p.stats().dt_fallbacks, 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut p = pipeline(EstimatorType::BiasEkf);
        p.process(&SensorSample::new(
            0.1,
            Vec3::new(2.0, 0.0, 9.81),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(20.0, 0.0, 0.0),
        ))
        .unwrap();
        assert_ne!(p.motion().position, Vec3::zeros());

        p.reset();
        assert_eq!(p.motion().position, Vec3::zeros());
        assert_eq!(p.estimator().quaternion(), Quaternion::identity());
        assert_eq!(*p.stats(), PipelineStats::default());
    }
}
