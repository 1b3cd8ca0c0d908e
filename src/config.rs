//! Configuration for Disha
//!
//! Loads every tunable from one TOML file. All sections are optional; a
//! missing section or key takes its default.
//!
//! ```toml
//! [calibration]
//! hard_iron = [109.06, 37.90, 125.21]
//!
//! [madgwick]
//! beta = 0.1
//!
//! [pipeline]
//! estimator = "bias_ekf"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::pipeline::{Pipeline, PipelineConfig};
use crate::error::Result;
use crate::io::line_reader::SerialConfig;
use crate::sensors::calibration::MagCalibrationConfig;
use crate::sensors::fusion::{DynEstimatorConfig, EkfConfig, MadgwickConfig};
use crate::sensors::integrator::MotionConfig;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Magnetometer hard/soft-iron constants
    pub calibration: MagCalibrationConfig,
    /// Gradient-descent AHRS
    pub madgwick: MadgwickConfig,
    /// Bias EKF
    pub ekf: EkfConfig,
    /// Dead reckoning
    pub motion: MotionConfig,
    /// Estimator selection and dt fallback
    pub pipeline: PipelineConfig,
    /// Serial line source
    pub serial: SerialConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use disha::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("disha.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Settings for both estimators.
    pub fn estimators(&self) -> DynEstimatorConfig {
        DynEstimatorConfig {
            madgwick: self.madgwick,
            ekf: self.ekf,
        }
    }

    /// Build a streaming pipeline from this configuration.
    pub fn build_pipeline(&self) -> Pipeline {
        Pipeline::new(
            &self.pipeline,
            &self.calibration,
            self.estimators(),
            self.motion,
        )
    }
}
