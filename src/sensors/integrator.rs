//! Gravity-compensated dead reckoning.
//!
//! Rotates body-frame acceleration into the world frame, removes gravity and
//! integrates twice (semi-implicit Euler):
//!
//! ```text
//! a = R(q)·accel − [0, 0, g]
//! v ← v + a·dt
//! p ← p + v·dt
//! ```
//!
//! No drift correction or zero-velocity update is applied; position error
//! grows without bound, so trials must be short or re-anchored externally
//! with [`MotionIntegrator::reset`].

use serde::{Deserialize, Serialize};

use crate::core::math::{GRAVITY, Vec3};
use crate::core::types::Quaternion;
use crate::{Error, Result};

/// Configuration for [`MotionIntegrator`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Gravity magnitude removed along world +Z (m/s²).
    pub gravity: f64,

    /// Length of a rod rigidly attached along body +Z (m).
    /// When set, every step also reports the rod tip position.
    pub rod_length: Option<f64>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            rod_length: None,
        }
    }
}

/// Velocity/position accumulated over a trial.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionState {
    /// World-frame velocity (m/s)
    pub velocity: Vec3,
    /// World-frame position (m)
    pub position: Vec3,
    /// Rod tip in the world frame (m), when a rod is configured
    pub rod_tip: Option<Vec3>,
}

/// Double integrator from (orientation, body acceleration) to position.
#[derive(Debug, Clone)]
pub struct MotionIntegrator {
    config: MotionConfig,
    state: MotionState,
}

impl MotionIntegrator {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            state: MotionState::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Start a new trial: zero velocity and position.
    pub fn reset(&mut self) {
        self.state = MotionState::default();
    }

    /// Integrate one step.
    ///
    /// `dt <= 0` leaves the state unchanged and returns it.
    ///
    /// # Errors
    ///
    /// `NumericInstability` if the new state is not finite; the previous
    /// state is kept.
    pub fn step(&mut self, q: &Quaternion, accel: &Vec3, dt: f64) -> Result<MotionState> {
        if dt <= 0.0 {
            log::trace!("Integrator step skipped for dt={}", dt);
            return Ok(self.state);
        }

        let r = q.rotation_matrix();
        let a_world = r * accel - Vec3::new(0.0, 0.0, self.config.gravity);

        let velocity = self.state.velocity + a_world * dt;
        let position = self.state.position + velocity * dt;

        if !velocity.iter().chain(position.iter()).all(|v| v.is_finite()) {
            return Err(Error::NumericInstability(format!(
                "non-finite motion state (accel={:?}, dt={})",
                accel, dt
            )));
        }

        let rod_tip = self
            .config
            .rod_length
            .map(|len| position + r * Vec3::new(0.0, 0.0, len));

        self.state = MotionState {
            velocity,
            position,
            rod_tip,
        };
        Ok(self.state)
    }
}

impl Default for MotionIntegrator {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}
