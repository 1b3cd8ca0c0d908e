//! Orientation EKF with gyroscope bias estimation.
//!
//! # State Vector (7 elements)
//!
//! ```text
//! x = [qw, qx, qy, qz, bx, by, bz]
//! ```
//!
//! - `q`: Orientation quaternion (body → world)
//! - `b`: Gyroscope bias (rad/s)
//!
//! # Predict
//!
//! The quaternion is propagated with the bias-corrected rate
//! `q ← (I + ½·dt·Ω(ω − b))·q`; the bias is a random walk. The covariance
//! transition carries the `∂q/∂b = −½·dt·Ξ(q)` coupling so accel/mag
//! corrections can feed back into the bias.
//!
//! # Update
//!
//! Two sequential corrections with central-difference Jacobians:
//!
//! 1. Pose: predicted body-frame gravity and magnetic reference against the
//!    normalized accel/mag reading (6 rows)
//! 2. Heading: tilt-compensated heading of the measured field against the
//!    heading of the magnetic reference (1 row, innovation wrapped)
//!
//! Covariance updates use the Joseph form and are re-symmetrized after every
//! step. A step whose P is asymmetric or has a negative eigenvalue beyond
//! tolerance is rejected.

use nalgebra::{Matrix4, Matrix4x3, SMatrix, SVector, Vector4, Vector6};
use serde::{Deserialize, Serialize};

use crate::core::math::{Mat3, Vec3, angle_diff, normalize_angle, try_normalize};
use crate::core::types::{EulerAngles, Quaternion};
use crate::{Error, Result};

/// State dimension.
const N: usize = 7;

type StateVector = SVector<f64, N>;
type StateCovariance = SMatrix<f64, N, N>;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for [`BiasEkf`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EkfConfig {
    /// Initial variance of every state element.
    pub initial_covariance: f64,

    /// Process noise variance of the quaternion block (per step).
    pub quaternion_process_noise: f64,

    /// Process noise variance of the bias block (per step).
    /// Kept above the quaternion noise so the bias can adapt.
    pub bias_process_noise: f64,

    /// Measurement noise of the normalized accel/mag components.
    pub accel_mag_noise: f64,

    /// Measurement noise of the heading correction (rad²).
    pub heading_noise: f64,

    /// Magnetic field direction in the world frame.
    pub magnetic_reference: [f64; 3],

    /// Central-difference step for the measurement Jacobians.
    pub jacobian_epsilon: f64,

    /// Largest tolerated |P − Pᵀ| element before a step is rejected.
    pub symmetry_tolerance: f64,

    /// Most negative tolerated eigenvalue of P.
    pub psd_tolerance: f64,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            initial_covariance: 0.01,
            quaternion_process_noise: 1e-5,
            bias_process_noise: 1e-4,
            accel_mag_noise: 1e-2,
            heading_noise: 1e-3,
            magnetic_reference: [1.0, 0.0, 0.0],
            jacobian_epsilon: 1e-6,
            symmetry_tolerance: 1e-6,
            psd_tolerance: 1e-9,
        }
    }
}

// ============================================================================
// Filter
// ============================================================================

/// 7-state orientation + gyro bias Extended Kalman Filter.
#[derive(Debug, Clone)]
pub struct BiasEkf {
    config: EkfConfig,

    /// Normalized magnetic reference.
    m_ref: Vec3,

    /// State estimate.
    x: StateVector,

    /// Error covariance.
    p: StateCovariance,

    /// Process noise.
    q_noise: StateCovariance,
}

impl BiasEkf {
    /// Create a new filter at identity orientation with zero bias.
    ///
    /// A zero-norm magnetic reference falls back to magnetic north on +X.
    pub fn new(config: EkfConfig) -> Self {
        let m_ref = try_normalize(&Vec3::from(config.magnetic_reference)).unwrap_or_else(|| {
            log::warn!("Zero magnetic reference in EKF config, using +X");
            Vec3::x()
        });

        let mut q_noise = StateCovariance::zeros();
        q_noise
            .fixed_view_mut::<4, 4>(0, 0)
            .fill_diagonal(config.quaternion_process_noise);
        q_noise
            .fixed_view_mut::<3, 3>(4, 4)
            .fill_diagonal(config.bias_process_noise);

        Self {
            config,
            m_ref,
            x: initial_state(),
            p: StateCovariance::identity() * config.initial_covariance,
            q_noise,
        }
    }

    /// Current orientation estimate.
    pub fn quaternion(&self) -> Quaternion {
        quat_of(&self.x)
    }

    /// Current gyroscope bias estimate (rad/s).
    pub fn gyro_bias(&self) -> Vec3 {
        self.x.fixed_rows::<3>(4).into_owned()
    }

    /// Current error covariance.
    pub fn covariance(&self) -> &SMatrix<f64, N, N> {
        &self.p
    }

    /// Filter configuration.
    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    /// Euler angles in radians.
    pub fn euler(&self) -> EulerAngles {
        self.quaternion().to_euler()
    }

    /// Euler angles as `(yaw, pitch, roll)` in degrees.
    pub fn euler_degrees(&self) -> (f64, f64, f64) {
        let e = self.euler().to_degrees();
        (e.yaw, e.pitch, e.roll)
    }

    /// Rotation matrix (body → world) of the current estimate.
    pub fn rotation_matrix(&self) -> Mat3 {
        self.quaternion().rotation_matrix()
    }

    /// Reset to identity orientation, zero bias and initial covariance.
    pub fn reset(&mut self) {
        self.x = initial_state();
        self.p = StateCovariance::identity() * self.config.initial_covariance;
    }

    // ========================================================================
    // Predict
    // ========================================================================

    /// Propagate the state with a gyro reading over `dt` seconds.
    ///
    /// Non-positive `dt` is a no-op.
    pub fn predict(&mut self, gyro: &Vec3, dt: f64) -> Result<()> {
        if dt <= 0.0 {
            log::trace!("EKF predict skipped for dt={}", dt);
            return Ok(());
        }

        let q: Vector4<f64> = self.x.fixed_rows::<4>(0).into_owned();
        let omega = gyro - self.gyro_bias();

        let f_q = Matrix4::identity() + omega_matrix(&omega) * (0.5 * dt);

        // Transition Jacobian: quaternion kinematics plus bias coupling
        let mut f = StateCovariance::identity();
        f.fixed_view_mut::<4, 4>(0, 0).copy_from(&f_q);
        f.fixed_view_mut::<4, 3>(0, 4)
            .copy_from(&(xi_matrix(&q) * (-0.5 * dt)));

        let mut x = self.x;
        x.fixed_rows_mut::<4>(0).copy_from(&normalize4(&(f_q * q)));

        let p = f * self.p * f.transpose() + self.q_noise;

        self.commit(x, p, "predict")
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Correct the orientation with an accel/mag reading.
    ///
    /// `mag` is expected to be calibrated already. A zero-norm `accel` or
    /// `mag` skips both corrections and returns the current orientation.
    ///
    /// # Errors
    ///
    /// `NumericInstability` for a non-finite reading, or when a correction
    /// leaves the state non-finite, the quaternion off unit norm, or P
    /// asymmetric or indefinite. The state of the failing stage is not
    /// stored.
    pub fn update(&mut self, accel: &Vec3, mag: &Vec3) -> Result<Quaternion> {
        if !accel.iter().chain(mag.iter()).all(|v| v.is_finite()) {
            return Err(Error::NumericInstability(format!(
                "non-finite EKF measurement (accel={:?}, mag={:?})",
                accel, mag
            )));
        }

        let (Some(a), Some(m)) = (try_normalize(accel), try_normalize(mag)) else {
            log::trace!("Degenerate accel/mag reading, EKF update skipped");
            return Ok(self.quaternion());
        };

        // Stage 1: pose
        let z = Vector6::new(a.x, a.y, a.z, m.x, m.y, m.z);
        let x = self.x;
        let h_x = pose_model(&quat_of(&x), &self.m_ref);
        let h = self.pose_jacobian(&x);
        let r = SMatrix::<f64, 6, 6>::identity() * self.config.accel_mag_noise;
        let (x, p) = self.correct(&x, &self.p, &h, &(z - h_x), &r)?;
        self.commit(x, p, "pose update")?;

        // Stage 2: heading
        let x = self.x;
        let heading_ref = self.m_ref.y.atan2(self.m_ref.x);
        let heading = heading_model(&quat_of(&x), &m);
        let innovation = SVector::<f64, 1>::new(angle_diff(heading, heading_ref));
        let h = self.heading_jacobian(&x, &m);
        let r = SMatrix::<f64, 1, 1>::new(self.config.heading_noise);
        let (x, p) = self.correct(&x, &self.p, &h, &innovation, &r)?;
        self.commit(x, p, "heading update")?;

        Ok(self.quaternion())
    }

    /// Joseph-form Kalman correction on a candidate state.
    fn correct<const D: usize>(
        &self,
        x: &StateVector,
        p: &StateCovariance,
        h: &SMatrix<f64, D, N>,
        innovation: &SVector<f64, D>,
        r: &SMatrix<f64, D, D>,
    ) -> Result<(StateVector, StateCovariance)> {
        let s = h * p * h.transpose() + r;
        let s_inv = s.try_inverse().ok_or_else(|| {
            Error::NumericInstability("singular innovation covariance".to_string())
        })?;

        let k = p * h.transpose() * s_inv;
        let mut x = x + k * innovation;
        let q = normalize4(&x.fixed_rows::<4>(0).into_owned());
        x.fixed_rows_mut::<4>(0).copy_from(&q);

        let i_kh = StateCovariance::identity() - k * h;
        let p = i_kh * p * i_kh.transpose() + k * r * k.transpose();

        Ok((x, p))
    }

    /// Validate a candidate state and store it.
    fn commit(&mut self, x: StateVector, p: StateCovariance, stage: &str) -> Result<()> {
        if x.iter().any(|v| !v.is_finite()) || p.iter().any(|v| !v.is_finite()) {
            return Err(Error::NumericInstability(format!(
                "non-finite EKF state after {}",
                stage
            )));
        }

        let asymmetry = (p - p.transpose()).amax();
        if asymmetry > self.config.symmetry_tolerance {
            return Err(Error::NumericInstability(format!(
                "covariance asymmetry {:.3e} after {}",
                asymmetry, stage
            )));
        }

        let p = (p + p.transpose()) * 0.5;
        let min_eigenvalue = p.symmetric_eigenvalues().min();
        if min_eigenvalue < -self.config.psd_tolerance {
            return Err(Error::NumericInstability(format!(
                "covariance not positive semi-definite (min eigenvalue {:.3e}) after {}",
                min_eigenvalue, stage
            )));
        }

        if !quat_of(&x).is_unit(1e-9) {
            return Err(Error::NumericInstability(format!(
                "non-unit EKF quaternion after {}",
                stage
            )));
        }

        self.x = x;
        self.p = p;
        Ok(())
    }

    // ========================================================================
    // Jacobians
    // ========================================================================

    fn pose_jacobian(&self, x: &StateVector) -> SMatrix<f64, 6, N> {
        let eps = self.config.jacobian_epsilon;
        let q: Vector4<f64> = x.fixed_rows::<4>(0).into_owned();

        let mut h = SMatrix::<f64, 6, N>::zeros();
        for i in 0..4 {
            let mut dq = Vector4::zeros();
            dq[i] = eps;
            let plus = pose_model(&Quaternion::from_vector(&normalize4(&(q + dq))), &self.m_ref);
            let minus = pose_model(&Quaternion::from_vector(&normalize4(&(q - dq))), &self.m_ref);
            h.set_column(i, &((plus - minus) / (2.0 * eps)));
        }
        h
    }

    fn heading_jacobian(&self, x: &StateVector, mag: &Vec3) -> SMatrix<f64, 1, N> {
        let eps = self.config.jacobian_epsilon;
        let q: Vector4<f64> = x.fixed_rows::<4>(0).into_owned();

        let mut h = SMatrix::<f64, 1, N>::zeros();
        for i in 0..4 {
            let mut dq = Vector4::zeros();
            dq[i] = eps;
            let plus = heading_model(&Quaternion::from_vector(&normalize4(&(q + dq))), mag);
            let minus = heading_model(&Quaternion::from_vector(&normalize4(&(q - dq))), mag);
            h[(0, i)] = normalize_angle(plus - minus) / (2.0 * eps);
        }
        h
    }
}

impl Default for BiasEkf {
    fn default() -> Self {
        Self::new(EkfConfig::default())
    }
}

// ============================================================================
// Models
// ============================================================================

fn initial_state() -> StateVector {
    let mut x = StateVector::zeros();
    x[0] = 1.0;
    x
}

fn quat_of(x: &StateVector) -> Quaternion {
    Quaternion::from_vector(&x.fixed_rows::<4>(0).into_owned())
}

fn normalize4(q: &Vector4<f64>) -> Vector4<f64> {
    let norm = q.norm();
    if norm > 1e-12 { q / norm } else { *q }
}

/// Predicted body-frame gravity (world +Z) and magnetic reference.
fn pose_model(q: &Quaternion, m_ref: &Vec3) -> Vector6<f64> {
    let rt = q.rotation_matrix().transpose();
    let g = rt * Vec3::z();
    let m = rt * m_ref;
    Vector6::new(g.x, g.y, g.z, m.x, m.y, m.z)
}

/// Heading of the measured field rotated into the navigation frame.
fn heading_model(q: &Quaternion, mag: &Vec3) -> f64 {
    let m_nav = q.rotation_matrix() * mag;
    m_nav.y.atan2(m_nav.x)
}

/// Quaternion rate matrix: `Ω(ω)·q = q ⊗ [0, ω]`.
fn omega_matrix(w: &Vec3) -> Matrix4<f64> {
    let (wx, wy, wz) = (w.x, w.y, w.z);
    Matrix4::new(
        0.0, -wx, -wy, -wz, //
        wx, 0.0, wz, -wy, //
        wy, -wz, 0.0, wx, //
        wz, wy, -wx, 0.0,
    )
}

/// `Ξ(q)·ω = q ⊗ [0, ω]`, the rate matrix seen as linear in ω.
fn xi_matrix(q: &Vector4<f64>) -> Matrix4x3<f64> {
    let (qw, qx, qy, qz) = (q[0], q[1], q[2], q[3]);
    Matrix4x3::new(
        -qx, -qy, -qz, //
        qw, -qz, qy, //
        qz, qw, -qx, //
        -qy, qx, qw,
    )
}
