//! Core data types for orientation and dead reckoning.
//!
//! - [`Quaternion`]: Unit quaternion orientation (body → world)
//! - [`EulerAngles`]: Yaw/pitch/roll view of an orientation
//! - [`SensorSample`]: One 9-DOF IMU reading with its time step

mod quaternion;
mod sample;

pub use quaternion::{EulerAngles, Quaternion};
pub use sample::{SAMPLE_ROW_WIDTH, SensorSample};
