//! Device text line protocol.
//!
//! The IMU board prints one line per reading:
//!
//! ```text
//! 0.069569 s Accel X: 0.14 Y: 0.73 Z: 0.26 m/s^2 Mag X: -5.70 Y: 7.20 Z: -8.00uT Gyro X: -0.00 Y: -0.01 Z: 0.01radians/s
//! ```
//!
//! The leading `<seconds> s` timestamp is optional (older firmware omits
//! it). The three `Accel`/`Mag`/`Gyro` groups are required; units may be
//! glued to the last number and whitespace after `X:` is optional.

use crate::core::math::Vec3;
use crate::core::types::SensorSample;
use crate::{Error, Result};

/// One decoded device line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceLine {
    /// Device timestamp in seconds, if the line carried one
    pub timestamp_s: Option<f64>,
    /// Accelerometer (m/s²)
    pub accel: Vec3,
    /// Magnetometer (µT)
    pub mag: Vec3,
    /// Gyroscope (rad/s)
    pub gyro: Vec3,
}

impl DeviceLine {
    /// All-zero line without timestamp.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Convert into a pipeline sample with the given step.
    pub fn to_sample(&self, dt: f64) -> SensorSample {
        SensorSample::new(dt, self.accel, self.gyro, self.mag)
    }
}

/// Parse one device line.
///
/// # Errors
///
/// `MalformedInput` if any of the three sensor groups is missing or has an
/// unparseable number.
pub fn parse_line(line: &str) -> Result<DeviceLine> {
    let line = line.trim();

    let accel = field_triplet(line, "Accel")
        .ok_or_else(|| Error::MalformedInput(format!("missing Accel group: {:?}", line)))?;
    let mag = field_triplet(line, "Mag")
        .ok_or_else(|| Error::MalformedInput(format!("missing Mag group: {:?}", line)))?;
    let gyro = field_triplet(line, "Gyro")
        .ok_or_else(|| Error::MalformedInput(format!("missing Gyro group: {:?}", line)))?;

    Ok(DeviceLine {
        timestamp_s: timestamp(line),
        accel,
        mag,
        gyro,
    })
}

/// Parse one device line, substituting an all-zero reading on failure.
///
/// The failure is logged at `warn`; the zero reading is later treated as a
/// degenerate measurement by the estimators.
pub fn parse_line_or_zero(line: &str) -> DeviceLine {
    parse_line(line).unwrap_or_else(|e| zero_fallback(&e))
}

/// Log a parse failure and return the reading that stands in for it.
pub(crate) fn zero_fallback(err: &Error) -> DeviceLine {
    log::warn!("Failed to parse device line, using zeros: {}", err);
    DeviceLine::zero()
}

/// `<seconds> s` prefix.
fn timestamp(line: &str) -> Option<f64> {
    let mut tokens = line.split_whitespace();
    let value = tokens.next()?.parse::<f64>().ok()?;
    (tokens.next()? == "s").then_some(value)
}

/// `<label> X: <f> Y: <f> Z: <f>`.
fn field_triplet(line: &str, label: &str) -> Option<Vec3> {
    let start = line.find(label)? + label.len();
    let mut tokens = line[start..].split_whitespace();
    let x = axis_value(&mut tokens, "X")?;
    let y = axis_value(&mut tokens, "Y")?;
    let z = axis_value(&mut tokens, "Z")?;
    Some(Vec3::new(x, y, z))
}

fn axis_value<'a>(tokens: &mut impl Iterator<Item = &'a str>, axis: &str) -> Option<f64> {
    let rest = tokens.next()?.strip_prefix(axis)?.strip_prefix(':')?;
    let number = if rest.is_empty() { tokens.next()? } else { rest };
    leading_number(number)
}

/// Numeric prefix of a token such as `-8.00uT` or `0.01radians/s`.
fn leading_number(token: &str) -> Option<f64> {
    let end = token
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+' || c == '.'))
        .unwrap_or(token.len());
    token[..end].parse().ok()
}

// ============================================================================
// Sample clock
// ============================================================================

/// Turns absolute device timestamps into per-sample steps.
///
/// The first timestamp, a missing timestamp, or one that goes backwards
/// yields `dt = 0`, which the pipeline replaces with its default step.
#[derive(Debug, Clone, Default)]
pub struct SampleClock {
    last: Option<f64>,
}

impl SampleClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step since the previous timestamp.
    pub fn tick(&mut self, timestamp_s: Option<f64>) -> f64 {
        let Some(t) = timestamp_s else {
            return 0.0;
        };
        let dt = match self.last {
            Some(prev) if t > prev => t - prev,
            Some(prev) => {
                log::debug!("Device clock went backwards: {} -> {}", prev, t);
                0.0
            }
            None => 0.0,
        };
        self.last = Some(t);
        dt
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
