//! CSV sample logs and trajectory output.
//!
//! Input logs carry a header naming at least
//! `Timestamp,Accel_X,Accel_Y,Accel_Z,Gyro_X,Gyro_Y,Gyro_Z,Mag_X,Mag_Y,Mag_Z`
//! (any order, extra columns ignored). Trajectories are written as
//! `Timestamp,Qw,Qx,Qy,Qz,Pos_X,Pos_Y,Pos_Z,Tip_X,Tip_Y,Tip_Z`; the tip
//! columns stay empty when no rod is configured.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::math::Vec3;
use crate::core::types::{Quaternion, SensorSample};
use crate::engine::BatchTrajectory;
use crate::sensors::integrator::MotionState;
use crate::{Error, Result};

/// Input columns, in sample row order after the timestamp.
pub const SAMPLE_COLUMNS: [&str; 10] = [
    "Timestamp", "Accel_X", "Accel_Y", "Accel_Z", "Gyro_X", "Gyro_Y", "Gyro_Z", "Mag_X", "Mag_Y",
    "Mag_Z",
];

/// Output header.
pub const TRAJECTORY_HEADER: &str = "Timestamp,Qw,Qx,Qy,Qz,Pos_X,Pos_Y,Pos_Z,Tip_X,Tip_Y,Tip_Z";

/// A logged sample together with its absolute timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    /// Seconds since the start of the log
    pub timestamp_s: f64,
    pub sample: SensorSample,
}

// ============================================================================
// Reading
// ============================================================================

/// Read a sample log from disk.
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<Vec<TimedSample>> {
    let file = File::open(path.as_ref())?;
    let samples = parse_samples(BufReader::new(file))?;
    log::info!(
        "Loaded {} samples from {}",
        samples.len(),
        path.as_ref().display()
    );
    Ok(samples)
}

/// Parse a sample log.
///
/// `dt` of each sample is the difference to the previous timestamp; the
/// first sample takes the second sample's `dt` (0 for a single-row log).
///
/// # Errors
///
/// `MalformedInput` for a missing header column or an unparseable row (the
/// message names the 1-based line number).
pub fn parse_samples<R: BufRead>(reader: R) -> Result<Vec<TimedSample>> {
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Ok(Vec::new()),
        }
    };
    let columns = locate_columns(&header)?;

    let mut stamped: Vec<(f64, [f64; 9])> = Vec::new();
    for (idx, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let mut values = [0.0; 10];
        for (k, &col) in columns.iter().enumerate() {
            let raw = fields.get(col).ok_or_else(|| {
                Error::MalformedInput(format!("line {}: missing {}", idx + 1, SAMPLE_COLUMNS[k]))
            })?;
            values[k] = raw.parse().map_err(|_| {
                Error::MalformedInput(format!(
                    "line {}: invalid number {:?} in {}",
                    idx + 1,
                    raw,
                    SAMPLE_COLUMNS[k]
                ))
            })?;
        }

        let mut rest = [0.0; 9];
        rest.copy_from_slice(&values[1..]);
        stamped.push((values[0], rest));
    }

    let mut samples = Vec::with_capacity(stamped.len());
    for i in 0..stamped.len() {
        let dt = match i {
            0 if stamped.len() > 1 => stamped[1].0 - stamped[0].0,
            0 => 0.0,
            _ => stamped[i].0 - stamped[i - 1].0,
        };
        let (t, v) = stamped[i];
        samples.push(TimedSample {
            timestamp_s: t,
            sample: SensorSample::new(
                dt,
                Vec3::new(v[0], v[1], v[2]),
                Vec3::new(v[3], v[4], v[5]),
                Vec3::new(v[6], v[7], v[8]),
            ),
        });
    }

    Ok(samples)
}

/// Flatten samples into `[dt, accel₃, gyro₃, mag₃]` rows for batch processing.
pub fn flatten_rows(samples: &[TimedSample]) -> Vec<f64> {
    samples.iter().flat_map(|s| s.sample.to_row()).collect()
}

/// Header position of each required column.
fn locate_columns(header: &str) -> Result<[usize; 10]> {
    let names: Vec<&str> = header.split(',').map(str::trim).collect();
    let mut columns = [0usize; 10];
    for (slot, wanted) in columns.iter_mut().zip(SAMPLE_COLUMNS) {
        *slot = names
            .iter()
            .position(|n| *n == wanted)
            .ok_or_else(|| Error::MalformedInput(format!("missing column {}", wanted)))?;
    }
    Ok(columns)
}

// ============================================================================
// Writing
// ============================================================================

/// Buffered CSV writer for orientation/position output.
pub struct TrajectoryWriter<W: Write> {
    out: BufWriter<W>,
    rows: usize,
}

impl TrajectoryWriter<File> {
    /// Create (truncate) a trajectory file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write> TrajectoryWriter<W> {
    /// Wrap a writer and emit the header.
    pub fn new(inner: W) -> Result<Self> {
        let mut out = BufWriter::new(inner);
        writeln!(out, "{}", TRAJECTORY_HEADER)?;
        Ok(Self { out, rows: 0 })
    }

    /// Append one streaming output row.
    pub fn write(&mut self, timestamp_s: f64, q: &Quaternion, motion: &MotionState) -> Result<()> {
        self.write_row(timestamp_s, q, &motion.position, motion.rod_tip.as_ref())
    }

    /// Append every row of a batch run.
    pub fn write_batch(&mut self, timestamps: &[f64], trajectory: &BatchTrajectory) -> Result<()> {
        if timestamps.len() != trajectory.len() {
            return Err(Error::DimensionMismatch {
                expected: trajectory.len(),
                actual: timestamps.len(),
            });
        }
        for (i, &t) in timestamps.iter().enumerate() {
            self.write_row(
                t,
                &trajectory.quaternions[i],
                &trajectory.positions[i],
                trajectory.rod_tips.get(i),
            )?;
        }
        Ok(())
    }

    fn write_row(
        &mut self,
        timestamp_s: f64,
        q: &Quaternion,
        position: &Vec3,
        tip: Option<&Vec3>,
    ) -> Result<()> {
        write!(
            self.out,
            "{:.6},{:.9},{:.9},{:.9},{:.9},{:.6},{:.6},{:.6}",
            timestamp_s, q.w, q.x, q.y, q.z, position.x, position.y, position.z
        )?;
        match tip {
            Some(t) => writeln!(self.out, ",{:.6},{:.6},{:.6}", t.x, t.y, t.z)?,
            None => writeln!(self.out, ",,,")?,
        }
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far (excluding the header).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the inner writer.
    pub fn finish(self) -> Result<W> {
        self.out.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}
