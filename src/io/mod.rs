//! I/O edge layer.
//!
//! Sample sources and sinks around the estimation core. Nothing in
//! [`crate::sensors`] or [`crate::engine`] depends on this layer.
//!
//! # Contents
//!
//! - [`line_protocol`]: Device text line parsing and timestamp → dt clock
//! - [`csv`]: Sample log reader, trajectory writer
//! - [`latest`]: Single-slot latest-sample cell
//! - [`line_reader`]: Background reader thread, serial port opening

pub mod csv;
pub mod latest;
pub mod line_protocol;
pub mod line_reader;

pub use csv::{TimedSample, TrajectoryWriter, flatten_rows, parse_samples, read_samples};
pub use latest::LatestSample;
pub use line_protocol::{DeviceLine, SampleClock, parse_line, parse_line_or_zero};
pub use line_reader::{LineReader, ReaderStats, SerialConfig, open_serial};
