//! Background line reader.
//!
//! Reads device lines from any [`BufRead`] source (a serial port or a
//! capture file) on its own thread and publishes each decoded line into a
//! [`LatestSample`] cell. Malformed lines are published as the all-zero
//! fallback reading so consumers still see a heartbeat.
//!
//! The thread exits on end of input, on an I/O error, or when the shared
//! shutdown flag is set.

use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use serde::{Deserialize, Serialize};

use super::latest::LatestSample;
use super::line_protocol::{parse_line, zero_fallback};
use crate::Result;

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyACM0`, `COM6`)
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 100,
        }
    }
}

/// Open a serial port as a line source (8N1, no flow control).
pub fn open_serial(config: &SerialConfig) -> Result<BufReader<Box<dyn SerialPort>>> {
    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(config.timeout_ms))
        .open()?;

    log::info!(
        "Opened serial port: {} at {} baud",
        config.port,
        config.baud_rate
    );
    Ok(BufReader::new(port))
}

/// Counters shared with the reader thread.
#[derive(Debug, Default)]
pub struct ReaderStats {
    /// Lines decoded successfully
    pub lines: AtomicU64,
    /// Lines replaced by the zero fallback
    pub malformed: AtomicU64,
}

/// Handle to a running reader thread.
pub struct LineReader {
    handle: JoinHandle<()>,
    stats: Arc<ReaderStats>,
}

impl LineReader {
    /// Spawn the reader thread.
    pub fn spawn<R>(source: R, cell: LatestSample, shutdown: Arc<AtomicBool>) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let stats = Arc::new(ReaderStats::default());
        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("line-reader".to_string())
            .spawn(move || reader_loop(source, cell, shutdown, thread_stats))?;
        Ok(Self { handle, stats })
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// True once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("Line reader thread panicked");
        }
    }
}

fn reader_loop<R: BufRead>(
    mut source: R,
    cell: LatestSample,
    shutdown: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
) {
    let mut buf = String::new();

    while !shutdown.load(Ordering::Relaxed) {
        // A timeout may leave a partial line in `buf`; the next read appends to it
        match source.read_line(&mut buf) {
            Ok(0) => {
                log::info!("Line source reached end of input");
                break;
            }
            Ok(_) => {
                let text = std::mem::take(&mut buf);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let line = match parse_line(text) {
                    Ok(line) => {
                        stats.lines.fetch_add(1, Ordering::Relaxed);
                        line
                    }
                    Err(e) => {
                        stats.malformed.fetch_add(1, Ordering::Relaxed);
                        zero_fallback(&e)
                    }
                };
                let seq = cell.publish(line);
                if seq % 1000 == 0 {
                    log::debug!(
                        "Reader: {} lines, {} malformed",
                        stats.lines.load(Ordering::Relaxed),
                        stats.malformed.load(Ordering::Relaxed)
                    );
                }
            }
            // Serial timeouts just mean no data yet
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                buf.clear();
                stats.malformed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Non-UTF-8 device line skipped");
            }
            Err(e) => {
                log::error!("Line source read error: {}", e);
                break;
            }
        }
    }

    log::info!(
        "Line reader stopped ({} lines, {} malformed)",
        stats.lines.load(Ordering::Relaxed),
        stats.malformed.load(Ordering::Relaxed)
    );
}
