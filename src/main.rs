//! Disha - IMU orientation and dead-reckoning runner
//!
//! # Usage
//!
//! ```bash
//! # Whole-trial dead reckoning of a CSV log (Madgwick, first-row offset removal)
//! disha batch --input trial.csv --output trajectory.csv --rod-length 0.2
//!
//! # Per-sample pipeline over a CSV log with either estimator
//! disha replay --input trial.csv --estimator bias-ekf
//!
//! # Live device lines from a serial port (or a captured text file)
//! disha --config disha.toml stream --port /dev/ttyACM0
//! disha stream --capture session.txt --output live.csv
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use disha::io::{
    LatestSample, LineReader, SampleClock, TrajectoryWriter, flatten_rows, open_serial,
    read_samples,
};
use disha::{AppConfig, BatchProcessor, Error, EstimatorType, MagnetometerCalibrator, Result};

#[derive(Parser)]
#[command(name = "disha")]
#[command(about = "IMU orientation fusion and dead reckoning")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dead-reckon a whole CSV log and report the final position
    Batch {
        /// Input sample log
        #[arg(short, long)]
        input: PathBuf,

        /// Trajectory CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Madgwick gain (overrides config)
        #[arg(long)]
        beta: Option<f64>,

        /// Rod length along body +Z in metres
        #[arg(long, default_value = "0.0")]
        rod_length: f64,
    },

    /// Run the per-sample pipeline over a CSV log
    Replay {
        /// Input sample log
        #[arg(short, long)]
        input: PathBuf,

        /// Trajectory CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Orientation estimator (overrides config)
        #[arg(long, value_enum)]
        estimator: Option<EstimatorType>,
    },

    /// Run the pipeline on live device lines
    Stream {
        /// Serial port (overrides config)
        #[arg(short, long)]
        port: Option<String>,

        /// Read device lines from a captured text file instead of a port
        #[arg(long, conflicts_with = "port")]
        capture: Option<PathBuf>,

        /// Trajectory CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Orientation estimator (overrides config)
        #[arg(long, value_enum)]
        estimator: Option<EstimatorType>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("Disha v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        log::info!("Using config: {}", path.display());
    }

    match args.command {
        Commands::Batch {
            input,
            output,
            beta,
            rod_length,
        } => run_batch(&config, &input, output.as_deref(), beta, rod_length),
        Commands::Replay {
            input,
            output,
            estimator,
        } => run_replay(config, &input, output.as_deref(), estimator),
        Commands::Stream {
            port,
            capture,
            output,
            estimator,
        } => run_stream(config, port, capture, output.as_deref(), estimator),
    }
}

fn run_batch(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
    beta: Option<f64>,
    rod_length: f64,
) -> Result<()> {
    let samples = read_samples(input)?;
    let processor = BatchProcessor::new(
        MagnetometerCalibrator::from_config(&config.calibration),
        beta.unwrap_or(config.madgwick.beta),
        rod_length,
    );
    let trajectory = processor.trace(&flatten_rows(&samples))?;

    if let Some(path) = output {
        let timestamps: Vec<f64> = samples.iter().map(|s| s.timestamp_s).collect();
        let mut writer = TrajectoryWriter::create(path)?;
        writer.write_batch(&timestamps, &trajectory)?;
        writer.finish()?;
        log::info!("Wrote {} rows to {}", trajectory.len(), path.display());
    }

    let p = trajectory.final_position();
    println!("Final position: [{:.4}, {:.4}, {:.4}] m", p.x, p.y, p.z);
    Ok(())
}

fn run_replay(
    mut config: AppConfig,
    input: &Path,
    output: Option<&Path>,
    estimator: Option<EstimatorType>,
) -> Result<()> {
    if let Some(kind) = estimator {
        config.pipeline.estimator = kind;
    }
    let samples = read_samples(input)?;
    let mut pipeline = config.build_pipeline();
    let mut writer = output.map(TrajectoryWriter::create).transpose()?;

    for timed in &samples {
        let out = pipeline.process(&timed.sample)?;
        if let Some(w) = writer.as_mut() {
            w.write(timed.timestamp_s, &out.quaternion, &out.motion)?;
        }
    }

    if let Some(w) = writer {
        w.finish()?;
    }

    let stats = pipeline.stats();
    let p = pipeline.motion().position;
    let e = pipeline.estimator().euler().to_degrees();
    log::info!(
        "Replayed {} samples ({} degenerate, {} dt fallbacks)",
        stats.samples,
        stats.degenerate,
        stats.dt_fallbacks
    );
    println!(
        "Final orientation: yaw={:.2}° pitch={:.2}° roll={:.2}°",
        e.yaw, e.pitch, e.roll
    );
    println!("Final position: [{:.4}, {:.4}, {:.4}] m", p.x, p.y, p.z);
    Ok(())
}

fn run_stream(
    mut config: AppConfig,
    port: Option<String>,
    capture: Option<PathBuf>,
    output: Option<&Path>,
    estimator: Option<EstimatorType>,
) -> Result<()> {
    if let Some(kind) = estimator {
        config.pipeline.estimator = kind;
    }
    if let Some(port) = port {
        config.serial.port = port;
    }

    let running = Arc::new(AtomicBool::new(true));
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let r = Arc::clone(&running);
        let s = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            r.store(false, Ordering::Relaxed);
            s.store(true, Ordering::Relaxed);
        })
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;
    }

    let cell = LatestSample::new();
    let reader = match capture {
        Some(path) => {
            log::info!("Reading device lines from {}", path.display());
            let file = BufReader::new(File::open(&path)?);
            LineReader::spawn(file, cell.clone(), Arc::clone(&shutdown))?
        }
        None => LineReader::spawn(
            open_serial(&config.serial)?,
            cell.clone(),
            Arc::clone(&shutdown),
        )?,
    };

    let mut pipeline = config.build_pipeline();
    let mut clock = SampleClock::new();
    let mut writer = output.map(TrajectoryWriter::create).transpose()?;
    let mut last_seq = 0;
    let mut elapsed = 0.0;

    while running.load(Ordering::Relaxed) {
        let Some((seq, line)) = cell.newer_than(last_seq) else {
            if reader.is_finished() && cell.newer_than(last_seq).is_none() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
            continue;
        };
        if seq > last_seq + 1 {
            log::debug!("Skipped {} stale lines", seq - last_seq - 1);
        }
        last_seq = seq;

        let dt = clock.tick(line.timestamp_s);
        let out = pipeline.process(&line.to_sample(dt))?;
        elapsed += out.dt;

        if let Some(w) = writer.as_mut() {
            w.write(line.timestamp_s.unwrap_or(elapsed), &out.quaternion, &out.motion)?;
        }

        if pipeline.stats().samples % 100 == 0 {
            let e = out.quaternion.to_euler().to_degrees();
            let p = out.motion.position;
            log::info!(
                "yaw={:.1}° pitch={:.1}° roll={:.1}° pos=[{:.3}, {:.3}, {:.3}]",
                e.yaw,
                e.pitch,
                e.roll,
                p.x,
                p.y,
                p.z
            );
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    reader.join();

    if let Some(w) = writer {
        w.finish()?;
    }

    let stats = pipeline.stats();
    log::info!(
        "Stream stopped: {} samples ({} degenerate, {} dt fallbacks)",
        stats.samples,
        stats.degenerate,
        stats.dt_fallbacks
    );
    Ok(())
}
