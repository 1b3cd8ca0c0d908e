//! Streaming Edge Tests
//!
//! Exercises the I/O edges together with the pipeline:
//! - CSV log on disk → pipeline → trajectory CSV
//! - Device text lines → reader thread → latest cell → sample clock
//!
//! Run with: `cargo test --test streaming`

use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use disha::io::{LatestSample, LineReader, SampleClock, TrajectoryWriter, parse_line, read_samples};
use disha::math::Vec3;
use disha::{AppConfig, EstimatorType, MagCalibrationConfig};

fn identity_config(kind: EstimatorType) -> AppConfig {
    let mut config = AppConfig::default();
    config.calibration = MagCalibrationConfig::identity();
    config.pipeline.estimator = kind;
    config
}

fn device_line(t: f64, gyro_z: f64) -> String {
    format!(
        "{:.3} s Accel X: 0.00 Y: 0.00 Z: 9.81 m/s^2 Mag X: 20.00 Y: 0.00 Z: 0.00uT Gyro X: 0.00 Y: 0.00 Z: {:.2}radians/s",
        t, gyro_z
    )
}

#[test]
fn test_csv_replay_writes_trajectory() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("trial.csv");
    let output = dir.path().join("trajectory.csv");

    let mut log = String::from("Timestamp,Accel_X,Accel_Y,Accel_Z,Gyro_X,Gyro_Y,Gyro_Z,Mag_X,Mag_Y,Mag_Z\n");
    for i in 0..50 {
        log.push_str(&format!(
            "{:.2},0.0,0.0,9.81,0.0,0.0,0.0,20.0,0.0,0.0\n",
            i as f64 * 0.01
        ));
    }
    fs::write(&input, log).unwrap();

    let samples = read_samples(&input).unwrap();
    assert_eq!(samples.len(), 50);
    assert_relative_eq!(samples[0].sample.dt, 0.01, epsilon = 1e-9);

    for kind in [EstimatorType::Madgwick, EstimatorType::BiasEkf] {
        let mut pipeline = identity_config(kind).build_pipeline();
        let mut writer = TrajectoryWriter::create(&output).unwrap();
        for timed in &samples {
            let out = pipeline.process(&timed.sample).unwrap();
            writer
                .write(timed.timestamp_s, &out.quaternion, &out.motion)
                .unwrap();
        }
        assert_eq!(writer.rows(), 50);
        writer.finish().unwrap();

        assert_eq!(pipeline.stats().samples, 50);
        assert_eq!(pipeline.stats().dt_fallbacks, 0);
        assert_relative_eq!(pipeline.motion().position, Vec3::zeros(), epsilon = 1e-9);

        let written = fs::read_to_string(&output).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("Timestamp,Qw,Qx,Qy,Qz,Pos_X,Pos_Y,Pos_Z,Tip_X,Tip_Y,Tip_Z")
        );
        assert_eq!(lines.count(), 50);
    }
}

#[test]
fn test_missing_column_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.csv");
    fs::write(&input, "Timestamp,Accel_X,Accel_Y\n0.0,1.0,2.0\n").unwrap();
    assert!(read_samples(&input).is_err());
}

#[test]
fn test_device_lines_through_reader_and_clock() {
    let text: String = (0..20)
        .map(|i| device_line(0.01 * i as f64, 0.5) + "\n")
        .collect();

    let cell = LatestSample::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let reader = LineReader::spawn(
        Cursor::new(text.into_bytes()),
        cell.clone(),
        Arc::clone(&shutdown),
    )
    .unwrap();

    while !reader.is_finished() {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(reader.stats().lines.load(Ordering::Relaxed), 20);
    assert_eq!(reader.stats().malformed.load(Ordering::Relaxed), 0);
    reader.join();

    let (seq, line) = cell.latest().unwrap();
    assert_eq!(seq, 20);
    assert_eq!(line.gyro, Vec3::new(0.0, 0.0, 0.5));
    assert!(cell.newer_than(seq).is_none());

    let mut clock = SampleClock::new();
    assert_eq!(clock.tick(Some(0.18)), 0.0);
    assert_relative_eq!(clock.tick(line.timestamp_s), 0.01, epsilon = 1e-9);
}

#[test]
fn test_device_lines_drive_pipeline() {
    let mut pipeline = identity_config(EstimatorType::BiasEkf).build_pipeline();
    let mut clock = SampleClock::new();

    for i in 0..10 {
        let line = parse_line(&device_line(1.0 + 0.01 * i as f64, 0.0)).unwrap();
        let dt = clock.tick(line.timestamp_s);
        let out = pipeline.process(&line.to_sample(dt)).unwrap();
        assert!((out.quaternion.norm() - 1.0).abs() < 1e-9);
    }

    // Only the first line lacks a previous timestamp
    assert_eq!(pipeline.stats().dt_fallbacks, 1);
    assert_eq!(pipeline.stats().degenerate, 0);
}
