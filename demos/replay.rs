//! Replay a recorded sensor session through the attitude driver
//!
//! Reads a CSV recording, plays it back at the configured sample rate and
//! prints the estimated attitude next to the recorded reference.
//!
//! Run with: `cargo run --example replay -- [config.toml] [recording.csv]`
//!
//! Defaults to `demos/replay.toml` and `testdata/level_turn.csv`. Set
//! `RUST_LOG=fused_attitude=debug` to see the driver's diagnostics.

use fused_attitude::{
    AttitudeConfig, AttitudeDriver, AttitudeSample, EulerAngles, Madgwick, RawSample,
    ReplaySource, SensorReading,
};
use nalgebra::Vector3;
use serde::Deserialize;
use std::error::Error;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "Gyroscope X (rad/s)")]
    gyro_x: f32,
    #[serde(rename = "Gyroscope Y (rad/s)")]
    gyro_y: f32,
    #[serde(rename = "Gyroscope Z (rad/s)")]
    gyro_z: f32,
    #[serde(rename = "Accelerometer X (g)")]
    accel_x: f32,
    #[serde(rename = "Accelerometer Y (g)")]
    accel_y: f32,
    #[serde(rename = "Accelerometer Z (g)")]
    accel_z: f32,
    #[serde(rename = "Magnetometer X (uT)")]
    mag_x: f32,
    #[serde(rename = "Magnetometer Y (uT)")]
    mag_y: f32,
    #[serde(rename = "Magnetometer Z (uT)")]
    mag_z: f32,
    #[serde(rename = "Roll (rad)")]
    roll: Option<f32>,
    #[serde(rename = "Pitch (rad)")]
    pitch: Option<f32>,
    #[serde(rename = "Yaw (rad)")]
    yaw: Option<f32>,
}

impl Record {
    fn into_reading(self) -> SensorReading {
        let reading = SensorReading::new(RawSample::new(
            Vector3::new(self.gyro_x, self.gyro_y, self.gyro_z),
            Vector3::new(self.accel_x, self.accel_y, self.accel_z),
            Vector3::new(self.mag_x, self.mag_y, self.mag_z),
        ));
        match (self.roll, self.pitch, self.yaw) {
            (Some(roll), Some(pitch), Some(yaw)) => {
                reading.with_reference(EulerAngles::new(roll, pitch, yaw))
            }
            _ => reading,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fused_attitude=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "demos/replay.toml".into());
    let recording_path = args
        .next()
        .unwrap_or_else(|| "testdata/level_turn.csv".into());

    let config = AttitudeConfig::load(&config_path)?;

    let mut reader = csv::Reader::from_path(&recording_path)?;
    let mut readings = Vec::new();
    for result in reader.deserialize() {
        let record: Record = result?;
        readings.push(record.into_reading());
    }
    let total = readings.len();
    println!(
        "Replaying {} samples from {} at {} Hz",
        total, recording_path, config.sample_frequency
    );

    let mut driver = AttitudeDriver::<_, Madgwick>::new(config, ReplaySource::new(readings))?;

    let (tx, rx) = mpsc::channel();
    driver.start(move |update: fused_attitude::Result<AttitudeSample>| {
        let _ = tx.send(update);
    })?;

    // Print roughly ten lines per second of recording
    let stride = ((config.sample_frequency / 10.0) as usize).max(1);
    for _ in 0..total {
        let sample = match rx.recv_timeout(Duration::from_secs(5))? {
            Ok(sample) => sample,
            Err(e) => {
                println!("Skipping sample: {}", e);
                continue;
            }
        };
        if sample.sequence as usize % stride != 0 {
            continue;
        }

        print!(
            "#{:5} Roll: {:7.2}, Pitch: {:7.2}, Yaw: {:7.2}",
            sample.sequence, sample.euler.roll, sample.euler.pitch, sample.euler.yaw
        );
        if let Some(reference) = sample.reference {
            print!(
                "  | Reference Roll: {:7.2}, Pitch: {:7.2}, Yaw: {:7.2}",
                reference.roll, reference.pitch, reference.yaw
            );
        }
        println!();
    }

    driver.stop()?;
    println!("Delivered {} samples", driver.samples_delivered());
    Ok(())
}
