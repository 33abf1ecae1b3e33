//! Fused Attitude - attitude reporting from raw inertial and magnetic samples
//!
//! Raw gyroscope, accelerometer and magnetometer samples are pushed by a
//! sensor source, fused into an orientation quaternion and decomposed into
//! roll, pitch and yaw. Every processed sample reaches a consumer callback
//! in arrival order, from a single worker thread.
//!
//! # Features
//!
//! - Gimbal-lock aware quaternion to Euler decomposition that tolerates
//!   non-unit quaternions
//! - Pluggable fusion engines, with a Madgwick MARG filter included
//! - Pluggable sensor sources: timed replay of recorded samples, or readings
//!   pushed by the host application
//! - Strictly serialized processing with non-blocking stop
//! - TOML configuration and structured `tracing` diagnostics
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::mpsc;
//! use std::time::Duration;
//! use nalgebra::Vector3;
//! use fused_attitude::{
//!     AttitudeConfig, AttitudeDriver, AttitudeError, AttitudeSample, Madgwick, RawSample,
//!     ReplaySource, SensorReading,
//! };
//!
//! // One second of a level, motionless device at 100 Hz
//! let level = RawSample::new(
//!     Vector3::zeros(),               // rad/s
//!     Vector3::new(0.0, 0.0, -1.0),   // g
//!     Vector3::new(0.3, 0.0, -0.5),   // µT, any unit
//! );
//! let source = ReplaySource::new(vec![SensorReading::new(level); 100]);
//!
//! let config = AttitudeConfig {
//!     sample_frequency: 100.0,
//!     ..Default::default()
//! };
//! let mut driver = AttitudeDriver::<_, Madgwick>::new(config, source)?;
//!
//! let (tx, rx) = mpsc::channel();
//! driver.start(move |update: Result<AttitudeSample, AttitudeError>| {
//!     let _ = tx.send(update);
//! })?;
//!
//! let sample = rx.recv_timeout(Duration::from_secs(1)).unwrap()?;
//! println!(
//!     "Roll: {:.2}, Pitch: {:.2}, Yaw: {:.2}",
//!     sample.euler.roll, sample.euler.pitch, sample.euler.yaw
//! );
//!
//! driver.stop()?;
//! # Ok::<(), fused_attitude::AttitudeError>(())
//! ```

mod config;
mod driver;
mod engine;
mod error;
pub mod euler;
pub mod madgwick;
mod math;
pub mod source;
mod types;

// Re-export all public types and functions
pub use config::{AttitudeConfig, InvalidOrientationPolicy};
pub use driver::{AttitudeConsumer, AttitudeDriver};
pub use engine::FusionEngine;
pub use error::{AttitudeError, Result};
pub use euler::{EulerAngles, QuaternionExt, decompose};
pub use madgwick::Madgwick;
pub use math::{DEG_TO_RAD, RAD_TO_DEG, Vector3Ext, degrees_from_radians, radians_from_degrees};
pub use source::{ManualSource, ManualSourceHandle, ReplaySource, SampleSink, SensorSource};
pub use types::*;
