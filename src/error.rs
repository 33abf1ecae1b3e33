//! Error type for the attitude pipeline

use thiserror::Error;

/// Errors reported by the decomposer, the driver and configuration loading
///
/// None of these are fatal to the host process; every failure is returned as a
/// value or handed to the consumer.
#[derive(Debug, Error)]
pub enum AttitudeError {
    /// The quaternion is all zeros or has a non-finite component
    #[error("invalid orientation: quaternion is zero or not finite")]
    InvalidOrientation,

    /// `start` was called on a driver that is already running
    #[error("attitude driver is already running")]
    AlreadyRunning,

    /// `stop` was called on a driver that is idle
    #[error("attitude driver is not running")]
    NotRunning,

    /// Configuration rejected at construction time
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The sensor source could not begin delivering samples
    #[error("sensor source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Result alias used throughout the crate
pub type Result<T> = core::result::Result<T, AttitudeError>;
