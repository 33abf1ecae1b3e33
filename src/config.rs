//! Attitude driver configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AttitudeError, Result};

/// What the driver does when the fusion engine yields a degenerate quaternion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidOrientationPolicy {
    /// Hand `Err(AttitudeError::InvalidOrientation)` to the consumer
    #[default]
    Report,
    /// Report the sample with the identity quaternion and zero angles
    SubstituteIdentity,
}

/// Attitude driver settings
///
/// Fixed when a driver is constructed and immutable for its lifetime.
///
/// # Example
/// ```
/// use fused_attitude::{AttitudeConfig, InvalidOrientationPolicy};
///
/// let config = AttitudeConfig {
///     sample_frequency: 100.0,   // 100 Hz
///     beta: 0.05,                // Slower, smoother convergence
///     invalid_orientation: InvalidOrientationPolicy::SubstituteIdentity,
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.sample_interval().as_millis(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttitudeConfig {
    /// Sampling rate in Hz, must be positive
    pub sample_frequency: f32,
    /// Fusion engine gain (Madgwick beta), must be non-negative
    ///
    /// Higher values trust the accelerometer and magnetometer more and
    /// converge faster; lower values follow the gyroscope and are smoother.
    pub beta: f32,
    /// Handling of degenerate quaternions
    pub invalid_orientation: InvalidOrientationPolicy,
}

impl Default for AttitudeConfig {
    fn default() -> Self {
        Self {
            sample_frequency: 512.0,
            beta: 0.1,
            invalid_orientation: InvalidOrientationPolicy::default(),
        }
    }
}

impl AttitudeConfig {
    /// Check the invariants the driver relies on
    pub fn validate(&self) -> Result<()> {
        if !self.sample_frequency.is_finite() || self.sample_frequency <= 0.0 {
            return Err(AttitudeError::InvalidConfig(format!(
                "sample_frequency must be positive and finite, got {}",
                self.sample_frequency
            )));
        }
        if Duration::try_from_secs_f64(1.0 / f64::from(self.sample_frequency)).is_err() {
            return Err(AttitudeError::InvalidConfig(format!(
                "sample_frequency {} gives an unrepresentable sample interval",
                self.sample_frequency
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(AttitudeError::InvalidConfig(format!(
                "beta must be non-negative and finite, got {}",
                self.beta
            )));
        }
        Ok(())
    }

    /// Time between samples, `1 / sample_frequency`
    ///
    /// Zero for a configuration that does not pass [`validate`](Self::validate).
    pub fn sample_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / f64::from(self.sample_frequency)).unwrap_or_default()
    }

    /// Parse and validate a TOML document
    ///
    /// Missing keys take their default values.
    ///
    /// ```
    /// use fused_attitude::AttitudeConfig;
    ///
    /// let config = AttitudeConfig::from_toml_str("sample_frequency = 100.0").unwrap();
    /// assert_eq!(config.sample_frequency, 100.0);
    /// assert_eq!(config.beta, 0.1);
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AttitudeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(?path, "Loaded attitude config");
        Ok(config)
    }

    /// Render as a TOML document that [`from_toml_str`](Self::from_toml_str) accepts
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate and write the configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?)?;
        info!(?path, "Saved attitude config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AttitudeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_frequency, 512.0);
        assert_eq!(config.beta, 0.1);
        assert_eq!(config.invalid_orientation, InvalidOrientationPolicy::Report);
    }

    #[test]
    fn test_rejects_bad_frequency() {
        for frequency in [0.0, -10.0, f32::NAN, f32::INFINITY, 1e-45] {
            let config = AttitudeConfig {
                sample_frequency: frequency,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(AttitudeError::InvalidConfig(_))),
                "frequency {} should be rejected",
                frequency
            );
        }
    }

    #[test]
    fn test_beta_bounds() {
        let zero = AttitudeConfig {
            beta: 0.0,
            ..Default::default()
        };
        assert!(zero.validate().is_ok());

        let negative = AttitudeConfig {
            beta: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(AttitudeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sample_interval() {
        let config = AttitudeConfig {
            sample_frequency: 50.0,
            ..Default::default()
        };
        assert_eq!(config.sample_interval(), Duration::from_millis(20));

        let invalid = AttitudeConfig {
            sample_frequency: 0.0,
            ..Default::default()
        };
        assert_eq!(invalid.sample_interval(), Duration::ZERO);
    }

    #[test]
    fn test_from_toml() {
        let config = AttitudeConfig::from_toml_str(
            r#"
            sample_frequency = 200.0
            beta = 0.25
            invalid_orientation = "substitute_identity"
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_frequency, 200.0);
        assert_eq!(config.beta, 0.25);
        assert_eq!(
            config.invalid_orientation,
            InvalidOrientationPolicy::SubstituteIdentity
        );
    }

    #[test]
    fn test_from_toml_defaults_and_errors() {
        let config = AttitudeConfig::from_toml_str("").unwrap();
        assert_eq!(config, AttitudeConfig::default());

        assert!(matches!(
            AttitudeConfig::from_toml_str("sample_frequency = -1.0"),
            Err(AttitudeError::InvalidConfig(_))
        ));
        assert!(matches!(
            AttitudeConfig::from_toml_str("sample_rate = 100.0"),
            Err(AttitudeError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AttitudeConfig {
            sample_frequency: 250.0,
            beta: 0.033,
            invalid_orientation: InvalidOrientationPolicy::SubstituteIdentity,
        };

        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("invalid_orientation = \"substitute_identity\""));
        assert_eq!(AttitudeConfig::from_toml_str(&rendered).unwrap(), config);

        let default = AttitudeConfig::default().to_toml_string().unwrap();
        assert!(default.contains("invalid_orientation = \"report\""));
        assert_eq!(
            AttitudeConfig::from_toml_str(&default).unwrap(),
            AttitudeConfig::default()
        );
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "fused-attitude-config-{}.toml",
            std::process::id()
        ));
        let config = AttitudeConfig {
            sample_frequency: 100.0,
            ..Default::default()
        };

        config.save(&path).unwrap();
        let loaded = AttitudeConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), config);

        let invalid = AttitudeConfig {
            beta: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            invalid.save(&path),
            Err(AttitudeError::InvalidConfig(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file() {
        let result = AttitudeConfig::load("does/not/exist.toml");
        assert!(matches!(result, Err(AttitudeError::Io(_))));
    }
}
