use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Manufacturer prefix reported by genuine Arduino boards over USB.
pub const ARDUINO_VENDOR_PREFIX: &str = "Arduino";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("Baud rate must be greater than zero")]
    ZeroBaudRate,

    #[error("Sample rate {sample_rate} Hz exceeds what {baud_rate} baud can carry (max {max} Hz)")]
    SampleRateTooHigh {
        sample_rate: u32,
        baud_rate: u32,
        max: u32,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Acquisition parameters for one board.
///
/// Missing keys in a TOML file fall back to the defaults of a stock Arduino
/// sketch streaming `analogRead(A0)` with `Serial.println` at 9600 baud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub baud_rate: u32,
    /// Upper bound on accepted samples per second.
    pub sample_rate: u32,
    /// Bound on each blocking serial read, in milliseconds.
    pub timeout_ms: u64,
    /// Explicit device path, skips discovery when set.
    pub port: Option<String>,
    /// Device path used when discovery finds no matching board.
    pub fallback_port: Option<String>,
    pub vendor_prefix: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            sample_rate: 500,
            timeout_ms: 10_000,
            port: None,
            fallback_port: None,
            vendor_prefix: ARDUINO_VENDOR_PREFIX.to_string(),
        }
    }
}

impl AcquisitionConfig {
    pub fn new(baud_rate: u32, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            baud_rate,
            sample_rate,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_fallback_port(mut self, port: impl Into<String>) -> Self {
        self.fallback_port = Some(port.into());
        self
    }

    pub fn with_vendor_prefix(mut self, vendor_prefix: impl Into<String>) -> Self {
        self.vendor_prefix = vendor_prefix.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Minimum spacing between two accepted samples.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.sample_rate.max(1)))
    }

    /// Highest sample rate the link could possibly sustain.
    ///
    /// An 8N1 frame is ten bits, and every sample needs at least one
    /// character on the wire.
    pub fn max_sample_rate(&self) -> u32 {
        self.baud_rate / 10
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        let max = self.max_sample_rate();
        if self.sample_rate > max {
            return Err(ConfigError::SampleRateTooHigh {
                sample_rate: self.sample_rate,
                baud_rate: self.baud_rate,
                max,
            });
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded acquisition config from {}", path.as_ref().display());
        Self::from_toml_str(&contents)
    }
}
