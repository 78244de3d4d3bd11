//! TOML configuration for the reader and the mock transmitter.

use crate::PlcError;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the serial reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Serial port device path (e.g. "/dev/ttyUSB0" or "COM2")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout in seconds
    pub timeout_secs: f64,
    /// Maximum silence before the connection is considered dead (seconds)
    pub max_silence_secs: f64,
    /// Interval between health checks (seconds)
    pub health_check_interval_secs: f64,
    /// Wait after a failed reconnect before the next attempt (seconds)
    pub retry_interval_secs: f64,
    /// Number of readings kept in the in-memory history
    pub history_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 9600,
            timeout_secs: 1.0,
            max_silence_secs: 10.0,
            health_check_interval_secs: 5.0,
            retry_interval_secs: 5.0,
            history_capacity: 100,
        }
    }
}

impl ReaderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.health_check_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs_f64(self.retry_interval_secs)
    }
}

/// One simulated sensor channel of the mock transmitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSensor {
    /// Wire key, emitted upper-case
    pub name: String,
    pub min_value: f64,
    pub max_value: f64,
    /// Decimal places; 0 emits integers
    pub precision: u8,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self {
            name: "TEMPERATURE".into(),
            min_value: 0.0,
            max_value: 100.0,
            precision: 1,
        }
    }
}

/// Configuration for the mock PLC transmitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Serial port the mock writes to (the other end of the reader's port)
    pub port: String,
    pub baud_rate: u32,
    /// Seconds between transmitted lines
    pub interval_secs: f64,
    pub sensors: Vec<MockSensor>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".into(),
            baud_rate: 9600,
            interval_secs: 2.0,
            sensors: vec![
                MockSensor {
                    name: "TEMPERATURE".into(),
                    min_value: 15.0,
                    max_value: 35.0,
                    precision: 1,
                },
                MockSensor {
                    name: "PRESSURE".into(),
                    min_value: 95.0,
                    max_value: 110.0,
                    precision: 1,
                },
                MockSensor {
                    name: "SPEED".into(),
                    min_value: 0.0,
                    max_value: 3000.0,
                    precision: 0,
                },
            ],
        }
    }
}

impl MockConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }
}

/// Root configuration (unifies reader and mock transmitter).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reader: ReaderConfig,
    pub mock: MockConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file, a TOML syntax error, or a value out of range is fatal:
    /// the reader must not start on a guessed configuration.
    pub fn load(path: &Path) -> Result<Self, PlcError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlcError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| PlcError::Config(format!("cannot parse {}: {}", path.display(), e)))?;

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(PlcError::Config(format!(
                "{}: {}",
                path.display(),
                errors.join("; ")
            )));
        }

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Validates the configuration and returns a list of problems.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.reader.port.is_empty() {
            errors.push("reader port must not be empty".into());
        }
        if self.reader.baud_rate == 0 {
            errors.push("reader baud_rate must not be 0".into());
        }
        if self.reader.timeout_secs <= 0.0 {
            errors.push(format!(
                "reader timeout_secs must be positive: {}",
                self.reader.timeout_secs
            ));
        }
        if self.reader.max_silence_secs <= 0.0 {
            errors.push(format!(
                "reader max_silence_secs must be positive: {}",
                self.reader.max_silence_secs
            ));
        }
        if self.reader.health_check_interval_secs <= 0.0 {
            errors.push(format!(
                "reader health_check_interval_secs must be positive: {}",
                self.reader.health_check_interval_secs
            ));
        }
        if self.reader.retry_interval_secs <= 0.0 {
            errors.push(format!(
                "reader retry_interval_secs must be positive: {}",
                self.reader.retry_interval_secs
            ));
        }
        if self.reader.history_capacity == 0 {
            errors.push("reader history_capacity must not be 0".into());
        }
        if self.mock.interval_secs <= 0.0 {
            errors.push(format!(
                "mock interval_secs must be positive: {}",
                self.mock.interval_secs
            ));
        }
        for sensor in &self.mock.sensors {
            if sensor.min_value > sensor.max_value {
                errors.push(format!(
                    "mock sensor {}: min_value {} > max_value {}",
                    sensor.name, sensor.min_value, sensor.max_value
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "errors: {:?}", errors);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[reader]
port = "COM7"
baud_rate = 115200
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.reader.port, "COM7");
        assert_eq!(config.reader.baud_rate, 115200);
        assert_eq!(config.reader.max_silence_secs, 10.0);
        assert_eq!(config.reader.health_check_interval_secs, 5.0);
        assert_eq!(config.reader.history_capacity, 100);
        assert_eq!(config.mock.sensors.len(), 3);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.reader.port, parsed.reader.port);
        assert_eq!(config.mock.interval_secs, parsed.mock.interval_secs);
    }

    #[test]
    fn missing_file_is_fatal() {
        let result = AppConfig::load(Path::new("/nonexistent/plc_config.toml"));
        assert!(matches!(result, Err(PlcError::Config(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = AppConfig::default();
        config.reader.history_capacity = 0;
        config.reader.max_silence_secs = -1.0;
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
    }
}
