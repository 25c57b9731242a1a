// src/config.rs - Host configuration (TOML)
use std::fs::File;
use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::CaptureMode;
use crate::job::JobOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub job: JobConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub port: Option<String>,

    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_baud(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default = "default_ack_timeout_s")]
    pub ack_timeout_s: u64,

    #[serde(default = "default_heating_ack_timeout_s")]
    pub heating_ack_timeout_s: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack_timeout_s: default_ack_timeout_s(),
            heating_ack_timeout_s: default_heating_ack_timeout_s(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(default = "default_cancel_grace_s")]
    pub cancel_grace_s: u64,

    #[serde(default = "default_status_led")]
    pub status_led: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cancel_grace_s: default_cancel_grace_s(),
            status_led: default_status_led(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub mode: CaptureMode,
}

fn default_baud() -> u32 {
    115_200
}

fn default_uploads_dir() -> String {
    "data/uploads".to_string()
}

fn default_ack_timeout_s() -> u64 {
    30
}

fn default_heating_ack_timeout_s() -> u64 {
    60
}

fn default_cancel_grace_s() -> u64 {
    2
}

fn default_status_led() -> bool {
    true
}

impl Config {
    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            ack_timeout: Duration::from_secs(self.link.ack_timeout_s),
            heating_ack_timeout: Duration::from_secs(self.link.heating_ack_timeout_s),
            cancel_grace: Duration::from_secs(self.job.cancel_grace_s),
            status_led: self.job.status_led,
        }
    }
}

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let config = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.serial.baud, 115_200);
        assert_eq!(config.link.ack_timeout_s, 30);
        assert_eq!(config.link.heating_ack_timeout_s, 60);
        assert_eq!(config.job.cancel_grace_s, 2);
        assert!(config.job.status_led);
        assert_eq!(config.capture.mode, CaptureMode::Disabled);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyUSB0"
            baud = 250000

            [capture]
            mode = "per-layer"
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud, 250_000);
        assert_eq!(config.capture.mode, CaptureMode::PerLayer);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.link.ack_timeout_s, 30);
    }

    #[test]
    fn job_options_convert_seconds() {
        let config = Config::default();
        let options = config.job_options();
        assert_eq!(options.ack_timeout, Duration::from_secs(30));
        assert_eq!(options.heating_ack_timeout, Duration::from_secs(60));
        assert!(options.heating_ack_timeout > options.ack_timeout);
    }
}
