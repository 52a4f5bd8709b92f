//! Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use time::macros::format_description;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Document-store settings.
    pub store: StoreConfig,
    /// Daily-record cache settings.
    pub cache: CacheConfig,
    /// Disaggregation pipeline settings.
    pub pipeline: PipelineConfig,
    /// The device registry: identifiers of registered monitoring devices.
    #[serde(default)]
    pub devices: Vec<String>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Store URL looks like an HTTP base URL
    /// - Pipeline offset, cadence, and runner settings are usable
    /// - Device identifiers are non-empty and unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.store.validate());
        errors.extend(self.pipeline.validate());

        let mut seen = std::collections::HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            if device.is_empty() {
                errors.push(ValidationError {
                    field: format!("devices[{i}]"),
                    message: "device identifier cannot be empty".to_string(),
                });
            } else if !seen.insert(device.clone()) {
                errors.push(ValidationError {
                    field: format!("devices[{i}]"),
                    message: format!("duplicate device identifier '{device}'"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            let parts: Vec<&str> = self.bind.rsplitn(2, ':').collect();
            if parts.len() != 2 {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                });
            } else {
                match parts[0].parse::<u16>() {
                    Ok(0) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: "port cannot be 0".to_string(),
                        });
                    }
                    Err(_) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: format!(
                                "invalid port '{}': must be a number 1-65535",
                                parts[0]
                            ),
                        });
                    }
                    Ok(_) => {}
                }
            }
        }

        errors
    }
}

/// Document-store connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the document store.
    pub url: String,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5984".to_string(),
            username: "admin".to_string(),
            password: String::new(),
        }
    }
}

impl StoreConfig {
    /// Validate store configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            errors.push(ValidationError {
                field: "store.url".to_string(),
                message: format!(
                    "invalid store URL '{}': must start with http:// or https://",
                    self.url
                ),
            });
        }

        errors
    }
}

/// Daily-record cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether fetched past days may be cached on disk.
    pub enabled: bool,
    /// Cache directory.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
        }
    }
}

/// Minimum day-boundary check interval in seconds.
pub const MIN_CHECK_INTERVAL: u64 = 10;

/// Disaggregation pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fixed UTC offset the day grid is built in (e.g. "+01:00").
    pub utc_offset: String,
    /// Model runner executable.
    pub runner: PathBuf,
    /// Where the model-input CSV is written.
    pub input_path: PathBuf,
    /// Where the model leaves per-appliance prediction files.
    pub output_dir: PathBuf,
    /// Seconds between day-boundary checks.
    pub check_interval: u64,
    /// Seconds to let upstream ingestion flush after a day boundary before
    /// the pipeline reads the finished day.
    pub settle_delay: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+01:00".to_string(),
            runner: PathBuf::from("/opt/nilm/run"),
            input_path: PathBuf::from("/var/lib/wattmon/nilm/input/data.csv"),
            output_dir: PathBuf::from("/var/lib/wattmon/nilm/output"),
            check_interval: 300,
            settle_delay: 60,
        }
    }
}

impl PipelineConfig {
    /// Parse the configured UTC offset.
    pub fn offset(&self) -> Result<UtcOffset, ConfigError> {
        let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
        UtcOffset::parse(&self.utc_offset, &format).map_err(|_| {
            ConfigError::Validation(vec![ValidationError {
                field: "pipeline.utc_offset".to_string(),
                message: format!(
                    "invalid offset '{}': expected ±HH:MM",
                    self.utc_offset
                ),
            }])
        })
    }

    /// Validate pipeline configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.offset().is_err() {
            errors.push(ValidationError {
                field: "pipeline.utc_offset".to_string(),
                message: format!("invalid offset '{}': expected ±HH:MM", self.utc_offset),
            });
        }

        if self.check_interval < MIN_CHECK_INTERVAL {
            errors.push(ValidationError {
                field: "pipeline.check_interval".to_string(),
                message: format!(
                    "check interval {} is too short (minimum {} seconds)",
                    self.check_interval, MIN_CHECK_INTERVAL
                ),
            });
        }

        if self.runner.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "pipeline.runner".to_string(),
                message: "model runner executable cannot be empty".to_string(),
            });
        }

        if self.input_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "pipeline.input_path".to_string(),
                message: "model input path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The configuration field that failed validation.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Invalid configuration: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Default configuration path following platform conventions.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wattmon")
        .join("server.toml")
}

/// Default cache directory following platform conventions.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wattmon")
        .join("days")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::offset;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.pipeline.check_interval, 300);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.devices = vec!["emon01".to_string(), "emon02".to_string()];
        config.store.password = "secret".to_string();

        let toml = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&toml).unwrap();

        assert_eq!(back.devices, config.devices);
        assert_eq!(back.store.password, "secret");
        assert_eq!(back.pipeline.utc_offset, "+01:00");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            devices = ["emon01"]

            [server]
            bind = "0.0.0.0:9090"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9090");
        assert_eq!(config.store.url, "http://127.0.0.1:5984");
        assert_eq!(config.devices, vec!["emon01".to_string()]);
    }

    #[test]
    fn test_offset_parses() {
        let mut pipeline = PipelineConfig::default();
        assert_eq!(pipeline.offset().unwrap(), offset!(+1));

        pipeline.utc_offset = "-05:30".to_string();
        assert_eq!(pipeline.offset().unwrap(), offset!(-5:30));

        pipeline.utc_offset = "CET".to_string();
        assert!(pipeline.offset().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "nonsense".to_string();
        assert!(config.validate().is_err());

        config.server.bind = "127.0.0.1:0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_devices() {
        let mut config = Config::default();
        config.devices = vec!["emon01".to_string(), "emon01".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validation_rejects_bad_store_url() {
        let mut config = Config::default();
        config.store.url = "couch.local:5984".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("server.toml");

        let mut config = Config::default();
        config.devices = vec!["emon07".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load_validated(&path).unwrap();
        assert_eq!(loaded.devices, vec!["emon07".to_string()]);
    }
}
