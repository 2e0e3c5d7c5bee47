//! Application configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backon::ExponentialBuilder;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::SailtrackError;
use crate::models::Mmsi;

pub const DEFAULT_STREAM_URL: &str = "wss://stream.aisstream.io/v0/stream";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_stream_url")]
    pub url: String,
    /// Listener is disabled when no key is configured
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub mmsi_filter: Vec<String>,
    /// Bounding boxes as `[[lat, lon], [lat, lon]]` corner pairs
    #[serde(default = "default_bounding_boxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    /// How long to wait for a rejection after subscribing, in milliseconds
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout: Duration,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReconnectConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub initial_backoff: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub max_backoff: Duration,
    pub max_retries: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub healthy_after: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_retries: 10,
            healthy_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

fn default_stream_url() -> String {
    DEFAULT_STREAM_URL.to_string()
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_bounding_boxes() -> Vec<[[f64; 2]; 2]> {
    vec![[[-90.0, -180.0], [90.0, 180.0]]]
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("SAILTRACK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("stream.mmsi_filter"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), SailtrackError> {
        self.stream.validate()?;
        self.database.validate()?;
        self.server.socket_addr()?;
        Ok(())
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), SailtrackError> {
        if self.url.trim().is_empty() {
            return Err(SailtrackError::ConfigurationError {
                message: "Stream URL cannot be empty".to_string(),
            });
        }
        if matches!(&self.api_key, Some(key) if key.trim().is_empty()) {
            return Err(SailtrackError::ConfigurationError {
                message: "API key cannot be blank".to_string(),
            });
        }
        self.mmsi_filter()?;
        self.reconnect.validate()
    }

    /// Vessel filter as validated MMSIs; blank entries are skipped
    pub fn mmsi_filter(&self) -> Result<Vec<Mmsi>, SailtrackError> {
        self.mmsi_filter
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Mmsi::try_from)
            .collect()
    }
}

impl ReconnectConfig {
    /// Exponential backoff with jitter for one streak of consecutive failures
    ///
    /// Yields at most `max_retries` delays, starting at `initial_backoff` and
    /// capped at `max_backoff` before jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_retries as usize)
            .with_jitter()
    }

    pub fn validate(&self) -> Result<(), SailtrackError> {
        if self.initial_backoff.is_zero() {
            return Err(SailtrackError::ConfigurationError {
                message: "Initial backoff must be greater than zero".to_string(),
            });
        }
        if self.initial_backoff > self.max_backoff {
            return Err(SailtrackError::ConfigurationError {
                message: "Initial backoff cannot exceed maximum backoff".to_string(),
            });
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), SailtrackError> {
        self.validate_path()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_directory_exists(parent)?;
        }
        Ok(())
    }

    fn validate_path(&self) -> Result<(), SailtrackError> {
        if self.path.as_os_str().is_empty() {
            return Err(SailtrackError::ConfigurationError {
                message: "Database path cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), SailtrackError> {
        if !dir.exists() {
            warn!("Database directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| SailtrackError::ConfigurationError {
                message: format!("Could not create database directory: {}", e),
            })?;
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, SailtrackError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| SailtrackError::ConfigurationError {
                message: format!("Invalid server address: {}", e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn stream_config() -> StreamConfig {
        StreamConfig {
            url: DEFAULT_STREAM_URL.to_string(),
            api_key: Some("key".to_string()),
            mmsi_filter: vec![],
            bounding_boxes: default_bounding_boxes(),
            auth_timeout: default_auth_timeout(),
            reconnect: ReconnectConfig::default(),
        }
    }

    #[test]
    fn test_load_config() {
        env::set_var("SAILTRACK__STREAM__URL", "ws://localhost:9000");
        env::set_var("SAILTRACK__STREAM__API_KEY", "secret");
        env::set_var("SAILTRACK__STREAM__MMSI_FILTER", "111222333,230123456");
        env::set_var("SAILTRACK__STREAM__RECONNECT__INITIAL_BACKOFF", "2");
        env::set_var("SAILTRACK__STREAM__RECONNECT__MAX_BACKOFF", "30");
        env::set_var("SAILTRACK__STREAM__RECONNECT__MAX_RETRIES", "5");
        env::set_var("SAILTRACK__STREAM__RECONNECT__HEALTHY_AFTER", "45");
        env::set_var("SAILTRACK__DATABASE__PATH", "/tmp/sailtrack-test.db");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.stream.url, "ws://localhost:9000");
        assert_eq!(config.stream.api_key.as_deref(), Some("secret"));
        assert_eq!(config.stream.mmsi_filter, vec!["111222333", "230123456"]);
        assert_eq!(
            config.stream.reconnect,
            ReconnectConfig {
                initial_backoff: Duration::from_secs(2),
                max_backoff: Duration::from_secs(30),
                max_retries: 5,
                healthy_after: Duration::from_secs(45),
            }
        );
        assert_eq!(config.stream.bounding_boxes, default_bounding_boxes());
        assert_eq!(config.stream.auth_timeout, Duration::from_secs(5));
        assert_eq!(config.database.path, PathBuf::from("/tmp/sailtrack-test.db"));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_mmsi_filter() {
        let mut config = stream_config();
        config.mmsi_filter = vec!["111222333".to_string(), " ".to_string()];
        let filter = config.mmsi_filter().unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter[0].value(), 111_222_333);

        config.mmsi_filter = vec!["boat".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_config_validate() {
        assert!(stream_config().validate().is_ok());

        let mut config = stream_config();
        config.api_key = None;
        assert!(config.validate().is_ok());

        config.api_key = Some("  ".to_string());
        assert!(config.validate().is_err());

        let mut config = stream_config();
        config.url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_config_validate() {
        let mut config = ReconnectConfig::default();
        assert!(config.validate().is_ok());

        config.initial_backoff = Duration::ZERO;
        assert!(config.validate().is_err());

        config.initial_backoff = Duration::from_secs(120);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_backoff() {
        use backon::BackoffBuilder;

        let config = ReconnectConfig {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            max_retries: 6,
            healthy_after: Duration::from_secs(60),
        };
        let delays: Vec<Duration> = config.backoff().build().collect();
        assert_eq!(delays.len(), 6);
        assert!(delays[0] >= Duration::from_secs(1));
        // Jitter adds at most one extra delay on top of the cap
        assert!(delays.iter().all(|d| *d < Duration::from_secs(20)));

        let config = ReconnectConfig {
            max_retries: 0,
            ..config
        };
        assert_eq!(config.backoff().build().next(), None);
    }

    #[test]
    fn test_database_config_validate() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("ais.db"),
        };

        assert!(config.validate().is_ok());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_database_config_validate_invalid_path() {
        let config = DatabaseConfig {
            path: PathBuf::from(""),
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_socket_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8000);

        let config = ServerConfig {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(config.socket_addr().is_err());
    }
}
