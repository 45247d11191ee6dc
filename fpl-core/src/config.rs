use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::poller::PollConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// `None` keeps everything in process memory.
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub poll_interval_seconds: u64,
    pub retention_hours: u64,
    pub lease_seconds: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "fplwatch".to_owned(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
            retention_hours: 24,
            lease_seconds: None,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DetectorConfig {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_seconds.max(1)),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 60 * 60)
    }

    pub fn lease_ttl(&self) -> Option<Duration> {
        self.lease_seconds.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Path of the config file, creating its directory if needed.
    pub fn config_file_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir =
            dirs::config_dir().ok_or("no config directory on this platform")?;

        let app_config_dir = config_dir.join("fplwatch");
        std::fs::create_dir_all(&app_config_dir)?;

        Ok(app_config_dir.join("config.json"))
    }

    /// Loads the config file, falling back to (and writing out) the defaults.
    pub fn load() -> Self {
        match Self::config_file_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "failed to load configuration, using defaults");
                let default_config = Self::default();
                if let Err(save_err) = default_config.save() {
                    warn!(error = %save_err, "failed to save default configuration");
                }
                default_config
            }
        }
    }

    /// Loads a config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config_content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Writes the config back to its file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::config_file_path()?;
        let config_json = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, config_json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"detector": {"lease_seconds": 90}}"#).unwrap();
        assert_eq!(config.upstream, UpstreamConfig::default());
        assert_eq!(config.upstream.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.detector.lease_ttl(), Some(Duration::from_secs(90)));
        assert_eq!(config.detector.retention(), Duration::from_secs(86_400));
        assert_eq!(config.detector.poll_config().interval, Duration::from_secs(60));
    }

    #[test]
    fn load_from_reads_written_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("fplwatch_config_{}.json", uuid::Uuid::new_v4()));
        let mut config = AppConfig::default();
        config.cache.redis_url = Some("redis://127.0.0.1/".into());
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(&path);
    }
}
