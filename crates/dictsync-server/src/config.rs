use std::time::Duration;

use dictsync_cache::{LabelScope, RefreshConfig};
use dictsync_db_postgres::{DEFAULT_NOTIFY_CHANNEL, PostgresConfig};
use dictsync_storage::DictTypeInfo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dict: DictSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            if self.storage.postgres.url.trim().is_empty() {
                return Err("storage.postgres.url is required for the postgres backend".into());
            }
            if self.storage.postgres.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        // Dictionary validation
        if self.dict.notify_channel.trim().is_empty() {
            return Err("dict.notify_channel must not be empty".into());
        }
        if let Some(seed) = self
            .dict
            .seed_types
            .iter()
            .find(|t| t.dict_type.trim().is_empty())
        {
            return Err(format!(
                "dict.seed_types entries need a dict_type (name = {:?})",
                seed.name
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictSettings {
    /// Safety-net refresh delay; 0 disables the timer.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub label_scope: LabelScope,
    /// LISTEN/NOTIFY channel used by the postgres backend.
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
    /// Dictionary types registered at startup.
    #[serde(default)]
    pub seed_types: Vec<DictTypeInfo>,
}

fn default_refresh_interval_secs() -> u64 {
    300
}
fn default_notify_channel() -> String {
    DEFAULT_NOTIFY_CHANNEL.into()
}

impl Default for DictSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            label_scope: LabelScope::default(),
            notify_channel: default_notify_channel(),
            seed_types: Vec::new(),
        }
    }
}

impl DictSettings {
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig::with_interval(Duration::from_secs(self.refresh_interval_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, looked up in the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "dictsync.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., DICTSYNC__DICT__REFRESH_INTERVAL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix("DICTSYNC")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.dict.refresh_interval_secs, 300);
        assert_eq!(cfg.dict.label_scope, LabelScope::Global);
        assert_eq!(cfg.dict.notify_channel, "dictsync_dict_data_changed");
        assert_eq!(
            cfg.dict.refresh_config().interval,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));

        let mut cfg = AppConfig::default();
        cfg.storage.backend = StorageBackend::Postgres;
        cfg.storage.postgres.url = String::new();
        assert!(cfg.validate().unwrap_err().contains("storage.postgres.url"));

        let mut cfg = AppConfig::default();
        cfg.storage.backend = StorageBackend::Postgres;
        cfg.storage.postgres.pool_size = 0;
        assert!(cfg.validate().unwrap_err().contains("pool_size"));

        let mut cfg = AppConfig::default();
        cfg.dict.notify_channel = " ".into();
        assert!(cfg.validate().unwrap_err().contains("notify_channel"));
    }

    #[test]
    fn test_memory_backend_ignores_postgres_settings() {
        let mut cfg = AppConfig::default();
        cfg.storage.postgres.pool_size = 0;
        assert!(cfg.validate().is_ok());
    }
}
