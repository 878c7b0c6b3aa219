//! Engine Configuration
//!
//! Handles loading and saving operator configuration from TOML files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use veilcast_contracts::{EngineConfig, DEFAULT_PERIOD_LENGTH};
use veilcast_fhe::Account;
use veilcast_storage::StorageConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full operator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeilcastConfig {
    /// Engine settings
    #[serde(default)]
    pub engine: EngineSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl VeilcastConfig {
    /// Configuration for a new engine
    pub fn new(host: Account, owner: Account, period_length: u64) -> Self {
        Self {
            engine: EngineSettings {
                host: host.to_hex(),
                owner: owner.to_hex(),
                period_length,
            },
            ..Default::default()
        }
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.period_length == 0 {
            return Err(ConfigError::Invalid(
                "Period length must be greater than 0".to_string()
            ));
        }
        self.host()?;
        self.owner()?;

        if self.storage.snapshot_interval == 0 {
            return Err(ConfigError::Invalid(
                "Snapshot interval must be greater than 0".to_string()
            ));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!("Unknown log format: {}", other))),
        }
    }

    pub fn host(&self) -> Result<Account, ConfigError> {
        parse_account("engine.host", &self.engine.host)
    }

    pub fn owner(&self) -> Result<Account, ConfigError> {
        parse_account("engine.owner", &self.engine.owner)
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig::new(self.host()?).with_period_length(self.engine.period_length))
    }

    /// Storage configuration, resolving a relative path against `data_dir`
    pub fn storage_config(&self, data_dir: &Path) -> StorageConfig {
        let path = if self.storage.path.is_absolute() {
            self.storage.path.clone()
        } else {
            data_dir.join(&self.storage.path)
        };
        StorageConfig {
            path,
            enable_snapshots: true,
            snapshot_interval: self.storage.snapshot_interval,
            snapshot_retention: self.storage.snapshot_retention,
        }
    }
}

fn parse_account(field: &str, value: &str) -> Result<Account, ConfigError> {
    let account = Account::from_hex(value)
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", field, e)))?;
    if account.is_null() {
        return Err(ConfigError::Invalid(format!("{} must not be the null account", field)));
    }
    Ok(account)
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// The engine's own account (hex)
    pub host: String,

    /// Owner at genesis (hex)
    pub owner: String,

    /// Seconds per settlement period
    pub period_length: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            owner: String::new(),
            period_length: DEFAULT_PERIOD_LENGTH,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file, relative to the data directory unless absolute
    pub path: PathBuf,

    /// Snapshot every N committed invocations
    pub snapshot_interval: u64,

    /// Snapshots kept after pruning (0 keeps all)
    pub snapshot_retention: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("veilcast.db"),
            snapshot_interval: 1,
            snapshot_retention: 64,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("io", "veilcast", "veilcast")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".veilcast"))
}

/// Get default config file path
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> VeilcastConfig {
        VeilcastConfig::new(Account::repeat(0xEE), Account::repeat(0x0A), 3600)
    }

    #[test]
    fn test_default_config_is_incomplete() {
        let config = VeilcastConfig::default();
        assert_eq!(config.engine.period_length, DEFAULT_PERIOD_LENGTH);
        // No host or owner yet
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        sample().save(&path).unwrap();

        let loaded = VeilcastConfig::load(&path).unwrap();
        assert_eq!(loaded.host().unwrap(), Account::repeat(0xEE));
        assert_eq!(loaded.owner().unwrap(), Account::repeat(0x0A));
        assert_eq!(loaded.engine_config().unwrap().period_length, 3600);
    }

    #[test]
    fn test_missing_config() {
        let dir = tempdir().unwrap();
        let err = VeilcastConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_period_length() {
        let mut config = sample();
        config.engine.period_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_null_host_rejected() {
        let config = VeilcastConfig::new(Account::ZERO, Account::repeat(0x0A), 60);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_storage_path_resolution() {
        let config = sample();
        let resolved = config.storage_config(Path::new("/data/veilcast"));
        assert_eq!(resolved.path, PathBuf::from("/data/veilcast/veilcast.db"));
        assert_eq!(resolved.snapshot_interval, 1);
    }
}
