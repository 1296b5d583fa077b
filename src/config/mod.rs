//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::battle::BattleRules;
use crate::models::STARTING_HEALTH;
use crate::parse_duration;

/// Prefix for environment overrides, e.g. `ROAST__SERVER__PORT=9000`.
const ENV_PREFIX: &str = "ROAST";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to load layered config: {0}")]
    SourceError(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Battle policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Most points one attack can deal
    #[serde(default = "default_max_points_per_turn")]
    pub max_points_per_turn: u32,

    #[serde(default = "default_max_insult_chars")]
    pub max_insult_chars: usize,

    #[serde(default = "default_invite_code_attempts")]
    pub invite_code_attempts: u32,

    /// Bound on each store call (e.g. "5s")
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout: String,

    /// How often completed battles are re-checked for unrecorded results
    #[serde(default = "default_settle_interval")]
    pub settle_interval: String,
}

fn default_max_points_per_turn() -> u32 {
    30
}

fn default_max_insult_chars() -> usize {
    280
}

fn default_invite_code_attempts() -> u32 {
    5
}

fn default_storage_timeout() -> String {
    "5s".to_string()
}

fn default_settle_interval() -> String {
    "60s".to_string()
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_points_per_turn: default_max_points_per_turn(),
            max_insult_chars: default_max_insult_chars(),
            invite_code_attempts: default_invite_code_attempts(),
            storage_timeout: default_storage_timeout(),
            settle_interval: default_settle_interval(),
        }
    }
}

impl BattleConfig {
    pub fn storage_timeout(&self) -> Option<Duration> {
        parse_duration(&self.storage_timeout)
    }

    pub fn settle_interval(&self) -> Option<Duration> {
        parse_duration(&self.settle_interval)
    }

    /// Rules for the battle service. Call after `validate`.
    pub fn to_rules(&self) -> BattleRules {
        let defaults = BattleRules::default();
        BattleRules {
            max_points_per_turn: self.max_points_per_turn,
            max_insult_chars: self.max_insult_chars,
            invite_code_attempts: self.invite_code_attempts,
            storage_timeout: self.storage_timeout().unwrap_or(defaults.storage_timeout),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Journal writes to JSONL under `data_dir`
    #[serde(default = "default_persist")]
    pub persist: bool,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub battle: BattleConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_persist() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            persist: default_persist(),
            server: ServerConfig::default(),
            battle: BattleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an optional TOML file layered with `ROAST__*` environment
    /// variables. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        let battle = &self.battle;
        if battle.max_points_per_turn == 0 || battle.max_points_per_turn > STARTING_HEALTH {
            return Err(ConfigError::ValidationError(format!(
                "max_points_per_turn must be between 1 and {}",
                STARTING_HEALTH
            )));
        }

        if battle.max_insult_chars == 0 {
            return Err(ConfigError::ValidationError(
                "max_insult_chars must be greater than 0".to_string(),
            ));
        }

        if battle.invite_code_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "invite_code_attempts must be greater than 0".to_string(),
            ));
        }

        match battle.storage_timeout() {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "storage_timeout must be a positive duration, got {:?}",
                    battle.storage_timeout
                )))
            }
        }

        match battle.settle_interval() {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "settle_interval must be a positive duration, got {:?}",
                    battle.settle_interval
                )))
            }
        }

        Ok(())
    }
}
