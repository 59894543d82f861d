//! Application configuration.
//!
//! Read from a TOML file (`config/default.toml` unless `--config` says
//! otherwise). Every key is optional; a missing file means all defaults.
//!
//! ```toml
//! [store]
//! backend = "preferences"          # or "memory"
//! database = "data/sms_forwarder.db"
//! preferences_name = "sms_forwarder_prefs"
//! id_policy = "passthrough"        # or "reconcile"
//!
//! [bridge]
//! channel = "sms_forwarder"
//! default_log_limit = 200
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use smsfwd_bridge::{DEFAULT_CHANNEL_NAME, DEFAULT_LOG_LIMIT};
use smsfwd_store::{DEFAULT_PREFERENCES_NAME, IdPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Where the store keeps its collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// SQLite-backed preference store; survives restarts.
    #[default]
    Preferences,
    /// Process lifetime only.
    Memory,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preferences => write!(f, "preferences"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: Backend,
    pub database: PathBuf,
    pub preferences_name: String,
    pub id_policy: IdPolicy,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            database: PathBuf::from("data/sms_forwarder.db"),
            preferences_name: DEFAULT_PREFERENCES_NAME.to_string(),
            id_policy: IdPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub channel: String,
    pub default_log_limit: i64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL_NAME.to_string(),
            default_log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreSection,
    pub bridge: BridgeSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bridge.default_log_limit < 0 {
            bail!(
                "bridge.default_log_limit must not be negative, got {}",
                self.bridge.default_log_limit
            );
        }
        Ok(())
    }

    /// Load from `path`. Returns the config and whether the file existed.
    pub fn load(path: &Path) -> Result<(Self, bool)> {
        if !path.exists() {
            return Ok((Self::default(), false));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config =
            Self::from_toml(&content).with_context(|| format!("in {}", path.display()))?;
        Ok((config, true))
    }
}
