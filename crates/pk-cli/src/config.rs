//! Configuration for the `pk` binary.
//!
//! Layers, lowest precedence first: built-in defaults, `~/.config/pk/config.toml`,
//! the file given with `--config`, then `PK_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use pk_core::SlotType;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the parking database.
    pub database_path: PathBuf,
    /// How long a check-in or check-out waits for a competing writer, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Slot type requested by `check-in --building/--park` when `--type` is omitted.
    pub default_slot_type: SlotType,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("pk.db"),
            busy_timeout_ms: 5000,
            default_slot_type: SlotType::Car,
        }
    }
}

impl Config {
    /// Loads configuration, optionally layering a specific file over the default one.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("PK_"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    fn validate(&self) -> Result<(), figment::Error> {
        if self.busy_timeout_ms == 0 {
            return Err(figment::Error::from(
                "busy_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(figment::Error::from(
                "database_path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pk"))
}

/// On Linux: `~/.local/share/pk`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pk"))
}
