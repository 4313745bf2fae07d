//! Runtime configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SYNC_BRIDGE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_SIMULATION_TICK_MS: u64 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
    #[error("failed to read settings file {}: {source}", path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    SettingsParse(#[source] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub port: u16,
    /// Upper bound on waiting for a device acknowledgement.
    pub sync_bridge_timeout: Duration,
    pub simulation_tick: Duration,
    pub settings_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sync_bridge_timeout: Duration::from_millis(DEFAULT_SYNC_BRIDGE_TIMEOUT_MS),
            simulation_tick: Duration::from_millis(DEFAULT_SIMULATION_TICK_MS),
            settings_path: None,
        }
    }
}

impl HubConfig {
    /// Build typed hub config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000; a value that is set but unparsable is an error
    /// - `SYNC_BRIDGE_TIMEOUT_MS`: default 1000
    /// - `SIMULATION_TICK_MS`: default 5000
    /// - `HUB_SETTINGS`: path to a YAML settings file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidVar`] for an unparsable `PORT` or a zero
    /// timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar { var: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let timeout_ms = env_parse("SYNC_BRIDGE_TIMEOUT_MS", DEFAULT_SYNC_BRIDGE_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidVar { var: "SYNC_BRIDGE_TIMEOUT_MS", value: "0".into() });
        }
        let tick_ms = env_parse("SIMULATION_TICK_MS", DEFAULT_SIMULATION_TICK_MS).max(1);

        let settings_path = std::env::var("HUB_SETTINGS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            sync_bridge_timeout: Duration::from_millis(timeout_ms),
            simulation_tick: Duration::from_millis(tick_ms),
            settings_path,
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
