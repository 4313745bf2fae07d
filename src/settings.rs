//! Hub settings file.
//!
//! DESIGN
//! ======
//! The devices a hub knows about (chargers, sensors, price services, users)
//! come from a YAML file named by `HUB_SETTINGS`. Every section has defaults,
//! so a missing file or a partial file still yields a working hub.

use std::collections::BTreeMap;
use std::path::Path;

use protocol::domain::{
    EssOperationMode, EvChargingMode, HeaterMode, LedStripeMode, Level, LoadSharingPriority, UserRole,
};
use serde::Deserialize;

use crate::config::ConfigError;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HubSettings {
    pub garage: GarageSettings,
    pub heater: HeaterSettings,
    pub chargers: Vec<ChargerSettings>,
    pub sensors: Vec<SensorSettings>,
    pub ess: EssSettings,
    pub pricing: BTreeMap<String, PriceServiceConfig>,
    pub firewall: FirewallSettings,
    pub users: BTreeMap<String, BTreeMap<UserRole, Level>>,
}

impl HubSettings {
    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SettingsRead`] if the file cannot be read and
    /// [`ConfigError::SettingsParse`] if it is not valid settings YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::SettingsRead { path: path.to_path_buf(), source })?;
        Self::from_yaml(&raw)
    }

    /// Parse settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SettingsParse`] for invalid YAML.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(ConfigError::SettingsParse)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GarageSettings {
    pub led_stripe_mode: LedStripeMode,
    pub led_stripe_low_milli_volts: i32,
    pub ventilation_milli_volts: i32,
    pub ack_latency_ms: u64,
}

impl Default for GarageSettings {
    fn default() -> Self {
        Self {
            led_stripe_mode: LedStripeMode::Manual,
            led_stripe_low_milli_volts: 5000,
            ventilation_milli_volts: 0,
            ack_latency_ms: 50,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaterSettings {
    pub mode: HeaterMode,
    pub target_temperature: i32,
}

impl Default for HeaterSettings {
    fn default() -> Self {
        Self { mode: HeaterMode::Automatic, target_temperature: 24 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerSettings {
    pub client_id: String,
    pub display_name: String,
    #[serde(default = "default_charging_mode")]
    pub mode: EvChargingMode,
    #[serde(default = "default_priority")]
    pub priority: LoadSharingPriority,
    #[serde(default = "default_charge_rate_limit")]
    pub charge_rate_limit: i32,
}

fn default_charging_mode() -> EvChargingMode {
    EvChargingMode::ChargeDuringCheapHours
}

fn default_priority() -> LoadSharingPriority {
    LoadSharingPriority::Normal
}

fn default_charge_rate_limit() -> i32 {
    16
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSettings {
    pub sensor_id: i32,
    pub display_name: String,
    #[serde(default = "default_sleep_time")]
    pub sleep_time_in_seconds: i32,
}

fn default_sleep_time() -> i32 {
    300
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EssSettings {
    pub operation_mode: EssOperationMode,
    pub soc_limit_from: i32,
    pub soc_limit_to: i32,
}

impl Default for EssSettings {
    fn default() -> Self {
        Self { operation_mode: EssOperationMode::Passthrough, soc_limit_from: 20, soc_limit_to: 90 }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceServiceConfig {
    pub avg_multiplier: f64,
    pub neutral_span: f64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirewallSettings {
    pub standard_lists: Vec<String>,
    pub dns_blocking_lists: Vec<String>,
    pub blocked_macs: Vec<String>,
}
