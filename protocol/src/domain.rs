//! Payload types for the hub's domain services.
//!
//! These are the shapes carried inside requests, responses and pushes. The
//! services that own the state live in the server; only their data crosses
//! the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// GARAGE
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedStripeMode {
    Auto,
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedStripeStatus {
    Off,
    OnLow,
    OnHigh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarageLightStatus {
    pub ceiling_light_is_on: bool,
    pub led_stripe_status: LedStripeStatus,
    pub led_stripe_mode: LedStripeMode,
    pub led_stripe_low_milli_volts: i32,
    pub updated_at_ms: i64,
}

/// Commands sent to the light controller. Each one is acknowledged by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GarageLightCommand {
    SwitchOnCeilingLight,
    SwitchOffCeilingLight,
    SwitchLedStripeOff,
    SwitchLedStripeOnLow,
    SwitchLedStripeOnHigh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GarageLightRequest {
    GetStatus,
    SetLedStripeMode {
        #[serde(rename = "setLedStripeMode")]
        led_stripe_mode: LedStripeMode,
    },
    SetLedStripeLowMillivolts {
        #[serde(rename = "ledStripeLowMillivolts")]
        led_stripe_low_milli_volts: i32,
    },
    SwitchOnCeilingLight,
    SwitchOffCeilingLight,
    SwitchLedStripeOff,
    SwitchLedStripeOnLow,
    SwitchLedStripeOnHigh,
}

impl GarageLightRequest {
    /// The device command behind a switch request, if this is one.
    #[must_use]
    pub fn command(&self) -> Option<GarageLightCommand> {
        match self {
            Self::SwitchOnCeilingLight => Some(GarageLightCommand::SwitchOnCeilingLight),
            Self::SwitchOffCeilingLight => Some(GarageLightCommand::SwitchOffCeilingLight),
            Self::SwitchLedStripeOff => Some(GarageLightCommand::SwitchLedStripeOff),
            Self::SwitchLedStripeOnLow => Some(GarageLightCommand::SwitchLedStripeOnLow),
            Self::SwitchLedStripeOnHigh => Some(GarageLightCommand::SwitchLedStripeOnHigh),
            Self::GetStatus | Self::SetLedStripeMode { .. } | Self::SetLedStripeLowMillivolts { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarageLightResponse {
    pub garage_light_status: GarageLightStatus,
    /// Device acknowledgement for switch commands; absent for reads and settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_result: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HoermannE4Command {
    Open,
    Close,
    Stop,
    HalfOpen,
    ToggleLight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DoorPosition {
    Open,
    Closed,
    HalfOpen,
    Opening,
    Closing,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoermannE4Broadcast {
    pub position: DoorPosition,
    pub light_on: bool,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarageVentilationState {
    pub milli_volts: i32,
    pub updated_at_ms: i64,
}

// =============================================================================
// HEATING
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaterMode {
    PermanentOff,
    PermanentOn,
    Automatic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderFloorHeaterStatus {
    pub mode: HeaterMode,
    pub heater_on: bool,
    pub target_temperature: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UnderFloorHeaterRequest {
    GetStatus,
    UpdateMode { new_mode: HeaterMode },
    UpdateTargetTemperature { new_target_temperature: i32 },
    AdjustTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderFloorHeaterResponse {
    pub status: UnderFloorHeaterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjust_time_success: Option<bool>,
}

// =============================================================================
// EV CHARGING
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvChargingMode {
    On,
    Off,
    ChargeDuringCheapHours,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadSharingPriority {
    High,
    Normal,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingStation {
    pub client_id: String,
    pub display_name: String,
    pub mode: EvChargingMode,
    pub priority: LoadSharingPriority,
    pub charge_rate_limit: i32,
    pub charging_current_amps: i32,
    pub connected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EvChargingStationRequest {
    GetChargingStationsDataAndConfig,
    SetMode { client_id: String, new_mode: EvChargingMode },
    SetLoadSharingPriority { client_id: String, new_load_sharing_priority: LoadSharingPriority },
    SetChargeRateLimit { client_id: String, charge_rate_limit: i32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvChargingStationResponse {
    pub charging_stations: Vec<ChargingStation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_updated: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvChargingEventType {
    NewData,
    ConfigUpdated,
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvChargingEvent {
    pub event_type: EvChargingEventType,
    pub station: ChargingStation,
}

// =============================================================================
// ENVIRONMENT SENSORS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSensor {
    pub sensor_id: i32,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_milli_volts: Option<i32>,
    pub sleep_time_in_seconds: i32,
    pub firmware_upgrade_scheduled: bool,
    pub time_adjustment_scheduled: bool,
    pub reset_scheduled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_received_ms: Option<i64>,
}

/// Requests against the sensor fleet. `sensor_id` of `None` targets every sensor
/// where the original protocol allows it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EnvironmentSensorRequest {
    GetAllEnvironmentSensorData,
    ScheduleFirmwareUpgrade { sensor_id: i32 },
    CancelFirmwareUpgrade { sensor_id: i32 },
    ScheduleTimeAdjustment { #[serde(default)] sensor_id: Option<i32> },
    CancelTimeAdjustment { #[serde(default)] sensor_id: Option<i32> },
    ScheduleReset { #[serde(default)] sensor_id: Option<i32> },
    CancelReset { #[serde(default)] sensor_id: Option<i32> },
    AdjustSleepTimeInSeconds { sensor_id: i32, sleep_time_in_seconds_delta: i32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSensorResponse {
    pub sensors: Vec<EnvironmentSensor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSensorEvent {
    pub sensor: EnvironmentSensor,
}

// =============================================================================
// ENERGY
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStatsResponse {
    pub power_import_watts: i64,
    pub power_export_watts: i64,
    pub energy_price_cents: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outside_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_soc: Option<i32>,
    pub updated_at_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EssOperationMode {
    Passthrough,
    SelfConsumption,
    ForceCharge,
    ZeroGrid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssState {
    pub operation_mode: EssOperationMode,
    pub soc: i32,
    pub soc_limit_from: i32,
    pub soc_limit_to: i32,
    pub grid_power_watts: i64,
    pub battery_power_watts: i64,
    pub updated_at_ms: i64,
}

/// Partial update of the energy storage system. Absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssWrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_mode: Option<EssOperationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_limit_from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_limit_to: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceServiceSettings {
    pub service: String,
    pub avg_multiplier: f64,
    pub neutral_span: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPricingSettingsRead {
    pub services: Vec<PriceServiceSettings>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPricingSettingsWrite {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neutral_span: Option<f64>,
}

// =============================================================================
// FIREWALL
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallState {
    pub dns_blocking_lists: Vec<String>,
    pub available_standard_lists: Vec<String>,
    pub blocked_macs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_lists_updated_ms: Option<i64>,
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    Garage,
    Heating,
    EvCharging,
    EnergyStorage,
    EnvironmentSensors,
    Firewall,
    UserSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    None,
    Read,
    ReadWrite,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user: String,
    #[serde(default)]
    pub authorization: BTreeMap<UserRole, Level>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteUserSettings {
    pub user: String,
    pub role: UserRole,
    pub level: Level,
}
