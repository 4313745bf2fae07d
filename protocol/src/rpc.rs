//! Request and response unions.
//!
//! A request is tagged by `type` and carries the one payload field that tag
//! needs. A response is either a failure (`errorMsg`), one payload field, or
//! an empty object for writes that return nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    EnergyPricingSettingsRead, EnergyPricingSettingsWrite, EnvironmentSensorRequest, EnvironmentSensorResponse,
    EssState, EssWrite, EvChargingStationRequest, EvChargingStationResponse, GarageLightRequest,
    GarageLightResponse, GarageVentilationState, HoermannE4Command, QuickStatsResponse, UnderFloorHeaterRequest,
    UnderFloorHeaterResponse, UserSettings, WriteUserSettings,
};
use crate::notify::{Subscribe, Unsubscribe};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RpcRequest {
    Subscribe { subscribe: Subscribe },
    Unsubscribe { unsubscribe: Unsubscribe },
    GarageLightRequest { garage_light_request: GarageLightRequest },
    GarageVentilationRequest { garage_ventilation_command_milli_volts: i32 },
    SendHoermannE4Command { hoermann_e4_command: HoermannE4Command },
    UnderFloorHeaterRequest { under_floor_heater_request: UnderFloorHeaterRequest },
    EvChargingStationRequest { ev_charging_station_request: EvChargingStationRequest },
    EnvironmentSensorRequest { environment_sensor_request: EnvironmentSensorRequest },
    QuickStats,
    EssRead,
    EssWrite { ess_write: EssWrite },
    ReadEnergyPricingSettings,
    WriteEnergyPricingSettings { energy_pricing_settings_write: EnergyPricingSettingsWrite },
    UserSettings,
    ReadAllUserSettings,
    WriteUserSettings { write_user_settings: WriteUserSettings },
    DnsBlockingSet { dns_blocking_lists: Vec<String> },
    DnsBlockingUpdateStandardLists,
    BlockedMacsSet { blocked_macs: Vec<String> },
}

impl RpcRequest {
    /// Wire tag of this request, for logging.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::GarageLightRequest { .. } => "garageLightRequest",
            Self::GarageVentilationRequest { .. } => "garageVentilationRequest",
            Self::SendHoermannE4Command { .. } => "sendHoermannE4Command",
            Self::UnderFloorHeaterRequest { .. } => "underFloorHeaterRequest",
            Self::EvChargingStationRequest { .. } => "evChargingStationRequest",
            Self::EnvironmentSensorRequest { .. } => "environmentSensorRequest",
            Self::QuickStats => "quickStats",
            Self::EssRead => "essRead",
            Self::EssWrite { .. } => "essWrite",
            Self::ReadEnergyPricingSettings => "readEnergyPricingSettings",
            Self::WriteEnergyPricingSettings { .. } => "writeEnergyPricingSettings",
            Self::UserSettings => "userSettings",
            Self::ReadAllUserSettings => "readAllUserSettings",
            Self::WriteUserSettings { .. } => "writeUserSettings",
            Self::DnsBlockingSet { .. } => "dnsBlockingSet",
            Self::DnsBlockingUpdateStandardLists => "dnsBlockingUpdateStandardLists",
            Self::BlockedMacsSet { .. } => "blockedMacsSet",
        }
    }
}

/// Response payload. Absence of `errorMsg` means success.
///
/// Variant order matters for decoding: `Empty` accepts any object and must
/// stay last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Failed {
        #[serde(rename = "errorMsg")]
        error_msg: String,
    },
    Body(ResponseBody),
    Empty {},
}

impl RpcResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { error_msg: message.into() }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::Empty {}
    }

    #[must_use]
    pub fn error_msg(&self) -> Option<&str> {
        match self {
            Self::Failed { error_msg } => Some(error_msg),
            Self::Body(_) | Self::Empty {} => None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_msg().is_none()
    }
}

impl From<ResponseBody> for RpcResponse {
    fn from(body: ResponseBody) -> Self {
        Self::Body(body)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseBody {
    SubscriptionCreated(bool),
    SubscriptionRemoved(bool),
    GarageLightResponse(GarageLightResponse),
    GarageVentilationState(GarageVentilationState),
    HoermannE4CommandResult(bool),
    UnderFloorHeaterResponse(UnderFloorHeaterResponse),
    EvChargingStationResponse(EvChargingStationResponse),
    EnvironmentSensorResponse(EnvironmentSensorResponse),
    QuickStatsResponse(QuickStatsResponse),
    EssState(EssState),
    EnergyPricingSettingsRead(EnergyPricingSettingsRead),
    UserSettings(UserSettings),
    AllUserSettings(BTreeMap<String, UserSettings>),
}
