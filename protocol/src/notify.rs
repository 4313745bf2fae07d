//! Subscriptions and the push payloads they produce.

use serde::{Deserialize, Serialize};

use crate::domain::{
    EnvironmentSensorEvent, EssState, EvChargingEvent, FirewallState, GarageLightStatus, GarageVentilationState,
    HoermannE4Broadcast, QuickStatsResponse, UnderFloorHeaterStatus,
};

/// One tag per streaming event source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionType {
    GetGarageLightStatus,
    GetGarageDoorStatus,
    GetGarageVentilationStatus,
    GetUnderFloorHeaterStatus,
    EvChargingStationEvents,
    EnvironmentSensorEvents,
    QuickStatsEvents,
    Firewall,
    EssState,
}

impl SubscriptionType {
    pub const ALL: [SubscriptionType; 9] = [
        Self::GetGarageLightStatus,
        Self::GetGarageDoorStatus,
        Self::GetGarageVentilationStatus,
        Self::GetUnderFloorHeaterStatus,
        Self::EvChargingStationEvents,
        Self::EnvironmentSensorEvents,
        Self::QuickStatsEvents,
        Self::Firewall,
        Self::EssState,
    ];

    /// Wire name, as used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetGarageLightStatus => "getGarageLightStatus",
            Self::GetGarageDoorStatus => "getGarageDoorStatus",
            Self::GetGarageVentilationStatus => "getGarageVentilationStatus",
            Self::GetUnderFloorHeaterStatus => "getUnderFloorHeaterStatus",
            Self::EvChargingStationEvents => "evChargingStationEvents",
            Self::EnvironmentSensorEvents => "environmentSensorEvents",
            Self::QuickStatsEvents => "quickStatsEvents",
            Self::Firewall => "firewall",
            Self::EssState => "essState",
        }
    }
}

impl std::fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscribe {
    pub subscription_id: String,
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unsubscribe {
    pub subscription_id: String,
}

/// Push for one subscription. The event field name identifies its shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notify {
    pub subscription_id: String,
    #[serde(flatten)]
    pub event: NotifyEvent,
}

/// Event payloads, 1:1 with [`SubscriptionType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotifyEvent {
    GarageStatus(GarageLightStatus),
    HoermannE4Broadcast(HoermannE4Broadcast),
    GarageVentilationState(GarageVentilationState),
    UnderFloorHeaterStatus(UnderFloorHeaterStatus),
    EvChargingStationEvent(EvChargingEvent),
    EnvironmentSensorEvent(EnvironmentSensorEvent),
    QuickStatsResponse(QuickStatsResponse),
    FirewallState(FirewallState),
    EssState(EssState),
}

impl NotifyEvent {
    /// The subscription type that produces this event.
    #[must_use]
    pub fn subscription_type(&self) -> SubscriptionType {
        match self {
            Self::GarageStatus(_) => SubscriptionType::GetGarageLightStatus,
            Self::HoermannE4Broadcast(_) => SubscriptionType::GetGarageDoorStatus,
            Self::GarageVentilationState(_) => SubscriptionType::GetGarageVentilationStatus,
            Self::UnderFloorHeaterStatus(_) => SubscriptionType::GetUnderFloorHeaterStatus,
            Self::EvChargingStationEvent(_) => SubscriptionType::EvChargingStationEvents,
            Self::EnvironmentSensorEvent(_) => SubscriptionType::EnvironmentSensorEvents,
            Self::QuickStatsResponse(_) => SubscriptionType::QuickStatsEvents,
            Self::FirewallState(_) => SubscriptionType::Firewall,
            Self::EssState(_) => SubscriptionType::EssState,
        }
    }
}
