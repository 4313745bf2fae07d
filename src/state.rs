//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! cloned into every session. It holds the domain collaborators and the
//! runtime config. Per-connection state (subscriptions, outbound queue) lives
//! in the session, never here.

use std::sync::Arc;

use crate::config::HubConfig;
use crate::services::Collaborators;

#[derive(Clone)]
pub struct AppState {
    pub collaborators: Collaborators,
    pub config: Arc<HubConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(collaborators: Collaborators, config: HubConfig) -> Self {
        Self { collaborators, config: Arc::new(config) }
    }
}

#[cfg(test)]
pub mod test_helpers {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use protocol::domain::{EvChargingMode, Level, LoadSharingPriority, UserRole};

    use super::*;
    use crate::services::Simulation;
    use crate::services::garage::AckMode;
    use crate::settings::{ChargerSettings, FirewallSettings, HubSettings, PriceServiceConfig, SensorSettings};

    /// Bridge deadline used by tests. Short so timeout paths stay fast.
    pub const TEST_BRIDGE_TIMEOUT: Duration = Duration::from_millis(150);

    /// Settings with one device of every kind.
    #[must_use]
    pub fn test_settings() -> HubSettings {
        HubSettings {
            chargers: vec![ChargerSettings {
                client_id: "carport".into(),
                display_name: "Carport".into(),
                mode: EvChargingMode::ChargeDuringCheapHours,
                priority: LoadSharingPriority::Normal,
                charge_rate_limit: 16,
            }],
            sensors: vec![SensorSettings { sensor_id: 1, display_name: "Attic".into(), sleep_time_in_seconds: 300 }],
            pricing: BTreeMap::from([(
                "spot".to_string(),
                PriceServiceConfig { avg_multiplier: 1.0, neutral_span: 0.1 },
            )]),
            firewall: FirewallSettings {
                standard_lists: vec!["ads".into(), "malware".into()],
                dns_blocking_lists: vec!["ads".into()],
                blocked_macs: vec![],
            },
            users: BTreeMap::from([(
                "alice".to_string(),
                BTreeMap::from([(UserRole::Garage, Level::ReadWrite)]),
            )]),
            ..HubSettings::default()
        }
    }

    /// Create a test `AppState` over a fresh simulation whose devices ack
    /// immediately. The simulation is returned to let tests steer devices.
    #[must_use]
    pub fn test_app_state() -> (AppState, Simulation) {
        let simulation = Simulation::from_settings(&test_settings());
        simulation.garage.set_ack_mode(AckMode::Reply { ok: true, latency: Duration::ZERO });
        let config = HubConfig { sync_bridge_timeout: TEST_BRIDGE_TIMEOUT, ..HubConfig::default() };
        (AppState::new(simulation.collaborators(), config), simulation)
    }
}
