//! Domain collaborators consumed by sessions.
//!
//! ARCHITECTURE
//! ============
//! Each domain exposes a trait: read accessors, write mutators and, where the
//! domain streams state, an [`EventSource`](listeners::EventSource). Sessions
//! only see [`Collaborators`], a bundle of trait objects.
//!
//! The crate ships simulated implementations so the hub runs without hardware.
//! [`Simulation`] builds them from `HubSettings` and drives their readings from
//! a background ticker, the way real pollers and radio listeners would.

pub mod energy;
pub mod ev_charging;
pub mod firewall;
pub mod garage;
pub mod heating;
pub mod listeners;
pub mod sensors;
pub mod users;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::error::ErrorCode;
use crate::settings::HubSettings;

pub use listeners::{EventSource, Listener, ListenerKey, ListenerSet};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{device} is unreachable")]
    Unreachable { device: &'static str },
    #[error("unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ErrorCode for DomainError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "E_DEVICE_UNREACHABLE",
            Self::NotFound { .. } => "E_NOT_FOUND",
            Self::Invalid { .. } => "E_INVALID_ARGUMENT",
        }
    }
}

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Every domain service a session can reach.
#[derive(Clone)]
pub struct Collaborators {
    pub garage_lights: Arc<dyn garage::GarageLights>,
    pub garage_door: Arc<dyn garage::GarageDoor>,
    pub garage_ventilation: Arc<dyn garage::GarageVentilation>,
    pub heater: Arc<dyn heating::UnderFloorHeater>,
    pub ev_charging: Arc<dyn ev_charging::EvCharging>,
    pub sensors: Arc<dyn sensors::EnvironmentSensors>,
    pub quick_stats: Arc<dyn energy::QuickStats>,
    pub ess: Arc<dyn energy::EnergyStorage>,
    pub pricing: Arc<dyn energy::EnergyPricing>,
    pub firewall: Arc<dyn firewall::Firewall>,
    pub users: Arc<dyn users::UserSettingsStore>,
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Concrete simulated collaborators. Cloning shares the same devices.
#[derive(Clone)]
pub struct Simulation {
    pub garage: Arc<garage::SimGarage>,
    pub heater: Arc<heating::SimHeater>,
    pub charging: Arc<ev_charging::SimCharging>,
    pub sensors: Arc<sensors::SimSensors>,
    pub energy: Arc<energy::SimEnergy>,
    pub firewall: Arc<firewall::SimFirewall>,
    pub users: Arc<users::SimUsers>,
}

impl Simulation {
    #[must_use]
    pub fn from_settings(settings: &HubSettings) -> Self {
        Self {
            garage: Arc::new(garage::SimGarage::new(&settings.garage)),
            heater: Arc::new(heating::SimHeater::new(&settings.heater)),
            charging: Arc::new(ev_charging::SimCharging::new(&settings.chargers)),
            sensors: Arc::new(sensors::SimSensors::new(&settings.sensors)),
            energy: Arc::new(energy::SimEnergy::new(&settings.ess, &settings.pricing)),
            firewall: Arc::new(firewall::SimFirewall::new(&settings.firewall)),
            users: Arc::new(users::SimUsers::new(&settings.users)),
        }
    }

    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            garage_lights: self.garage.clone(),
            garage_door: self.garage.clone(),
            garage_ventilation: self.garage.clone(),
            heater: self.heater.clone(),
            ev_charging: self.charging.clone(),
            sensors: self.sensors.clone(),
            quick_stats: self.energy.clone(),
            ess: self.energy.clone(),
            pricing: self.energy.clone(),
            firewall: self.firewall.clone(),
            users: self.users.clone(),
        }
    }

    /// Advance every simulated device by one reading.
    pub fn tick(&self) {
        self.energy.tick();
        self.heater.tick();
        self.sensors.tick();
        self.charging.tick();
    }
}

/// Spawn the background ticker that publishes simulated readings.
pub fn spawn_simulation_ticker(simulation: Simulation, every: Duration) -> JoinHandle<()> {
    info!(tick_ms = every.as_millis(), "simulation ticker configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            simulation.tick();
        }
    })
}

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
