//! EV charging stations.
//!
//! Stations report charging data periodically and confirm config changes.
//! Both arrive as [`EvChargingEvent`]s; there is no snapshot, a subscriber
//! asks for `getChargingStationsDataAndConfig` when it needs the full picture.

use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::domain::{ChargingStation, EvChargingEvent, EvChargingEventType, EvChargingMode, LoadSharingPriority};
use rand::Rng;
use tracing::info;

use super::{DomainError, EventSource, Listener, ListenerKey, ListenerSet};
use crate::settings::ChargerSettings;

/// Per-phase current a station can be limited to, in amps.
pub const CHARGE_RATE_LIMIT_RANGE: std::ops::RangeInclusive<i32> = 6..=32;

pub trait EvCharging: EventSource<EvChargingEvent> {
    fn stations(&self) -> Vec<ChargingStation>;

    /// Returns `false` for an unknown station.
    ///
    /// # Errors
    ///
    /// Reserved for station communication failures.
    fn set_mode(&self, client_id: &str, mode: EvChargingMode) -> Result<bool, DomainError>;

    /// Returns `false` for an unknown station.
    ///
    /// # Errors
    ///
    /// Reserved for station communication failures.
    fn set_load_sharing_priority(&self, client_id: &str, priority: LoadSharingPriority) -> Result<bool, DomainError>;

    /// Returns `false` for an unknown station. The limit is clamped to
    /// [`CHARGE_RATE_LIMIT_RANGE`].
    ///
    /// # Errors
    ///
    /// Reserved for station communication failures.
    fn set_charge_rate_limit(&self, client_id: &str, amps: i32) -> Result<bool, DomainError>;
}

pub struct SimCharging {
    stations: Mutex<Vec<ChargingStation>>,
    listeners: ListenerSet<EvChargingEvent>,
}

impl SimCharging {
    #[must_use]
    pub fn new(chargers: &[ChargerSettings]) -> Self {
        let stations = chargers
            .iter()
            .map(|c| ChargingStation {
                client_id: c.client_id.clone(),
                display_name: c.display_name.clone(),
                mode: c.mode,
                priority: c.priority,
                charge_rate_limit: c.charge_rate_limit.clamp(*CHARGE_RATE_LIMIT_RANGE.start(), *CHARGE_RATE_LIMIT_RANGE.end()),
                charging_current_amps: 0,
                connected: true,
            })
            .collect();
        Self { stations: Mutex::new(stations), listeners: ListenerSet::new() }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Station drops off the network.
    pub fn disconnect(&self, client_id: &str) {
        let event = self.modify(client_id, |station| station.connected = false);
        if let Some(mut event) = event {
            event.event_type = EvChargingEventType::Disconnected;
            self.listeners.emit(&event);
        }
    }

    /// One round of data reports from every connected station.
    pub fn tick(&self) {
        let events: Vec<EvChargingEvent> = {
            let mut stations = self.lock();
            let mut rng = rand::rng();
            stations
                .iter_mut()
                .filter(|s| s.connected)
                .map(|s| {
                    s.charging_current_amps = match s.mode {
                        EvChargingMode::Off => 0,
                        EvChargingMode::On => s.charge_rate_limit,
                        EvChargingMode::ChargeDuringCheapHours => rng.random_range(0..=s.charge_rate_limit),
                    };
                    EvChargingEvent { event_type: EvChargingEventType::NewData, station: s.clone() }
                })
                .collect()
        };
        for event in &events {
            self.listeners.emit(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChargingStation>> {
        self.stations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn modify(&self, client_id: &str, change: impl FnOnce(&mut ChargingStation)) -> Option<EvChargingEvent> {
        let mut stations = self.lock();
        let station = stations.iter_mut().find(|s| s.client_id == client_id)?;
        change(station);
        Some(EvChargingEvent { event_type: EvChargingEventType::ConfigUpdated, station: station.clone() })
    }

    fn update_config(&self, client_id: &str, change: impl FnOnce(&mut ChargingStation)) -> bool {
        match self.modify(client_id, change) {
            Some(event) => {
                info!(client_id, "charging station config updated");
                self.listeners.emit(&event);
                true
            }
            None => {
                info!(client_id, "config update for unknown charging station");
                false
            }
        }
    }
}

impl EvCharging for SimCharging {
    fn stations(&self) -> Vec<ChargingStation> {
        self.lock().clone()
    }

    fn set_mode(&self, client_id: &str, mode: EvChargingMode) -> Result<bool, DomainError> {
        Ok(self.update_config(client_id, |s| s.mode = mode))
    }

    fn set_load_sharing_priority(&self, client_id: &str, priority: LoadSharingPriority) -> Result<bool, DomainError> {
        Ok(self.update_config(client_id, |s| s.priority = priority))
    }

    fn set_charge_rate_limit(&self, client_id: &str, amps: i32) -> Result<bool, DomainError> {
        let amps = amps.clamp(*CHARGE_RATE_LIMIT_RANGE.start(), *CHARGE_RATE_LIMIT_RANGE.end());
        Ok(self.update_config(client_id, |s| s.charge_rate_limit = amps))
    }
}

impl EventSource<EvChargingEvent> for SimCharging {
    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<EvChargingEvent>) {
        self.listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.listeners.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn charging() -> SimCharging {
        SimCharging::new(&[ChargerSettings {
            client_id: "carport".into(),
            display_name: "Carport".into(),
            mode: EvChargingMode::On,
            priority: LoadSharingPriority::Normal,
            charge_rate_limit: 16,
        }])
    }

    #[test]
    fn unknown_station_is_not_updated() {
        let charging = charging();
        assert!(!charging.set_mode("garage", EvChargingMode::Off).unwrap());
    }

    #[test]
    fn charge_rate_limit_is_clamped() {
        let charging = charging();
        assert!(charging.set_charge_rate_limit("carport", 80).unwrap());
        assert_eq!(charging.stations()[0].charge_rate_limit, 32);
        assert!(charging.set_charge_rate_limit("carport", 1).unwrap());
        assert_eq!(charging.stations()[0].charge_rate_limit, 6);
    }

    #[test]
    fn config_changes_and_data_are_published() {
        let charging = charging();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        charging.add_listener(
            None,
            ListenerKey::new(Uuid::new_v4(), "ev"),
            Arc::new(move |e: EvChargingEvent| sink.lock().unwrap().push(e.event_type)),
        );

        charging.set_load_sharing_priority("carport", LoadSharingPriority::High).unwrap();
        charging.tick();
        charging.disconnect("carport");
        charging.tick();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EvChargingEventType::ConfigUpdated, EvChargingEventType::NewData, EvChargingEventType::Disconnected]
        );
        assert!(charging.current(None).is_none());
    }
}
