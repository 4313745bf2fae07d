//! Under-floor heater.

use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::domain::{HeaterMode, UnderFloorHeaterStatus};
use rand::Rng;
use tracing::{debug, info};

use super::{DomainError, EventSource, Listener, ListenerKey, ListenerSet, now_ms};
use crate::settings::HeaterSettings;

const HEATER: &str = "under-floor heater";

/// Target temperatures the thermostat accepts, in whole degrees.
pub const TARGET_TEMPERATURE_RANGE: std::ops::RangeInclusive<i32> = 10..=30;

pub trait UnderFloorHeater: EventSource<UnderFloorHeaterStatus> {
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the thermostat is offline.
    fn heater_status(&self) -> Result<UnderFloorHeaterStatus, DomainError>;

    /// Returns whether the thermostat accepted the mode.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the thermostat is offline.
    fn update_mode(&self, mode: HeaterMode) -> Result<bool, DomainError>;

    /// Returns whether the thermostat accepted the temperature.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the thermostat is offline.
    fn update_target_temperature(&self, target: i32) -> Result<bool, DomainError>;

    /// Push the hub clock to the thermostat.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the thermostat is offline.
    fn adjust_time(&self) -> Result<bool, DomainError>;
}

struct HeaterState {
    status: UnderFloorHeaterStatus,
    reachable: bool,
}

pub struct SimHeater {
    state: Mutex<HeaterState>,
    listeners: ListenerSet<UnderFloorHeaterStatus>,
}

impl SimHeater {
    #[must_use]
    pub fn new(settings: &HeaterSettings) -> Self {
        let current = 21.0;
        Self {
            state: Mutex::new(HeaterState {
                status: UnderFloorHeaterStatus {
                    mode: settings.mode,
                    heater_on: heater_on(settings.mode, current, settings.target_temperature),
                    target_temperature: settings.target_temperature,
                    current_temperature: Some(current),
                    last_seen_ms: Some(now_ms()),
                },
                reachable: true,
            }),
            listeners: ListenerSet::new(),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// One thermostat report: the floor warms while the heater runs and cools
    /// otherwise.
    pub fn tick(&self) {
        let snapshot = {
            let mut state = self.lock();
            if !state.reachable {
                return;
            }
            let status = &mut state.status;
            let current = status.current_temperature.unwrap_or(20.0);
            let drift = rand::rng().random_range(0.05..0.3);
            let next = if status.heater_on { current + drift } else { current - drift };
            let next = (next * 10.0).round() / 10.0;
            status.current_temperature = Some(next);
            status.heater_on = heater_on(status.mode, next, status.target_temperature);
            status.last_seen_ms = Some(now_ms());
            status.clone()
        };
        self.listeners.emit(&snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, HeaterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a reachable thermostat and publish the result.
    fn update(&self, change: impl FnOnce(&mut UnderFloorHeaterStatus) -> bool) -> Result<bool, DomainError> {
        let (accepted, snapshot) = {
            let mut state = self.lock();
            if !state.reachable {
                return Err(DomainError::Unreachable { device: HEATER });
            }
            let accepted = change(&mut state.status);
            if !accepted {
                return Ok(false);
            }
            let status = &mut state.status;
            status.heater_on =
                heater_on(status.mode, status.current_temperature.unwrap_or(20.0), status.target_temperature);
            (accepted, status.clone())
        };
        self.listeners.emit(&snapshot);
        Ok(accepted)
    }
}

fn heater_on(mode: HeaterMode, current: f64, target: i32) -> bool {
    match mode {
        HeaterMode::PermanentOff => false,
        HeaterMode::PermanentOn => true,
        HeaterMode::Automatic => current < f64::from(target),
    }
}

impl UnderFloorHeater for SimHeater {
    fn heater_status(&self) -> Result<UnderFloorHeaterStatus, DomainError> {
        let state = self.lock();
        if !state.reachable {
            return Err(DomainError::Unreachable { device: HEATER });
        }
        Ok(state.status.clone())
    }

    fn update_mode(&self, mode: HeaterMode) -> Result<bool, DomainError> {
        info!(?mode, "heater mode update");
        self.update(|status| {
            status.mode = mode;
            true
        })
    }

    fn update_target_temperature(&self, target: i32) -> Result<bool, DomainError> {
        self.update(|status| {
            if !TARGET_TEMPERATURE_RANGE.contains(&target) {
                debug!(target, "target temperature rejected");
                return false;
            }
            status.target_temperature = target;
            true
        })
    }

    fn adjust_time(&self) -> Result<bool, DomainError> {
        self.update(|status| {
            status.last_seen_ms = Some(now_ms());
            true
        })
    }
}

impl EventSource<UnderFloorHeaterStatus> for SimHeater {
    fn current(&self, _owner: Option<&str>) -> Option<UnderFloorHeaterStatus> {
        self.heater_status().ok()
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<UnderFloorHeaterStatus>) {
        self.listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.listeners.remove(key);
    }
}
