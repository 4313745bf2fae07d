//! Battery-powered environment sensors.
//!
//! Sensors wake up, report, and pick up any scheduled maintenance (firmware
//! upgrade, clock adjustment, reset) on their next contact. Scheduling is
//! therefore just a flag on the hub side.

use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::domain::{EnvironmentSensor, EnvironmentSensorEvent};
use rand::Rng;
use tracing::info;

use super::{DomainError, EventSource, Listener, ListenerKey, ListenerSet, now_ms};
use crate::settings::SensorSettings;

pub const SLEEP_TIME_RANGE_SECONDS: std::ops::RangeInclusive<i32> = 10..=3600;

/// Maintenance flags a sensor picks up on its next report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Maintenance {
    FirmwareUpgrade,
    TimeAdjustment,
    Reset,
}

pub trait EnvironmentSensors: EventSource<EnvironmentSensorEvent> {
    fn all_sensors(&self) -> Vec<EnvironmentSensor>;

    /// Set or clear a maintenance flag. `None` targets every sensor.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for an unknown sensor id.
    fn schedule(&self, sensor_id: Option<i32>, maintenance: Maintenance, scheduled: bool) -> Result<(), DomainError>;

    /// Change a sensor's reporting interval by `delta` seconds, clamped to
    /// [`SLEEP_TIME_RANGE_SECONDS`].
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for an unknown sensor id.
    fn adjust_sleep_time(&self, sensor_id: i32, delta: i32) -> Result<(), DomainError>;
}

pub struct SimSensors {
    sensors: Mutex<Vec<EnvironmentSensor>>,
    listeners: ListenerSet<EnvironmentSensorEvent>,
}

impl SimSensors {
    #[must_use]
    pub fn new(settings: &[SensorSettings]) -> Self {
        let sensors = settings
            .iter()
            .map(|s| EnvironmentSensor {
                sensor_id: s.sensor_id,
                display_name: s.display_name.clone(),
                temperature: None,
                humidity: None,
                battery_milli_volts: None,
                sleep_time_in_seconds: s.sleep_time_in_seconds,
                firmware_upgrade_scheduled: false,
                time_adjustment_scheduled: false,
                reset_scheduled: false,
                last_received_ms: None,
            })
            .collect();
        Self { sensors: Mutex::new(sensors), listeners: ListenerSet::new() }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Every sensor reports once. Pending maintenance is carried out.
    pub fn tick(&self) {
        let events: Vec<EnvironmentSensorEvent> = {
            let mut sensors = self.lock();
            let mut rng = rand::rng();
            let now = now_ms();
            sensors
                .iter_mut()
                .map(|s| {
                    s.temperature = Some(f64::from(rng.random_range(150..260_i32)) / 10.0);
                    s.humidity = Some(f64::from(rng.random_range(300..650_i32)) / 10.0);
                    s.battery_milli_volts = Some(s.battery_milli_volts.unwrap_or(3000) - rng.random_range(0..=2));
                    s.firmware_upgrade_scheduled = false;
                    s.time_adjustment_scheduled = false;
                    s.reset_scheduled = false;
                    s.last_received_ms = Some(now);
                    EnvironmentSensorEvent { sensor: s.clone() }
                })
                .collect()
        };
        for event in &events {
            self.listeners.emit(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EnvironmentSensor>> {
        self.sensors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to the targeted sensors and publish each one.
    fn modify(&self, sensor_id: Option<i32>, change: impl Fn(&mut EnvironmentSensor)) -> Result<(), DomainError> {
        let events: Vec<EnvironmentSensorEvent> = {
            let mut sensors = self.lock();
            let targeted: Vec<&mut EnvironmentSensor> =
                sensors.iter_mut().filter(|s| sensor_id.is_none_or(|id| s.sensor_id == id)).collect();
            if let (Some(id), true) = (sensor_id, targeted.is_empty()) {
                return Err(DomainError::NotFound { kind: "sensor", id: id.to_string() });
            }
            targeted
                .into_iter()
                .map(|s| {
                    change(s);
                    EnvironmentSensorEvent { sensor: s.clone() }
                })
                .collect()
        };
        for event in &events {
            self.listeners.emit(event);
        }
        Ok(())
    }
}

impl EnvironmentSensors for SimSensors {
    fn all_sensors(&self) -> Vec<EnvironmentSensor> {
        self.lock().clone()
    }

    fn schedule(&self, sensor_id: Option<i32>, maintenance: Maintenance, scheduled: bool) -> Result<(), DomainError> {
        info!(?sensor_id, ?maintenance, scheduled, "sensor maintenance");
        self.modify(sensor_id, |s| match maintenance {
            Maintenance::FirmwareUpgrade => s.firmware_upgrade_scheduled = scheduled,
            Maintenance::TimeAdjustment => s.time_adjustment_scheduled = scheduled,
            Maintenance::Reset => s.reset_scheduled = scheduled,
        })
    }

    fn adjust_sleep_time(&self, sensor_id: i32, delta: i32) -> Result<(), DomainError> {
        self.modify(Some(sensor_id), |s| {
            s.sleep_time_in_seconds = s
                .sleep_time_in_seconds
                .saturating_add(delta)
                .clamp(*SLEEP_TIME_RANGE_SECONDS.start(), *SLEEP_TIME_RANGE_SECONDS.end());
        })
    }
}

impl EventSource<EnvironmentSensorEvent> for SimSensors {
    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<EnvironmentSensorEvent>) {
        self.listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.listeners.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensors() -> SimSensors {
        SimSensors::new(&[
            SensorSettings { sensor_id: 1, display_name: "Attic".into(), sleep_time_in_seconds: 300 },
            SensorSettings { sensor_id: 2, display_name: "Cellar".into(), sleep_time_in_seconds: 20 },
        ])
    }

    #[test]
    fn unknown_sensor_is_not_found() {
        let sensors = sensors();
        let err = sensors.schedule(Some(9), Maintenance::Reset, true).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { kind: "sensor", .. }));
    }

    #[test]
    fn schedule_without_id_targets_every_sensor() {
        let sensors = sensors();
        sensors.schedule(None, Maintenance::TimeAdjustment, true).unwrap();
        assert!(sensors.all_sensors().iter().all(|s| s.time_adjustment_scheduled));

        sensors.schedule(Some(2), Maintenance::TimeAdjustment, false).unwrap();
        let all = sensors.all_sensors();
        assert!(all[0].time_adjustment_scheduled);
        assert!(!all[1].time_adjustment_scheduled);
    }

    #[test]
    fn sleep_time_is_clamped() {
        let sensors = sensors();
        sensors.adjust_sleep_time(2, -100).unwrap();
        assert_eq!(sensors.all_sensors()[1].sleep_time_in_seconds, 10);
    }

    #[test]
    fn report_clears_pending_maintenance() {
        let sensors = sensors();
        sensors.schedule(Some(1), Maintenance::FirmwareUpgrade, true).unwrap();
        sensors.tick();
        let attic = &sensors.all_sensors()[0];
        assert!(!attic.firmware_upgrade_scheduled);
        assert!(attic.temperature.is_some());
        assert!(attic.last_received_ms.is_some());
    }
}
