//! Garage lights, door and ventilation.
//!
//! DESIGN
//! ======
//! The light controller and the Hoermann E4 door drive are remote devices.
//! Commands to them are fire-and-acknowledge: the caller passes an [`Ack`]
//! and the device completes it once it has acted. The simulated devices
//! reply after a configurable latency, or stay silent to exercise timeouts.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use protocol::domain::{
    DoorPosition, GarageLightCommand, GarageLightStatus, GarageVentilationState, HoermannE4Broadcast,
    HoermannE4Command, LedStripeMode, LedStripeStatus,
};
use tracing::{debug, warn};

use super::{DomainError, EventSource, Listener, ListenerKey, ListenerSet, now_ms};
use crate::settings::GarageSettings;
use crate::sync_bridge::Ack;

const LIGHT_CONTROLLER: &str = "garage light controller";
const DOOR_DRIVE: &str = "hoermann e4 drive";
const VENTILATION: &str = "garage ventilation";

/// Highest control voltage accepted by the LED driver and the fan controller.
const MAX_CONTROL_MILLI_VOLTS: i32 = 10_000;

// =============================================================================
// CONTRACTS
// =============================================================================

pub trait GarageLights: EventSource<GarageLightStatus> {
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the controller is offline.
    fn status(&self) -> Result<GarageLightStatus, DomainError>;

    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the controller is offline.
    fn set_led_stripe_mode(&self, mode: LedStripeMode) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// [`DomainError::Invalid`] outside `0..=10000`, or
    /// [`DomainError::Unreachable`] when the controller is offline.
    fn set_led_stripe_low_milli_volts(&self, milli_volts: i32) -> Result<(), DomainError>;

    /// Send a switch command. `ack` is completed when the controller answers.
    fn send_light_command(&self, command: GarageLightCommand, ack: Ack);
}

pub trait GarageDoor: EventSource<HoermannE4Broadcast> {
    /// Send a door command. `ack` is completed when the drive answers.
    fn send_door_command(&self, command: HoermannE4Command, ack: Ack);
}

pub trait GarageVentilation: EventSource<GarageVentilationState> {
    fn ventilation_state(&self) -> GarageVentilationState;

    /// # Errors
    ///
    /// [`DomainError::Invalid`] outside `0..=10000`.
    fn set_milli_volts(&self, milli_volts: i32) -> Result<(), DomainError>;
}

// =============================================================================
// SIMULATION
// =============================================================================

/// How the simulated devices answer commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckMode {
    Reply { ok: bool, latency: Duration },
    /// Never answer. Acks are held so the waiter times out instead of
    /// observing an abandoned command.
    Silent,
}

struct GarageState {
    lights: GarageLightStatus,
    door: HoermannE4Broadcast,
    ventilation: GarageVentilationState,
    reachable: bool,
    ack_mode: AckMode,
    unanswered: Vec<Ack>,
}

pub struct SimGarage {
    state: Mutex<GarageState>,
    light_listeners: ListenerSet<GarageLightStatus>,
    door_listeners: ListenerSet<HoermannE4Broadcast>,
    ventilation_listeners: ListenerSet<GarageVentilationState>,
}

impl SimGarage {
    #[must_use]
    pub fn new(settings: &GarageSettings) -> Self {
        let now = now_ms();
        Self {
            state: Mutex::new(GarageState {
                lights: GarageLightStatus {
                    ceiling_light_is_on: false,
                    led_stripe_status: LedStripeStatus::Off,
                    led_stripe_mode: settings.led_stripe_mode,
                    led_stripe_low_milli_volts: settings.led_stripe_low_milli_volts,
                    updated_at_ms: now,
                },
                door: HoermannE4Broadcast { position: DoorPosition::Closed, light_on: false, updated_at_ms: now },
                ventilation: GarageVentilationState {
                    milli_volts: settings.ventilation_milli_volts,
                    updated_at_ms: now,
                },
                reachable: true,
                ack_mode: AckMode::Reply { ok: true, latency: Duration::from_millis(settings.ack_latency_ms) },
                unanswered: Vec::new(),
            }),
            light_listeners: ListenerSet::new(),
            door_listeners: ListenerSet::new(),
            ventilation_listeners: ListenerSet::new(),
        }
    }

    pub fn set_ack_mode(&self, mode: AckMode) {
        let mut state = self.lock();
        state.ack_mode = mode;
        if !matches!(mode, AckMode::Silent) {
            state.unanswered.clear();
        }
    }

    /// Take the devices off the network. Commands are answered negatively and
    /// reads fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Door position report as the drive broadcasts it on its own.
    pub fn report_door_position(&self, position: DoorPosition) {
        let snapshot = {
            let mut state = self.lock();
            state.door.position = position;
            state.door.updated_at_ms = now_ms();
            state.door.clone()
        };
        self.door_listeners.emit(&snapshot);
    }

    #[must_use]
    pub fn light_listener_count(&self) -> usize {
        self.light_listeners.len()
    }

    #[must_use]
    pub fn door_listener_count(&self) -> usize {
        self.door_listeners.len()
    }

    #[must_use]
    pub fn ventilation_listener_count(&self) -> usize {
        self.ventilation_listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, GarageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How the device will answer `ack`, or `None` when it cannot be reached.
    fn accept(state: &mut GarageState, device: &'static str, ack: &Ack) -> Option<AckMode> {
        if !state.reachable {
            warn!(device, "command sent to unreachable device");
            return None;
        }
        if matches!(state.ack_mode, AckMode::Silent) {
            state.unanswered.push(ack.clone());
        }
        Some(state.ack_mode)
    }
}

/// Complete `ack` the way `mode` says, off the caller's stack when delayed.
fn answer(device: &'static str, mode: Option<AckMode>, ack: Ack) {
    match mode {
        None => ack.complete(false),
        Some(AckMode::Silent) => debug!(device, "device stays silent"),
        Some(AckMode::Reply { ok, latency }) if latency.is_zero() => ack.complete(ok),
        Some(AckMode::Reply { ok, latency }) => match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(latency).await;
                    ack.complete(ok);
                });
            }
            Err(_) => ack.complete(ok),
        },
    }
}

fn acts(mode: Option<AckMode>) -> bool {
    !matches!(mode, None | Some(AckMode::Reply { ok: false, .. }))
}

fn check_control_voltage(field: &'static str, milli_volts: i32) -> Result<(), DomainError> {
    if (0..=MAX_CONTROL_MILLI_VOLTS).contains(&milli_volts) {
        Ok(())
    } else {
        Err(DomainError::Invalid { field, reason: format!("{milli_volts} is outside 0..={MAX_CONTROL_MILLI_VOLTS}") })
    }
}

impl GarageLights for SimGarage {
    fn status(&self) -> Result<GarageLightStatus, DomainError> {
        let state = self.lock();
        if !state.reachable {
            return Err(DomainError::Unreachable { device: LIGHT_CONTROLLER });
        }
        Ok(state.lights.clone())
    }

    fn set_led_stripe_mode(&self, mode: LedStripeMode) -> Result<(), DomainError> {
        let snapshot = {
            let mut state = self.lock();
            if !state.reachable {
                return Err(DomainError::Unreachable { device: LIGHT_CONTROLLER });
            }
            state.lights.led_stripe_mode = mode;
            state.lights.updated_at_ms = now_ms();
            state.lights.clone()
        };
        self.light_listeners.emit(&snapshot);
        Ok(())
    }

    fn set_led_stripe_low_milli_volts(&self, milli_volts: i32) -> Result<(), DomainError> {
        check_control_voltage("ledStripeLowMilliVolts", milli_volts)?;
        let snapshot = {
            let mut state = self.lock();
            if !state.reachable {
                return Err(DomainError::Unreachable { device: LIGHT_CONTROLLER });
            }
            state.lights.led_stripe_low_milli_volts = milli_volts;
            state.lights.updated_at_ms = now_ms();
            state.lights.clone()
        };
        self.light_listeners.emit(&snapshot);
        Ok(())
    }

    fn send_light_command(&self, command: GarageLightCommand, ack: Ack) {
        let (mode, snapshot) = {
            let mut state = self.lock();
            let mode = Self::accept(&mut state, LIGHT_CONTROLLER, &ack);
            let snapshot = acts(mode).then(|| {
                let lights = &mut state.lights;
                match command {
                    GarageLightCommand::SwitchOnCeilingLight => lights.ceiling_light_is_on = true,
                    GarageLightCommand::SwitchOffCeilingLight => lights.ceiling_light_is_on = false,
                    GarageLightCommand::SwitchLedStripeOff => lights.led_stripe_status = LedStripeStatus::Off,
                    GarageLightCommand::SwitchLedStripeOnLow => lights.led_stripe_status = LedStripeStatus::OnLow,
                    GarageLightCommand::SwitchLedStripeOnHigh => lights.led_stripe_status = LedStripeStatus::OnHigh,
                }
                lights.updated_at_ms = now_ms();
                lights.clone()
            });
            (mode, snapshot)
        };
        debug!(?command, "light command sent");
        if let Some(snapshot) = snapshot {
            self.light_listeners.emit(&snapshot);
        }
        answer(LIGHT_CONTROLLER, mode, ack);
    }
}

impl EventSource<GarageLightStatus> for SimGarage {
    fn current(&self, _owner: Option<&str>) -> Option<GarageLightStatus> {
        GarageLights::status(self).ok()
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<GarageLightStatus>) {
        self.light_listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.light_listeners.remove(key);
    }
}

impl GarageDoor for SimGarage {
    fn send_door_command(&self, command: HoermannE4Command, ack: Ack) {
        let (mode, snapshot) = {
            let mut state = self.lock();
            let mode = Self::accept(&mut state, DOOR_DRIVE, &ack);
            let snapshot = acts(mode).then(|| {
                let door = &mut state.door;
                match command {
                    HoermannE4Command::Open => door.position = DoorPosition::Open,
                    HoermannE4Command::Close => door.position = DoorPosition::Closed,
                    HoermannE4Command::Stop => door.position = DoorPosition::Stopped,
                    HoermannE4Command::HalfOpen => door.position = DoorPosition::HalfOpen,
                    HoermannE4Command::ToggleLight => door.light_on = !door.light_on,
                }
                door.updated_at_ms = now_ms();
                door.clone()
            });
            (mode, snapshot)
        };
        debug!(?command, "door command sent");
        if let Some(snapshot) = snapshot {
            self.door_listeners.emit(&snapshot);
        }
        answer(DOOR_DRIVE, mode, ack);
    }
}

impl EventSource<HoermannE4Broadcast> for SimGarage {
    fn current(&self, _owner: Option<&str>) -> Option<HoermannE4Broadcast> {
        let state = self.lock();
        state.reachable.then(|| state.door.clone())
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<HoermannE4Broadcast>) {
        self.door_listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.door_listeners.remove(key);
    }
}

impl GarageVentilation for SimGarage {
    fn ventilation_state(&self) -> GarageVentilationState {
        self.lock().ventilation.clone()
    }

    fn set_milli_volts(&self, milli_volts: i32) -> Result<(), DomainError> {
        check_control_voltage("garageVentilationCommandMilliVolts", milli_volts)?;
        let snapshot = {
            let mut state = self.lock();
            state.ventilation.milli_volts = milli_volts;
            state.ventilation.updated_at_ms = now_ms();
            state.ventilation.clone()
        };
        debug!(device = VENTILATION, milli_volts, "ventilation updated");
        self.ventilation_listeners.emit(&snapshot);
        Ok(())
    }
}

impl EventSource<GarageVentilationState> for SimGarage {
    fn current(&self, _owner: Option<&str>) -> Option<GarageVentilationState> {
        Some(self.ventilation_state())
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<GarageVentilationState>) {
        self.ventilation_listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.ventilation_listeners.remove(key);
    }
}

#[cfg(test)]
#[path = "garage_test.rs"]
mod tests;
