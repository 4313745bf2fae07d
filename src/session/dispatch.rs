//! Request dispatch: one handler per request tag.
//!
//! DESIGN
//! ======
//! Handlers are business logic only. They call collaborators and return an
//! [`Outcome`]; the session writes it. Every handler runs inside the same
//! catch boundary, so a domain error, a bridge timeout or a panic all become
//! an `errorMsg` response and the request is never left unanswered.
//!
//! Writes re-read the collaborator after mutating and return that state, so
//! clamping done by the device side is what the client sees.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use protocol::domain::{
    EnvironmentSensorRequest, EnvironmentSensorResponse, EvChargingStationRequest, EvChargingStationResponse,
    GarageLightRequest, GarageLightResponse, HoermannE4Command, UnderFloorHeaterRequest, UnderFloorHeaterResponse,
};
use protocol::{ResponseBody, RpcRequest, RpcResponse};
use tracing::{debug, error, warn};

use super::Session;
use super::subscription::Subscription;
use crate::error::{ErrorCode, HandlerError, error_response};
use crate::services::sensors::Maintenance;
use crate::sync_bridge;

const LIGHT_CONTROLLER: &str = "garage light controller";
const DOOR_DRIVE: &str = "hoermann e4 drive";

// =============================================================================
// OUTCOME
// =============================================================================

/// What the session does with a handled request.
pub enum Outcome {
    /// Send the response.
    Reply(RpcResponse),
    /// Send the response, then start pushing the new subscription.
    ReplyThenActivate(RpcResponse, Arc<dyn Subscription>),
}

impl From<ResponseBody> for Outcome {
    fn from(body: ResponseBody) -> Self {
        Self::Reply(body.into())
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run the handler for `request`. Always produces an outcome.
pub async fn dispatch(session: &Session, request: RpcRequest) -> Outcome {
    let tag = request.tag();
    debug!(session_id = %session.id(), tag, "rpc request");

    match AssertUnwindSafe(handle(session, request)).catch_unwind().await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!(session_id = %session.id(), tag, code = e.error_code(), error = %e, "request failed");
            Outcome::Reply(error_response(&e))
        }
        Err(_) => {
            error!(session_id = %session.id(), tag, "request handler panicked");
            Outcome::Reply(RpcResponse::failed(format!("internal error while handling {tag}")))
        }
    }
}

async fn handle(session: &Session, request: RpcRequest) -> Result<Outcome, HandlerError> {
    let c = &session.state().collaborators;
    let outcome = match request {
        RpcRequest::Subscribe { subscribe } => session.subscribe(&subscribe),
        RpcRequest::Unsubscribe { unsubscribe } => {
            session.unsubscribe(&unsubscribe.subscription_id);
            ResponseBody::SubscriptionRemoved(true).into()
        }
        RpcRequest::GarageLightRequest { garage_light_request } => {
            ResponseBody::GarageLightResponse(garage_light(session, garage_light_request).await?).into()
        }
        RpcRequest::GarageVentilationRequest { garage_ventilation_command_milli_volts } => {
            c.garage_ventilation.set_milli_volts(garage_ventilation_command_milli_volts)?;
            ResponseBody::GarageVentilationState(c.garage_ventilation.ventilation_state()).into()
        }
        RpcRequest::SendHoermannE4Command { hoermann_e4_command } => {
            ResponseBody::HoermannE4CommandResult(hoermann_e4(session, hoermann_e4_command).await?).into()
        }
        RpcRequest::UnderFloorHeaterRequest { under_floor_heater_request } => {
            ResponseBody::UnderFloorHeaterResponse(under_floor_heater(session, under_floor_heater_request)?).into()
        }
        RpcRequest::EvChargingStationRequest { ev_charging_station_request } => {
            ResponseBody::EvChargingStationResponse(ev_charging(session, ev_charging_station_request)?).into()
        }
        RpcRequest::EnvironmentSensorRequest { environment_sensor_request } => {
            ResponseBody::EnvironmentSensorResponse(environment_sensors(session, environment_sensor_request)?).into()
        }
        RpcRequest::QuickStats => ResponseBody::QuickStatsResponse(c.quick_stats.quick_stats()).into(),
        RpcRequest::EssRead => ResponseBody::EssState(c.ess.ess_state()?).into(),
        RpcRequest::EssWrite { ess_write } => {
            c.ess.write_ess(&ess_write)?;
            ResponseBody::EssState(c.ess.ess_state()?).into()
        }
        RpcRequest::ReadEnergyPricingSettings => {
            ResponseBody::EnergyPricingSettingsRead(c.pricing.pricing_settings()).into()
        }
        RpcRequest::WriteEnergyPricingSettings { energy_pricing_settings_write } => {
            c.pricing.write_pricing(&energy_pricing_settings_write)?;
            ResponseBody::EnergyPricingSettingsRead(c.pricing.pricing_settings()).into()
        }
        RpcRequest::UserSettings => ResponseBody::UserSettings(c.users.settings_for(session.owner())).into(),
        RpcRequest::ReadAllUserSettings => ResponseBody::AllUserSettings(c.users.all_settings()).into(),
        RpcRequest::WriteUserSettings { write_user_settings } => {
            c.users.write(&write_user_settings)?;
            ResponseBody::AllUserSettings(c.users.all_settings()).into()
        }
        RpcRequest::DnsBlockingSet { dns_blocking_lists } => {
            c.firewall.set_dns_blocking_lists(dns_blocking_lists)?;
            Outcome::Reply(RpcResponse::empty())
        }
        RpcRequest::DnsBlockingUpdateStandardLists => {
            c.firewall.update_standard_lists()?;
            Outcome::Reply(RpcResponse::empty())
        }
        RpcRequest::BlockedMacsSet { blocked_macs } => {
            c.firewall.set_blocked_macs(blocked_macs)?;
            Outcome::Reply(RpcResponse::empty())
        }
    };
    Ok(outcome)
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn garage_light(session: &Session, request: GarageLightRequest) -> Result<GarageLightResponse, HandlerError> {
    let lights = &session.state().collaborators.garage_lights;

    let command_result = if let Some(command) = request.command() {
        let device = Arc::clone(lights);
        let deadline = session.state().config.sync_bridge_timeout;
        Some(sync_bridge::call(LIGHT_CONTROLLER, deadline, move |ack| device.send_light_command(command, ack)).await?)
    } else {
        match request {
            GarageLightRequest::SetLedStripeMode { led_stripe_mode } => lights.set_led_stripe_mode(led_stripe_mode)?,
            GarageLightRequest::SetLedStripeLowMillivolts { led_stripe_low_milli_volts } => {
                lights.set_led_stripe_low_milli_volts(led_stripe_low_milli_volts)?;
            }
            _ => {}
        }
        None
    };

    Ok(GarageLightResponse { garage_light_status: lights.status()?, command_result })
}

async fn hoermann_e4(session: &Session, command: HoermannE4Command) -> Result<bool, HandlerError> {
    let door = Arc::clone(&session.state().collaborators.garage_door);
    let deadline = session.state().config.sync_bridge_timeout;
    Ok(sync_bridge::call(DOOR_DRIVE, deadline, move |ack| door.send_door_command(command, ack)).await?)
}

fn under_floor_heater(
    session: &Session,
    request: UnderFloorHeaterRequest,
) -> Result<UnderFloorHeaterResponse, HandlerError> {
    let heater = &session.state().collaborators.heater;
    let (update_success, adjust_time_success) = match request {
        UnderFloorHeaterRequest::GetStatus => (None, None),
        UnderFloorHeaterRequest::UpdateMode { new_mode } => (Some(heater.update_mode(new_mode)?), None),
        UnderFloorHeaterRequest::UpdateTargetTemperature { new_target_temperature } => {
            (Some(heater.update_target_temperature(new_target_temperature)?), None)
        }
        UnderFloorHeaterRequest::AdjustTime => (None, Some(heater.adjust_time()?)),
    };
    Ok(UnderFloorHeaterResponse { status: heater.heater_status()?, update_success, adjust_time_success })
}

fn ev_charging(
    session: &Session,
    request: EvChargingStationRequest,
) -> Result<EvChargingStationResponse, HandlerError> {
    let charging = &session.state().collaborators.ev_charging;
    let config_updated = match request {
        EvChargingStationRequest::GetChargingStationsDataAndConfig => None,
        EvChargingStationRequest::SetMode { client_id, new_mode } => Some(charging.set_mode(&client_id, new_mode)?),
        EvChargingStationRequest::SetLoadSharingPriority { client_id, new_load_sharing_priority } => {
            Some(charging.set_load_sharing_priority(&client_id, new_load_sharing_priority)?)
        }
        EvChargingStationRequest::SetChargeRateLimit { client_id, charge_rate_limit } => {
            Some(charging.set_charge_rate_limit(&client_id, charge_rate_limit)?)
        }
    };
    Ok(EvChargingStationResponse { charging_stations: charging.stations(), config_updated })
}

fn environment_sensors(
    session: &Session,
    request: EnvironmentSensorRequest,
) -> Result<EnvironmentSensorResponse, HandlerError> {
    let sensors = &session.state().collaborators.sensors;
    match request {
        EnvironmentSensorRequest::GetAllEnvironmentSensorData => {}
        EnvironmentSensorRequest::ScheduleFirmwareUpgrade { sensor_id } => {
            sensors.schedule(Some(sensor_id), Maintenance::FirmwareUpgrade, true)?;
        }
        EnvironmentSensorRequest::CancelFirmwareUpgrade { sensor_id } => {
            sensors.schedule(Some(sensor_id), Maintenance::FirmwareUpgrade, false)?;
        }
        EnvironmentSensorRequest::ScheduleTimeAdjustment { sensor_id } => {
            sensors.schedule(sensor_id, Maintenance::TimeAdjustment, true)?;
        }
        EnvironmentSensorRequest::CancelTimeAdjustment { sensor_id } => {
            sensors.schedule(sensor_id, Maintenance::TimeAdjustment, false)?;
        }
        EnvironmentSensorRequest::ScheduleReset { sensor_id } => sensors.schedule(sensor_id, Maintenance::Reset, true)?,
        EnvironmentSensorRequest::CancelReset { sensor_id } => sensors.schedule(sensor_id, Maintenance::Reset, false)?,
        EnvironmentSensorRequest::AdjustSleepTimeInSeconds { sensor_id, sleep_time_in_seconds_delta } => {
            sensors.adjust_sleep_time(sensor_id, sleep_time_in_seconds_delta)?;
        }
    }
    Ok(EnvironmentSensorResponse { sensors: sensors.all_sensors() })
}
