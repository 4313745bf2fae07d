//! Power meter, energy storage system and spot-price settings.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::domain::{
    EnergyPricingSettingsRead, EnergyPricingSettingsWrite, EssOperationMode, EssState, EssWrite,
    PriceServiceSettings, QuickStatsResponse,
};
use rand::Rng;
use tracing::info;

use super::{DomainError, EventSource, Listener, ListenerKey, ListenerSet, now_ms};
use crate::settings::{EssSettings, PriceServiceConfig};

const ESS: &str = "energy storage system";

// =============================================================================
// CONTRACTS
// =============================================================================

pub trait QuickStats: EventSource<QuickStatsResponse> {
    fn quick_stats(&self) -> QuickStatsResponse;
}

pub trait EnergyStorage: EventSource<EssState> {
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the inverter is offline.
    fn ess_state(&self) -> Result<EssState, DomainError>;

    /// Apply the present fields of `write`. SoC limits are clamped to
    /// `0..=100` and `from` never exceeds `to`.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unreachable`] when the inverter is offline.
    fn write_ess(&self, write: &EssWrite) -> Result<(), DomainError>;
}

pub trait EnergyPricing: Send + Sync {
    fn pricing_settings(&self) -> EnergyPricingSettingsRead;

    /// # Errors
    ///
    /// [`DomainError::NotFound`] for an unknown price service and
    /// [`DomainError::Invalid`] for a non-finite or negative value.
    fn write_pricing(&self, write: &EnergyPricingSettingsWrite) -> Result<(), DomainError>;
}

// =============================================================================
// SIMULATION
// =============================================================================

struct EnergyState {
    stats: QuickStatsResponse,
    ess: EssState,
    ess_reachable: bool,
    pricing: BTreeMap<String, PriceServiceConfig>,
}

pub struct SimEnergy {
    state: Mutex<EnergyState>,
    stats_listeners: ListenerSet<QuickStatsResponse>,
    ess_listeners: ListenerSet<EssState>,
}

impl SimEnergy {
    #[must_use]
    pub fn new(ess: &EssSettings, pricing: &BTreeMap<String, PriceServiceConfig>) -> Self {
        let now = now_ms();
        let (from, to) = clamp_soc_limits(ess.soc_limit_from, ess.soc_limit_to);
        Self {
            state: Mutex::new(EnergyState {
                stats: QuickStatsResponse {
                    power_import_watts: 0,
                    power_export_watts: 0,
                    energy_price_cents: 0.0,
                    outside_temperature: None,
                    battery_soc: Some(50),
                    updated_at_ms: now,
                },
                ess: EssState {
                    operation_mode: ess.operation_mode,
                    soc: 50,
                    soc_limit_from: from,
                    soc_limit_to: to,
                    grid_power_watts: 0,
                    battery_power_watts: 0,
                    updated_at_ms: now,
                },
                ess_reachable: true,
                pricing: pricing.clone(),
            }),
            stats_listeners: ListenerSet::new(),
            ess_listeners: ListenerSet::new(),
        }
    }

    pub fn set_ess_reachable(&self, reachable: bool) {
        self.lock().ess_reachable = reachable;
    }

    #[must_use]
    pub fn stats_listener_count(&self) -> usize {
        self.stats_listeners.len()
    }

    #[must_use]
    pub fn ess_listener_count(&self) -> usize {
        self.ess_listeners.len()
    }

    /// Publish a meter reading directly, as the grid meter poller would.
    pub fn report_quick_stats(&self, stats: QuickStatsResponse) {
        self.lock().stats = stats.clone();
        self.stats_listeners.emit(&stats);
    }

    /// One meter and inverter poll.
    pub fn tick(&self) {
        let (stats, ess) = {
            let mut state = self.lock();
            let mut rng = rand::rng();
            let now = now_ms();

            let load: i64 = rng.random_range(200..3_500);
            let solar: i64 = rng.random_range(0..4_000);
            let battery = match state.ess.operation_mode {
                EssOperationMode::Passthrough => 0,
                EssOperationMode::ForceCharge => -2_000,
                EssOperationMode::SelfConsumption | EssOperationMode::ZeroGrid => (load - solar).clamp(-2_500, 2_500),
            };
            let grid = load - solar - battery;

            let ess = &mut state.ess;
            let step = i32::from(battery < 0) - i32::from(battery > 0);
            ess.soc = (ess.soc + step).clamp(ess.soc_limit_from, ess.soc_limit_to);
            ess.grid_power_watts = grid;
            ess.battery_power_watts = battery;
            ess.updated_at_ms = now;
            let soc = ess.soc;

            state.stats = QuickStatsResponse {
                power_import_watts: grid.max(0),
                power_export_watts: (-grid).max(0),
                energy_price_cents: f64::from(rng.random_range(50..4_000_i32)) / 100.0,
                outside_temperature: Some(f64::from(rng.random_range(-100..300_i32)) / 10.0),
                battery_soc: Some(soc),
                updated_at_ms: now,
            };
            (state.stats.clone(), state.ess_reachable.then(|| state.ess.clone()))
        };
        self.stats_listeners.emit(&stats);
        if let Some(ess) = ess {
            self.ess_listeners.emit(&ess);
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnergyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn clamp_soc_limits(from: i32, to: i32) -> (i32, i32) {
    let to = to.clamp(0, 100);
    (from.clamp(0, to), to)
}

fn check_price_value(field: &'static str, value: f64) -> Result<f64, DomainError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DomainError::Invalid { field, reason: format!("{value} is not a non-negative number") })
    }
}

impl QuickStats for SimEnergy {
    fn quick_stats(&self) -> QuickStatsResponse {
        self.lock().stats.clone()
    }
}

impl EventSource<QuickStatsResponse> for SimEnergy {
    fn current(&self, _owner: Option<&str>) -> Option<QuickStatsResponse> {
        Some(self.quick_stats())
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<QuickStatsResponse>) {
        self.stats_listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.stats_listeners.remove(key);
    }
}

impl EnergyStorage for SimEnergy {
    fn ess_state(&self) -> Result<EssState, DomainError> {
        let state = self.lock();
        if !state.ess_reachable {
            return Err(DomainError::Unreachable { device: ESS });
        }
        Ok(state.ess.clone())
    }

    fn write_ess(&self, write: &EssWrite) -> Result<(), DomainError> {
        let snapshot = {
            let mut state = self.lock();
            if !state.ess_reachable {
                return Err(DomainError::Unreachable { device: ESS });
            }
            let ess = &mut state.ess;
            if let Some(mode) = write.operation_mode {
                ess.operation_mode = mode;
            }
            let (from, to) = clamp_soc_limits(
                write.soc_limit_from.unwrap_or(ess.soc_limit_from),
                write.soc_limit_to.unwrap_or(ess.soc_limit_to),
            );
            ess.soc_limit_from = from;
            ess.soc_limit_to = to;
            ess.updated_at_ms = now_ms();
            ess.clone()
        };
        info!(mode = ?snapshot.operation_mode, from = snapshot.soc_limit_from, to = snapshot.soc_limit_to, "ess updated");
        self.ess_listeners.emit(&snapshot);
        Ok(())
    }
}

impl EventSource<EssState> for SimEnergy {
    fn current(&self, _owner: Option<&str>) -> Option<EssState> {
        self.ess_state().ok()
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<EssState>) {
        self.ess_listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.ess_listeners.remove(key);
    }
}

impl EnergyPricing for SimEnergy {
    fn pricing_settings(&self) -> EnergyPricingSettingsRead {
        let services = self
            .lock()
            .pricing
            .iter()
            .map(|(service, config)| PriceServiceSettings {
                service: service.clone(),
                avg_multiplier: config.avg_multiplier,
                neutral_span: config.neutral_span,
            })
            .collect();
        EnergyPricingSettingsRead { services }
    }

    fn write_pricing(&self, write: &EnergyPricingSettingsWrite) -> Result<(), DomainError> {
        let avg_multiplier = write.avg_multiplier.map(|v| check_price_value("avgMultiplier", v)).transpose()?;
        let neutral_span = write.neutral_span.map(|v| check_price_value("neutralSpan", v)).transpose()?;

        let mut state = self.lock();
        let config = state
            .pricing
            .get_mut(&write.service)
            .ok_or_else(|| DomainError::NotFound { kind: "price service", id: write.service.clone() })?;
        if let Some(v) = avg_multiplier {
            config.avg_multiplier = v;
        }
        if let Some(v) = neutral_span {
            config.neutral_span = v;
        }
        info!(service = %write.service, "pricing settings updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy() -> SimEnergy {
        let pricing = BTreeMap::from([("spot".to_string(), PriceServiceConfig { avg_multiplier: 1.0, neutral_span: 0.1 })]);
        SimEnergy::new(&EssSettings::default(), &pricing)
    }

    #[test]
    fn soc_limits_are_clamped_and_ordered() {
        let energy = energy();
        energy.write_ess(&EssWrite { operation_mode: None, soc_limit_from: Some(95), soc_limit_to: Some(140) }).unwrap();
        let ess = energy.ess_state().unwrap();
        assert_eq!(ess.soc_limit_to, 100);
        assert_eq!(ess.soc_limit_from, 95);

        energy.write_ess(&EssWrite { soc_limit_to: Some(60), ..EssWrite::default() }).unwrap();
        let ess = energy.ess_state().unwrap();
        assert_eq!((ess.soc_limit_from, ess.soc_limit_to), (60, 60));
    }

    #[test]
    fn unknown_price_service_is_not_found() {
        let energy = energy();
        let write = EnergyPricingSettingsWrite { service: "nordpool".into(), avg_multiplier: Some(1.2), neutral_span: None };
        assert!(matches!(energy.write_pricing(&write), Err(DomainError::NotFound { .. })));
    }

    #[test]
    fn pricing_write_rejects_nan() {
        let energy = energy();
        let write = EnergyPricingSettingsWrite { service: "spot".into(), avg_multiplier: Some(f64::NAN), neutral_span: None };
        assert!(matches!(energy.write_pricing(&write), Err(DomainError::Invalid { .. })));
        assert!((energy.pricing_settings().services[0].avg_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tick_keeps_soc_within_limits() {
        let energy = energy();
        energy.write_ess(&EssWrite { operation_mode: Some(EssOperationMode::ForceCharge), ..EssWrite::default() }).unwrap();
        for _ in 0..100 {
            energy.tick();
        }
        let ess = energy.ess_state().unwrap();
        assert_eq!(ess.soc, ess.soc_limit_to);
        assert_eq!(energy.quick_stats().battery_soc, Some(ess.soc));
    }
}
