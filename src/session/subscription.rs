//! Subscriptions: one event stream pushed to one connection.
//!
//! DESIGN
//! ======
//! Every subscription type is the same [`EventSubscription`] parameterized by
//! its event source and the `NotifyEvent` variant its events are wrapped in.
//! [`open`] is the table from subscription type to that pair.
//!
//! DELIVERY
//! ========
//! A subscription starts `Pending`: the listener is registered and the
//! snapshot taken, but nothing is pushed yet, so the subscribe response can
//! go out first. Live events that arrive in that window are buffered.
//! `activate` pushes the snapshot, then the backlog, then switches to `Live`.
//! After `close` every event is dropped.
//!
//! The source holds the listener, the listener holds only a weak reference
//! back to the subscription. The session's registry is the sole owner.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use protocol::{Envelope, NotifyEvent, SubscriptionType};
use protocol::domain::{
    EnvironmentSensorEvent, EssState, EvChargingEvent, FirewallState, GarageLightStatus, GarageVentilationState,
    HoermannE4Broadcast, QuickStatsResponse, UnderFloorHeaterStatus,
};
use tracing::debug;

use super::Outbound;
use crate::services::{Collaborators, EventSource, Listener, ListenerKey};

/// A live registration owned by one session.
pub trait Subscription: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> SubscriptionType;

    /// Push the snapshot and any buffered events, then deliver live.
    fn activate(&self);

    /// Stop delivery and unregister from the source. Idempotent.
    fn close(&self);
}

/// Who a subscription delivers to.
pub struct Target {
    pub key: ListenerKey,
    pub owner: Option<String>,
    pub outbound: Outbound,
}

enum Delivery<E> {
    Pending { snapshot: Option<E>, backlog: Vec<E> },
    Live,
    Closed,
}

pub struct EventSubscription<E> {
    kind: SubscriptionType,
    target: Target,
    source: Arc<dyn EventSource<E>>,
    to_notify: fn(E) -> NotifyEvent,
    delivery: Mutex<Delivery<E>>,
}

impl<E> EventSubscription<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Register with `source` and capture its snapshot. Nothing is pushed
    /// until [`Subscription::activate`].
    pub fn open(
        target: Target,
        kind: SubscriptionType,
        source: Arc<dyn EventSource<E>>,
        to_notify: fn(E) -> NotifyEvent,
    ) -> Arc<Self> {
        let subscription = Arc::new(Self {
            kind,
            target,
            source,
            to_notify,
            delivery: Mutex::new(Delivery::Pending { snapshot: None, backlog: Vec::new() }),
        });

        let weak: Weak<Self> = Arc::downgrade(&subscription);
        let listener: Listener<E> = Arc::new(move |event| {
            if let Some(subscription) = weak.upgrade() {
                subscription.on_event(event);
            }
        });

        {
            // Held across registration so an event racing the snapshot lands
            // in the backlog behind it.
            let mut delivery = subscription.lock();
            let owner = subscription.target.owner.as_deref();
            subscription.source.add_listener(owner, subscription.target.key.clone(), listener);
            let registration = Registration { source: &*subscription.source, key: &subscription.target.key };
            if let Delivery::Pending { snapshot, .. } = &mut *delivery {
                *snapshot = subscription.source.current(owner);
            }
            registration.keep();
        }
        subscription
    }

    /// Listener entry point. Runs on whatever thread the source emits from.
    pub fn on_event(&self, event: E) {
        let mut delivery = self.lock();
        match &mut *delivery {
            Delivery::Pending { backlog, .. } => backlog.push(event),
            Delivery::Live => self.push(event),
            Delivery::Closed => debug!(key = %self.target.key, "event after close dropped"),
        }
    }

    fn push(&self, event: E) {
        let envelope = Envelope::notify(self.target.key.subscription_id.clone(), (self.to_notify)(event));
        if self.target.outbound.send(envelope).is_err() {
            debug!(key = %self.target.key, "outbound closed, push dropped");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Delivery<E>> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unregisters the listener if the snapshot unwinds before the subscription
/// reaches the registry.
struct Registration<'a, E> {
    source: &'a dyn EventSource<E>,
    key: &'a ListenerKey,
}

impl<E> Registration<'_, E> {
    fn keep(self) {
        std::mem::forget(self);
    }
}

impl<E> Drop for Registration<'_, E> {
    fn drop(&mut self) {
        debug!(key = %self.key, "snapshot failed, listener removed");
        self.source.remove_listener(self.key);
    }
}

impl<E> Subscription for EventSubscription<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        &self.target.key.subscription_id
    }

    fn kind(&self) -> SubscriptionType {
        self.kind
    }

    fn activate(&self) {
        let mut delivery = self.lock();
        // Already live, or closed before activation.
        if !matches!(*delivery, Delivery::Pending { .. }) {
            return;
        }
        if let Delivery::Pending { snapshot, backlog } = std::mem::replace(&mut *delivery, Delivery::Live) {
            for event in snapshot.into_iter().chain(backlog) {
                self.push(event);
            }
        }
    }

    fn close(&self) {
        let was_closed = {
            let mut delivery = self.lock();
            matches!(std::mem::replace(&mut *delivery, Delivery::Closed), Delivery::Closed)
        };
        if !was_closed {
            self.source.remove_listener(&self.target.key);
            debug!(key = %self.target.key, kind = %self.kind, "subscription closed");
        }
    }
}

// =============================================================================
// TYPE TABLE
// =============================================================================

/// Open the subscription for `kind` against its collaborator.
pub fn open(collaborators: &Collaborators, kind: SubscriptionType, target: Target) -> Arc<dyn Subscription> {
    let c = collaborators;
    match kind {
        SubscriptionType::GetGarageLightStatus => {
            EventSubscription::<GarageLightStatus>::open(target, kind, c.garage_lights.clone(), NotifyEvent::GarageStatus)
        }
        SubscriptionType::GetGarageDoorStatus => EventSubscription::<HoermannE4Broadcast>::open(
            target,
            kind,
            c.garage_door.clone(),
            NotifyEvent::HoermannE4Broadcast,
        ),
        SubscriptionType::GetGarageVentilationStatus => EventSubscription::<GarageVentilationState>::open(
            target,
            kind,
            c.garage_ventilation.clone(),
            NotifyEvent::GarageVentilationState,
        ),
        SubscriptionType::GetUnderFloorHeaterStatus => EventSubscription::<UnderFloorHeaterStatus>::open(
            target,
            kind,
            c.heater.clone(),
            NotifyEvent::UnderFloorHeaterStatus,
        ),
        SubscriptionType::EvChargingStationEvents => EventSubscription::<EvChargingEvent>::open(
            target,
            kind,
            c.ev_charging.clone(),
            NotifyEvent::EvChargingStationEvent,
        ),
        SubscriptionType::EnvironmentSensorEvents => EventSubscription::<EnvironmentSensorEvent>::open(
            target,
            kind,
            c.sensors.clone(),
            NotifyEvent::EnvironmentSensorEvent,
        ),
        SubscriptionType::QuickStatsEvents => EventSubscription::<QuickStatsResponse>::open(
            target,
            kind,
            c.quick_stats.clone(),
            NotifyEvent::QuickStatsResponse,
        ),
        SubscriptionType::Firewall => {
            EventSubscription::<FirewallState>::open(target, kind, c.firewall.clone(), NotifyEvent::FirewallState)
        }
        SubscriptionType::EssState => {
            EventSubscription::<EssState>::open(target, kind, c.ess.clone(), NotifyEvent::EssState)
        }
    }
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
