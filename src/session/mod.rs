//! One connection's protocol state.
//!
//! ARCHITECTURE
//! ============
//! A `Session` owns the subscription registry and the outbound queue of one
//! connection. The transport feeds it inbound text and drains the queue; the
//! session never touches the socket. Everything written to the client, both
//! responses and pushes, goes through [`Session::send`].
//!
//! Inbound frames may be handled concurrently. The registry is the only
//! shared mutable state and is guarded by a mutex that is never held across
//! an await.
//!
//! LIFECYCLE
//! =========
//! 1. `open` → empty registry
//! 2. `handle_text` per frame → dispatch → response (+ activation)
//! 3. `close` → every subscription closed, registry refuses new ones

pub mod dispatch;
pub mod registry;
pub mod subscription;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use protocol::{Envelope, Inbound, RpcResponse, Subscribe};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::ListenerKey;
use crate::state::AppState;
use dispatch::Outcome;
use registry::{Opened, SubscriptionRegistry};
use subscription::Target;

/// Writer side of a connection's outbound queue.
pub type Outbound = mpsc::UnboundedSender<Envelope>;

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    owner: Option<String>,
    state: AppState,
    outbound: Outbound,
    registry: Mutex<SubscriptionRegistry>,
}

impl Session {
    #[must_use]
    pub fn open(state: AppState, owner: Option<String>, outbound: Outbound) -> Self {
        let id = Uuid::new_v4();
        debug!(session_id = %id, owner = ?owner, "session opened");
        Self {
            inner: Arc::new(SessionInner {
                id,
                owner,
                state,
                outbound,
                registry: Mutex::new(SubscriptionRegistry::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.inner.owner.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.inner.state
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.registry().len()
    }

    /// Handle one inbound text frame.
    ///
    /// Unreadable envelopes and non-request kinds are dropped. A request whose
    /// payload does not fit its tag is answered with `errorMsg`; every other
    /// request goes through dispatch.
    pub async fn handle_text(&self, text: &str) {
        let (id, request) = match protocol::decode_inbound(text) {
            Ok(Inbound::Request { id, request }) => (id, request),
            Ok(Inbound::Ignored { id, kind }) => {
                debug!(session_id = %self.id(), %id, ?kind, "ignoring non-request envelope");
                return;
            }
            Err(e) => {
                warn!(session_id = %self.id(), error = %e, "dropping malformed envelope");
                return;
            }
        };

        let request = match request {
            Ok(request) => request,
            Err(e) => {
                warn!(session_id = %self.id(), %id, code = "E_INVALID_REQUEST", error = %e, "invalid request");
                self.send(Envelope::response(id, RpcResponse::failed(format!("invalid request: {e}"))));
                return;
            }
        };

        match dispatch::dispatch(self, request).await {
            Outcome::Reply(response) => self.send(Envelope::response(id, response)),
            Outcome::ReplyThenActivate(response, subscription) => {
                self.send(Envelope::response(id, response));
                subscription.activate();
            }
        }
    }

    /// Queue an envelope for the connection writer.
    pub fn send(&self, envelope: Envelope) {
        if self.inner.outbound.send(envelope).is_err() {
            debug!(session_id = %self.id(), "outbound closed, envelope dropped");
        }
    }

    /// Subscribe handler. A repeat for an active id is a no-op success.
    pub(crate) fn subscribe(&self, subscribe: &Subscribe) -> Outcome {
        let Subscribe { subscription_id, kind } = subscribe;
        let opened = self.registry().get_or_open(subscription_id, || {
            let target = Target {
                key: ListenerKey::new(self.id(), subscription_id.clone()),
                owner: self.inner.owner.clone(),
                outbound: self.inner.outbound.clone(),
            };
            subscription::open(&self.state().collaborators, *kind, target)
        });

        let created = RpcResponse::from(protocol::ResponseBody::SubscriptionCreated(true));
        match opened {
            Ok(Opened::Created(subscription)) => {
                info!(session_id = %self.id(), %subscription_id, %kind, "subscription created");
                Outcome::ReplyThenActivate(created, subscription)
            }
            Ok(Opened::Existing) => {
                info!(session_id = %self.id(), %subscription_id, %kind, "subscription already active, keeping it");
                Outcome::Reply(created)
            }
            Err(e) => Outcome::Reply(RpcResponse::failed(e.to_string())),
        }
    }

    /// Remove one subscription. Absent ids are fine.
    pub(crate) fn unsubscribe(&self, subscription_id: &str) -> bool {
        let removed = self.registry().remove(subscription_id);
        debug!(session_id = %self.id(), %subscription_id, removed, "unsubscribe");
        removed
    }

    /// Tear down every subscription. Idempotent.
    pub fn close(&self) {
        let closed = self.registry().close_all();
        info!(session_id = %self.id(), closed, "session closed");
    }

    fn registry(&self) -> MutexGuard<'_, SubscriptionRegistry> {
        self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
