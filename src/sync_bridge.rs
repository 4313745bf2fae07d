//! Bounded wait on a device acknowledgement.
//!
//! DESIGN
//! ======
//! Some collaborators report the outcome of a write through a callback fired
//! when the device acknowledges. A request handler hands the collaborator an
//! [`Ack`] and awaits it with a deadline. The wait is a future, so no worker
//! is parked while the device is silent.
//!
//! - First completion wins; later completions are dropped.
//! - Timeout and abandonment are errors, never a `false` result.
//! - Dropping the waiting future cancels the wait. The device operation is not
//!   rolled back and a late acknowledgement is discarded.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{target} did not acknowledge within {timeout_ms}ms")]
    Timeout { target: &'static str, timeout_ms: u64 },
    #[error("{target} dropped the command without acknowledging")]
    Abandoned { target: &'static str },
}

impl ErrorCode for BridgeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "E_ACK_TIMEOUT",
            Self::Abandoned { .. } => "E_ACK_ABANDONED",
        }
    }
}

/// Completion handle passed to a collaborator. Cheap to clone.
#[derive(Clone)]
pub struct Ack {
    slot: Arc<Mutex<Option<oneshot::Sender<bool>>>>,
}

impl Ack {
    fn new(tx: oneshot::Sender<bool>) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(tx))) }
    }

    /// Report the device outcome. Only the first call has an effect.
    pub fn complete(&self, ok: bool) {
        let tx = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                if tx.send(ok).is_err() {
                    debug!(ok, "ack arrived after the waiter gave up");
                }
            }
            None => debug!(ok, "duplicate ack ignored"),
        }
    }

    /// Whether an outcome has already been reported.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

/// Issue a callback-based command and wait at most `deadline` for its ack.
///
/// `send` receives the [`Ack`] and must arrange for `complete` to be called
/// once the device answers. It may complete synchronously.
///
/// # Errors
///
/// [`BridgeError::Timeout`] when no ack arrives in time, and
/// [`BridgeError::Abandoned`] when every `Ack` is dropped unanswered.
pub async fn call<F>(target: &'static str, deadline: Duration, send: F) -> Result<bool, BridgeError>
where
    F: FnOnce(Ack),
{
    let (tx, rx) = oneshot::channel();
    send(Ack::new(tx));

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(ok)) => Ok(ok),
        Ok(Err(_)) => Err(BridgeError::Abandoned { target }),
        Err(_) => Err(BridgeError::Timeout {
            target,
            timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
#[path = "sync_bridge_test.rs"]
mod tests;
