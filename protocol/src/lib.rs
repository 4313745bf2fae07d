//! Shared envelope model and JSON codec for the hub websocket.
//!
//! This crate owns the wire representation used by the hub server and any
//! Rust client. One connection carries three kinds of envelope: requests from
//! the client, correlated responses from the hub, and pushes for active
//! subscriptions.
//!
//! DESIGN
//! ======
//! The request and response payloads are true sum types: a tag selects exactly
//! one payload shape, so "exactly one field populated" is enforced by serde
//! instead of by convention.

pub mod domain;
pub mod notify;
pub mod rpc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use notify::{Notify, NotifyEvent, Subscribe, SubscriptionType, Unsubscribe};
pub use rpc::{ResponseBody, RpcRequest, RpcResponse};

/// Error returned by [`decode_inbound`] and [`encode`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not a JSON envelope with a readable `id` and `kind`.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// `kind` is `rpcRequest` but the `rpcRequest` body is missing.
    #[error("rpcRequest body missing")]
    MissingRequest,
    /// The request body does not match the contract of its `type` tag.
    #[error("{0}")]
    InvalidRequest(#[source] serde_json::Error),
    /// An outbound envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Discriminator of the envelope body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    RpcRequest,
    RpcResponse,
    Notify,
}

/// Top-level wire message. `id` correlates a response with its request; pushes
/// carry a fresh id each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(flatten)]
    pub body: Body,
}

/// Exactly one of request, response or push.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Body {
    RpcRequest { rpc_request: RpcRequest },
    RpcResponse { rpc_response: RpcResponse },
    Notify { notify: Notify },
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(id: impl Into<String>, request: RpcRequest) -> Self {
        Self { id: id.into(), body: Body::RpcRequest { rpc_request: request } }
    }

    /// Build the response to the request carrying `id`.
    pub fn response(id: impl Into<String>, response: RpcResponse) -> Self {
        Self { id: id.into(), body: Body::RpcResponse { rpc_response: response } }
    }

    /// Build a push for one subscription. Every push gets a fresh id.
    pub fn notify(subscription_id: impl Into<String>, event: NotifyEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            body: Body::Notify { notify: Notify { subscription_id: subscription_id.into(), event } },
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self.body {
            Body::RpcRequest { .. } => Kind::RpcRequest,
            Body::RpcResponse { .. } => Kind::RpcResponse,
            Body::Notify { .. } => Kind::Notify,
        }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Result of the first decoding phase.
#[derive(Debug)]
pub enum Inbound {
    /// A request envelope. The payload is parsed separately so a bad payload
    /// can still be answered under the envelope id.
    Request { id: String, request: Result<RpcRequest, CodecError> },
    /// A response or push sent by the client. The hub ignores these.
    Ignored { id: String, kind: Kind },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    id: String,
    kind: Kind,
    #[serde(default)]
    rpc_request: Option<Value>,
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when the text is not JSON or lacks a
/// readable `id` / `kind`. Payload errors are reported inside
/// [`Inbound::Request`] instead.
pub fn decode_inbound(text: &str) -> Result<Inbound, CodecError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(CodecError::Malformed)?;
    if raw.kind != Kind::RpcRequest {
        return Ok(Inbound::Ignored { id: raw.id, kind: raw.kind });
    }
    let request = match raw.rpc_request {
        Some(value) => serde_json::from_value(value).map_err(CodecError::InvalidRequest),
        None => Err(CodecError::MissingRequest),
    };
    Ok(Inbound::Request { id: raw.id, request })
}

/// Encode an envelope as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if a payload fails to serialize.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Encode)
}

/// Decode any envelope, including responses and pushes. Used by clients.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for text that is not a valid envelope.
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Malformed)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
