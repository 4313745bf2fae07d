//! Error codes shared by handlers and collaborators.
//!
//! DESIGN
//! ======
//! The wire only carries a human-readable `errorMsg`. Codes exist for logs:
//! every failed request is logged with a grepable code so device faults,
//! timeouts and bad input can be told apart without parsing messages.

use protocol::RpcResponse;

use crate::services::DomainError;
use crate::sync_bridge::BridgeError;

/// Grepable error code for structured logs.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Failure of one request handler. Converted to `errorMsg` at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ErrorCode for HandlerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Domain(e) => e.error_code(),
            Self::Bridge(e) => e.error_code(),
        }
    }
}

/// Build the failed response for a typed error.
pub fn error_response(err: &(impl ErrorCode + ?Sized)) -> RpcResponse {
    RpcResponse::failed(err.to_string())
}
