//! WebSocket handler: envelope relay for one session.
//!
//! DESIGN
//! ======
//! On upgrade, opens a [`Session`] and enters a `select!` loop:
//! - Incoming text frames → one task each, so a device ack wait never
//!   holds up the next request
//! - Outbound queue → socket
//!
//! This loop is the only writer to the socket. Responses and pushes both
//! arrive through the session's outbound queue.
//!
//! The queue is unbounded. Subscription sources emit from their own threads
//! and must never block or drop, so a push never overtakes or loses an
//! earlier one for the same subscription id. A client that stops reading
//! while pushes keep coming grows the queue until the socket errors or the
//! client disconnects; the ticker pace bounds how fast that happens.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → session opened, owner taken from `?user=`
//! 2. Text frames → `Session::handle_text` on a tracked task
//! 3. Close or socket error → in-flight tasks aborted → `Session::close`

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use protocol::{Body, Envelope};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Connection owner. Authentication happens in front of the hub.
    pub user: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, params.user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, owner: Option<String>) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
    let session = Session::open(state, owner, outbound_tx);
    let mut in_flight = JoinSet::new();

    info!(session_id = %session.id(), owner = ?session.owner(), "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let session = session.clone();
                        in_flight.spawn(async move { session.handle_text(text.as_str()).await });
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(envelope) = outbound_rx.recv() => {
                if send_envelope(&mut socket, &session, &envelope).await.is_err() {
                    break;
                }
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    warn!(session_id = %session.id(), error = %e, "ws: request task failed");
                }
            }
        }
    }

    in_flight.abort_all();
    session.close();
    info!(session_id = %session.id(), "ws: client disconnected");
}

async fn send_envelope(socket: &mut WebSocket, session: &Session, envelope: &Envelope) -> Result<(), ()> {
    let json = match protocol::encode(envelope) {
        Ok(j) => j,
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "ws: failed to encode envelope");
            return Err(());
        }
    };
    match &envelope.body {
        Body::RpcResponse { rpc_response } if rpc_response.is_success() => {
            info!(session_id = %session.id(), id = %envelope.id, "ws: send response");
        }
        Body::RpcResponse { rpc_response } => {
            let message = rpc_response.error_msg().unwrap_or_default();
            warn!(session_id = %session.id(), id = %envelope.id, message, "ws: send response status=Error");
        }
        Body::Notify { notify } => {
            debug!(session_id = %session.id(), subscription_id = %notify.subscription_id, "ws: send notify");
        }
        Body::RpcRequest { .. } => {}
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
