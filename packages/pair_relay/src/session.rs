//! Session Supervisor
//!
//! Drives one connection from accept to teardown. The inbound side is any
//! stream of [`Frame`]s, so the same loop serves a real WebSocket and an
//! in-process channel.

use futures::stream::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::relay::Relay;

/// Transport-neutral view of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Binary, ping and pong frames. Not part of the protocol.
    Ignored,
    Close,
}

/// Run the session for `conn` until the client closes or the transport fails.
/// Registry and pairing state held by `conn` is released on the way out.
pub async fn run_session<S, E>(relay: Arc<Relay>, conn: ConnectionHandle, mut inbound: S)
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let conn_id = conn.id();
    info!(conn_id = %conn_id, addr = %conn.addr(), "Client connected");
    relay.accept(conn.clone()).await;

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(Frame::Text(text)) => {
                let deliveries = relay.dispatch(&conn, &text).await;
                relay.deliver(&conn, deliveries);
            }
            Ok(Frame::Ignored) => {
                debug!(conn_id = %conn_id, "Ignoring non-text frame");
            }
            Ok(Frame::Close) => {
                debug!(conn_id = %conn_id, "Close frame received");
                break;
            }
            Err(e) => {
                warn!(conn_id = %conn_id, "Transport error: {}", e);
                break;
            }
        }
    }

    let name = relay.name_of(conn_id).await;
    let notices = relay.disconnect(conn_id).await;
    relay.deliver(&conn, notices);
    info!(
        conn_id = %conn_id,
        addr = %conn.addr(),
        name = name.as_deref().unwrap_or("-"),
        "Client disconnected"
    );
}
