//! WebSocket transport
//!
//! Upgrades `/ws`, pumps the connection's outbound queue into the socket and
//! feeds inbound frames to the session supervisor.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tracing::{debug, error};

use crate::AppState;
use crate::connection::ChannelConnection;
use crate::session::{Frame, run_session};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, addr, state))
}

pub async fn handle_websocket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let (mut ws_sender, ws_receiver) = socket.split();

    let (conn, mut outbound_rx) =
        ChannelConnection::new(addr.ip().to_string(), state.outbound_buffer);
    let conn = conn.into_handle();
    let conn_id = conn.id();

    // Task to send queued envelopes to the WebSocket
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                debug!(conn_id = %conn_id, "WebSocket send failed, closing writer");
                break;
            }
        }
    });

    let inbound = ws_receiver.map(|msg| {
        msg.map(|msg| match msg {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Close(_) => Frame::Close,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => Frame::Ignored,
        })
    });

    run_session(state.relay.clone(), conn, inbound).await;

    // Cleanup
    sender_task.abort();
}
