//! Relay hub
//!
//! Owns the Identity Registry, the Pairing Table and the set of live sessions
//! behind a single lock. Every read and write of those three goes through
//! here, and the lock is never held while sending.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::RouteError;
use crate::metrics::RelayMetrics;
use crate::pairing::PairingTable;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::IdentityRegistry;
use crate::router::{Delivery, Router};

#[derive(Default)]
struct RelayState {
    registry: IdentityRegistry,
    pairings: PairingTable,
    sessions: HashMap<ConnectionId, ConnectionHandle>,
}

impl RelayState {
    fn router(&mut self) -> Router<'_> {
        Router::new(&mut self.registry, &mut self.pairings)
    }
}

pub struct Relay {
    state: Mutex<RelayState>,
    metrics: Arc<RelayMetrics>,
}

impl Relay {
    pub fn new(metrics: Arc<RelayMetrics>) -> Self {
        Self {
            state: Mutex::new(RelayState::default()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Add a freshly accepted, still unnamed connection to the session set.
    pub async fn accept(&self, conn: ConnectionHandle) {
        let id = conn.id();
        self.state.lock().await.sessions.insert(id, conn);
        self.metrics.connection_opened();
    }

    /// Decode and route one inbound text frame from `sender`.
    ///
    /// Malformed frames and unknown envelope types produce no deliveries.
    pub async fn dispatch(&self, sender: &ConnectionHandle, text: &str) -> Vec<Delivery> {
        self.metrics.envelope_received();

        let msg = match ClientMessage::decode(text) {
            Ok(ClientMessage::Unknown) => {
                debug!(conn_id = %sender.id(), "Ignoring envelope with unknown type");
                return Vec::new();
            }
            Ok(msg) => msg,
            Err(e) => {
                self.metrics.malformed_envelope();
                warn!(conn_id = %sender.id(), code = e.error_code(), "Dropping envelope: {}", e);
                return Vec::new();
            }
        };

        let kind = msg.kind();
        let mut state = self.state.lock().await;
        let mut router = state.router();
        match router.handle(sender, msg) {
            Ok(deliveries) => {
                debug!(conn_id = %sender.id(), kind, deliveries = deliveries.len(), "Envelope routed");
                if kind == "new_chat" {
                    self.metrics.chat_started();
                }
                deliveries
            }
            Err(e) => {
                self.metrics.routing_error();
                debug!(conn_id = %sender.id(), kind, code = e.error_code(), "Request rejected: {}", e);
                vec![router.reject(sender, &e)]
            }
        }
    }

    /// Tear down everything `id` held: its name, its pairing and its session
    /// entry. Returns the notice for its former partner, if any.
    pub async fn disconnect(&self, id: ConnectionId) -> Vec<Delivery> {
        let mut state = self.state.lock().await;
        if state.sessions.remove(&id).is_none() {
            return Vec::new();
        }
        self.metrics.connection_closed();
        state.router().disconnect(id)
    }

    /// Send `deliveries` on behalf of `origin`. Sends never wait on a slow
    /// client. A target that is gone or backed up loses the envelope and,
    /// for chat partners, is reported back to `origin`.
    pub fn deliver(&self, origin: &ConnectionHandle, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let kind = delivery.message.kind();
            match delivery.to.send(delivery.message) {
                Ok(()) => self.metrics.envelope_delivered(),
                Err(e) => {
                    self.metrics.envelope_dropped();
                    debug!(kind, code = e.error_code(), "Delivery failed: {}", e);
                    if let Some(name) = delivery.unreachable.filter(|_| !origin.is_closed()) {
                        info!(conn_id = %origin.id(), target = %name, "Chat partner unreachable");
                        let notice = ServerMessage::error(&RouteError::NotOnline(name), None);
                        if origin.send(notice).is_ok() {
                            self.metrics.envelope_delivered();
                        }
                    }
                }
            }
        }
    }

    pub async fn resolve(&self, name: &str) -> Option<ConnectionHandle> {
        self.state.lock().await.registry.resolve(name)
    }

    pub async fn partner_of(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .pairings
            .partner_of(name)
            .map(str::to_owned)
    }

    pub async fn name_of(&self, id: ConnectionId) -> Option<String> {
        self.state
            .lock()
            .await
            .registry
            .name_of(id)
            .map(str::to_owned)
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}
