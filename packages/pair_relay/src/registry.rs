//! Identity Registry
//!
//! Maps display names to live connections and back. Names are
//! case-sensitive and the last registration of a name wins.
//! No locking here; the [`Relay`](crate::relay::Relay) serializes access.

use std::collections::HashMap;

use crate::connection::{ConnectionHandle, ConnectionId};

struct Entry {
    conn: ConnectionHandle,
    addr: String,
}

/// What a call to [`IdentityRegistry::register`] replaced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Displaced {
    /// The connection's own previous name, if it was bound under a different one.
    pub previous_name: Option<String>,
    /// Another connection that held the requested name and is now unbound.
    pub previous_holder: Option<ConnectionId>,
}

#[derive(Default)]
pub struct IdentityRegistry {
    by_name: HashMap<String, Entry>,
    by_conn: HashMap<ConnectionId, String>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `conn`. Always succeeds.
    pub fn register(&mut self, conn: &ConnectionHandle, name: &str) -> Displaced {
        let id = conn.id();
        let mut displaced = Displaced::default();

        if let Some(old) = self.by_conn.remove(&id) {
            if old != name {
                self.by_name.remove(&old);
                displaced.previous_name = Some(old);
            }
        }

        let entry = Entry {
            conn: conn.clone(),
            addr: conn.addr().to_string(),
        };
        if let Some(prev) = self.by_name.insert(name.to_string(), entry) {
            let prev_id = prev.conn.id();
            if prev_id != id {
                self.by_conn.remove(&prev_id);
                displaced.previous_holder = Some(prev_id);
            }
        }
        self.by_conn.insert(id, name.to_string());

        displaced
    }

    pub fn resolve(&self, name: &str) -> Option<ConnectionHandle> {
        self.by_name.get(name).map(|e| e.conn.clone())
    }

    pub fn address_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|e| e.addr.as_str())
    }

    pub fn name_of(&self, id: ConnectionId) -> Option<&str> {
        self.by_conn.get(&id).map(String::as_str)
    }

    /// Drop whatever name `id` holds. Returns the name that was released.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<String> {
        let name = self.by_conn.remove(&id)?;
        if self.by_name.get(&name).is_some_and(|e| e.conn.id() == id) {
            self.by_name.remove(&name);
        }
        Some(name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
