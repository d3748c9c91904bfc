//! Router
//!
//! The protocol state machine. A connection is UNBOUND until it registers a
//! name, BOUND once it has one and PAIRED while the Pairing Table lists a
//! partner for that name. Each inbound envelope is validated against the
//! registry and pairing state and turned into a list of [`Delivery`]s; the
//! caller sends them once the state lock is released.

use std::fmt;
use tracing::{debug, info};

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::RouteError;
use crate::pairing::PairingTable;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::IdentityRegistry;

/// One outbound envelope and the connection it goes to.
pub struct Delivery {
    pub to: ConnectionHandle,
    pub message: ServerMessage,
    /// Name to report back to the originating connection as not online if
    /// this send fails. Set for deliveries to a chat partner.
    pub unreachable: Option<String>,
}

impl Delivery {
    pub fn to(to: &ConnectionHandle, message: ServerMessage) -> Self {
        Self {
            to: to.clone(),
            message,
            unreachable: None,
        }
    }

    fn to_partner(to: &ConnectionHandle, message: ServerMessage, partner: &str) -> Self {
        Self {
            to: to.clone(),
            message,
            unreachable: Some(partner.to_string()),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("to", &self.to.id())
            .field("message", &self.message)
            .field("unreachable", &self.unreachable)
            .finish()
    }
}

pub struct Router<'a> {
    registry: &'a mut IdentityRegistry,
    pairings: &'a mut PairingTable,
}

impl<'a> Router<'a> {
    pub fn new(registry: &'a mut IdentityRegistry, pairings: &'a mut PairingTable) -> Self {
        Self { registry, pairings }
    }

    /// Apply one envelope from `sender`.
    pub fn handle(
        &mut self,
        sender: &ConnectionHandle,
        msg: ClientMessage,
    ) -> Result<Vec<Delivery>, RouteError> {
        match msg {
            ClientMessage::Register { name } => Ok(self.register(sender, &name)),
            ClientMessage::NewChat { target } => self.new_chat(sender, target),
            ClientMessage::Message { message } => self.message(sender, message),
            ClientMessage::Unknown => Ok(Vec::new()),
        }
    }

    /// The `error` envelope that reports `err` to `sender`.
    pub fn reject(&self, sender: &ConnectionHandle, err: &RouteError) -> Delivery {
        let label = match err {
            RouteError::NotInChat => self.registry.name_of(sender.id()).map(str::to_owned),
            _ => None,
        };
        Delivery::to(sender, ServerMessage::error(err, label))
    }

    /// Release everything `id` held. Returns the notice for its former
    /// partner, if it had one.
    pub fn disconnect(&mut self, id: ConnectionId) -> Vec<Delivery> {
        match self.registry.unregister(id) {
            Some(name) => self.end_chat(&name),
            None => Vec::new(),
        }
    }

    fn register(&mut self, sender: &ConnectionHandle, name: &str) -> Vec<Delivery> {
        // Chats end while both names still resolve to their current holders,
        // so partner notices reach the right connections.
        let mut deliveries = Vec::new();
        let old_name = self
            .registry
            .name_of(sender.id())
            .filter(|old| *old != name)
            .map(str::to_owned);
        if let Some(old) = &old_name {
            deliveries.extend(self.end_chat(old));
        }
        let taken = self
            .registry
            .resolve(name)
            .is_some_and(|holder| holder.id() != sender.id());
        if taken {
            deliveries.extend(self.end_chat(name));
        }

        let displaced = self.registry.register(sender, name);
        info!(conn_id = %sender.id(), addr = %sender.addr(), name = %name, "Name registered");
        if let Some(old) = displaced.previous_name {
            debug!(conn_id = %sender.id(), old = %old, name = %name, "Connection renamed");
        }
        if let Some(holder) = displaced.previous_holder {
            info!(name = %name, displaced = %holder, "Name taken over by another connection");
        }
        deliveries
    }

    fn new_chat(
        &mut self,
        sender: &ConnectionHandle,
        target: String,
    ) -> Result<Vec<Delivery>, RouteError> {
        let initiator = self
            .registry
            .name_of(sender.id())
            .map(str::to_owned)
            .ok_or(RouteError::NotRegistered)?;
        let target_conn = self
            .registry
            .resolve(&target)
            .ok_or_else(|| RouteError::NotOnline(target.clone()))?;

        let mut deliveries = Vec::new();
        for name in [&initiator, &target] {
            if let Some(old) = self.pairings.partner_of(name) {
                if old != initiator && old != target {
                    let old = old.to_string();
                    deliveries.extend(self.notify_left(&old, name));
                }
            }
        }
        self.pairings.pair(&initiator, &target);

        info!(
            initiator = %initiator,
            initiator_addr = %sender.addr(),
            target = %target,
            target_addr = %target_conn.addr(),
            "Chat started"
        );

        deliveries.push(Delivery::to(
            sender,
            ServerMessage::StartChat {
                with: target.clone(),
                ip: target_conn.addr().to_string(),
            },
        ));
        if target_conn.id() != sender.id() {
            deliveries.push(Delivery::to_partner(
                &target_conn,
                ServerMessage::StartChat {
                    with: initiator,
                    ip: sender.addr().to_string(),
                },
                &target,
            ));
        }
        Ok(deliveries)
    }

    fn message(
        &mut self,
        sender: &ConnectionHandle,
        text: String,
    ) -> Result<Vec<Delivery>, RouteError> {
        let name = self
            .registry
            .name_of(sender.id())
            .ok_or(RouteError::NotInChat)?;
        let partner = self
            .pairings
            .partner_of(name)
            .ok_or(RouteError::NotInChat)?;
        let partner_conn = self
            .registry
            .resolve(partner)
            .ok_or_else(|| RouteError::NotOnline(partner.to_string()))?;

        debug!(sender = %name, partner = %partner, len = text.len(), "Relaying message");

        let payload = ServerMessage::Message {
            sender: name.to_string(),
            message: text,
        };
        let mut deliveries = vec![Delivery::to(sender, payload.clone())];
        if partner_conn.id() != sender.id() {
            deliveries.push(Delivery::to_partner(&partner_conn, payload, partner));
        }
        Ok(deliveries)
    }

    /// Drop the pairing of `name` and tell its partner.
    fn end_chat(&mut self, name: &str) -> Vec<Delivery> {
        match self.pairings.unregister_all(name) {
            Some(partner) if partner != name => {
                debug!(name = %name, partner = %partner, "Chat ended");
                self.notify_left(&partner, name)
            }
            _ => Vec::new(),
        }
    }

    fn notify_left(&self, recipient: &str, left: &str) -> Vec<Delivery> {
        self.registry
            .resolve(recipient)
            .map(|conn| {
                Delivery::to(
                    &conn,
                    ServerMessage::error(&RouteError::PartnerLeft(left.to_string()), None),
                )
            })
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ChannelConnection;

    struct Fixture {
        registry: IdentityRegistry,
        pairings: PairingTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: IdentityRegistry::new(),
                pairings: PairingTable::new(),
            }
        }

        fn handle(
            &mut self,
            sender: &ConnectionHandle,
            msg: ClientMessage,
        ) -> Result<Vec<Delivery>, RouteError> {
            Router::new(&mut self.registry, &mut self.pairings).handle(sender, msg)
        }

        fn register(&mut self, sender: &ConnectionHandle, name: &str) {
            self.handle(
                sender,
                ClientMessage::Register {
                    name: name.to_string(),
                },
            )
            .unwrap();
        }
    }

    fn conn(addr: &str) -> ConnectionHandle {
        let (conn, _rx) = ChannelConnection::new(addr, 1);
        conn.into_handle()
    }

    fn new_chat(target: &str) -> ClientMessage {
        ClientMessage::NewChat {
            target: target.to_string(),
        }
    }

    fn text(message: &str) -> ClientMessage {
        ClientMessage::Message {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_register_produces_no_output() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let out = fx
            .handle(
                &alice,
                ClientMessage::Register {
                    name: "Alice".to_string(),
                },
            )
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(fx.registry.name_of(alice.id()), Some("Alice"));
    }

    #[test]
    fn test_new_chat_pairs_both_and_notifies_both() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");

        let out = fx.handle(&alice, new_chat("Bob")).unwrap();

        assert_eq!(fx.pairings.partner_of("Alice"), Some("Bob"));
        assert_eq!(fx.pairings.partner_of("Bob"), Some("Alice"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to.id(), alice.id());
        assert_eq!(
            out[0].message,
            ServerMessage::StartChat {
                with: "Bob".to_string(),
                ip: "10.0.0.2".to_string()
            }
        );
        assert_eq!(out[1].to.id(), bob.id());
        assert_eq!(
            out[1].message,
            ServerMessage::StartChat {
                with: "Alice".to_string(),
                ip: "10.0.0.1".to_string()
            }
        );
        assert_eq!(out[1].unreachable.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_new_chat_unknown_target() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        fx.register(&alice, "Alice");

        let err = fx.handle(&alice, new_chat("Bob")).unwrap_err();
        assert_eq!(err, RouteError::NotOnline("Bob".to_string()));
        assert!(fx.pairings.is_empty());

        let rejection = Router::new(&mut fx.registry, &mut fx.pairings).reject(&alice, &err);
        assert_eq!(rejection.to.id(), alice.id());
        assert_eq!(
            rejection.message,
            ServerMessage::Error {
                message: "User 'Bob' is not online.".to_string(),
                sender: None
            }
        );
    }

    #[test]
    fn test_new_chat_requires_registration() {
        let mut fx = Fixture::new();
        let anon = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&bob, "Bob");

        let err = fx.handle(&anon, new_chat("Bob")).unwrap_err();
        assert_eq!(err, RouteError::NotRegistered);
        assert!(fx.pairings.is_empty());
    }

    #[test]
    fn test_message_echoes_to_sender_and_partner() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        let out = fx.handle(&alice, text("hi")).unwrap();
        let expected = ServerMessage::Message {
            sender: "Alice".to_string(),
            message: "hi".to_string(),
        };
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to.id(), alice.id());
        assert_eq!(out[1].to.id(), bob.id());
        assert!(out.iter().all(|d| d.message == expected));
    }

    #[test]
    fn test_message_without_partner() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        fx.register(&alice, "Alice");

        let err = fx.handle(&alice, text("hi")).unwrap_err();
        assert_eq!(err, RouteError::NotInChat);

        let rejection = Router::new(&mut fx.registry, &mut fx.pairings).reject(&alice, &err);
        assert_eq!(
            rejection.message,
            ServerMessage::Error {
                message: "You're not in a chat.".to_string(),
                sender: Some("Alice".to_string())
            }
        );

        // Unbound sender gets the same error without a label
        let anon = conn("10.0.0.3");
        let err = fx.handle(&anon, text("hi")).unwrap_err();
        let rejection = Router::new(&mut fx.registry, &mut fx.pairings).reject(&anon, &err);
        assert_eq!(
            rejection.message,
            ServerMessage::Error {
                message: "You're not in a chat.".to_string(),
                sender: None
            }
        );
    }

    #[test]
    fn test_self_chat_delivers_once() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        fx.register(&alice, "Alice");

        let out = fx.handle(&alice, new_chat("Alice")).unwrap();
        assert_eq!(out.len(), 1);

        let out = fx.handle(&alice, text("echo")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to.id(), alice.id());
    }

    #[test]
    fn test_disconnect_clears_pairing_and_notifies_partner() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        let out = Router::new(&mut fx.registry, &mut fx.pairings).disconnect(bob.id());

        assert!(fx.registry.resolve("Bob").is_none());
        assert!(fx.pairings.partner_of("Alice").is_none());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to.id(), alice.id());
        assert_eq!(
            out[0].message,
            ServerMessage::Error {
                message: "'Bob' has left the chat.".to_string(),
                sender: None
            }
        );

        let err = fx.handle(&alice, new_chat("Bob")).unwrap_err();
        assert_eq!(err, RouteError::NotOnline("Bob".to_string()));
    }

    #[test]
    fn test_rename_mid_chat_ends_chat() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        let out = fx
            .handle(
                &alice,
                ClientMessage::Register {
                    name: "Alicia".to_string(),
                },
            )
            .unwrap();

        assert!(fx.pairings.is_empty());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to.id(), bob.id());
        assert_eq!(
            fx.handle(&alice, text("still there?")).unwrap_err(),
            RouteError::NotInChat
        );
    }

    #[test]
    fn test_reregister_same_name_keeps_chat() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        fx.register(&alice, "Alice");
        assert_eq!(fx.pairings.partner_of("Alice"), Some("Bob"));
    }

    #[test]
    fn test_name_takeover_ends_previous_holders_chat() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        let impostor = conn("10.0.0.3");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        let out = fx
            .handle(
                &impostor,
                ClientMessage::Register {
                    name: "Alice".to_string(),
                },
            )
            .unwrap();

        assert_eq!(fx.registry.resolve("Alice").unwrap().id(), impostor.id());
        assert!(fx.pairings.partner_of("Bob").is_none());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to.id(), bob.id());
        // The displaced connection is back to unbound
        assert_eq!(
            fx.handle(&alice, new_chat("Bob")).unwrap_err(),
            RouteError::NotRegistered
        );
    }

    #[test]
    fn test_rename_to_partners_name_notifies_partner() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        let out = fx
            .handle(
                &alice,
                ClientMessage::Register {
                    name: "Bob".to_string(),
                },
            )
            .unwrap();

        assert!(fx.pairings.is_empty());
        assert_eq!(fx.registry.resolve("Bob").unwrap().id(), alice.id());
        assert!(fx.registry.name_of(bob.id()).is_none());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to.id(), bob.id());
        assert_eq!(
            out[0].message,
            ServerMessage::Error {
                message: "'Alice' has left the chat.".to_string(),
                sender: None
            }
        );
    }

    #[test]
    fn test_new_chat_frees_and_notifies_former_partner() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        let bob = conn("10.0.0.2");
        let carol = conn("10.0.0.3");
        fx.register(&alice, "Alice");
        fx.register(&bob, "Bob");
        fx.register(&carol, "Carol");
        fx.handle(&alice, new_chat("Bob")).unwrap();

        let out = fx.handle(&carol, new_chat("Alice")).unwrap();

        assert_eq!(fx.pairings.partner_of("Alice"), Some("Carol"));
        assert!(fx.pairings.partner_of("Bob").is_none());
        // Bob is told, then both new participants get start_chat
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].to.id(), bob.id());
        assert_eq!(out[0].message.kind(), "error");
        assert_eq!(out[1].message.kind(), "start_chat");
        assert_eq!(out[2].message.kind(), "start_chat");
    }

    #[test]
    fn test_unknown_is_ignored() {
        let mut fx = Fixture::new();
        let alice = conn("10.0.0.1");
        assert!(fx.handle(&alice, ClientMessage::Unknown).unwrap().is_empty());
    }
}
