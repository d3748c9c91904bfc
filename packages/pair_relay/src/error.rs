//! Error types for envelope decoding, routing and delivery.

use crate::connection::ConnectionId;

/// An inbound text frame that could not be turned into a [`ClientMessage`].
///
/// These are recoverable per-message failures: the frame is dropped and the
/// session keeps reading.
///
/// [`ClientMessage`]: crate::protocol::ClientMessage
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope has no string `type` field")]
    MissingType,
}

impl ProtocolError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
        }
    }
}

/// A request that was well-formed but cannot be honoured in the current
/// registry/pairing state. The `Display` text is what the client sees in
/// the `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Register a name before starting a chat.")]
    NotRegistered,

    #[error("User '{0}' is not online.")]
    NotOnline(String),

    #[error("You're not in a chat.")]
    NotInChat,

    #[error("'{0}' has left the chat.")]
    PartnerLeft(String),
}

impl RouteError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::NotOnline(_) => "not_online",
            Self::NotInChat => "not_in_chat",
            Self::PartnerLeft(_) => "partner_left",
        }
    }
}

/// An envelope could not be queued for a connection. Sends never wait, so a
/// client that stops reading loses envelopes instead of stalling others.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("outbound queue of connection {0} is full")]
    Full(ConnectionId),
}

impl SendError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::Closed(_) => "closed",
            Self::Full(_) => "queue_full",
        }
    }
}
