//! WebSocket Protocol Types
//!
//! JSON envelopes exchanged with browser clients. Every envelope is an object
//! tagged by its `type` field.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, RouteError};

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind a display name to this connection.
    Register { name: String },

    /// Chat text for the current partner; the sender is implied by the
    /// connection's bound name.
    Message { message: String },

    /// Ask to be paired with the client registered as `target`.
    NewChat { target: String },

    /// Any `type` this server does not know about. Kept so newer clients
    /// can talk to older servers.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        if !object.get("type").is_some_and(|t| t.is_string()) {
            return Err(ProtocolError::MissingType);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Message { .. } => "message",
            Self::NewChat { .. } => "new_chat",
            Self::Unknown => "unknown",
        }
    }
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A pairing was created; `with` is the partner's name and `ip` its address.
    StartChat { with: String, ip: String },

    /// Chat text, echoed identically to both participants.
    Message { sender: String, message: String },

    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(err: &RouteError, sender: Option<String>) -> Self {
        Self::Error {
            message: err.to_string(),
            sender,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartChat { .. } => "start_chat",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
        }
    }
}
