//! Relay transport seam.
//!
//! The hosted relay is an external collaborator with a fixed interface:
//! subscribe-style long polling per channel with an opaque continuation
//! cursor, fire-and-forget publishes acknowledged with a delivery token,
//! and bounded history reads. [`RelayTransport`] is that interface; the
//! production implementation is [`http::HttpRelayTransport`], and tests
//! substitute scripted in-memory transports.
//!
//! The transport may duplicate deliveries across retries and reconnects.
//! Callers must not assume otherwise: dedup belongs to the history store.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::message::{Message, SYSTEM_USER};

/// One decoded long-poll result: zero or more messages plus the cursor to
/// resume from. The cursor only becomes "confirmed" once the caller has
/// successfully handed the batch downstream.
#[derive(Debug, Clone)]
pub struct Batch {
    pub messages: Vec<Message>,
    pub cursor: String,
}

/// Acknowledgement of a publish. The token is the delivery token the relay
/// will attach to the echoed message, which lets the send path persist
/// immediately and dedup the echo.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    pub token: String,
    pub timestamp: String,
}

/// Payload for a publish, as the relay accepts it.
#[derive(Debug, Clone, Serialize)]
pub struct Outgoing {
    pub user: String,
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub broadcast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper_to: Option<String>,
}

impl Outgoing {
    /// An ordinary chat message.
    pub fn chat(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            broadcast: false,
            whisper_to: None,
        }
    }

    /// A broadcast copy of a chat message.
    pub fn broadcast(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            broadcast: true,
            ..Self::chat(user, text)
        }
    }

    /// A whisper addressed to one user.
    pub fn whisper(
        user: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            whisper_to: Some(to.into()),
            ..Self::chat(user, text)
        }
    }

    /// A SYSTEM announcement (join/leave).
    pub fn system(text: impl Into<String>) -> Self {
        Self::chat(SYSTEM_USER, text)
    }
}

/// The relay service contract consumed by the synchronization engine.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Long-poll one channel from `cursor` (`None` means "from now").
    /// Blocks up to the relay's wait window; an empty batch with a fresh
    /// cursor is a normal outcome.
    async fn poll(&self, channel: &str, cursor: Option<&str>) -> Result<Batch, TransportError>;

    /// Publish a payload to a channel. Success means the relay accepted
    /// it, nothing more; local persistence is the caller's job.
    async fn publish(&self, channel: &str, payload: &Outgoing) -> Result<Ack, TransportError>;

    /// Fetch the latest `count` messages of remote history, oldest first.
    async fn history(&self, channel: &str, count: u32) -> Result<Vec<Message>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_chat_serializes_minimal() {
        let json = serde_json::to_value(Outgoing::chat("alice", "hi")).unwrap();
        assert_eq!(json["user"], "alice");
        assert_eq!(json["text"], "hi");
        // Absent flags stay off the wire.
        assert!(json.get("broadcast").is_none());
        assert!(json.get("whisper_to").is_none());
    }

    #[test]
    fn test_outgoing_broadcast_flag_on_wire() {
        let json = serde_json::to_value(Outgoing::broadcast("alice", "all hands")).unwrap();
        assert_eq!(json["broadcast"], true);
    }

    #[test]
    fn test_outgoing_whisper_addressee_on_wire() {
        let json = serde_json::to_value(Outgoing::whisper("alice", "bob", "psst")).unwrap();
        assert_eq!(json["whisper_to"], "bob");
    }

    #[test]
    fn test_outgoing_system_uses_reserved_user() {
        let payload = Outgoing::system("alice has joined");
        assert_eq!(payload.user, SYSTEM_USER);
    }
}
