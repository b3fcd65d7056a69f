//! HTTP implementation of the relay transport.
//!
//! Talks JSON to the hosted relay: `GET .../poll` long-polls with an
//! opaque cursor, `POST .../messages` publishes, `GET .../history` reads
//! back. The wire protocol itself is the relay's fixed contract; this
//! module only decodes it into [`Message`] values.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;
use crate::message::Message;
use crate::transport::{Ack, Batch, Outgoing, RelayTransport};

/// How long the relay holds a poll open before returning an empty batch.
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(25);

/// Configuration for the HTTP relay client.
#[derive(Debug, Clone)]
pub struct HttpRelayConfig {
    /// Base URL of the relay, e.g. `https://relay.example.net`.
    pub base_url: String,
    /// Optional bearer token for authenticated relays.
    pub auth_token: Option<String>,
    /// Server-side long-poll window.
    pub poll_wait: Duration,
}

impl HttpRelayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            poll_wait: DEFAULT_POLL_WAIT,
        }
    }
}

/// Relay client over reqwest.
pub struct HttpRelayTransport {
    client: reqwest::Client,
    config: HttpRelayConfig,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    user: String,
    text: String,
    timestamp: String,
    token: String,
    #[serde(default)]
    broadcast: bool,
    #[serde(default)]
    whisper_to: Option<String>,
}

impl WireMessage {
    fn into_message(self, channel: &str) -> Message {
        Message {
            channel: channel.to_string(),
            user: self.user,
            text: self.text,
            timestamp: self.timestamp,
            delivery_token: self.token,
            broadcast: self.broadcast,
            whisper_to: self.whisper_to,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PollWire {
    messages: Vec<WireMessage>,
    cursor: String,
}

#[derive(Debug, Deserialize)]
struct HistoryWire {
    messages: Vec<WireMessage>,
}

impl HttpRelayTransport {
    /// Build a client. The HTTP timeout covers one full poll window plus
    /// headroom so a healthy long-poll is never cut off mid-wait.
    pub fn new(config: HttpRelayConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.poll_wait + Duration::from_secs(10))
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client, config })
    }

    fn channel_url(&self, channel: &str, leaf: &str) -> String {
        format!(
            "{}/v1/channels/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            channel,
            leaf
        )
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn poll(&self, channel: &str, cursor: Option<&str>) -> Result<Batch, TransportError> {
        let mut query: Vec<(&str, String)> =
            vec![("wait", self.config.poll_wait.as_secs().to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .request(self.client.get(self.channel_url(channel, "poll")))
            .query(&query)
            .send()
            .await?;
        let wire: PollWire = Self::check_status(response).await?.json().await?;

        Ok(Batch {
            messages: wire
                .messages
                .into_iter()
                .map(|m| m.into_message(channel))
                .collect(),
            cursor: wire.cursor,
        })
    }

    async fn publish(&self, channel: &str, payload: &Outgoing) -> Result<Ack, TransportError> {
        let response = self
            .request(self.client.post(self.channel_url(channel, "messages")))
            .json(payload)
            .send()
            .await?;
        let ack: Ack = Self::check_status(response).await?.json().await?;
        Ok(ack)
    }

    async fn history(&self, channel: &str, count: u32) -> Result<Vec<Message>, TransportError> {
        let response = self
            .request(self.client.get(self.channel_url(channel, "history")))
            .query(&[("count", count)])
            .send()
            .await?;
        let wire: HistoryWire = Self::check_status(response).await?.json().await?;
        Ok(wire
            .messages
            .into_iter()
            .map(|m| m.into_message(channel))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url_joins_cleanly() {
        let transport =
            HttpRelayTransport::new(HttpRelayConfig::new("https://relay.example.net/")).unwrap();
        assert_eq!(
            transport.channel_url("general", "poll"),
            "https://relay.example.net/v1/channels/general/poll"
        );
    }

    #[test]
    fn test_wire_message_decodes_with_defaults() {
        let json = r#"{"user":"bob","text":"hi","timestamp":"09:15:00","token":"tk-7"}"#;
        let wire: WireMessage = serde_json::from_str(json).unwrap();
        let msg = wire.into_message("general");
        assert_eq!(msg.channel, "general");
        assert_eq!(msg.delivery_token, "tk-7");
        assert!(!msg.broadcast);
        assert!(msg.whisper_to.is_none());
    }

    #[test]
    fn test_poll_wire_decodes_batch_shape() {
        let json = r#"{
            "messages": [
                {"user":"bob","text":"one","timestamp":"09:15:00","token":"t1"},
                {"user":"eve","text":"two","timestamp":"09:15:02","token":"t2","broadcast":true}
            ],
            "cursor": "c-42"
        }"#;
        let wire: PollWire = serde_json::from_str(json).unwrap();
        assert_eq!(wire.messages.len(), 2);
        assert_eq!(wire.cursor, "c-42");
        assert!(wire.messages[1].broadcast);
    }
}
