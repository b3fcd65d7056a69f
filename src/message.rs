//! The relay message record and ingress validation.
//!
//! Messages are immutable: created by the transport layer on receipt (the
//! relay assigns the `delivery_token`) or by the send path just before
//! transmission (the token comes from the publish ack). They are never
//! mutated, and deleted only by an explicit channel wipe.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// User name reserved for join/leave announcements and other relay
/// housekeeping traffic.
pub const SYSTEM_USER: &str = "SYSTEM";

/// Maximum message length enforced at the ingress boundary.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Names nobody may log in as (spoof prevention).
const RESERVED_USERNAMES: &[&str] = &["SYSTEM", "ADMIN", "ROOT", "SERVER", "MODERATOR"];

/// A single chat message as it flows through the relay engine.
///
/// `delivery_token` is opaque and transport-assigned, globally unique per
/// logical delivery. Per channel it is the sole deduplication key: retried
/// or replayed deliveries carry the same token and must not create a
/// second history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub user: String,
    pub text: String,
    /// Display-formatted local time (`HH:MM:SS`).
    pub timestamp: String,
    pub delivery_token: String,
    #[serde(default)]
    pub broadcast: bool,
    /// Addressee of a `/whisper`; fanned out on the channel like any other
    /// message, filtered client-side at display time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_to: Option<String>,
}

impl Message {
    /// Whether this is a SYSTEM announcement (join/leave etc.).
    pub fn is_system(&self) -> bool {
        self.user == SYSTEM_USER
    }
}

/// Current local time formatted for display, `HH:MM:SS`.
pub fn display_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Validate a username at login or `/nick` time.
///
/// Rejects empty names, reserved system names (case-insensitive), and
/// names containing control characters.
pub fn validate_username(name: &str) -> Result<(), InputError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InputError::EmptyUsername);
    }
    let upper = name.to_uppercase();
    if RESERVED_USERNAMES.contains(&upper.as_str()) {
        return Err(InputError::ReservedUsername(name.to_string()));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(InputError::InvalidUsername);
    }
    Ok(())
}

/// Normalize and validate a channel name from user input.
///
/// Strips a leading `#`, then requires a non-empty name of visible,
/// whitespace-free characters.
pub fn normalize_channel(raw: &str) -> Result<String, InputError> {
    let name = raw.trim().trim_start_matches('#');
    if name.is_empty()
        || name.chars().any(|c| c.is_whitespace() || c.is_control())
        || name.contains('#')
    {
        return Err(InputError::InvalidChannelName(raw.trim().to_string()));
    }
    Ok(name.to_string())
}

/// Enforce the ingress message length cap.
pub fn validate_message_text(text: &str) -> Result<(), InputError> {
    let length = text.chars().count();
    if length > MAX_MESSAGE_LEN {
        return Err(InputError::MessageTooLong {
            length,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}
