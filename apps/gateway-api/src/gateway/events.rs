//! Wire-format frames: the inbound client envelope and outbound events.
//!
//! Both directions use the same JSON envelope: `{"event": <name>, "data":
//! <payload>}` with kebab-case event names and camelCase payload keys. The
//! outbound names are part of the wire contract and must not be renamed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A frame received from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Admission handshake; must be the first frame on every connection.
    Identify(IdentifyPayload),
    Message(MessagePayload),
    Typing,
    JoinRoom(JoinRoomPayload),
    RoomMessage(RoomMessagePayload),
}

#[derive(Debug, Default, Deserialize)]
pub struct IdentifyPayload {
    /// Bearer token in the handshake auth payload. Optional here — the
    /// query parameter and authorization header carriers may supply it.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessagePayload {
    pub room_id: String,
    pub text: String,
    /// Client-supplied display name. Ignored — the attached identity's
    /// username is authoritative.
    #[serde(default)]
    pub username: Option<String>,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A frame sent to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub event: String,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a (String, Value) pair cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Outbound event names.
pub struct EventName;

impl EventName {
    pub const WELCOME: &'static str = "welcome";
    pub const USER_JOINED: &'static str = "user-joined";
    pub const USER_LEFT: &'static str = "user-left";
    pub const USER_COUNT: &'static str = "user-count";
    pub const MESSAGE: &'static str = "message";
    pub const MESSAGE_ACK: &'static str = "message-ack";
    pub const USER_TYPING: &'static str = "user-typing";
    pub const ROOM_MESSAGE: &'static str = "room-message";
}
