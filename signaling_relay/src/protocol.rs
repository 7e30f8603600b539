//! Wire format spoken between peers and the relay
//!
//! Every frame is a JSON object discriminated by its `type` field. The relay
//! only interprets `join-room`; any other object is forwarded untouched to
//! the rest of the sender's room. The relay itself emits two notifications,
//! `new-peer` and `peer-left`, modelled by [`PeerEvent`].

use crate::error::ClientRequestError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// `type` of the control message that places a connection in a room
pub const JOIN_ROOM: &str = "join-room";

/// Room identifier, chosen by the peers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Self-reported peer identifier. Not verified and not unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// An inbound frame that parsed as a JSON object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// `{"type": "join-room", "roomId": ..., "sender": ...}`
    Join { room_id: RoomId, sender: PeerId },
    /// Anything else. Only the `type` is kept, for logging; the relay
    /// forwards the original frame text.
    Relay { kind: Option<String> },
}

impl FromStr for Envelope {
    type Err = ClientRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Value::Object(object) = serde_json::from_str::<Value>(s)? else {
            return Err(ClientRequestError::NotAnObject);
        };

        match object.get("type").and_then(Value::as_str) {
            Some(JOIN_ROOM) => Ok(Envelope::Join {
                room_id: RoomId(required_string(&object, "roomId")?),
                sender: PeerId(required_string(&object, "sender")?),
            }),
            kind => Ok(Envelope::Relay {
                kind: kind.map(str::to_owned),
            }),
        }
    }
}

/// Only non-empty JSON strings count; numbers, booleans and other values are
/// treated as missing.
fn required_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ClientRequestError> {
    match object.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(ClientRequestError::MissingField(field)),
    }
}

/// Notifications generated by the relay itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PeerEvent {
    /// Sent to existing members when a connection joins their room
    NewPeer {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        sender: PeerId,
    },
    /// Sent to remaining members when a joined connection closes
    PeerLeft {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        sender: PeerId,
    },
}

impl fmt::Display for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
