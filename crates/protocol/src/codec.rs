//! JSON encoding of the messages exchanged over a client connection.
//!
//! Server -> client frames are either a full entity list or the session id
//! (a bare JSON string). Client -> server frames carry a single entity.

use crate::entity::Entity;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Every live entity, as an array.
    Snapshot(Vec<Entity>),
    /// The identifier of the receiving session, as a string.
    SessionId(String),
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedMessage)
    }
}

/// Decode a client-submitted entity from a text or binary frame payload.
pub fn decode_entity(payload: &[u8]) -> Result<Entity, ProtocolError> {
    serde_json::from_slice(payload).map_err(ProtocolError::MalformedEntity)
}

/// Encode an entity the way a client submits it.
pub fn encode_entity(entity: &Entity) -> Result<String, ProtocolError> {
    serde_json::to_string(entity).map_err(ProtocolError::Encode)
}
