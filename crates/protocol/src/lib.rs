//! Shared protocol crate for the arena server.
//!
//! This crate contains:
//! - The `Entity` record exchanged in both directions
//! - Outbound message encoding (snapshots, session id)
//! - Inbound entity decoding

mod codec;
mod entity;
mod error;

pub use codec::{ServerMessage, decode_entity, encode_entity};
pub use entity::Entity;
pub use error::ProtocolError;
