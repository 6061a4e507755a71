//! Arena simulation server library.
//!
//! A shared entity registry advanced by a fixed-rate simulation, topped up by
//! a population manager, and streamed to every WebSocket client as full
//! snapshots.

pub mod config;
pub mod population;
pub mod registry;
pub mod server;
pub mod simulation;
pub mod stats;

// Re-export commonly used types
pub use config::Config;
pub use registry::{Registry, SharedRegistry};
pub use server::{Arena, Frame, Server, SessionId, run, run_session};
pub use stats::StatsSnapshot;
