//! Rendezvous signaling relay.
//!
//! Peers hold one WebSocket each, registered under a user key. Envelopes
//! addressed to another key are forwarded untouched; `entergroup` envelopes
//! add the sender to a group and push the roster to every member.

#![forbid(unsafe_code)]

pub mod api;
pub mod app;
pub mod config;
pub mod groups;
pub mod keys;
pub mod registry;
pub mod router;
pub mod signal;
pub mod state;

pub use config::{Config, JoinPolicy};
pub use groups::{Group, GroupStore};
pub use registry::{ConnectionRegistry, PeerChannel, Registration};
pub use router::{MessageRouter, Routed};
pub use state::AppState;
