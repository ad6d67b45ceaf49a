//! # mc-network
//!
//! Signaling plumbing for meshclip:
//! - [`registry::RoomRegistry`]: in-memory rooms and per-member outbound queues
//! - [`server::RelayServer`]: websocket relay that dispatches join/leave and
//!   routes directed negotiation messages
//! - [`client::RelayClient`]: websocket client implementing `SignalingPort`

pub mod client;
pub mod connection;
pub mod registry;
pub mod server;

pub use client::{relay_url, RelayClient};
pub use connection::{ConnectionId, RelayConnection};
pub use registry::RoomRegistry;
pub use server::RelayServer;
