//! Port interfaces for the application layer
//!
//! Ports define the contract between the mesh/sync use cases (mc-app) and
//! the adapters that talk to the outside world (mc-network, mc-platform,
//! mc-infra). Use cases only ever hold `Arc<dyn ...Port>`.
//!
//! ## Port Placement Guidelines
//!
//! A trait belongs here when it represents a capability the core consumes,
//! more than one use case depends on it, and an outer crate implements it.
//! Otherwise keep it next to the code that uses it.

mod chat_output;
mod clock;
mod hash;
pub mod shared_content;
pub mod signaling;
pub mod transport;

pub use chat_output::ChatOutputPort;
pub use clock::ClockPort;
pub use hash::ContentHashPort;
pub use shared_content::{SharedContentError, SharedContentPort};
pub use signaling::{SignalingError, SignalingPort};
pub use transport::{PeerTransportPort, TransportError, TransportEvent, TransportSession};
