//! # mc-core
//!
//! Core domain models and ports for meshclip.
//!
//! This crate contains pure domain logic without any infrastructure
//! dependencies: identifiers, the signaling wire protocol, the peer session
//! state machine, initiator election, content fingerprints, the application
//! payload envelope and the port traits implemented by adapters.

pub mod config;
pub mod ids;
pub mod mesh;
pub mod ports;
pub mod signaling;
pub mod sync;

// Re-export commonly used types at the crate root
pub use config::AppConfig;
pub use ids::{ChannelHandle, PeerId, RoomCode, SessionHandle};
pub use mesh::{MeshEvent, PeerSessionState, SessionRole};
pub use signaling::{IceCandidate, SdpType, SessionDescription, SignalMessage};
pub use sync::{AppPayload, ContentFingerprint, FingerprintGate};
