//! Mesh domain: peer session lifecycle, initiator election and the events
//! the orchestrator reports to the application.

pub mod election;
pub mod events;
pub mod session_state;

pub use election::{elect_role, should_initiate, SessionRole};
pub use events::MeshEvent;
pub use session_state::PeerSessionState;
