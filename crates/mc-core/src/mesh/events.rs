use bytes::Bytes;

use crate::ids::PeerId;

/// Facts the orchestrator publishes to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    /// A session's data channel opened
    PeerConnected { peer_id: PeerId },

    /// A session was closed and evicted
    PeerDisconnected { peer_id: PeerId },

    /// Application payload received on an open channel
    Message { from: PeerId, payload: Bytes },

    /// Number of open sessions changed
    ConnectionCountChanged { open_sessions: usize },
}
