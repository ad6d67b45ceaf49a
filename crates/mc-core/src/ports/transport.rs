//! Peer transport port - abstracts direct peer-to-peer sessions
//!
//! The transport owns everything below the session: connectivity checks,
//! encryption, framing. The orchestrator only drives the negotiation steps
//! and consumes events. Callback-style notifications from the underlying
//! stack are delivered as [`TransportEvent`]s on a per-session channel, in
//! the order they happened.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ids::{ChannelHandle, SessionHandle};
use crate::mesh::SessionRole;
use crate::signaling::{IceCandidate, SessionDescription};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("unknown transport session: {0}")]
    UnknownSession(SessionHandle),
    #[error("unknown data channel: {0}")]
    UnknownChannel(ChannelHandle),
    #[error("description rejected: {0}")]
    DescriptionRejected(String),
    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),
    #[error("channel not open: {0}")]
    ChannelNotOpen(ChannelHandle),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("transport backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Local connectivity candidate discovered
    IceCandidate(IceCandidate),
    /// Remote side opened a data channel on this session
    DataChannel(ChannelHandle),
    ChannelOpen(ChannelHandle),
    ChannelMessage { channel: ChannelHandle, data: Bytes },
    ChannelClose(ChannelHandle),
    /// Session-level failure (connectivity lost, negotiation aborted)
    Failed { reason: String },
}

/// A freshly created session and the subscription to its events.
#[derive(Debug)]
pub struct TransportSession {
    pub handle: SessionHandle,
    pub events: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
pub trait PeerTransportPort: Send + Sync {
    async fn create_session(&self, role: SessionRole) -> Result<TransportSession, TransportError>;

    async fn create_data_channel(
        &self,
        session: &SessionHandle,
        label: &str,
    ) -> Result<ChannelHandle, TransportError>;

    async fn create_offer(&self, session: &SessionHandle) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self, session: &SessionHandle) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(
        &self,
        session: &SessionHandle,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn set_remote_description(
        &self,
        session: &SessionHandle,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn add_ice_candidate(
        &self,
        session: &SessionHandle,
        candidate: IceCandidate,
    ) -> Result<(), TransportError>;

    /// Send one frame on an open channel.
    async fn send(&self, channel: &ChannelHandle, data: Bytes) -> Result<(), TransportError>;

    /// Release the session and every channel on it. Unknown handles are ignored.
    async fn close_session(&self, session: &SessionHandle);
}
