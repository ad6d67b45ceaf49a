use async_trait::async_trait;
use thiserror::Error;

use crate::signaling::SignalMessage;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("relay connection closed")]
    Closed,
    #[error("failed to connect to relay at {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("failed to encode signaling message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound half of a relay connection.
///
/// The inbound half is an `mpsc::Receiver<SignalMessage>` handed out by the
/// adapter when it connects.
#[async_trait]
pub trait SignalingPort: Send + Sync {
    async fn send(&self, message: SignalMessage) -> Result<(), SignalingError>;
}
