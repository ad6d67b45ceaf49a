//! Mesh session orchestration.

mod orchestrator;
mod session_task;

use async_trait::async_trait;
use bytes::Bytes;

pub use orchestrator::MeshOrchestrator;

/// Fan-out surface the use cases depend on.
#[async_trait]
pub trait MeshBroadcast: Send + Sync {
    /// Send `payload` on every open session. Returns how many accepted it.
    async fn broadcast(&self, payload: Bytes) -> usize;
}
