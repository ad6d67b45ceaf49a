//! Use case for sending a chat line to every connected peer

use std::sync::Arc;

use anyhow::{Context, Result};
use mc_core::AppPayload;
use tracing::{debug, info_span, Instrument};

use crate::mesh::MeshBroadcast;

pub struct SendChatUseCase {
    mesh: Arc<dyn MeshBroadcast>,
}

impl SendChatUseCase {
    pub fn new(mesh: Arc<dyn MeshBroadcast>) -> Self {
        Self { mesh }
    }

    /// Wrap `text` in a chat envelope and broadcast it.
    ///
    /// # Returns / 返回值
    /// Number of peers the line was delivered to. `0` means no session is
    /// open yet.
    pub async fn execute(&self, text: &str) -> Result<usize> {
        let span = info_span!("usecase.chat.send", len = text.len());

        async move {
            let frame = AppPayload::chat(text)
                .encode()
                .context("failed to encode chat payload")?;
            let delivered = self.mesh.broadcast(frame).await;
            debug!(delivered, "Chat line broadcast");
            Ok(delivered)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct RecordingMesh {
        sent: Mutex<Vec<Bytes>>,
        open_sessions: usize,
    }

    #[async_trait]
    impl MeshBroadcast for RecordingMesh {
        async fn broadcast(&self, payload: Bytes) -> usize {
            self.sent.lock().unwrap().push(payload);
            self.open_sessions
        }
    }

    #[tokio::test]
    async fn test_chat_is_sent_as_envelope() {
        let mesh = Arc::new(RecordingMesh {
            sent: Mutex::new(Vec::new()),
            open_sessions: 2,
        });
        let use_case = SendChatUseCase::new(mesh.clone());

        let delivered = use_case.execute("hi all").await.unwrap();

        assert_eq!(delivered, 2);
        let sent = mesh.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(AppPayload::decode(&sent[0]), AppPayload::chat("hi all"));
    }

    #[tokio::test]
    async fn test_no_open_sessions_reports_zero() {
        let mesh = Arc::new(RecordingMesh {
            sent: Mutex::new(Vec::new()),
            open_sessions: 0,
        });
        let use_case = SendChatUseCase::new(mesh);

        assert_eq!(use_case.execute("anyone?").await.unwrap(), 0);
    }
}
