//! Use case for reacting to mesh events
//! 处理网状连接事件的用例

use std::sync::Arc;

use mc_core::ports::ChatOutputPort;
use mc_core::{AppPayload, MeshEvent, PeerId};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::content_sync::ContentSyncUseCase;

/// Routes inbound payloads to chat output or content sync and turns
/// connection changes into terminal notices.
///
/// Clipboard payloads are ignored when no [`ContentSyncUseCase`] is
/// configured (sync disabled).
pub struct HandleMeshEventsUseCase {
    output: Arc<dyn ChatOutputPort>,
    sync: Option<Arc<ContentSyncUseCase>>,
}

impl HandleMeshEventsUseCase {
    pub fn new(output: Arc<dyn ChatOutputPort>, sync: Option<Arc<ContentSyncUseCase>>) -> Self {
        Self { output, sync }
    }

    pub async fn handle(&self, event: MeshEvent) {
        match event {
            MeshEvent::Message { from, payload } => {
                self.handle_payload(&from, AppPayload::decode(&payload)).await;
            }
            MeshEvent::PeerConnected { peer_id } => {
                info!(peer_id = %peer_id, "Peer connected");
                self.output
                    .show_notice(&format!("[Connected to peer {}]", peer_id.short()));
            }
            MeshEvent::PeerDisconnected { peer_id } => {
                info!(peer_id = %peer_id, "Peer session ended");
            }
            MeshEvent::ConnectionCountChanged { open_sessions } => {
                self.output
                    .show_notice(&format!("[Connected peers: {open_sessions}]"));
            }
        }
    }

    async fn handle_payload(&self, from: &PeerId, payload: AppPayload) {
        match payload {
            AppPayload::Chat { text } => self.output.show_chat(from, &text),
            AppPayload::Clipboard { content, hash } => match &self.sync {
                Some(sync) => {
                    if let Err(err) = sync.apply_remote(from, &content, &hash).await {
                        warn!(from = %from, error = %format!("{err:#}"), "Failed to apply remote content");
                    }
                }
                None => debug!(from = %from, "Content sync disabled, ignoring clipboard payload"),
            },
        }
    }

    /// Consume events until the mesh drops its sender.
    pub async fn run(self, mut events: mpsc::Receiver<MeshEvent>) {
        let span = info_span!("usecase.mesh_events.run");

        async move {
            while let Some(event) = events.recv().await {
                self.handle(event).await;
            }
            debug!("Mesh event stream ended");
        }
        .instrument(span)
        .await
    }
}
