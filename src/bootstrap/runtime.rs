//! # Mesh Runtime
//!
//! Wires adapters (`Arc<dyn Port>`) into the orchestrator and use cases and
//! owns the background tasks that drive them.
//!
//! ## Tasks / 后台任务
//!
//! - `mesh.dispatch`: relay messages → [`MeshOrchestrator::run`]
//! - `mesh_events`: [`MeshEvent`](mc_core::MeshEvent)s → [`HandleMeshEventsUseCase`]
//! - `content_sync`: poll loop, only when a shared-content adapter is present

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mc_app::{ContentSyncUseCase, HandleMeshEventsUseCase, MeshOrchestrator, SendChatUseCase};
use mc_core::ports::{ChatOutputPort, ClockPort, PeerTransportPort, SharedContentPort};
use mc_core::{AppConfig, PeerId, RoomCode};
use mc_infra::Blake3Hasher;
use mc_network::RelayClient;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything the runtime needs from the outside.
/// 运行时所需的外部依赖
pub struct MeshDeps {
    pub relay_url: String,
    pub room: RoomCode,
    pub transport: Arc<dyn PeerTransportPort>,
    /// `None` runs chat only.
    pub content: Option<Arc<dyn SharedContentPort>>,
    pub output: Arc<dyn ChatOutputPort>,
    pub clock: Arc<dyn ClockPort>,
}

/// A joined room with its background tasks running.
pub struct MeshRuntime {
    local_id: PeerId,
    room: RoomCode,
    mesh: Arc<MeshOrchestrator>,
    relay: Arc<RelayClient>,
    chat: SendChatUseCase,
    cancel: CancellationToken,
    dispatch: JoinHandle<()>,
    events: JoinHandle<()>,
    poll: Option<JoinHandle<()>>,
}

impl MeshRuntime {
    /// Connect to the relay, start the background tasks, then join the room.
    ///
    /// Joining happens last so no `joined`/`peer_joined` message can arrive
    /// before the dispatch loop is consuming the inbound stream.
    pub async fn start(deps: MeshDeps, config: &AppConfig) -> anyhow::Result<Self> {
        let local_id = PeerId::generate(deps.clock.now_ms());

        let (relay, inbound) = RelayClient::connect(&deps.relay_url)
            .await
            .with_context(|| format!("Failed to connect to relay at {}", deps.relay_url))?;
        let relay = Arc::new(relay);

        let (mesh, events) = MeshOrchestrator::new(
            local_id.clone(),
            deps.transport,
            relay.clone(),
            config.data_channel_label.clone(),
        );

        let sync = deps.content.map(|content| {
            Arc::new(ContentSyncUseCase::new(
                mesh.clone(),
                content,
                Arc::new(Blake3Hasher),
            ))
        });

        let cancel = CancellationToken::new();
        let dispatch = tokio::spawn(mesh.clone().run(inbound));
        let events =
            tokio::spawn(HandleMeshEventsUseCase::new(deps.output, sync.clone()).run(events));
        let poll = sync.map(|sync| {
            let interval = Duration::from_millis(config.poll_interval_ms);
            tokio::spawn(sync.run_poll_loop(interval, cancel.clone()))
        });

        relay
            .join(&deps.room, &local_id)
            .await
            .with_context(|| format!("Failed to join room {}", deps.room))?;
        info!(peer_id = %local_id, room = %deps.room, "Joined room");

        Ok(Self {
            local_id,
            room: deps.room,
            chat: SendChatUseCase::new(mesh.clone()),
            mesh,
            relay,
            cancel,
            dispatch,
            events,
            poll,
        })
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn mesh(&self) -> &Arc<MeshOrchestrator> {
        &self.mesh
    }

    pub fn chat(&self) -> &SendChatUseCase {
        &self.chat
    }

    /// Close every peer session, leave the relay and stop background tasks.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Some(poll) = self.poll {
            join_task("content_sync", poll).await;
        }

        // Closing the relay ends the inbound stream and with it the dispatch
        // loop, so no new session can start once the mesh is torn down.
        self.relay.close();
        join_task("mesh.dispatch", self.dispatch).await;
        self.mesh.shutdown().await;

        // The event handler shares ownership of the mesh through content sync,
        // so its channel never closes on its own.
        self.events.abort();
        info!(peer_id = %self.local_id, "Mesh runtime stopped");
    }
}

async fn join_task(name: &str, task: JoinHandle<()>) {
    if let Err(err) = task.await {
        warn!(task = name, error = %err, "Runtime task ended abnormally");
    }
}
