//! Mesh session orchestrator.
//!
//! Turns the flat peer list the relay hands out into one session per peer:
//!
//! - `joined` / `peer_joined`: elect a role; the smaller id starts a session
//!   and sends an offer, the larger one waits.
//! - `offer` from an unknown peer: start a responder session.
//! - `answer` / `ice-candidate`: forwarded to the existing session, dropped
//!   when there is none.
//! - `peer_left`: tear the session down.
//!
//! The session table holds at most one slot per peer id. Slots are created
//! under the table's write lock and only their own task, `remove_peer` or
//! `shutdown` ever removes them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, info_span, warn, Instrument};

use mc_core::mesh::{elect_role, should_initiate};
use mc_core::ports::{PeerTransportPort, SignalingPort};
use mc_core::{MeshEvent, PeerId, PeerSessionState, SessionRole, SignalMessage};

use super::session_task::{MeshShared, PeerInput, PeerSessionTask, PeerSlot};
use super::MeshBroadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct MeshOrchestrator {
    shared: Arc<MeshShared>,
    next_generation: AtomicU64,
}

impl MeshOrchestrator {
    /// Create the orchestrator and the receiver for its [`MeshEvent`]s.
    pub fn new(
        local_id: PeerId,
        transport: Arc<dyn PeerTransportPort>,
        signaling: Arc<dyn SignalingPort>,
        channel_label: impl Into<String>,
    ) -> (Arc<Self>, mpsc::Receiver<MeshEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(MeshShared {
            local_id,
            transport,
            signaling,
            channel_label: channel_label.into(),
            sessions: RwLock::new(HashMap::new()),
            events,
            closed: AtomicBool::new(false),
        });
        let orchestrator = Arc::new(Self {
            shared,
            next_generation: AtomicU64::new(1),
        });
        (orchestrator, events_rx)
    }

    pub fn local_id(&self) -> &PeerId {
        &self.shared.local_id
    }

    /// Signaling dispatch loop. Returns when the relay connection closes;
    /// sessions that are already open keep running.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<SignalMessage>) {
        let span = info_span!("mesh.dispatch", local_id = %self.shared.local_id);
        async move {
            while let Some(message) = inbound.recv().await {
                self.handle_signal(message).await;
            }
            warn!("Signaling stream ended, no new sessions can be formed");
        }
        .instrument(span)
        .await
    }

    /// Dispatch one relay message.
    pub async fn handle_signal(&self, message: SignalMessage) {
        match message {
            SignalMessage::Joined {
                code,
                my_id,
                peers,
                peer_count,
            } => {
                if my_id != self.shared.local_id {
                    warn!(assigned = %my_id, "Relay assigned a different peer id");
                }
                info!(room = %code, peer_count, "Joined room");
                for peer_id in peers {
                    self.on_peer_discovered(peer_id).await;
                }
            }
            SignalMessage::PeerJoined { peer_id } => self.on_peer_discovered(peer_id).await,
            SignalMessage::PeerLeft { peer_id } => {
                if self.remove_peer(&peer_id).await {
                    info!(peer_id = %peer_id, "Peer left, session removed");
                }
            }
            SignalMessage::Offer {
                from_peer: Some(from),
                sdp,
                ..
            } => self.on_offer(from, sdp).await,
            SignalMessage::Answer {
                from_peer: Some(from),
                sdp,
                ..
            } => self.forward(&from, PeerInput::RemoteAnswer(sdp)).await,
            SignalMessage::IceCandidate {
                from_peer: Some(from),
                candidate,
                ..
            } => self.forward(&from, PeerInput::RemoteCandidate(candidate)).await,
            other => {
                debug!(kind = other.kind(), "Ignoring signaling message");
            }
        }
    }

    async fn on_peer_discovered(&self, peer_id: PeerId) {
        if peer_id == self.shared.local_id {
            return;
        }
        if !should_initiate(&self.shared.local_id, &peer_id) {
            debug!(peer_id = %peer_id, "Waiting for offer from peer");
            return;
        }
        let mut sessions = self.shared.sessions.write().await;
        if self.shared.is_closed() {
            debug!(peer_id = %peer_id, "Mesh closed, ignoring discovered peer");
            return;
        }
        if sessions.contains_key(&peer_id) {
            debug!(peer_id = %peer_id, "Session already tracked");
            return;
        }
        info!(peer_id = %peer_id, "Initiating session");
        self.spawn_session(&mut sessions, peer_id, SessionRole::Initiator, PeerInput::Initiate);
    }

    async fn on_offer(&self, from: PeerId, sdp: mc_core::SessionDescription) {
        if from == self.shared.local_id {
            return;
        }
        let mut sessions = self.shared.sessions.write().await;
        if self.shared.is_closed() {
            debug!(peer_id = %from, "Mesh closed, offer dropped");
            return;
        }
        if let Some(slot) = sessions.get(&from) {
            if slot.inbox.send(PeerInput::RemoteOffer(sdp)).is_err() {
                debug!(peer_id = %from, "Session task gone, offer dropped");
            }
            return;
        }
        if elect_role(&self.shared.local_id, &from).is_initiator() {
            // Our own offer was never sent or its session already ended
            debug!(peer_id = %from, "Offer from peer we were elected to initiate to");
        }
        info!(peer_id = %from, "Accepting session offer");
        self.spawn_session(
            &mut sessions,
            from,
            SessionRole::Responder,
            PeerInput::RemoteOffer(sdp),
        );
    }

    async fn forward(&self, peer_id: &PeerId, input: PeerInput) {
        let sessions = self.shared.sessions.read().await;
        match sessions.get(peer_id) {
            Some(slot) => {
                if slot.inbox.send(input).is_err() {
                    debug!(peer_id = %peer_id, "Session task gone, input dropped");
                }
            }
            None => debug!(peer_id = %peer_id, "No session for peer, dropping negotiation input"),
        }
    }

    fn spawn_session(
        &self,
        sessions: &mut HashMap<PeerId, PeerSlot>,
        peer_id: PeerId,
        role: SessionRole,
        first: PeerInput,
    ) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        // Receiver is alive, so this cannot fail
        let _ = inbox.send(first);

        sessions.insert(
            peer_id.clone(),
            PeerSlot {
                generation,
                role,
                state: PeerSessionState::New,
                channel: None,
                inbox,
            },
        );

        let span = info_span!("mesh.session", peer_id = %peer_id, role = ?role);
        let task = PeerSessionTask::new(self.shared.clone(), peer_id, generation, role);
        tokio::spawn(task.run(inbox_rx).instrument(span));
    }

    /// Close and forget the session for `peer_id`. Returns once the
    /// transport session has been released; `false` if none was tracked.
    pub async fn remove_peer(&self, peer_id: &PeerId) -> bool {
        let slot = self.shared.sessions.write().await.remove(peer_id);
        match slot {
            Some(slot) => {
                close_slot(slot).await;
                true
            }
            None => false,
        }
    }

    /// Close every session before returning. The mesh stays closed: later
    /// discoveries and offers are dropped.
    pub async fn shutdown(&self) {
        let slots: Vec<PeerSlot> = {
            let mut sessions = self.shared.sessions.write().await;
            self.shared.closed.store(true, Ordering::Release);
            sessions.drain().map(|(_, slot)| slot).collect()
        };
        let count = slots.len();
        let mut closing = tokio::task::JoinSet::new();
        for slot in slots {
            closing.spawn(close_slot(slot));
        }
        while closing.join_next().await.is_some() {}
        info!(closed = count, "Mesh shut down");
    }

    /// Send `payload` on every open session; returns how many accepted it.
    pub async fn broadcast(&self, payload: Bytes) -> usize {
        let targets: Vec<_> = {
            let sessions = self.shared.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, slot)| slot.state.is_open())
                .filter_map(|(peer_id, slot)| {
                    slot.channel
                        .clone()
                        .map(|channel| (peer_id.clone(), channel))
                })
                .collect()
        };

        let mut delivered = 0;
        for (peer_id, channel) in targets {
            match self.shared.transport.send(&channel, payload.clone()).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(peer_id = %peer_id, error = %err, "Broadcast send failed"),
            }
        }
        debug!(delivered, bytes = payload.len(), "Broadcast complete");
        delivered
    }

    pub async fn open_session_count(&self) -> usize {
        self.shared.open_session_count().await
    }

    pub async fn session_count(&self) -> usize {
        self.shared.sessions.read().await.len()
    }

    /// Snapshot of every tracked session, sorted by peer id.
    pub async fn session_states(&self) -> Vec<(PeerId, SessionRole, PeerSessionState)> {
        let sessions = self.shared.sessions.read().await;
        let mut states: Vec<_> = sessions
            .iter()
            .map(|(peer_id, slot)| (peer_id.clone(), slot.role, slot.state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}

#[async_trait]
impl MeshBroadcast for MeshOrchestrator {
    async fn broadcast(&self, payload: Bytes) -> usize {
        MeshOrchestrator::broadcast(self, payload).await
    }
}

async fn close_slot(slot: PeerSlot) {
    let (done, done_rx) = oneshot::channel();
    if slot.inbox.send(PeerInput::Close { done }).is_ok() {
        // Err means the task already finished on its own
        let _ = done_rx.await;
    }
}
