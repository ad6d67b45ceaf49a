//! Per-peer session task.
//!
//! Every peer session is driven by exactly one task. Negotiation inputs from
//! the signaling dispatch loop and events from the transport are consumed by
//! the same `select!` loop, so the steps of one session never interleave
//! while different peers progress independently.
//!
//! ```text
//! dispatch loop ──PeerInput──┐
//!                            ├─▶ PeerSessionTask ──▶ PeerTransportPort
//! transport ─TransportEvent──┘         │
//!                                      ├─▶ SignalingPort (offer/answer/ice)
//!                                      └─▶ MeshEvent stream
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use mc_core::ports::{PeerTransportPort, SignalingPort, TransportEvent, TransportSession};
use mc_core::{
    ChannelHandle, IceCandidate, MeshEvent, PeerId, PeerSessionState, SessionDescription,
    SessionHandle, SessionRole, SignalMessage,
};

/// State shared by the orchestrator and all session tasks.
pub(super) struct MeshShared {
    pub local_id: PeerId,
    pub transport: Arc<dyn PeerTransportPort>,
    pub signaling: Arc<dyn SignalingPort>,
    pub channel_label: String,
    pub sessions: RwLock<HashMap<PeerId, PeerSlot>>,
    pub events: mpsc::Sender<MeshEvent>,
    /// Set under the `sessions` write lock by shutdown; no slot is created after.
    pub closed: AtomicBool,
}

impl MeshShared {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn open_session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|slot| slot.state.is_open())
            .count()
    }

    pub async fn emit(&self, event: MeshEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event).await;
    }
}

/// Orchestrator-visible view of one session.
pub(super) struct PeerSlot {
    pub generation: u64,
    pub role: SessionRole,
    pub state: PeerSessionState,
    pub channel: Option<ChannelHandle>,
    pub inbox: mpsc::UnboundedSender<PeerInput>,
}

#[derive(Debug)]
pub(super) enum PeerInput {
    Initiate,
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
    Close { done: oneshot::Sender<()> },
}

enum Flow {
    Continue,
    Closed,
}

pub(super) struct PeerSessionTask {
    shared: Arc<MeshShared>,
    peer_id: PeerId,
    generation: u64,
    role: SessionRole,
    state: PeerSessionState,
    session: Option<SessionHandle>,
    channel: Option<ChannelHandle>,
}

impl PeerSessionTask {
    pub fn new(shared: Arc<MeshShared>, peer_id: PeerId, generation: u64, role: SessionRole) -> Self {
        Self {
            shared,
            peer_id,
            generation,
            role,
            state: PeerSessionState::New,
            session: None,
            channel: None,
        }
    }

    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<PeerInput>) {
        let mut close_ack = None;

        match self.shared.transport.create_session(self.role).await {
            Ok(TransportSession { handle, events }) => {
                debug!(peer_id = %self.peer_id, session = %handle, role = ?self.role, "Transport session created");
                self.session = Some(handle);
                close_ack = self.drive(&mut inbox, events).await;
            }
            Err(err) => {
                warn!(peer_id = %self.peer_id, error = %err, "Failed to create transport session");
            }
        }

        self.finish().await;

        if close_ack.is_none() {
            // A removal may have raced with a failure; still acknowledge it
            inbox.close();
            while let Ok(input) = inbox.try_recv() {
                if let PeerInput::Close { done } = input {
                    close_ack = Some(done);
                }
            }
        }
        if let Some(done) = close_ack {
            let _ = done.send(());
        }
    }

    /// Process inputs and transport events until the session ends.
    /// Returns the removal acknowledgement if the end was an explicit close.
    async fn drive(
        &mut self,
        inbox: &mut mpsc::UnboundedReceiver<PeerInput>,
        mut events: mpsc::Receiver<TransportEvent>,
    ) -> Option<oneshot::Sender<()>> {
        loop {
            tokio::select! {
                input = inbox.recv() => match input {
                    Some(PeerInput::Close { done }) => {
                        debug!(peer_id = %self.peer_id, "Session removal requested");
                        return Some(done);
                    }
                    Some(input) => {
                        if let Err(err) = self.handle_input(input).await {
                            warn!(peer_id = %self.peer_id, error = %err, "Negotiation failed, closing session");
                            return None;
                        }
                    }
                    None => return None,
                },
                event = events.recv() => match event {
                    Some(event) => match self.handle_event(event).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Closed) => return None,
                        Err(err) => {
                            warn!(peer_id = %self.peer_id, error = %err, "Transport event handling failed, closing session");
                            return None;
                        }
                    },
                    None => {
                        debug!(peer_id = %self.peer_id, "Transport event stream ended");
                        return None;
                    }
                },
            }
        }
    }

    async fn handle_input(&mut self, input: PeerInput) -> Result<()> {
        match input {
            PeerInput::Initiate => self.initiate().await,
            PeerInput::RemoteOffer(offer) => self.accept_offer(offer).await,
            PeerInput::RemoteAnswer(answer) => self.accept_answer(answer).await,
            PeerInput::RemoteCandidate(candidate) => {
                let session = self.session_handle()?;
                self.shared
                    .transport
                    .add_ice_candidate(&session, candidate)
                    .await
                    .context("failed to apply remote candidate")
            }
            // Handled by the select loop
            PeerInput::Close { .. } => Ok(()),
        }
    }

    async fn initiate(&mut self) -> Result<()> {
        let Some(next) = self.state.start_negotiating() else {
            debug!(peer_id = %self.peer_id, state = ?self.state, "Ignoring initiate outside New state");
            return Ok(());
        };
        let session = self.session_handle()?;
        let transport = &self.shared.transport;

        self.state = next;
        let channel = transport
            .create_data_channel(&session, &self.shared.channel_label)
            .await
            .context("failed to create data channel")?;
        self.channel = Some(channel);
        self.publish().await;

        let offer = transport
            .create_offer(&session)
            .await
            .context("failed to create offer")?;
        transport
            .set_local_description(&session, offer.clone())
            .await
            .context("failed to set local offer")?;
        self.shared
            .signaling
            .send(SignalMessage::offer(self.peer_id.clone(), offer))
            .await
            .context("failed to send offer")?;

        info!(peer_id = %self.peer_id, "Offer sent");
        Ok(())
    }

    async fn accept_offer(&mut self, offer: SessionDescription) -> Result<()> {
        if self.role != SessionRole::Responder {
            warn!(peer_id = %self.peer_id, "Ignoring offer on initiator session");
            return Ok(());
        }
        let Some(next) = self.state.start_negotiating() else {
            warn!(peer_id = %self.peer_id, state = ?self.state, "Ignoring repeated offer");
            return Ok(());
        };
        let session = self.session_handle()?;
        let transport = &self.shared.transport;

        self.state = next;
        self.publish().await;

        transport
            .set_remote_description(&session, offer)
            .await
            .context("remote offer rejected")?;
        let answer = transport
            .create_answer(&session)
            .await
            .context("failed to create answer")?;
        transport
            .set_local_description(&session, answer.clone())
            .await
            .context("failed to set local answer")?;
        self.shared
            .signaling
            .send(SignalMessage::answer(self.peer_id.clone(), answer))
            .await
            .context("failed to send answer")?;

        info!(peer_id = %self.peer_id, "Answer sent");
        Ok(())
    }

    async fn accept_answer(&mut self, answer: SessionDescription) -> Result<()> {
        if self.role != SessionRole::Initiator || self.state != PeerSessionState::Negotiating {
            debug!(peer_id = %self.peer_id, state = ?self.state, "Ignoring unexpected answer");
            return Ok(());
        }
        let session = self.session_handle()?;
        self.shared
            .transport
            .set_remote_description(&session, answer)
            .await
            .context("remote answer rejected")?;
        debug!(peer_id = %self.peer_id, "Remote answer applied");
        Ok(())
    }

    async fn handle_event(&mut self, event: TransportEvent) -> Result<Flow> {
        match event {
            TransportEvent::IceCandidate(candidate) => {
                let message = SignalMessage::ice_candidate(self.peer_id.clone(), candidate);
                if let Err(err) = self.shared.signaling.send(message).await {
                    // Losing a candidate is not fatal on its own
                    debug!(peer_id = %self.peer_id, error = %err, "Failed to forward local candidate");
                }
            }
            TransportEvent::DataChannel(channel) => {
                debug!(peer_id = %self.peer_id, channel = %channel, "Remote data channel announced");
                self.channel = Some(channel);
                self.publish().await;
            }
            TransportEvent::ChannelOpen(channel) => {
                if self.channel.is_none() {
                    self.channel = Some(channel);
                }
                match self.state.on_channel_open() {
                    Some(next) => {
                        self.state = next;
                        self.publish().await;
                        info!(peer_id = %self.peer_id, "Peer session open");
                        self.shared
                            .emit(MeshEvent::PeerConnected {
                                peer_id: self.peer_id.clone(),
                            })
                            .await;
                        self.emit_count().await;
                    }
                    None => {
                        debug!(peer_id = %self.peer_id, state = ?self.state, "Ignoring channel open");
                    }
                }
            }
            TransportEvent::ChannelMessage { channel, data } => {
                if self.channel.as_ref() != Some(&channel) {
                    debug!(peer_id = %self.peer_id, channel = %channel, "Message on unknown channel");
                }
                self.shared
                    .emit(MeshEvent::Message {
                        from: self.peer_id.clone(),
                        payload: data,
                    })
                    .await;
            }
            TransportEvent::ChannelClose(channel) => {
                info!(peer_id = %self.peer_id, channel = %channel, "Data channel closed");
                return Ok(Flow::Closed);
            }
            TransportEvent::Failed { reason } => {
                warn!(peer_id = %self.peer_id, reason = %reason, "Transport session failed");
                return Ok(Flow::Closed);
            }
        }
        Ok(Flow::Continue)
    }

    fn session_handle(&self) -> Result<SessionHandle> {
        self.session
            .clone()
            .context("transport session not created")
    }

    /// Mirror state and channel into the orchestrator's table.
    async fn publish(&self) {
        let mut sessions = self.shared.sessions.write().await;
        if let Some(slot) = sessions.get_mut(&self.peer_id) {
            if slot.generation == self.generation {
                slot.state = self.state;
                slot.channel = self.channel.clone();
            }
        }
    }

    async fn emit_count(&self) {
        let open_sessions = self.shared.open_session_count().await;
        self.shared
            .emit(MeshEvent::ConnectionCountChanged { open_sessions })
            .await;
    }

    /// Release the transport session, evict the slot, report the disconnect.
    async fn finish(&mut self) {
        let was_open = self.state.is_open();
        self.state = self.state.close();

        if let Some(session) = self.session.take() {
            self.shared.transport.close_session(&session).await;
        }
        self.channel = None;

        {
            let mut sessions = self.shared.sessions.write().await;
            if sessions
                .get(&self.peer_id)
                .is_some_and(|slot| slot.generation == self.generation)
            {
                sessions.remove(&self.peer_id);
            }
        }

        info!(peer_id = %self.peer_id, was_open, "Peer session closed");
        self.shared
            .emit(MeshEvent::PeerDisconnected {
                peer_id: self.peer_id.clone(),
            })
            .await;
        if was_open {
            self.emit_count().await;
        }
    }
}
