//! WebRTC implementation of [`PeerTransportPort`].
//!
//! One `RTCPeerConnection` per session. The library reports everything
//! through callbacks; each callback only forwards a [`TransportEvent`] into
//! the session's channel and never touches orchestrator state.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use mc_core::ports::{PeerTransportPort, TransportError, TransportEvent, TransportSession};
use mc_core::{ChannelHandle, IceCandidate, SdpType, SessionDescription, SessionHandle, SessionRole};

const SESSION_EVENT_CAPACITY: usize = 128;

type ChannelTable = Arc<Mutex<HashMap<ChannelHandle, (SessionHandle, Arc<RTCDataChannel>)>>>;

struct RtcSession {
    pc: Arc<RTCPeerConnection>,
    events: mpsc::Sender<TransportEvent>,
}

pub struct WebRtcTransport {
    api: API,
    ice_servers: Vec<String>,
    sessions: Mutex<HashMap<SessionHandle, RtcSession>>,
    channels: ChannelTable,
}

impl WebRtcTransport {
    pub fn new(ice_servers: Vec<String>) -> Result<Self> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            ice_servers,
            sessions: Mutex::new(HashMap::new()),
            channels: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    async fn connection(&self, session: &SessionHandle) -> Result<Arc<RTCPeerConnection>, TransportError> {
        self.sessions
            .lock()
            .await
            .get(session)
            .map(|s| s.pc.clone())
            .ok_or_else(|| TransportError::UnknownSession(session.clone()))
    }
}

/// Forward a data channel's lifecycle and messages as events for `handle`.
fn wire_channel(
    dc: &Arc<RTCDataChannel>,
    handle: ChannelHandle,
    events: mpsc::Sender<TransportEvent>,
) {
    let open_tx = events.clone();
    let open_handle = handle.clone();
    dc.on_open(Box::new(move || {
        Box::pin(async move {
            let _ = open_tx.send(TransportEvent::ChannelOpen(open_handle)).await;
        })
    }));

    let message_tx = events.clone();
    let message_handle = handle.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let message_tx = message_tx.clone();
        let channel = message_handle.clone();
        Box::pin(async move {
            let _ = message_tx
                .send(TransportEvent::ChannelMessage {
                    channel,
                    data: msg.data,
                })
                .await;
        })
    }));

    dc.on_close(Box::new(move || {
        let close_tx = events.clone();
        let channel = handle.clone();
        Box::pin(async move {
            let _ = close_tx.send(TransportEvent::ChannelClose(channel)).await;
        })
    }));
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    let result = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpType::Rollback => {
            return Err(TransportError::DescriptionRejected(
                "rollback is not supported".into(),
            ))
        }
    };
    result.map_err(|err| TransportError::DescriptionRejected(err.to_string()))
}

fn from_rtc_description(description: RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    match description.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(description.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(description.sdp)),
        other => Err(TransportError::Backend(format!("unexpected sdp type {other}"))),
    }
}

#[async_trait]
impl PeerTransportPort for WebRtcTransport {
    async fn create_session(&self, role: SessionRole) -> Result<TransportSession, TransportError> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.configuration())
                .await
                .map_err(|err| TransportError::Backend(err.to_string()))?,
        );
        let handle = SessionHandle::new();
        let (events, events_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);

        let ice_tx = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let ice_tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let candidate = IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        };
                        let _ = ice_tx.send(TransportEvent::IceCandidate(candidate)).await;
                    }
                    Err(err) => warn!(error = %err, "Failed to serialize local candidate"),
                }
            })
        }));

        let state_tx = events.clone();
        let state_session = handle.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let state_tx = state_tx.clone();
            let session = state_session.clone();
            Box::pin(async move {
                debug!(session = %session, state = %state, "Peer connection state changed");
                if state == RTCPeerConnectionState::Failed {
                    let _ = state_tx
                        .send(TransportEvent::Failed {
                            reason: "peer connection failed".into(),
                        })
                        .await;
                }
            })
        }));

        if role == SessionRole::Responder {
            let channel_tx = events.clone();
            let channels = self.channels.clone();
            let channel_session = handle.clone();
            pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let channel_tx = channel_tx.clone();
                let channels = channels.clone();
                let session = channel_session.clone();
                Box::pin(async move {
                    let channel = ChannelHandle::new();
                    info!(session = %session, label = %dc.label(), channel = %channel, "Remote data channel");
                    channels
                        .lock()
                        .await
                        .insert(channel.clone(), (session, dc.clone()));
                    let _ = channel_tx
                        .send(TransportEvent::DataChannel(channel.clone()))
                        .await;
                    wire_channel(&dc, channel, channel_tx);
                })
            }));
        }

        self.sessions
            .lock()
            .await
            .insert(handle.clone(), RtcSession { pc, events });
        Ok(TransportSession {
            handle,
            events: events_rx,
        })
    }

    async fn create_data_channel(
        &self,
        session: &SessionHandle,
        label: &str,
    ) -> Result<ChannelHandle, TransportError> {
        let (pc, events) = {
            let sessions = self.sessions.lock().await;
            let entry = sessions
                .get(session)
                .ok_or_else(|| TransportError::UnknownSession(session.clone()))?;
            (entry.pc.clone(), entry.events.clone())
        };
        let dc = pc
            .create_data_channel(label, None)
            .await
            .map_err(|err| TransportError::Backend(err.to_string()))?;

        let channel = ChannelHandle::new();
        self.channels
            .lock()
            .await
            .insert(channel.clone(), (session.clone(), dc.clone()));
        wire_channel(&dc, channel.clone(), events);
        Ok(channel)
    }

    async fn create_offer(&self, session: &SessionHandle) -> Result<SessionDescription, TransportError> {
        let pc = self.connection(session).await?;
        let offer = pc
            .create_offer(None)
            .await
            .map_err(|err| TransportError::Backend(err.to_string()))?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self, session: &SessionHandle) -> Result<SessionDescription, TransportError> {
        let pc = self.connection(session).await?;
        let answer = pc
            .create_answer(None)
            .await
            .map_err(|err| TransportError::Backend(err.to_string()))?;
        from_rtc_description(answer)
    }

    async fn set_local_description(
        &self,
        session: &SessionHandle,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let pc = self.connection(session).await?;
        pc.set_local_description(to_rtc_description(description)?)
            .await
            .map_err(|err| TransportError::DescriptionRejected(err.to_string()))
    }

    async fn set_remote_description(
        &self,
        session: &SessionHandle,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let pc = self.connection(session).await?;
        pc.set_remote_description(to_rtc_description(description)?)
            .await
            .map_err(|err| TransportError::DescriptionRejected(err.to_string()))
    }

    async fn add_ice_candidate(
        &self,
        session: &SessionHandle,
        candidate: IceCandidate,
    ) -> Result<(), TransportError> {
        let pc = self.connection(session).await?;
        pc.add_ice_candidate(RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        })
        .await
        .map_err(|err| TransportError::InvalidCandidate(err.to_string()))
    }

    async fn send(&self, channel: &ChannelHandle, data: Bytes) -> Result<(), TransportError> {
        let dc = self
            .channels
            .lock()
            .await
            .get(channel)
            .map(|(_, dc)| dc.clone())
            .ok_or_else(|| TransportError::UnknownChannel(channel.clone()))?;
        if dc.ready_state() != RTCDataChannelState::Open {
            return Err(TransportError::ChannelNotOpen(channel.clone()));
        }
        dc.send(&data)
            .await
            .map(|_| ())
            .map_err(|err| TransportError::SendFailed(err.to_string()))
    }

    async fn close_session(&self, session: &SessionHandle) {
        let Some(RtcSession { pc, .. }) = self.sessions.lock().await.remove(session) else {
            return;
        };
        self.channels
            .lock()
            .await
            .retain(|_, (owner, _)| owner != session);
        if let Err(err) = pc.close().await {
            warn!(session = %session, error = %err, "Failed to close peer connection");
        }
        debug!(session = %session, "Peer connection closed");
    }
}
