//! In-process implementation of [`PeerTransportPort`].
//!
//! Every clone of an [`InMemoryTransport`] shares one hub, so several mesh
//! orchestrators in the same process can negotiate with each other through
//! a real relay without any network stack below the session.
//!
//! Descriptions carry the session handle (`mem:<handle>`). Applying the
//! answer on the initiator links the two sessions and opens both channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use mc_core::ports::{PeerTransportPort, TransportError, TransportEvent, TransportSession};
use mc_core::{ChannelHandle, IceCandidate, SdpType, SessionDescription, SessionHandle, SessionRole};

const SDP_PREFIX: &str = "mem:";
const SESSION_EVENT_CAPACITY: usize = 64;

struct MemSession {
    events: mpsc::Sender<TransportEvent>,
    remote: Option<SessionHandle>,
    channel: Option<ChannelHandle>,
    open: bool,
}

#[derive(Default)]
struct Hub {
    sessions: HashMap<SessionHandle, MemSession>,
    channels: HashMap<ChannelHandle, SessionHandle>,
}

type Outbox = Vec<(mpsc::Sender<TransportEvent>, TransportEvent)>;

#[derive(Clone, Default)]
pub struct InMemoryTransport {
    hub: Arc<Mutex<Hub>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions across every clone.
    pub fn session_count(&self) -> usize {
        self.hub().map(|hub| hub.sessions.len()).unwrap_or_default()
    }

    fn hub(&self) -> Result<MutexGuard<'_, Hub>, TransportError> {
        self.hub
            .lock()
            .map_err(|_| TransportError::Backend("in-memory hub poisoned".into()))
    }
}

impl Hub {
    fn session(&self, handle: &SessionHandle) -> Result<&MemSession, TransportError> {
        self.sessions
            .get(handle)
            .ok_or_else(|| TransportError::UnknownSession(handle.clone()))
    }

    fn session_mut(&mut self, handle: &SessionHandle) -> Result<&mut MemSession, TransportError> {
        self.sessions
            .get_mut(handle)
            .ok_or_else(|| TransportError::UnknownSession(handle.clone()))
    }

    fn ensure_channel(&mut self, handle: &SessionHandle) -> Result<ChannelHandle, TransportError> {
        if let Some(channel) = self.session(handle)?.channel.clone() {
            return Ok(channel);
        }
        let channel = ChannelHandle::new();
        self.session_mut(handle)?.channel = Some(channel.clone());
        self.channels.insert(channel.clone(), handle.clone());
        Ok(channel)
    }

    /// Link `initiator` and `responder` and queue the open events.
    fn link(
        &mut self,
        initiator: &SessionHandle,
        responder: &SessionHandle,
        outbox: &mut Outbox,
    ) -> Result<(), TransportError> {
        if self.session(responder)?.remote.as_ref() != Some(initiator) {
            return Err(TransportError::DescriptionRejected(format!(
                "session {responder} did not answer {initiator}"
            )));
        }
        let initiator_channel = self.ensure_channel(initiator)?;
        let responder_had_channel = self.session(responder)?.channel.is_some();
        let responder_channel = self.ensure_channel(responder)?;

        let local = self.session_mut(initiator)?;
        local.remote = Some(responder.clone());
        local.open = true;
        outbox.push((
            local.events.clone(),
            TransportEvent::ChannelOpen(initiator_channel),
        ));

        let remote = self.session_mut(responder)?;
        remote.open = true;
        if !responder_had_channel {
            outbox.push((
                remote.events.clone(),
                TransportEvent::DataChannel(responder_channel.clone()),
            ));
        }
        outbox.push((
            remote.events.clone(),
            TransportEvent::ChannelOpen(responder_channel),
        ));
        Ok(())
    }
}

fn parse_description(description: &SessionDescription) -> Result<SessionHandle, TransportError> {
    description
        .sdp
        .strip_prefix(SDP_PREFIX)
        .map(SessionHandle::from)
        .ok_or_else(|| TransportError::DescriptionRejected(format!("not an in-memory sdp: {}", description.sdp)))
}

async fn deliver(outbox: Outbox) {
    for (events, event) in outbox {
        // A session closing concurrently is not an error for the sender
        let _ = events.send(event).await;
    }
}

#[async_trait]
impl PeerTransportPort for InMemoryTransport {
    async fn create_session(&self, role: SessionRole) -> Result<TransportSession, TransportError> {
        let handle = SessionHandle::new();
        let (events, events_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
        self.hub()?.sessions.insert(
            handle.clone(),
            MemSession {
                events,
                remote: None,
                channel: None,
                open: false,
            },
        );
        debug!(session = %handle, role = ?role, "In-memory session created");
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
        let channel = self.hub()?.ensure_channel(session)?;
        debug!(session = %session, channel = %channel, label, "In-memory channel created");
        Ok(channel)
    }

    async fn create_offer(&self, session: &SessionHandle) -> Result<SessionDescription, TransportError> {
        self.hub()?.session(session)?;
        Ok(SessionDescription::offer(format!("{SDP_PREFIX}{session}")))
    }

    async fn create_answer(&self, session: &SessionHandle) -> Result<SessionDescription, TransportError> {
        if self.hub()?.session(session)?.remote.is_none() {
            return Err(TransportError::DescriptionRejected(
                "answer requested before remote offer".into(),
            ));
        }
        Ok(SessionDescription::answer(format!("{SDP_PREFIX}{session}")))
    }

    async fn set_local_description(
        &self,
        session: &SessionHandle,
        _description: SessionDescription,
    ) -> Result<(), TransportError> {
        let events = self.hub()?.session(session)?.events.clone();
        let candidate = IceCandidate {
            candidate: format!("candidate:mem {session}"),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        };
        deliver(vec![(events, TransportEvent::IceCandidate(candidate))]).await;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        session: &SessionHandle,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let remote = parse_description(&description)?;
        let mut outbox = Outbox::new();
        {
            let mut hub = self.hub()?;
            hub.session(&remote)?;
            match description.sdp_type {
                SdpType::Offer => hub.session_mut(session)?.remote = Some(remote),
                SdpType::Answer => hub.link(session, &remote, &mut outbox)?,
                other => {
                    return Err(TransportError::DescriptionRejected(format!(
                        "unsupported sdp type {other}"
                    )))
                }
            }
        }
        deliver(outbox).await;
        Ok(())
    }

    async fn add_ice_candidate(
        &self,
        session: &SessionHandle,
        candidate: IceCandidate,
    ) -> Result<(), TransportError> {
        self.hub()?.session(session)?;
        if !candidate.candidate.starts_with("candidate:") {
            return Err(TransportError::InvalidCandidate(candidate.candidate));
        }
        Ok(())
    }

    async fn send(&self, channel: &ChannelHandle, data: Bytes) -> Result<(), TransportError> {
        let (events, remote_channel) = {
            let hub = self.hub()?;
            let session = hub
                .channels
                .get(channel)
                .ok_or_else(|| TransportError::UnknownChannel(channel.clone()))?;
            let local = hub.session(session)?;
            let remote = match (&local.remote, local.open) {
                (Some(remote), true) => hub.session(remote)?,
                _ => return Err(TransportError::ChannelNotOpen(channel.clone())),
            };
            let remote_channel = remote
                .channel
                .clone()
                .ok_or_else(|| TransportError::ChannelNotOpen(channel.clone()))?;
            (remote.events.clone(), remote_channel)
        };
        events
            .send(TransportEvent::ChannelMessage {
                channel: remote_channel,
                data,
            })
            .await
            .map_err(|_| TransportError::SendFailed("remote session gone".into()))
    }

    async fn close_session(&self, session: &SessionHandle) {
        let mut outbox = Outbox::new();
        {
            let mut hub = match self.hub() {
                Ok(hub) => hub,
                Err(err) => {
                    warn!(error = %err, "Cannot close in-memory session");
                    return;
                }
            };
            let Some(closed) = hub.sessions.remove(session) else {
                return;
            };
            if let Some(channel) = &closed.channel {
                hub.channels.remove(channel);
            }
            if let Some(remote) = closed.remote.as_ref().and_then(|r| hub.sessions.get_mut(r)) {
                if remote.remote.as_ref() == Some(session) && remote.open {
                    remote.open = false;
                    if let Some(channel) = remote.channel.clone() {
                        outbox.push((remote.events.clone(), TransportEvent::ChannelClose(channel)));
                    }
                }
            }
        }
        deliver(outbox).await;
        debug!(session = %session, "In-memory session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next(events: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    /// Run the full offer/answer exchange between two sessions.
    async fn connect(
        transport: &InMemoryTransport,
    ) -> (TransportSession, ChannelHandle, TransportSession) {
        let mut a = transport.create_session(SessionRole::Initiator).await.unwrap();
        let mut b = transport.create_session(SessionRole::Responder).await.unwrap();

        let ca = transport.create_data_channel(&a.handle, "meshclip").await.unwrap();
        let offer = transport.create_offer(&a.handle).await.unwrap();
        transport.set_local_description(&a.handle, offer.clone()).await.unwrap();
        assert!(matches!(next(&mut a.events).await, TransportEvent::IceCandidate(_)));

        transport.set_remote_description(&b.handle, offer).await.unwrap();
        let answer = transport.create_answer(&b.handle).await.unwrap();
        transport.set_local_description(&b.handle, answer.clone()).await.unwrap();
        assert!(matches!(next(&mut b.events).await, TransportEvent::IceCandidate(_)));

        transport.set_remote_description(&a.handle, answer).await.unwrap();
        (a, ca, b)
    }

    #[tokio::test]
    async fn test_answer_opens_both_sides() {
        let transport = InMemoryTransport::new();
        let (mut a, ca, mut b) = connect(&transport).await;

        assert_eq!(next(&mut a.events).await, TransportEvent::ChannelOpen(ca));
        let TransportEvent::DataChannel(cb) = next(&mut b.events).await else {
            panic!("responder should see the remote channel first");
        };
        assert_eq!(next(&mut b.events).await, TransportEvent::ChannelOpen(cb));
    }

    #[tokio::test]
    async fn test_send_reaches_remote_session() {
        let transport = InMemoryTransport::new();
        let (mut a, ca, mut b) = connect(&transport).await;
        next(&mut a.events).await;
        let TransportEvent::DataChannel(cb) = next(&mut b.events).await else {
            panic!("expected data channel");
        };
        next(&mut b.events).await;

        transport.send(&ca, Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(
            next(&mut b.events).await,
            TransportEvent::ChannelMessage {
                channel: cb.clone(),
                data: Bytes::from_static(b"ping"),
            }
        );

        transport.send(&cb, Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(
            next(&mut a.events).await,
            TransportEvent::ChannelMessage {
                channel: ca,
                data: Bytes::from_static(b"pong"),
            }
        );
    }

    #[tokio::test]
    async fn test_send_before_open_is_rejected() {
        let transport = InMemoryTransport::new();
        let a = transport.create_session(SessionRole::Initiator).await.unwrap();
        let ca = transport.create_data_channel(&a.handle, "meshclip").await.unwrap();

        let err = transport.send(&ca, Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err, TransportError::ChannelNotOpen(ca));
    }

    #[tokio::test]
    async fn test_close_notifies_remote() {
        let transport = InMemoryTransport::new();
        let (mut a, ca, mut b) = connect(&transport).await;
        next(&mut a.events).await;
        let TransportEvent::DataChannel(cb) = next(&mut b.events).await else {
            panic!("expected data channel");
        };
        next(&mut b.events).await;

        transport.close_session(&a.handle).await;

        assert_eq!(next(&mut b.events).await, TransportEvent::ChannelClose(cb.clone()));
        assert_eq!(transport.session_count(), 1);
        assert!(transport.send(&ca, Bytes::new()).await.is_err());
        assert_eq!(
            transport.send(&cb, Bytes::new()).await.unwrap_err(),
            TransportError::ChannelNotOpen(cb)
        );
    }

    #[tokio::test]
    async fn test_foreign_sdp_is_rejected() {
        let transport = InMemoryTransport::new();
        let b = transport.create_session(SessionRole::Responder).await.unwrap();

        let err = transport
            .set_remote_description(&b.handle, SessionDescription::offer("v=0\r\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::DescriptionRejected(_)));
    }
}
