//! Relay client.
//!
//! Splits the websocket into a writer task fed by [`SignalingPort::send`]
//! and a reader task that decodes frames and forwards them on an `mpsc`
//! channel. When the relay goes away the inbound channel closes, which ends
//! the orchestrator's dispatch loop while already-open sessions keep going.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mc_core::config::defaults::RELAY_WS_PATH;
use mc_core::ports::{SignalingError, SignalingPort};
use mc_core::{PeerId, RoomCode, SignalMessage};

const CHANNEL_CAPACITY: usize = 64;

/// `ws://{host}:{port}/ws`
pub fn relay_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}{RELAY_WS_PATH}")
}

pub struct RelayClient {
    outbound: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl RelayClient {
    /// Connect and return the client plus the stream of decoded inbound messages.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::Receiver<SignalMessage>), SignalingError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|err| SignalingError::Connect {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        info!(url, "Connected to signaling relay");

        let (mut sink, mut stream) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<SignalMessage>(CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => break,
                    frame = outbound_rx.recv() => match frame {
                        Some(frame) => {
                            if let Err(err) = sink.send(Message::Text(frame.into())).await {
                                warn!(error = %err, "Relay send failed");
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            let _ = sink.close().await;
        });

        let reader_shutdown = shutdown.clone();
        let reader_url = url.to_string();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = reader_shutdown.cancelled() => break,
                    frame = stream.next() => frame,
                };
                match frame {
                    Some(Ok(Message::Text(text))) => match SignalMessage::from_json(text.as_str()) {
                        Ok(message) => {
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => debug!(error = %err, "Ignoring malformed relay frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "Relay connection error");
                        break;
                    }
                }
            }
            // Stop the writer too, so a dead relay frees both halves
            reader_shutdown.cancel();
            warn!(url = %reader_url, "Signaling relay connection closed");
        });

        Ok((
            Self {
                outbound: outbound_tx,
                shutdown,
            },
            inbound_rx,
        ))
    }

    /// Send `join{code, peerId}`.
    pub async fn join(&self, code: &RoomCode, peer_id: &PeerId) -> Result<(), SignalingError> {
        self.send(SignalMessage::Join {
            code: code.clone(),
            peer_id: Some(peer_id.clone()),
        })
        .await
    }

    /// Close the relay connection. Open peer sessions are unaffected.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl SignalingPort for RelayClient {
    async fn send(&self, message: SignalMessage) -> Result<(), SignalingError> {
        if self.shutdown.is_cancelled() {
            return Err(SignalingError::Closed);
        }
        let frame = message.to_json()?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SignalingError::Closed)
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
