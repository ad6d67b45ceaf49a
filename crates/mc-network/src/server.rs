//! Signaling relay server.
//!
//! One websocket per process at `/ws`. Each socket gets a reader loop (this
//! module) and a writer task draining the connection's bounded queue. The
//! relay understands exactly one thing about payloads: which kind of
//! message it is. Directed messages are stamped with the sender id the
//! relay assigned at join time and forwarded untouched otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use mc_core::config::defaults::RELAY_WS_PATH;
use mc_core::ports::ClockPort;
use mc_core::{PeerId, RoomCode, SignalMessage};

use crate::connection::RelayConnection;
use crate::registry::RoomRegistry;

#[derive(Clone)]
struct RelayState {
    registry: Arc<RoomRegistry>,
    clock: Arc<dyn ClockPort>,
    queue_capacity: usize,
    shutdown: CancellationToken,
}

/// Running relay. Dropping it does not stop the server; call [`shutdown`](Self::shutdown).
pub struct RelayServer {
    local_addr: SocketAddr,
    registry: Arc<RoomRegistry>,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl RelayServer {
    /// Bind `addr` (port 0 picks a free port) and start serving.
    pub async fn start(
        addr: SocketAddr,
        queue_capacity: usize,
        clock: Arc<dyn ClockPort>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind signaling relay on {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read signaling relay local address")?;

        let registry = Arc::new(RoomRegistry::new());
        let shutdown = CancellationToken::new();
        let state = RelayState {
            registry: registry.clone(),
            clock,
            queue_capacity,
            shutdown: shutdown.clone(),
        };

        let app = router(state);
        let graceful = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { graceful.cancelled().await })
                .await
                .context("signaling relay server failed")
        });

        info!(addr = %local_addr, path = RELAY_WS_PATH, "Signaling relay started");

        Ok(Self {
            local_addr,
            registry,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    /// Stop accepting, close every relay connection and wait for the server task.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .context("signaling relay task panicked")??;
        info!(addr = %self.local_addr, "Signaling relay stopped");
        Ok(())
    }
}

fn router(state: RelayState) -> Router {
    Router::new()
        .route(RELAY_WS_PATH, get(ws_handler))
        .with_state(state)
}

async fn ws_handler(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| {
        let (connection, outbound) = RelayConnection::new(state.queue_capacity);
        let span = info_span!("relay.connection", connection = %connection.id());
        handle_socket(socket, state, connection, outbound).instrument(span)
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: RelayState,
    connection: RelayConnection,
    mut outbound: mpsc::Receiver<String>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cancel = connection.cancel_token();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => break,
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(err) = ws_tx.send(Message::Text(frame.into())).await {
                            debug!(error = %err, "Relay write failed");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        let _ = ws_tx.close().await;
    });

    debug!("Relay connection opened");
    let mut membership: Option<(RoomCode, PeerId)> = None;

    loop {
        tokio::select! {
            _ = connection.cancelled() => {
                debug!("Relay connection cancelled");
                break;
            }
            _ = state.shutdown.cancelled() => break,
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&state, &connection, &mut membership, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(error = %err, "Relay read failed");
                    break;
                }
            },
        }
    }

    if let Some((code, peer_id)) = membership.take() {
        state
            .registry
            .leave_connection(&code, &peer_id, connection.id())
            .await;
    }
    connection.cancel();
    let _ = writer.await;
    debug!("Relay connection closed");
}

async fn handle_frame(
    state: &RelayState,
    connection: &RelayConnection,
    membership: &mut Option<(RoomCode, PeerId)>,
    text: &str,
) {
    let message = match SignalMessage::from_json(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(error = %err, "Dropping malformed signaling frame");
            return;
        }
    };

    match message {
        SignalMessage::Join { code, peer_id } => {
            if let Some((previous_code, previous_peer)) = membership.take() {
                state
                    .registry
                    .leave_connection(&previous_code, &previous_peer, connection.id())
                    .await;
            }
            let peer_id = peer_id.unwrap_or_else(|| PeerId::generate(state.clock.now_ms()));
            let existing = state
                .registry
                .join_and_announce(&code, &peer_id, connection.clone())
                .await;
            debug!(
                room = %code,
                peer_id = %peer_id,
                existing = existing.len(),
                "Join handled"
            );
            *membership = Some((code, peer_id));
        }
        directed @ (SignalMessage::Offer { .. }
        | SignalMessage::Answer { .. }
        | SignalMessage::IceCandidate { .. }) => {
            let Some((code, sender)) = membership.as_ref() else {
                debug!(kind = directed.kind(), "Dropping directed message before join");
                return;
            };
            let Some(target) = directed.target_peer().cloned() else {
                return;
            };
            let kind = directed.kind();
            let frame = match directed.stamped_from(sender.clone()).to_json() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(kind, error = %err, "Failed to re-encode directed message");
                    return;
                }
            };
            let delivered = state
                .registry
                .route_directed(code, sender, &target, frame)
                .await;
            debug!(kind, from = %sender, to = %target, delivered, "Directed message routed");
        }
        server_only => {
            debug!(kind = server_only.kind(), "Dropping server-only message from client");
        }
    }
}
