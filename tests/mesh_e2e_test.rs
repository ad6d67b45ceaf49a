//! End-to-end mesh test: a real relay on loopback, one signaling client per
//! participant and the in-memory transport standing in for WebRTC.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mc_core::ports::ChatOutputPort;
use mc_core::{AppConfig, PeerId, RoomCode};
use mc_infra::SystemClock;
use mc_network::{relay_url, RelayServer};
use mc_platform::InMemoryTransport;
use meshclip_lib::bootstrap::{MeshDeps, MeshRuntime};

const ROOM: &str = "482913";

/// Polls `$cond` until it holds or two seconds pass.
macro_rules! wait_for {
    ($cond:expr, $what:expr) => {{
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if $cond {
                break;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {}", $what);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }};
}

#[derive(Default)]
struct RecordingOutput {
    chats: Mutex<Vec<(PeerId, String)>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingOutput {
    fn chats(&self) -> Vec<(PeerId, String)> {
        self.chats.lock().unwrap().clone()
    }
}

impl ChatOutputPort for RecordingOutput {
    fn show_chat(&self, from: &PeerId, text: &str) {
        self.chats.lock().unwrap().push((from.clone(), text.to_string()));
    }

    fn show_notice(&self, notice: &str) {
        self.notices.lock().unwrap().push(notice.to_string());
    }
}

struct Participant {
    runtime: MeshRuntime,
    output: Arc<RecordingOutput>,
}

async fn start_relay() -> RelayServer {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    RelayServer::start(addr, 64, Arc::new(SystemClock)).await.unwrap()
}

async fn join(server: &RelayServer, transport: &InMemoryTransport) -> Participant {
    let output = Arc::new(RecordingOutput::default());
    let deps = MeshDeps {
        relay_url: relay_url("127.0.0.1", server.local_addr().port()),
        room: RoomCode::new(ROOM),
        transport: Arc::new(transport.clone()),
        content: None,
        output: output.clone(),
        clock: Arc::new(SystemClock),
    };
    let config = AppConfig::empty().resolve_defaults();
    let runtime = MeshRuntime::start(deps, &config).await.unwrap();
    Participant { runtime, output }
}

async fn peers_of(participant: &Participant) -> Vec<PeerId> {
    participant
        .runtime
        .mesh()
        .session_states()
        .await
        .into_iter()
        .map(|(peer, _, _)| peer)
        .collect()
}

#[tokio::test]
async fn test_three_peers_form_full_mesh() {
    let server = start_relay().await;
    let transport = InMemoryTransport::new();

    let a = join(&server, &transport).await;
    let b = join(&server, &transport).await;
    let c = join(&server, &transport).await;

    for (name, p) in [("A", &a), ("B", &b), ("C", &c)] {
        wait_for!(
            p.runtime.mesh().open_session_count().await == 2,
            format!("{name} to open two sessions")
        );
    }

    let mut peers = peers_of(&a).await;
    peers.sort();
    let mut expected = vec![b.runtime.local_id().clone(), c.runtime.local_id().clone()];
    expected.sort();
    assert_eq!(peers, expected);

    let registry = server.registry();
    assert_eq!(registry.members(&RoomCode::new(ROOM)).await.len(), 3);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_chat_reaches_every_other_peer() {
    let server = start_relay().await;
    let transport = InMemoryTransport::new();

    let a = join(&server, &transport).await;
    let b = join(&server, &transport).await;
    let c = join(&server, &transport).await;
    for p in [&a, &b, &c] {
        wait_for!(p.runtime.mesh().open_session_count().await == 2, "full mesh");
    }

    let delivered = a.runtime.chat().execute("hello mesh").await.unwrap();
    assert_eq!(delivered, 2);

    let from_a = (a.runtime.local_id().clone(), "hello mesh".to_string());
    wait_for!(b.output.chats() == vec![from_a.clone()], "B to receive chat");
    wait_for!(c.output.chats() == vec![from_a.clone()], "C to receive chat");
    assert!(a.output.chats().is_empty());
    assert!(b
        .output
        .notices
        .lock()
        .unwrap()
        .iter()
        .any(|notice| notice.starts_with("[Connected to peer")));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_departed_peer_is_removed_from_the_others() {
    let server = start_relay().await;
    let transport = InMemoryTransport::new();

    let a = join(&server, &transport).await;
    let b = join(&server, &transport).await;
    let c = join(&server, &transport).await;
    for p in [&a, &b, &c] {
        wait_for!(p.runtime.mesh().open_session_count().await == 2, "full mesh");
    }

    let b_id = b.runtime.local_id().clone();
    b.runtime.shutdown().await;

    wait_for!(a.runtime.mesh().session_count().await == 1, "A to drop B");
    wait_for!(c.runtime.mesh().session_count().await == 1, "C to drop B");
    assert_eq!(peers_of(&a).await, vec![c.runtime.local_id().clone()]);
    assert_eq!(peers_of(&c).await, vec![a.runtime.local_id().clone()]);
    assert!(!peers_of(&a).await.contains(&b_id));

    // A and C can still talk
    assert_eq!(a.runtime.chat().execute("still here").await.unwrap(), 1);
    wait_for!(
        c.output.chats() == vec![(a.runtime.local_id().clone(), "still here".to_string())],
        "C to receive chat after B left"
    );

    wait_for!(
        server.registry().members(&RoomCode::new(ROOM)).await.len() == 2,
        "relay to forget B"
    );

    a.runtime.shutdown().await;
    c.runtime.shutdown().await;
    server.shutdown().await.unwrap();
}
