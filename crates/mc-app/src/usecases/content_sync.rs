//! Clipboard content sync across the mesh
//! 剪贴板内容在网状连接间的同步
//!
//! ## Responsibilities / 职责
//!
//! - Poll the shared resource and broadcast content that changed locally
//! - Apply content received from peers to the shared resource
//! - Keep one "last applied" fingerprint so an applied update is never sent
//!   back out by the next poll
//!
//! Both directions take the same async mutex around the fingerprint gate, so
//! a poll can never observe a half-applied remote update.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use mc_core::ports::{ContentHashPort, SharedContentPort};
use mc_core::{AppPayload, FingerprintGate, PeerId};

use crate::mesh::MeshBroadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSyncOutcome {
    /// Nothing to send (no text content)
    Empty,
    /// Same content as last observed or applied
    Unchanged,
    Broadcast { delivered: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApplyOutcome {
    Applied,
    /// Content already current, not written
    Duplicate,
    Empty,
}

pub struct ContentSyncUseCase {
    mesh: Arc<dyn MeshBroadcast>,
    content: Arc<dyn SharedContentPort>,
    hasher: Arc<dyn ContentHashPort>,
    gate: Mutex<FingerprintGate>,
}

impl ContentSyncUseCase {
    pub fn new(
        mesh: Arc<dyn MeshBroadcast>,
        content: Arc<dyn SharedContentPort>,
        hasher: Arc<dyn ContentHashPort>,
    ) -> Self {
        Self {
            mesh,
            content,
            hasher,
            gate: Mutex::new(FingerprintGate::new()),
        }
    }

    /// Sample the shared resource once and broadcast it if it changed.
    pub async fn sync_local_once(&self) -> Result<LocalSyncOutcome> {
        let span = info_span!("usecase.content_sync.sync_local");

        async move {
            let (content, hash) = {
                let mut gate = self.gate.lock().await;

                let content = match self
                    .content
                    .read()
                    .await
                    .context("failed to read shared content")?
                {
                    Some(content) if !content.is_empty() => content,
                    _ => return Ok(LocalSyncOutcome::Empty),
                };

                let fingerprint = self
                    .hasher
                    .fingerprint(content.as_bytes())
                    .context("failed to fingerprint local content")?;
                let hash = fingerprint.to_hex();
                if !gate.observe_local(fingerprint) {
                    return Ok(LocalSyncOutcome::Unchanged);
                }
                (content, hash)
            };

            let frame = AppPayload::Clipboard { content, hash }
                .encode()
                .context("failed to encode clipboard payload")?;
            let delivered = self.mesh.broadcast(frame).await;
            info!(delivered, "Local content change broadcast");
            Ok(LocalSyncOutcome::Broadcast { delivered })
        }
        .instrument(span)
        .await
    }

    /// Apply content received from `from`.
    ///
    /// The fingerprint is recomputed locally; `claimed_hash` is only compared
    /// for diagnostics. The gate is advanced only after the write succeeded.
    pub async fn apply_remote(
        &self,
        from: &PeerId,
        content: &str,
        claimed_hash: &str,
    ) -> Result<RemoteApplyOutcome> {
        let span = info_span!("usecase.content_sync.apply_remote", from = %from);

        async move {
            if content.is_empty() {
                return Ok(RemoteApplyOutcome::Empty);
            }

            let mut gate = self.gate.lock().await;
            let fingerprint = self
                .hasher
                .fingerprint(content.as_bytes())
                .context("failed to fingerprint remote content")?;
            if fingerprint.to_hex() != claimed_hash {
                debug!(claimed = %claimed_hash, computed = %fingerprint, "Sender hash differs from local fingerprint");
            }
            if gate.is_current(&fingerprint) {
                debug!("Remote content already current");
                return Ok(RemoteApplyOutcome::Duplicate);
            }

            self.content
                .write(content)
                .await
                .context("failed to write remote content")?;
            gate.record(fingerprint);

            info!(len = content.len(), "Remote content applied");
            Ok(RemoteApplyOutcome::Applied)
        }
        .instrument(span)
        .await
    }

    /// Poll the shared resource every `interval` until `cancel` fires.
    /// Read failures are logged and retried on the next tick.
    pub async fn run_poll_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let span = info_span!("usecase.content_sync.poll_loop", interval_ms = interval.as_millis() as u64);

        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Content poll loop started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.sync_local_once().await {
                            warn!(error = %format!("{err:#}"), "Content poll failed");
                        }
                    }
                }
            }

            info!("Content poll loop stopped");
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
    use mc_core::ports::SharedContentError;
    use mc_infra::hashing::Blake3Hasher;
    use mockall::mock;
    use std::sync::Mutex as StdMutex;

    mock! {
        pub Content {}

        #[async_trait]
        impl SharedContentPort for Content {
            async fn read(&self) -> Result<Option<String>, SharedContentError>;
            async fn write(&self, content: &str) -> Result<(), SharedContentError>;
        }
    }

    #[derive(Default)]
    struct RecordingMesh {
        sent: StdMutex<Vec<Bytes>>,
    }

    impl RecordingMesh {
        fn sent(&self) -> Vec<AppPayload> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|frame| AppPayload::decode(frame))
                .collect()
        }
    }

    #[async_trait]
    impl MeshBroadcast for RecordingMesh {
        async fn broadcast(&self, payload: Bytes) -> usize {
            self.sent.lock().unwrap().push(payload);
            1
        }
    }

    /// In-memory clipboard whose value the test can change between polls.
    #[derive(Default)]
    struct FakeContent {
        value: StdMutex<Option<String>>,
        writes: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl SharedContentPort for FakeContent {
        async fn read(&self) -> Result<Option<String>, SharedContentError> {
            Ok(self.value.lock().unwrap().clone())
        }

        async fn write(&self, content: &str) -> Result<(), SharedContentError> {
            *self.value.lock().unwrap() = Some(content.to_string());
            self.writes.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    fn use_case(
        content: Arc<dyn SharedContentPort>,
    ) -> (Arc<ContentSyncUseCase>, Arc<RecordingMesh>) {
        let mesh = Arc::new(RecordingMesh::default());
        let sync = Arc::new(ContentSyncUseCase::new(
            mesh.clone(),
            content,
            Arc::new(Blake3Hasher),
        ));
        (sync, mesh)
    }

    fn hex_of(content: &str) -> String {
        Blake3Hasher.fingerprint(content.as_bytes()).unwrap().to_hex()
    }

    #[tokio::test]
    async fn test_local_change_is_broadcast_once() {
        let content = Arc::new(FakeContent::default());
        *content.value.lock().unwrap() = Some("copied text".into());
        let (sync, mesh) = use_case(content.clone());

        assert_eq!(
            sync.sync_local_once().await.unwrap(),
            LocalSyncOutcome::Broadcast { delivered: 1 }
        );
        assert_eq!(
            sync.sync_local_once().await.unwrap(),
            LocalSyncOutcome::Unchanged
        );

        let sent = mesh.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            AppPayload::Clipboard {
                content: "copied text".into(),
                hash: hex_of("copied text"),
            }
        );
    }

    #[tokio::test]
    async fn test_applied_remote_content_is_not_echoed() {
        let content = Arc::new(FakeContent::default());
        let (sync, mesh) = use_case(content.clone());
        let from = PeerId::new("peer-b");

        let outcome = sync
            .apply_remote(&from, "from b", &hex_of("from b"))
            .await
            .unwrap();
        assert_eq!(outcome, RemoteApplyOutcome::Applied);
        assert_eq!(*content.writes.lock().unwrap(), vec!["from b".to_string()]);

        // Next poll reads back what was just written
        assert_eq!(
            sync.sync_local_once().await.unwrap(),
            LocalSyncOutcome::Unchanged
        );
        assert!(mesh.sent().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_remote_is_not_written() {
        let content = Arc::new(FakeContent::default());
        *content.value.lock().unwrap() = Some("same".into());
        let (sync, _mesh) = use_case(content.clone());
        sync.sync_local_once().await.unwrap();

        let outcome = sync
            .apply_remote(&PeerId::new("peer-c"), "same", &hex_of("same"))
            .await
            .unwrap();

        assert_eq!(outcome, RemoteApplyOutcome::Duplicate);
        assert!(content.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_is_skipped() {
        let mut content = MockContent::new();
        content.expect_read().returning(|| Ok(Some(String::new())));
        content.expect_write().never();
        let (sync, mesh) = use_case(Arc::new(content));

        assert_eq!(sync.sync_local_once().await.unwrap(), LocalSyncOutcome::Empty);
        assert_eq!(
            sync.apply_remote(&PeerId::new("peer-b"), "", "").await.unwrap(),
            RemoteApplyOutcome::Empty
        );
        assert!(mesh.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_does_not_advance_gate() {
        let mut content = MockContent::new();
        let mut seq = mockall::Sequence::new();
        content
            .expect_write()
            .withf(|value| value.to_string() == "retry me")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SharedContentError::Write("busy".into())));
        content
            .expect_write()
            .withf(|value| value.to_string() == "retry me")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let (sync, _mesh) = use_case(Arc::new(content));
        let from = PeerId::new("peer-b");

        assert!(sync
            .apply_remote(&from, "retry me", &hex_of("retry me"))
            .await
            .is_err());
        assert_eq!(
            sync.apply_remote(&from, "retry me", &hex_of("retry me"))
                .await
                .unwrap(),
            RemoteApplyOutcome::Applied
        );
    }

    #[tokio::test]
    async fn test_read_failure_is_reported() {
        let mut content = MockContent::new();
        content
            .expect_read()
            .returning(|| Err(SharedContentError::Read("locked".into())));
        let (sync, _mesh) = use_case(Arc::new(content));

        let err = sync.sync_local_once().await.unwrap_err();
        assert!(format!("{err:#}").contains("locked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_broadcasts_changes_until_cancelled() {
        let content = Arc::new(FakeContent::default());
        *content.value.lock().unwrap() = Some("first".into());
        let (sync, mesh) = use_case(content.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            sync.clone()
                .run_poll_loop(Duration::from_millis(500), cancel.clone()),
        );

        tokio::time::sleep(Duration::from_millis(750)).await;
        *content.value.lock().unwrap() = Some("second".into());
        tokio::time::sleep(Duration::from_millis(1000)).await;

        cancel.cancel();
        handle.await.unwrap();

        let contents: Vec<_> = mesh
            .sent()
            .into_iter()
            .filter_map(|payload| match payload {
                AppPayload::Clipboard { content, .. } => Some(content),
                AppPayload::Chat { .. } => None,
            })
            .collect();
        assert_eq!(contents, vec!["first".to_string(), "second".to_string()]);
    }
}
