use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::spawn_blocking;
use tracing::debug;

use mc_core::ports::{SharedContentError, SharedContentPort};

/// System clipboard (text only) through `arboard`.
///
/// `arboard` calls block, so every access runs on the blocking pool with the
/// handle behind a mutex.
pub struct ArboardClipboard {
    inner: Arc<Mutex<arboard::Clipboard>>,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self> {
        let clipboard = arboard::Clipboard::new().context("Failed to open system clipboard")?;
        Ok(Self {
            inner: Arc::new(Mutex::new(clipboard)),
        })
    }
}

#[async_trait]
impl SharedContentPort for ArboardClipboard {
    async fn read(&self) -> Result<Option<String>, SharedContentError> {
        let inner = self.inner.clone();
        spawn_blocking(move || {
            let mut clipboard = inner
                .lock()
                .map_err(|_| SharedContentError::Unavailable("clipboard lock poisoned".into()))?;
            match clipboard.get_text() {
                Ok(text) => Ok(Some(text)),
                Err(arboard::Error::ContentNotAvailable) => Ok(None),
                Err(err) => Err(SharedContentError::Read(err.to_string())),
            }
        })
        .await
        .map_err(|err| SharedContentError::Read(err.to_string()))?
    }

    async fn write(&self, content: &str) -> Result<(), SharedContentError> {
        let inner = self.inner.clone();
        let content = content.to_string();
        let len = content.len();
        spawn_blocking(move || {
            let mut clipboard = inner
                .lock()
                .map_err(|_| SharedContentError::Unavailable("clipboard lock poisoned".into()))?;
            clipboard
                .set_text(content)
                .map_err(|err| SharedContentError::Write(err.to_string()))
        })
        .await
        .map_err(|err| SharedContentError::Write(err.to_string()))??;
        debug!(len, "Clipboard text written");
        Ok(())
    }
}
