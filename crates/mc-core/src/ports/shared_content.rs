use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedContentError {
    #[error("shared content unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read shared content: {0}")]
    Read(String),
    #[error("failed to write shared content: {0}")]
    Write(String),
}

/// Clipboard-style shared resource with one current text value.
#[async_trait]
pub trait SharedContentPort: Send + Sync {
    /// Current text, `None` when empty or not text.
    async fn read(&self) -> Result<Option<String>, SharedContentError>;

    async fn write(&self, content: &str) -> Result<(), SharedContentError>;
}
