//! Application payload envelope.
//!
//! Everything sent over an open channel is a JSON object with a mandatory
//! `kind` discriminator:
//!
//! ```text
//! {"kind":"chat","text":"hello"}
//! {"kind":"clipboard","content":"...","hash":"<hex fingerprint>"}
//! ```
//!
//! Frames that are not a valid envelope (plain text from a client that does
//! not wrap its messages) are surfaced as chat text unchanged.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("failed to encode application payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppPayload {
    Chat { text: String },
    Clipboard { content: String, hash: String },
}

impl AppPayload {
    pub fn chat(text: impl Into<String>) -> Self {
        Self::Chat { text: text.into() }
    }

    pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode a received frame, falling back to raw chat text.
    pub fn decode(frame: &[u8]) -> Self {
        match serde_json::from_slice::<Self>(frame) {
            Ok(payload) => payload,
            Err(_) => Self::Chat {
                text: String::from_utf8_lossy(frame).into_owned(),
            },
        }
    }
}
