use anyhow::Result;

use crate::sync::ContentFingerprint;

pub trait ContentHashPort: Send + Sync {
    fn fingerprint(&self, bytes: &[u8]) -> Result<ContentFingerprint>;
}
