use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_SUFFIX_LEN: usize = 9;

/// Identifier of one mesh participant.
///
/// Ordering is plain lexicographic comparison of the underlying string. The
/// mesh relies on that ordering being total and identical on every process,
/// see [`crate::mesh::election`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate `peer-{now_ms}-{9 base36 chars}`.
    pub fn generate(now_ms: i64) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..RANDOM_SUFFIX_LEN)
            .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("peer-{now_ms}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters of the id, for log lines and terminal labels.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
