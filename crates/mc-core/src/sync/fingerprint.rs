use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Blake3V1,
}

/// Hash of one shared-content value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint {
    pub alg: HashAlgorithm,
    pub bytes: [u8; 32],
}

impl ContentFingerprint {
    pub fn blake3(bytes: [u8; 32]) -> Self {
        Self {
            alg: HashAlgorithm::Blake3V1,
            bytes,
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl Display for ContentFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
