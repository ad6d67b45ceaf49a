use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

pub const ROOM_CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomCodeError {
    #[error("room code must be exactly {ROOM_CODE_LEN} digits, got {0:?}")]
    InvalidFormat(String),
}

/// Shared rendezvous code for one room.
///
/// The relay treats codes as opaque strings; the six-digit shape is only
/// enforced where a human types one in (see [`RoomCode::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Random code in `100000..=999999`.
    pub fn generate() -> Self {
        let n: u32 = rand::rng().random_range(100_000..=999_999);
        Self(n.to_string())
    }

    /// Validate user input: trims whitespace, requires six ASCII digits.
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let trimmed = input.trim();
        if Self::is_valid(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(RoomCodeError::InvalidFormat(trimmed.to_string()))
        }
    }

    pub fn is_valid(code: &str) -> bool {
        code.len() == ROOM_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for RoomCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
