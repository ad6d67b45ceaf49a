//! Initiator election.
//!
//! Each side of a pair evaluates the same rule against the same two ids, so
//! exactly one of them starts negotiation and neither needs to ask the other.
//!
//! ```text
//! local < remote   → Initiator  (create channel, send offer)
//! local > remote   → Responder  (wait for offer)
//! local == remote  → Responder  (never initiate toward ourselves)
//! ```

use serde::{Deserialize, Serialize};

use crate::ids::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Initiator,
    Responder,
}

impl SessionRole {
    pub fn is_initiator(self) -> bool {
        self == Self::Initiator
    }
}

/// `true` iff `local` sorts strictly before `remote`.
pub fn should_initiate(local: &PeerId, remote: &PeerId) -> bool {
    local < remote
}

pub fn elect_role(local: &PeerId, remote: &PeerId) -> SessionRole {
    if should_initiate(local, remote) {
        SessionRole::Initiator
    } else {
        SessionRole::Responder
    }
}
