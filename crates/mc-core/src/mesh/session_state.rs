use serde::{Deserialize, Serialize};

/// Peer session lifecycle state machine
///
/// Design principle: pure state definitions and transition validation.
/// Driving the transport and evicting closed sessions is the orchestrator's
/// job (mc-app).
///
/// State transitions:
///
/// ```text
/// New ──→ Negotiating ──→ Open
///  │           │            │
///  └───────────┴────────────┴──→ Closed (terminal)
/// ```
///
/// There is no path out of `Closed`. A fresh session needs a new
/// `peer_joined` or offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSessionState {
    /// Slot reserved, transport session not yet negotiating
    New,

    /// Offer/answer exchange in progress
    Negotiating,

    /// Data channel reported open
    Open,

    /// Removed or failed
    Closed,
}

impl PeerSessionState {
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Local initiation or inbound offer
    pub fn start_negotiating(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Negotiating),
            _ => None,
        }
    }

    /// Channel open event
    pub fn on_channel_open(self) -> Option<Self> {
        match self {
            Self::Negotiating => Some(Self::Open),
            _ => None,
        }
    }

    /// Explicit removal, channel close or transport failure
    pub fn close(self) -> Self {
        Self::Closed
    }
}

impl Default for PeerSessionState {
    fn default() -> Self {
        Self::New
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = PeerSessionState::default();
        assert_eq!(state, PeerSessionState::New);

        state = state.start_negotiating().unwrap();
        assert_eq!(state, PeerSessionState::Negotiating);

        state = state.on_channel_open().unwrap();
        assert!(state.is_open());

        state = state.close();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_open_requires_negotiation() {
        assert!(PeerSessionState::New.on_channel_open().is_none());
    }

    #[test]
    fn test_no_renegotiation() {
        assert!(PeerSessionState::Negotiating.start_negotiating().is_none());
        assert!(PeerSessionState::Open.start_negotiating().is_none());
    }

    #[test]
    fn test_closed_is_final() {
        let closed = PeerSessionState::Closed;
        assert!(closed.start_negotiating().is_none());
        assert!(closed.on_channel_open().is_none());
        assert_eq!(closed.close(), PeerSessionState::Closed);
    }

    #[test]
    fn test_any_state_can_close() {
        for state in [
            PeerSessionState::New,
            PeerSessionState::Negotiating,
            PeerSessionState::Open,
        ] {
            assert_eq!(state.close(), PeerSessionState::Closed);
        }
    }
}
