//! Signaling message model.
//!
//! Every frame on a relay connection is one JSON object tagged by `type`.
//! Frames are decoded into [`SignalMessage`] once at the connection boundary
//! and matched exhaustively afterwards.
//!
//! ```text
//! client ──join──────────────▶ relay
//! client ◀─joined──────────── relay ──peer_joined──▶ other members
//! client ──offer/answer/ice──▶ relay ──(fromPeer stamped)──▶ target
//! relay  ──peer_left─────────▶ remaining members
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{IceCandidate, SessionDescription};
use crate::ids::{PeerId, RoomCode};

#[derive(Debug, Error)]
pub enum SignalDecodeError {
    #[error("malformed signaling frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignalMessage {
    #[serde(rename = "join", rename_all = "camelCase")]
    Join {
        code: RoomCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        peer_id: Option<PeerId>,
    },

    #[serde(rename = "joined", rename_all = "camelCase")]
    Joined {
        code: RoomCode,
        my_id: PeerId,
        peers: Vec<PeerId>,
        peer_count: usize,
    },

    #[serde(rename = "peer_joined", rename_all = "camelCase")]
    PeerJoined { peer_id: PeerId },

    #[serde(rename = "peer_left", rename_all = "camelCase")]
    PeerLeft { peer_id: PeerId },

    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer {
        target_peer: PeerId,
        sdp: SessionDescription,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_peer: Option<PeerId>,
    },

    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer {
        target_peer: PeerId,
        sdp: SessionDescription,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_peer: Option<PeerId>,
    },

    /// `ice` is what older desktop clients send.
    #[serde(rename = "ice-candidate", alias = "ice", rename_all = "camelCase")]
    IceCandidate {
        target_peer: PeerId,
        candidate: IceCandidate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_peer: Option<PeerId>,
    },
}

impl SignalMessage {
    pub fn from_json(text: &str) -> Result<Self, SignalDecodeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of this message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Joined { .. } => "joined",
            Self::PeerJoined { .. } => "peer_joined",
            Self::PeerLeft { .. } => "peer_left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
        }
    }

    /// Target of a directed (relay-routed) message.
    pub fn target_peer(&self) -> Option<&PeerId> {
        match self {
            Self::Offer { target_peer, .. }
            | Self::Answer { target_peer, .. }
            | Self::IceCandidate { target_peer, .. } => Some(target_peer),
            _ => None,
        }
    }

    /// Sender stamped by the relay on directed messages.
    pub fn from_peer(&self) -> Option<&PeerId> {
        match self {
            Self::Offer { from_peer, .. }
            | Self::Answer { from_peer, .. }
            | Self::IceCandidate { from_peer, .. } => from_peer.as_ref(),
            _ => None,
        }
    }

    /// Overwrite `fromPeer` on a directed message. Other kinds are returned unchanged.
    pub fn stamped_from(mut self, sender: PeerId) -> Self {
        match &mut self {
            Self::Offer { from_peer, .. }
            | Self::Answer { from_peer, .. }
            | Self::IceCandidate { from_peer, .. } => *from_peer = Some(sender),
            _ => {}
        }
        self
    }

    pub fn offer(target_peer: PeerId, sdp: SessionDescription) -> Self {
        Self::Offer {
            target_peer,
            sdp,
            from_peer: None,
        }
    }

    pub fn answer(target_peer: PeerId, sdp: SessionDescription) -> Self {
        Self::Answer {
            target_peer,
            sdp,
            from_peer: None,
        }
    }

    pub fn ice_candidate(target_peer: PeerId, candidate: IceCandidate) -> Self {
        Self::IceCandidate {
            target_peer,
            candidate,
            from_peer: None,
        }
    }
}
