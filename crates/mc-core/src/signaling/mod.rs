//! Signaling wire protocol spoken between mesh processes and the relay.

pub mod description;
pub mod message;

pub use description::{IceCandidate, SdpType, SessionDescription};
pub use message::{SignalDecodeError, SignalMessage};
