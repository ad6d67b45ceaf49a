//! Peer transport providers
//!
//! Both providers implement [`mc_core::ports::PeerTransportPort`]:
//! [`WebRtcTransport`] for real peers and [`InMemoryTransport`] for peers
//! living in the same process.

mod memory;
mod webrtc_transport;

pub use self::memory::InMemoryTransport;
pub use self::webrtc_transport::WebRtcTransport;
