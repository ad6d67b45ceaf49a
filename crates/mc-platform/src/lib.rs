//! Platform adapters for meshclip
//!
//! - [`clipboard::ArboardClipboard`]: system clipboard as the shared resource
//! - [`transport::WebRtcTransport`]: direct peer sessions over WebRTC data channels
//! - [`transport::InMemoryTransport`]: in-process sessions for tests and demos
//! - [`net_utils`]: LAN address discovery for the host banner

pub mod clipboard;
pub mod net_utils;
pub mod transport;

pub use clipboard::ArboardClipboard;
pub use transport::{InMemoryTransport, WebRtcTransport};
