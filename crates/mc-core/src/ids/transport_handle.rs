use serde::{Deserialize, Serialize};

use super::id_macro::impl_handle;

/// Opaque handle for one transport session owned by a `PeerTransportPort`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(String);

/// Opaque handle for one data channel inside a transport session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelHandle(String);

impl_handle!(SessionHandle, ChannelHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handles_are_unique() {
        let a = SessionHandle::new();
        let b = SessionHandle::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_handle_from_str_round_trips_display() {
        let ch = ChannelHandle::from("chan-1");
        assert_eq!(ch.as_str(), "chan-1");
        assert_eq!(ch.to_string(), "chan-1");
    }
}
