//! ID type wrappers for type safety.

mod id_macro;
pub mod peer_id;
pub mod room_code;
pub mod transport_handle;

pub use peer_id::PeerId;
pub use room_code::{RoomCode, RoomCodeError};
pub use transport_handle::{ChannelHandle, SessionHandle};
