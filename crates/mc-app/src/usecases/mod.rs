//! Use cases on top of the mesh.
//!
//! ```text
//! terminal line ──▶ SendChatUseCase ──┐
//!                                     ├─▶ MeshBroadcast
//! poll tick ──▶ ContentSyncUseCase ───┘
//!                     ▲
//! MeshEvent ──▶ HandleMeshEventsUseCase ──▶ ChatOutputPort
//! ```

pub mod chat;
pub mod content_sync;
pub mod inbound;

pub use chat::SendChatUseCase;
pub use content_sync::{ContentSyncUseCase, LocalSyncOutcome, RemoteApplyOutcome};
pub use inbound::HandleMeshEventsUseCase;
