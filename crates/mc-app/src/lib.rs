//! meshclip application layer
//!
//! This crate contains the mesh session orchestrator and the use cases that
//! sit on top of it (chat, content sync, inbound event handling).

pub mod mesh;
pub mod usecases;

pub use mesh::{MeshBroadcast, MeshOrchestrator};
pub use usecases::{ContentSyncUseCase, HandleMeshEventsUseCase, SendChatUseCase};
