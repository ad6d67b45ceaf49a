//! meshclip: a room-code peer mesh for terminal chat and clipboard sync.
//!
//! The binary wires the workspace crates together:
//! - [`cli`]: command-line surface and input validation
//! - [`bootstrap`]: tracing, config resolution, runtime wiring and the
//!   host/join entry points
//! - [`terminal`]: prompts, the chat input loop and chat output

pub mod bootstrap;
pub mod cli;
pub mod terminal;
