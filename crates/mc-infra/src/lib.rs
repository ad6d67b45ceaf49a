//! meshclip infrastructure adapters
//!
//! Implementations of the small synchronous ports in `mc-core` plus the
//! config file loader and the application directory layout.

pub mod config;
pub mod fs;
pub mod hashing;
pub mod time;

pub use config::{default_config_path, load_config, load_config_or_default};
pub use hashing::Blake3Hasher;
pub use time::SystemClock;
