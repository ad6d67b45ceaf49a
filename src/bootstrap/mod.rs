pub mod config;
pub mod run;
pub mod runtime;
pub mod tracing;

pub use config::resolve_config;
pub use run::run_app;
pub use runtime::{MeshDeps, MeshRuntime};
