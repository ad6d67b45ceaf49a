//! Tracing configuration for meshclip
//!
//! ## Architecture / 架构
//!
//! - **Global filter**: `RUST_LOG` when set, otherwise build-dependent defaults
//! - **Console layer**: stderr, so log lines never interleave with the chat
//!   prompt on stdout. Quiet (`warn`) unless `RUST_LOG` asks for more.
//! - **File layer**: `meshclip.log` in the app log dir, full default level
//!
//! The `webrtc` stack logs through the `log` crate; `try_init` installs the
//! `log` bridge so those records land in the same layers.

use std::{fs, io, sync::OnceLock};

use mc_infra::fs::app_log_dir;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::LevelFilter, fmt, fmt::writer::BoxMakeWriter, prelude::*, registry, EnvFilter,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_NAME: &str = "meshclip.log";

/// Check if running in development environment
fn is_development() -> bool {
    cfg!(debug_assertions)
}

/// Build the default filter directives for tracing
///
/// ## Behavior / 行为
/// - **Development**: debug level for meshclip crates
/// - **Production**: info level for meshclip crates
/// - **WebRTC stack**: always clamped to warn (ICE/DTLS chatter)
fn build_filter_directives(is_dev: bool) -> Vec<String> {
    let level = if is_dev { "debug" } else { "info" };

    let mut directives = vec![
        level.to_string(),
        "webrtc=warn".to_string(),
        "webrtc_ice=warn".to_string(),
        "webrtc_dtls=warn".to_string(),
        "webrtc_sctp=warn".to_string(),
        "webrtc_mdns=off".to_string(),
        "hyper=info".to_string(),
        "tungstenite=info".to_string(),
    ];
    directives.extend(
        ["meshclip", "mc_app", "mc_network", "mc_platform", "mc_infra"]
            .iter()
            .map(|krate| format!("{krate}={level}")),
    );
    directives
}

/// Console output stays at `warn` unless the user explicitly set `RUST_LOG`.
fn console_level(rust_log_set: bool) -> LevelFilter {
    if rust_log_set {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    }
}

/// Initialize the tracing subscriber
/// 初始化 tracing 订阅者
///
/// Call once from `main`, before the runtime starts doing work.
///
/// ## Errors / 错误
///
/// Returns `Err` if a global subscriber is already registered.
pub fn init_tracing_subscriber() -> anyhow::Result<()> {
    let is_dev = is_development();

    // Step 1: environment filter, RUST_LOG wins over defaults
    let rust_log_set = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter_directives = build_filter_directives(is_dev);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives.join(",")));

    // Step 2: writers
    let console_writer: BoxMakeWriter = BoxMakeWriter::new(io::stderr);
    let file_writer = match build_file_writer() {
        Ok(writer) => Some(writer),
        Err(err) => {
            eprintln!("Failed to initialize file logging, falling back to console only: {err}");
            None
        }
    };

    // Step 3: fmt layers
    // "2025-01-15 10:30:45.123 INFO [file.rs:42] [target] message"
    let console_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_ansi(cfg!(not(test)))
        .with_writer(console_writer)
        .with_filter(console_level(rust_log_set));

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_timer(fmt::time::ChronoUtc::new(
                "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            ))
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
    });

    // Step 4: register the global subscriber
    let subscriber = registry().with(env_filter).with(console_layer);

    if let Some(layer) = file_layer {
        subscriber.with(layer).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    Ok(())
}

fn build_file_writer() -> anyhow::Result<NonBlocking> {
    let logs_dir = app_log_dir()?;
    fs::create_dir_all(&logs_dir)?;

    let file_appender = tracing_appender::rolling::never(&logs_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    LOG_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Tracing log guard already initialized"))?;

    Ok(non_blocking)
}
