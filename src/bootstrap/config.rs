//! Configuration resolution for the binary
//!
//! File location comes from `MESHCLIP_CONFIG` or the platform config dir;
//! a missing file yields defaults. Command-line flags are applied last.

use anyhow::Context;
use mc_core::AppConfig;
use mc_infra::{default_config_path, load_config_or_default};
use tracing::info;

use crate::cli::Cli;

pub fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let path = default_config_path().context("Failed to locate config file")?;
    let config = load_config_or_default(&path)?;
    info!(path = %path.display(), exists = path.exists(), "Resolved configuration");
    Ok(apply_cli_overrides(config, cli))
}

fn apply_cli_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(port) = cli.port {
        config.relay_port = port;
    }
    if cli.no_clipboard {
        config.clipboard_enabled = Some(false);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mc_core::config::defaults;

    #[test]
    fn test_cli_overrides_port_and_clipboard() {
        let cli = Cli::parse_from(["meshclip", "--host", "--port", "9100", "--no-clipboard"]);
        let config = apply_cli_overrides(AppConfig::empty().resolve_defaults(), &cli);

        assert_eq!(config.relay_port, 9100);
        assert!(!config.clipboard_enabled());
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[relay]\nport = 9200\n").unwrap();

        let cli = Cli::parse_from(["meshclip", "--join"]);
        let config = apply_cli_overrides(load_config_or_default(&path).unwrap(), &cli);

        assert_eq!(config.relay_port, 9200);
        assert_eq!(config.poll_interval_ms, defaults::POLL_INTERVAL_MS);
        assert!(config.clipboard_enabled());
    }
}
