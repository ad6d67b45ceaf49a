//! Config file loading
//! 配置文件加载
//!
//! Reads a TOML file into [`AppConfig`]. Only reading and parsing happen
//! here; validation and defaults are the caller's decision.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mc_core::AppConfig;
use tracing::{debug, info};

use crate::fs::app_config_dir;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "MESHCLIP_CONFIG";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
/// - the file cannot be read
/// - the content is not valid TOML
pub fn load_config(config_path: PathBuf) -> Result<AppConfig> {
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    AppConfig::from_toml(&toml_value)
}

/// `MESHCLIP_CONFIG` if set, otherwise `<config_dir>/meshclip/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(app_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load `path` if it exists, otherwise start from an empty config.
/// Defaults are always resolved.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        info!(path = %path.display(), "Loading config file");
        load_config(path.to_path_buf())?
    } else {
        debug!(path = %path.display(), "No config file, using defaults");
        AppConfig::empty()
    };
    Ok(config.resolve_defaults())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::config::defaults;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Test that valid TOML is parsed correctly
    /// 测试有效 TOML 被正确解析
    #[test]
    fn test_load_config_reads_valid_toml() {
        let toml_content = r#"
            [relay]
            bind_address = "127.0.0.1"
            port = 9100

            [mesh]
            ice_servers = ["stun:stun.example.org:3478"]

            [sync]
            poll_interval_ms = 250
            clipboard_enabled = false
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(temp_file.path().to_path_buf()).unwrap();

        assert_eq!(config.relay_bind_address, "127.0.0.1");
        assert_eq!(config.relay_port, 9100);
        assert_eq!(config.ice_servers, vec!["stun:stun.example.org:3478"]);
        assert_eq!(config.poll_interval_ms, 250);
        assert!(!config.clipboard_enabled());
        // Not in the file, left empty
        assert!(config.data_channel_label.is_empty());
    }

    /// Test that missing file returns error
    /// 测试缺失文件返回错误
    #[test]
    fn test_load_config_returns_error_on_missing_file() {
        let err = load_config(PathBuf::from("/nonexistent/meshclip/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_returns_error_on_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[relay\nport = ").unwrap();

        let err = load_config(temp_file.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config as TOML"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.relay_port, defaults::RELAY_PORT);
        assert_eq!(config.poll_interval_ms, defaults::POLL_INTERVAL_MS);
        assert_eq!(config.data_channel_label, defaults::DATA_CHANNEL_LABEL);
        assert!(config.clipboard_enabled());
    }

    #[test]
    fn test_file_values_win_over_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[relay]\nport = 7000\n").unwrap();

        let config = load_config_or_default(temp_file.path()).unwrap();

        assert_eq!(config.relay_port, 7000);
        assert_eq!(config.relay_bind_address, defaults::RELAY_BIND_ADDRESS);
    }
}
