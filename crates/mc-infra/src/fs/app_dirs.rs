use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "meshclip";

/// Directory holding `config.toml`.
///
/// # Platform-specific Paths / 平台特定路径
/// - macOS: ~/Library/Application Support/meshclip
/// - Windows: %APPDATA%\meshclip
/// - Linux: $XDG_CONFIG_HOME/meshclip or ~/.config/meshclip
///
/// Directories are not created here.
/// 此函数不自动创建目录。
pub fn app_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Failed to get platform-specific config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Directory for the rolling log file.
pub fn app_log_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .context("Failed to get platform-specific data directory")?;
    Ok(base.join(APP_DIR_NAME).join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_are_namespaced() {
        if let Ok(dir) = app_config_dir() {
            assert!(dir.ends_with(APP_DIR_NAME));
        }
        if let Ok(dir) = app_log_dir() {
            assert!(dir.ends_with("meshclip/logs") || dir.ends_with("meshclip\\logs"));
        }
    }
}
