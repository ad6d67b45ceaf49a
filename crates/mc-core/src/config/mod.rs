//! # Configuration DTO / 配置数据
//!
//! ## Responsibilities / 职责
//!
//! - ✅ Define configuration data structures / 定义配置数据结构
//! - ✅ Provide TOML → DTO mapping / 提供 TOML → DTO 的映射
//! - ✅ Fill unset fields from [`defaults`] on request / 按需填充默认值
//!
//! `from_toml` records what the file says: a missing key becomes an empty
//! value, never a guessed one. Defaults are applied only by
//! [`AppConfig::resolve_defaults`].

pub mod defaults;

/// Application configuration DTO
/// 应用配置 DTO
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Relay listen address (`[relay] bind_address`)
    pub relay_bind_address: String,

    /// Relay listen port (`[relay] port`)
    pub relay_port: u16,

    /// Per-connection outbound queue bound (`[relay] outbound_queue_capacity`)
    pub relay_queue_capacity: usize,

    /// Label for the data channel the initiator opens (`[mesh] data_channel_label`)
    pub data_channel_label: String,

    /// STUN/TURN urls handed to the transport (`[mesh] ice_servers`)
    pub ice_servers: Vec<String>,

    /// Clipboard sampling period (`[sync] poll_interval_ms`)
    pub poll_interval_ms: u64,

    /// Whether clipboard mirroring runs (`[sync] clipboard_enabled`)
    pub clipboard_enabled: Option<bool>,
}

impl AppConfig {
    /// Create AppConfig from TOML value
    /// 从 TOML 值创建 AppConfig
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let section = |name: &str, key: &str| toml_value.get(name).and_then(|s| s.get(key));

        Ok(Self {
            relay_bind_address: section("relay", "bind_address")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            relay_port: section("relay", "port")
                .and_then(|v| v.as_integer())
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(0),
            relay_queue_capacity: section("relay", "outbound_queue_capacity")
                .and_then(|v| v.as_integer())
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(0),
            data_channel_label: section("mesh", "data_channel_label")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            ice_servers: section("mesh", "ice_servers")
                .and_then(|v| v.as_array())
                .map(|urls| {
                    urls.iter()
                        .filter_map(|u| u.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            poll_interval_ms: section("sync", "poll_interval_ms")
                .and_then(|v| v.as_integer())
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(0),
            clipboard_enabled: section("sync", "clipboard_enabled").and_then(|v| v.as_bool()),
        })
    }

    /// Create empty AppConfig (all empty/default values)
    /// 创建空的 AppConfig
    pub fn empty() -> Self {
        Self {
            relay_bind_address: String::new(),
            relay_port: 0,
            relay_queue_capacity: 0,
            data_channel_label: String::new(),
            ice_servers: Vec::new(),
            poll_interval_ms: 0,
            clipboard_enabled: None,
        }
    }

    /// Replace every unset field with its default.
    /// 用默认值替换未设置的字段
    pub fn resolve_defaults(mut self) -> Self {
        if self.relay_bind_address.is_empty() {
            self.relay_bind_address = defaults::RELAY_BIND_ADDRESS.to_string();
        }
        if self.relay_port == 0 {
            self.relay_port = defaults::RELAY_PORT;
        }
        if self.relay_queue_capacity == 0 {
            self.relay_queue_capacity = defaults::RELAY_QUEUE_CAPACITY;
        }
        if self.data_channel_label.is_empty() {
            self.data_channel_label = defaults::DATA_CHANNEL_LABEL.to_string();
        }
        if self.ice_servers.is_empty() {
            self.ice_servers = defaults::ICE_SERVERS.iter().map(|s| s.to_string()).collect();
        }
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = defaults::POLL_INTERVAL_MS;
        }
        if self.clipboard_enabled.is_none() {
            self.clipboard_enabled = Some(true);
        }
        self
    }

    pub fn clipboard_enabled(&self) -> bool {
        self.clipboard_enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_reads_all_sections() {
        let value: toml::Value = toml::from_str(
            r#"
            [relay]
            bind_address = "127.0.0.1"
            port = 9000
            outbound_queue_capacity = 8

            [mesh]
            data_channel_label = "chat"
            ice_servers = ["stun:example.org:3478"]

            [sync]
            poll_interval_ms = 250
            clipboard_enabled = false
            "#,
        )
        .unwrap();

        let config = AppConfig::from_toml(&value).unwrap();
        assert_eq!(config.relay_bind_address, "127.0.0.1");
        assert_eq!(config.relay_port, 9000);
        assert_eq!(config.relay_queue_capacity, 8);
        assert_eq!(config.data_channel_label, "chat");
        assert_eq!(config.ice_servers, vec!["stun:example.org:3478".to_string()]);
        assert_eq!(config.poll_interval_ms, 250);
        assert!(!config.clipboard_enabled());
    }

    #[test]
    fn test_missing_keys_are_empty_facts() {
        let value: toml::Value = toml::from_str("").unwrap();
        assert_eq!(AppConfig::from_toml(&value).unwrap(), AppConfig::empty());
    }

    #[test]
    fn test_out_of_range_port_is_treated_as_unset() {
        let value: toml::Value = toml::from_str("[relay]\nport = 70000").unwrap();
        assert_eq!(AppConfig::from_toml(&value).unwrap().relay_port, 0);
    }

    #[test]
    fn test_resolve_defaults_keeps_explicit_values() {
        let mut config = AppConfig::empty();
        config.relay_port = 9100;
        let resolved = config.resolve_defaults();
        assert_eq!(resolved.relay_port, 9100);
        assert_eq!(resolved.relay_bind_address, defaults::RELAY_BIND_ADDRESS);
        assert_eq!(resolved.poll_interval_ms, defaults::POLL_INTERVAL_MS);
        assert_eq!(resolved.clipboard_enabled, Some(true));
        assert!(!resolved.ice_servers.is_empty());
    }
}
