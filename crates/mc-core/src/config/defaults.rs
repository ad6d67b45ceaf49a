pub const RELAY_BIND_ADDRESS: &str = "0.0.0.0";
pub const RELAY_PORT: u16 = 8080;
pub const RELAY_QUEUE_CAPACITY: usize = 64;
pub const RELAY_WS_PATH: &str = "/ws";

pub const DATA_CHANNEL_LABEL: &str = "meshclip";
pub const ICE_SERVERS: &[&str] = &["stun:stun.l.google.com:19302"];

pub const POLL_INTERVAL_MS: u64 = 500;
