//! Command-line surface
//! 命令行参数

use std::net::Ipv4Addr;

use anyhow::bail;
use clap::{ArgGroup, Parser};

pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "meshclip",
    version,
    about = "Chat and share a clipboard with everyone who knows the room code"
)]
#[command(group(ArgGroup::new("mode").required(true).args(["host", "join"])))]
pub struct Cli {
    /// Start the relay and create a new room
    #[arg(long)]
    pub host: bool,

    /// Join an existing room
    #[arg(long)]
    pub join: bool,

    /// Relay host to connect to (skips the prompt)
    #[arg(long, conflicts_with = "host", value_name = "HOST")]
    pub server: Option<String>,

    /// Six-digit room code (skips the prompt)
    #[arg(long, conflicts_with = "host", value_name = "CODE")]
    pub code: Option<String>,

    /// Relay port, overrides the config file
    #[arg(long)]
    pub port: Option<u16>,

    /// Chat only, do not touch the system clipboard
    #[arg(long)]
    pub no_clipboard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Host,
    Join,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.host {
            Mode::Host
        } else {
            Mode::Join
        }
    }
}

/// Accept `localhost` or a dotted-quad IPv4 address. Empty input means
/// `localhost`.
pub fn validate_host(input: &str) -> anyhow::Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(LOCALHOST) {
        return Ok(LOCALHOST.to_string());
    }
    match trimmed.parse::<Ipv4Addr>() {
        Ok(addr) => Ok(addr.to_string()),
        Err(_) => bail!("Invalid host {trimmed:?}: expected 'localhost' or an IPv4 address"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["meshclip"]).is_err());
        assert!(Cli::try_parse_from(["meshclip", "--host", "--join"]).is_err());

        let host = Cli::try_parse_from(["meshclip", "--host"]).unwrap();
        assert_eq!(host.mode(), Mode::Host);

        let join = Cli::try_parse_from(["meshclip", "--join", "--code", "482913"]).unwrap();
        assert_eq!(join.mode(), Mode::Join);
        assert_eq!(join.code.as_deref(), Some("482913"));
    }

    #[test]
    fn test_server_and_code_are_join_only() {
        assert!(Cli::try_parse_from(["meshclip", "--host", "--code", "482913"]).is_err());
        assert!(Cli::try_parse_from(["meshclip", "--host", "--server", "10.0.0.2"]).is_err());
        assert!(Cli::try_parse_from(["meshclip", "--code", "482913"]).is_err());

        let join = Cli::try_parse_from([
            "meshclip", "--join", "--server", "10.0.0.2", "--code", "482913",
        ])
        .unwrap();
        assert_eq!(join.server.as_deref(), Some("10.0.0.2"));
        assert_eq!(join.code.as_deref(), Some("482913"));
    }

    #[test]
    fn test_validate_host() {
        assert_eq!(validate_host("").unwrap(), "localhost");
        assert_eq!(validate_host("  ").unwrap(), "localhost");
        assert_eq!(validate_host("LocalHost").unwrap(), "localhost");
        assert_eq!(validate_host(" 192.168.1.20 ").unwrap(), "192.168.1.20");
        assert!(validate_host("192.168.1").is_err());
        assert!(validate_host("300.1.1.1").is_err());
        assert!(validate_host("example.com").is_err());
    }
}
