//! Host / join entry points.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{bail, Context};
use mc_core::ports::{ClockPort, SharedContentPort};
use mc_core::{AppConfig, RoomCode};
use mc_infra::SystemClock;
use mc_network::{relay_url, RelayServer};
use mc_platform::net_utils::lan_ip;
use mc_platform::{ArboardClipboard, WebRtcTransport};
use tokio::io::AsyncBufRead;
use tracing::{info, warn};

use super::runtime::{MeshDeps, MeshRuntime};
use crate::cli::{validate_host, Cli, Mode, LOCALHOST};
use crate::terminal::{Terminal, TerminalOutput};

const HOST_PROMPT: &str = "Enter host IP address (or press Enter for localhost): ";
const CODE_PROMPT: &str = "Enter 6-digit room code: ";
const LOOPBACK: &str = "127.0.0.1";

/// Run the selected mode until the user quits.
pub async fn run_app(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let mut terminal = Terminal::stdin();
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);

    match cli.mode() {
        Mode::Host => run_host(&config, clock, &mut terminal).await,
        Mode::Join => run_join(&cli, &config, clock, &mut terminal).await,
    }
}

async fn run_host<R: AsyncBufRead + Unpin>(
    config: &AppConfig,
    clock: Arc<dyn ClockPort>,
    terminal: &mut Terminal<R>,
) -> anyhow::Result<()> {
    let bind = format!("{}:{}", config.relay_bind_address, config.relay_port);
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid relay bind address: {bind}"))?;

    let server = RelayServer::start(addr, config.relay_queue_capacity, clock.clone()).await?;
    let port = server.local_addr().port();
    println!("[Server started on {}]", server.local_addr());

    let room = RoomCode::generate();
    let ip = lan_ip();
    if let Some(ip) = ip {
        println!("[Local IP: {ip}:{port}]");
    }
    println!();
    println!("{}", connection_info(ip, port, &room));
    println!("Share the room code above with the people you want to connect.");
    println!();

    let url = relay_url(LOOPBACK, port);
    let result = join_and_chat(url, room, config, clock, terminal).await;

    server.shutdown().await?;
    result
}

async fn run_join<R: AsyncBufRead + Unpin>(
    cli: &Cli,
    config: &AppConfig,
    clock: Arc<dyn ClockPort>,
    terminal: &mut Terminal<R>,
) -> anyhow::Result<()> {
    let host = match &cli.server {
        Some(server) => validate_host(server)?,
        None => {
            let input = terminal.prompt(HOST_PROMPT).await?.unwrap_or_default();
            validate_host(&input)?
        }
    };

    let code = match &cli.code {
        Some(code) => code.clone(),
        None => match terminal.prompt(CODE_PROMPT).await? {
            Some(code) => code,
            None => bail!("No room code entered"),
        },
    };
    let room = RoomCode::parse(&code)?;

    let url = relay_url(&host, config.relay_port);
    println!("[Connecting to {host}:{} ...]", config.relay_port);

    join_and_chat(url, room, config, clock, terminal).await
}

async fn join_and_chat<R: AsyncBufRead + Unpin>(
    relay_url: String,
    room: RoomCode,
    config: &AppConfig,
    clock: Arc<dyn ClockPort>,
    terminal: &mut Terminal<R>,
) -> anyhow::Result<()> {
    let transport = WebRtcTransport::new(config.ice_servers.clone())
        .context("Failed to initialize WebRTC transport")?;

    let deps = MeshDeps {
        relay_url,
        room,
        transport: Arc::new(transport),
        content: shared_clipboard(config),
        output: Arc::new(TerminalOutput),
        clock,
    };
    let runtime = MeshRuntime::start(deps, config).await?;
    println!(
        "[Joined room {} as {}] Type a message and press Enter, 'quit' to exit.",
        runtime.room(),
        runtime.local_id().short()
    );

    let result = terminal.chat_loop(runtime.chat()).await;
    runtime.shutdown().await;

    let exit = result?;
    info!(?exit, "Chat loop finished");
    Ok(())
}

/// The system clipboard when enabled and reachable; chat-only otherwise.
fn shared_clipboard(config: &AppConfig) -> Option<Arc<dyn SharedContentPort>> {
    if !config.clipboard_enabled() {
        info!("Clipboard sync disabled");
        return None;
    }
    match ArboardClipboard::new() {
        Ok(clipboard) => Some(Arc::new(clipboard)),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "Clipboard unavailable, continuing with chat only");
            None
        }
    }
}

/// Banner shown by the host.
fn connection_info(ip: Option<IpAddr>, port: u16, room: &RoomCode) -> String {
    let server = match ip {
        Some(ip) => format!("{ip}:{port}"),
        None => format!("{LOCALHOST}:{port}"),
    };
    format!("Server IP: {server}\nRoom Code: {room}")
}
