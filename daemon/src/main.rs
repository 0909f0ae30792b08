//! meshchat daemon: entry point for running a chat node or a mirror.

mod console;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use meshchat_mirror::{MirrorConfig, MirrorServer};
use meshchat_node::{init_logging, ChatNode, EventBus, LogFormat, NodeConfig, NodeEvent, ShutdownController};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast;

use console::Command as Input;

#[derive(Parser)]
#[command(name = "meshchat-daemon", about = "Peer-to-peer mesh chat")]
struct Cli {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "MESHCHAT_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "MESHCHAT_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Join the mesh as a chat node.
    Node {
        /// Hostname peers use to reach this node ("localhost" means [::1]).
        hostname: String,

        /// Port to listen on for peers.
        port: u16,

        /// Nickname; prompted for when absent.
        #[arg(long, env = "MESHCHAT_NICKNAME")]
        nickname: Option<String>,

        /// Mirrors to register with ("host:port++name", comma-separated).
        #[arg(long, env = "MESHCHAT_MIRRORS", value_delimiter = ',')]
        mirrors: Vec<String>,

        /// Mirror list file, one mirror per line.
        #[arg(long, env = "MESHCHAT_MIRROR_LIST")]
        mirror_list: Option<PathBuf>,

        /// Interface to bind instead of the hostname.
        #[arg(long, env = "MESHCHAT_LISTEN_HOST")]
        listen_host: Option<String>,

        /// Channel to start in.
        #[arg(long, env = "MESHCHAT_CHANNEL")]
        channel: Option<String>,

        /// Wrap peer connections in TLS.
        #[arg(long, env = "MESHCHAT_TLS")]
        tls: bool,

        /// Directory holding cert.pem and key.pem.
        #[arg(long, env = "MESHCHAT_TLS_DIR")]
        tls_dir: Option<PathBuf>,
    },
    /// Run a discovery mirror.
    Mirror {
        /// HTTP port.
        #[arg(long, env = "MESHCHAT_MIRROR_PORT")]
        port: Option<u16>,

        /// Interface to bind.
        #[arg(long, env = "MESHCHAT_MIRROR_BIND")]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Node {
            hostname,
            port,
            nickname,
            mirrors,
            mirror_list,
            listen_host,
            channel,
            tls,
            tls_dir,
        } => {
            let file_config = match &cli.config {
                Some(path) => load_node_config(path),
                None => NodeConfig::default(),
            };
            let mut config = NodeConfig {
                hostname: normalize_hostname(&hostname),
                port,
                nickname: nickname.unwrap_or(file_config.nickname.clone()),
                mirrors: if mirrors.is_empty() {
                    file_config.mirrors.clone()
                } else {
                    mirrors
                },
                mirror_list: mirror_list.unwrap_or(file_config.mirror_list.clone()),
                listen_host: listen_host.or(file_config.listen_host.clone()),
                default_channel: channel.unwrap_or(file_config.default_channel.clone()),
                enable_tls: tls || file_config.enable_tls,
                tls_dir: tls_dir.unwrap_or(file_config.tls_dir.clone()),
                log_level: cli.log_level.unwrap_or(file_config.log_level.clone()),
                log_format: cli.log_format.unwrap_or(file_config.log_format.clone()),
                ..file_config
            };

            init_logging(config.log_format.parse()?, &config.log_level)?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            if config.nickname.trim().is_empty() {
                config.nickname = prompt_nickname(&mut lines).await?;
            }
            run_node(config, lines).await
        }
        Command::Mirror { port, bind } => {
            let file_config = match &cli.config {
                Some(path) => MirrorConfig::from_toml_file(&path.to_string_lossy())
                    .with_context(|| format!("reading {}", path.display()))?,
                None => MirrorConfig::default(),
            };
            let config = MirrorConfig {
                port: port.unwrap_or(file_config.port),
                bind: bind.unwrap_or(file_config.bind),
            };
            let format: LogFormat = cli.log_format.as_deref().unwrap_or("human").parse()?;
            init_logging(format, cli.log_level.as_deref().unwrap_or("info"))?;
            run_mirror(config).await
        }
    }
}

fn load_node_config(path: &std::path::Path) -> NodeConfig {
    match NodeConfig::from_toml_file(&path.to_string_lossy()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet.
            eprintln!("failed to load {}: {e}, using defaults", path.display());
            NodeConfig::default()
        }
    }
}

/// `localhost` is reached over IPv6 loopback.
fn normalize_hostname(hostname: &str) -> String {
    let hostname = hostname.trim();
    if hostname.eq_ignore_ascii_case("localhost") {
        "[::1]".to_string()
    } else {
        hostname.to_string()
    }
}

async fn prompt_nickname(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<String> {
    loop {
        print!("nickname: ");
        std::io::stdout().flush()?;
        let line = lines.next_line().await?.context("stdin closed before a nickname was given")?;
        let nickname = line.trim();
        if !nickname.is_empty() {
            return Ok(nickname.to_string());
        }
    }
}

async fn run_node(config: NodeConfig, mut lines: Lines<BufReader<Stdin>>) -> anyhow::Result<()> {
    let events = EventBus::new();
    let receiver = events.subscribe();
    let mut node = ChatNode::start_with(config, events).await?;
    tracing::info!(node = %node.local(), address = %node.listen_addr(), "node running");
    println!("connected as {} in {}", node.local().display_name(), node.engine().home_name().await);

    let printer = tokio::spawn(print_events(receiver));
    let shutdown = node.shutdown_controller();
    tokio::select! {
        _ = shutdown.wait_for_signal() => {}
        result = console_loop(&node, &mut lines) => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "console input failed");
            }
        }
    }

    node.stop().await;
    printer.abort();
    tracing::info!("meshchat daemon exited cleanly");
    // A pending stdin read would otherwise hold runtime shutdown open.
    std::process::exit(0)
}

async fn print_events(mut events: broadcast::Receiver<NodeEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                for line in console::render(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "console fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Read console lines until `EXIT` or end of input.
async fn console_loop(node: &ChatNode, lines: &mut Lines<BufReader<Stdin>>) -> std::io::Result<()> {
    let engine = node.engine();
    while let Some(line) = lines.next_line().await? {
        match console::parse(&line) {
            Input::Empty => {}
            Input::Exit => break,
            Input::Chat(text) => {
                engine.send_chat(&text).await;
            }
            Input::Create(name) => {
                if let Err(e) = engine.create_channel(&name).await {
                    println!("! {e}");
                }
            }
            Input::Join(name) => {
                if let Err(e) = engine.change_channel(&name).await {
                    println!("! {e}");
                }
            }
            Input::Pm { nickname, text } => {
                if let Err(e) = engine.send_private_to(&nickname, &text).await {
                    println!("! {e}");
                }
            }
            Input::Members => {
                let members = engine.members().await;
                println!("{} in {}:", members.len(), engine.home_name().await);
                for member in members {
                    println!("  {member}");
                }
            }
            Input::Channels => {
                for (name, count) in engine.channels().await {
                    println!("  {name} ({count})");
                }
            }
            Input::History => {
                for line in console::chronological(&engine.history().await) {
                    println!("{line}");
                }
            }
            Input::Peers => {
                for peer in engine.peers().await {
                    println!("  {peer}");
                }
            }
            Input::Usage(usage) => println!("{usage}"),
        }
    }
    Ok(())
}

async fn run_mirror(config: MirrorConfig) -> anyhow::Result<()> {
    tracing::info!(address = %config.listen_address(), "starting mirror");
    let server = MirrorServer::new(config);
    let signal = ShutdownController::new();
    server
        .start(async move { signal.wait_for_signal().await })
        .await?;
    tracing::info!("mirror stopped");
    Ok(())
}
