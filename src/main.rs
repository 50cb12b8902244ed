//! rona-redir
//!
//! Transparent TCP redirector:
//! - Accepts connections diverted by the host packet filter
//! - Recovers each connection's original destination
//! - Forwards the stream through a randomly chosen rona relay server
//!   behind an encrypted opening frame

use anyhow::{Context, Result};
use clap::Parser;
use rona_redir::config::Config;
use rona_redir::redir::RedirServer;
use rona_redir::transport::RelayServer;
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Usage or configuration problem
const EXIT_CONFIG: u8 = 1;
/// Relay address resolution failed
const EXIT_RESOLVE: u8 = 2;
/// Redirect endpoint could not be resolved or bound
const EXIT_SOCKET: u8 = 4;

/// rona-redir - transparent TCP redirector through rona relay servers
#[derive(Parser, Debug)]
#[command(name = "rona-redir")]
#[command(about = "Transparent TCP redirector through rona relay servers")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', value_name = "FILE")]
    config: Option<String>,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // --help and --version land in the error branch too; only genuine usage
    // errors exit non-zero.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let usage_error = e.use_stderr();
            let _ = e.print();
            return if usage_error {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    let Some(config_path) = args.config else {
        error!("no configuration file given, see --help");
        return ExitCode::from(EXIT_CONFIG);
    };

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if config.server.is_empty() {
        error!("no [[server]] entries in {}", config_path);
        return ExitCode::from(EXIT_CONFIG);
    }

    let relays = match resolve_relays(&config).await {
        Ok(relays) => relays,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_RESOLVE);
        }
    };

    let server = match RedirServer::bind(&config.redir, relays).await {
        Ok(server) => server,
        Err(e) => {
            error!(
                "cannot listen on {}:{}: {}",
                config.redir.address, config.redir.port, e
            );
            return ExitCode::from(EXIT_SOCKET);
        }
    };

    info!(
        "starting rona-redir v{} at {}:{}",
        rona_redir::VERSION,
        config.redir.address,
        config.redir.port
    );

    let mut sigterm =
        signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

    // In-flight connections are not drained; process exit closes their
    // sockets.
    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Shutting down...");
        }
    }

    ExitCode::SUCCESS
}

/// Resolve every configured relay once, before accepting anything.
async fn resolve_relays(config: &Config) -> Result<Vec<RelayServer>> {
    let mut relays = Vec::with_capacity(config.server.len());
    for server in &config.server {
        let relay = RelayServer::resolve(server).await.with_context(|| {
            format!(
                "wrong server address/port {}:{}",
                server.address, server.port
            )
        })?;
        relays.push(relay);
    }
    Ok(relays)
}
