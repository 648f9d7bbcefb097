//! Agent binary: per-host sampling/serving process (`spec.md` §2, §6).
//! Grounded in the donor's `bin/fleet_hub.rs` bootstrap shape, adapted to the
//! agent's simpler surface: load config, start whichever transports are
//! configured, run until signalled.

use beszel_core::agent::config::{AgentConfig, ListenAddr};
use beszel_core::agent::{transport, AgentCore};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "agentd", about = "beszel agent — per-host telemetry sampler and transport server")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the agent version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    if matches!(args.command, Some(Command::Version)) {
        println!("agentd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,agentd=debug")),
        )
        .init();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "agent configuration invalid");
            std::process::exit(2);
        }
    };

    let core = Arc::new(Mutex::new(AgentCore::new(config.clone())));

    let push_enabled = config.push_enabled();
    let mut handles = Vec::new();

    match &config.listen {
        ListenAddr::Tcp(addr) => {
            let bind_addr = addr.clone();
            let authorized_keys = config.authorized_keys.clone();
            let pull_core = core.clone();
            handles.push(tokio::spawn(async move {
                if let Err(err) = transport::pull::run(bind_addr, authorized_keys, pull_core).await {
                    error!(%err, "pull transport exited");
                }
            }));
        }
        ListenAddr::Unix(path) => {
            // The pull transport's SSH server binds only TCP listeners in
            // this build; Unix-domain listen addresses are parsed for
            // config-surface parity but not yet servable.
            warn!(path = %path.display(), "unix-socket pull transport is not supported, only TCP LISTEN/ADDR/PORT values are servable");
        }
    }

    if push_enabled {
        let push_config = config.clone();
        let push_core = core.clone();
        handles.push(tokio::spawn(async move {
            transport::push::run(push_config, push_core).await;
        }));
        info!("push transport started");
    } else {
        info!("push transport not configured (set TOKEN and HUB_URL to enable)");
    }

    if handles.is_empty() {
        error!("no transport is running; check LISTEN/ADDR/PORT and TOKEN/HUB_URL configuration");
        std::process::exit(1);
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = futures::future::select_all(handles) => {
            error!("a transport task exited unexpectedly");
        }
    }

    Ok(())
}
