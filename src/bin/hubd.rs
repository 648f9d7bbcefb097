//! Hub binary: central collector/evaluator server (`spec.md` §2). Grounded in
//! the donor's `bin/fleet_hub.rs` bootstrap shape — `clap` CLI overlaying env
//! vars, `dotenvy`, `tracing_subscriber`, pool + migrations, background tasks
//! spawned ahead of `axum::serve`.

use beszel_core::hub;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hubd", about = "beszel hub — central collection and alerting server")]
struct CliArgs {
    /// SQLite database URL, e.g. sqlite://beszel.db
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Port to listen on (overridden by --bind-address)
    #[arg(long, short)]
    port: Option<u16>,

    /// Full bind address, e.g. 0.0.0.0:8090
    #[arg(long)]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hubd=debug")),
        )
        .init();

    let args = CliArgs::parse();
    let config = hub::config::HubConfig::from_env(args.database_url, args.bind_address, args.port)?;

    info!(bind = %config.bind_address, db = %config.database_url, "starting beszel hub");

    let pool = hub::db::create_pool(&config.database_url).await?;
    hub::db::run_migrations(&pool).await?;

    let hub_key = russh_keys::key::KeyPair::generate_ed25519()
        .ok_or_else(|| anyhow::anyhow!("failed to generate hub ed25519 keypair"))?;

    let poll_tick = config.poll_tick;
    let down_after_failures = config.down_after_failures;
    let retention_interval = config.retention_sweep_interval;

    let state = hub::HubState::new(pool, config, hub_key);

    let scheduler_state = state.clone();
    tokio::spawn(async move {
        hub::scheduler::run(
            scheduler_state.store.clone(),
            scheduler_state.registry.clone(),
            scheduler_state.notifier.clone(),
            (*scheduler_state.hub_key).clone(),
            env!("CARGO_PKG_VERSION").to_string(),
            poll_tick,
            down_after_failures,
        )
        .await;
    });
    info!("poll scheduler started");

    let retention_store = state.store.clone();
    tokio::spawn(hub::retention::run(retention_store, retention_interval));
    info!("retention sweeper started");

    let app = hub::api::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&state.config.bind_address).await?;
    info!(address = %state.config.bind_address, "hub listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("hub shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    info!("shutdown signal received");
}
