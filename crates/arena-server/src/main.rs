//! Binary entry point: CLI/config loading, logging setup, the reference
//! WebSocket transport, and the tick-loop driver that ties `arena-sim`'s
//! `World` to it (SPEC_FULL.md §A "arena-server").

mod config;
mod ids;
mod state;
mod tick;
mod ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use arena_sim::World;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let world_config = config::load_world_config(&args).context("loading world config")?;
    info!(?world_config, "starting world");

    let tick_rate = world_config.tick_rate;
    let world = World::new(world_config);
    let state = Arc::new(AppState::new(world, tick_rate));

    let tick_state = state.clone();
    tokio::spawn(async move { tick::run(tick_state).await });

    let app = Router::new().route("/ws", get(ws::ws_handler)).with_state(state);

    let listener = TcpListener::bind(args.listen).await.with_context(|| format!("binding {}", args.listen))?;
    info!(listen = %args.listen, "listening for subscribers");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("shut down cleanly");
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or, on Unix, SIGTERM — whichever arrives
/// first — so the process can exit with code 0 on a clean stop
/// (SPEC_FULL.md §F "graceful shutdown").
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
