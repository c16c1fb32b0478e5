//! Bridge Simulator Server - authoritative world for multi-station crews
//!
//! This is the main entry point for the simulation server. It handles:
//! - The fixed-step world simulation and automatic snapshots
//! - WebSocket connections for UI clients and the GM console
//! - TCP connections for physical station panels
//! - Scripted missions driven by an embedded interpreter

mod app;
mod config;
mod error;
mod gm;
mod input;
mod mission;
mod net;
mod panel;
mod ship;
mod sim;
mod util;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::{load_ship_classes, PanelMapping, ServerConfig};
use crate::net::{tcp, ws};
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    init_server_time();

    info!("Bridge Simulator Server - starting");

    // Load configuration
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "configs".to_string());
    let config = ServerConfig::load(format!("{config_dir}/server.yaml"))?;
    let ship_classes = load_ship_classes(format!("{config_dir}/ships"))?;
    let panel_mappings = PanelMapping::load(format!("{config_dir}/panels.yaml"))?;

    info!(
        tick_rate = config.tick_rate,
        websocket_port = config.websocket_port,
        tcp_port = config.tcp_port,
        ship_classes = ship_classes.len(),
        "configuration loaded"
    );

    let snapshot_interval = config.snapshot_interval;
    let websocket_port = config.websocket_port;
    let tcp_port = config.tcp_port;

    let state = AppState::new(config, ship_classes, panel_mappings);

    let missions_dir = std::env::var("MISSIONS_DIR").unwrap_or_else(|_| "missions".to_string());
    let mission_count = state.missions.load_missions(&missions_dir)?;
    info!(mission_count, missions = ?state.missions.mission_ids(), "missions loaded");

    // Stop channel observed by every long-lived loop
    let (stop_tx, stop_rx) = watch::channel(false);

    // Simulation loop
    tokio::spawn(state.simulator.clone().run(stop_rx.clone()));

    // Automatic snapshots
    tokio::spawn(
        state
            .gm
            .clone()
            .run_snapshot_ticker(snapshot_interval, stop_rx.clone()),
    );

    // Broadcast and heartbeat loops
    tokio::spawn(ws::run_broadcast_loop(state.clone(), stop_rx.clone()));
    tokio::spawn(ws::run_heartbeat_loop(state.clone(), stop_rx.clone()));
    tokio::spawn(tcp::run_panel_broadcast(state.clone(), stop_rx.clone()));

    // Panel TCP server; binding failures are fatal at startup
    let panel_addr: SocketAddr = ([0, 0, 0, 0], tcp_port).into();
    let panel_listener = TcpListener::bind(panel_addr).await?;
    info!("panel TCP server listening on {panel_addr}");
    tokio::spawn(tcp::run_panel_server(panel_listener, state.clone(), stop_rx.clone()));

    // UI WebSocket server
    let ws_addr: SocketAddr = ([0, 0, 0, 0], websocket_port).into();
    let listener = TcpListener::bind(ws_addr).await?;
    info!("WebSocket server listening on ws://{ws_addr}/ws");

    let router = ws::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Signal every loop to exit
    let _ = stop_tx.send(true);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    info!("server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("received terminate signal, starting graceful shutdown");
        }
    }
}
