//! # balancer
//!
//! Keeps the world's simulation load spread across a fleet of simulation
//! workers. The world rectangle is cut into one cell per worker, and write
//! authority over every entity's spatial components follows the entity into
//! whichever cell it occupies. The fleet grows and shrinks with the number
//! of connected clients.
//!
//! ## Startup Sequence
//!
//! 1. Parse flags and load the optional JSON config.
//! 2. Connect to NATS (`--nats-url`, then `NATS_URL`, then the local default).
//! 3. Subscribe to this worker's op subject and to flag updates.
//! 4. Request the first simulation worker and enter the event loop.

mod config;
mod coordinator;
mod entities;
mod event_loop;
mod fleet;
mod grid;
mod outbox;
mod process;
mod reconciler;
mod roster;
mod shapes;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Args, BalancerConfig};
use coordinator::Coordinator;
use event_loop::{EventLoop, LoopConfig};
use process::OsProcessHost;
use spatial_net::NatsConnection;
use spatial_net::connection::resolve_url;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("balancer=info".parse()?))
        .init();

    let args = Args::parse();
    let config = BalancerConfig::from_args(&args).context("loading configuration")?;
    let worker_id = args.worker_id();
    info!(
        %worker_id,
        launch_mode = ?args.launch_mode(),
        respawn_ships = config.respawn_ships,
        "configuration loaded"
    );

    let conn = NatsConnection::connect_to(&resolve_url(args.nats_url.as_deref())).await?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let host = OsProcessHost::new(config.launch_spec(&args), events_tx);
    let loop_config = LoopConfig {
        worker_id,
        sweep_interval: config.sweep_interval(),
    };
    let coordinator = Coordinator::new(config, host);

    EventLoop::new(loop_config, coordinator, events_rx)
        .run(&conn)
        .await?;

    info!("balancer shut down");
    Ok(())
}
