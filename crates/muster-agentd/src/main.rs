//! Minimal dedicated-server shell: connects to the cluster, reports its
//! lifecycle to the pool and idles until the assigned session ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::Context;
use muster_agent::{AgentConfig, PoolSession};
use muster_lib::session::{GameSessionStartupParameters, Status};
use tokio::sync::mpsc;

const STAGE_READY: u8 = 0;
const STAGE_IN_PROGRESS: u8 = 1;

const DEFAULT_ENDPOINT: &str = "127.0.0.1:41800";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let mut config = AgentConfig {
        parameters_from_env: true,
        ..Default::default()
    };
    config.apply_env();
    if config.cluster_endpoints.is_empty() {
        config.cluster_endpoints.push(DEFAULT_ENDPOINT.to_owned());
    }

    let session = PoolSession::connect(&config)
        .await
        .context("connecting to the cluster")?;

    // Lifecycle state shared with the pool's status probes.
    let stage = Arc::new(AtomicU8::new(STAGE_READY));
    let probe_stage = stage.clone();
    session.set_status_callback(move || match probe_stage.load(Ordering::Relaxed) {
        STAGE_READY => Status::Ready,
        STAGE_IN_PROGRESS => Status::InProgress,
        _ => Status::Complete,
    });

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let _shutdown = session.subscribe_shutdown(move || {
        let _ = shutdown_tx.try_send(());
    });

    tracing::info!("waiting for a game session assignment");
    let assignment: GameSessionStartupParameters<HashMap<String, String>> = session
        .wait_game_session()
        .await
        .context("waiting for a game session")?;

    stage.store(STAGE_IN_PROGRESS, Ordering::Relaxed);
    tracing::info!(
        token = %assignment.game_session_connection_token,
        teams = assignment.config.teams.len(),
        players = assignment.config.player_ids.len(),
        "game session assigned"
    );

    // The pool decides when this server goes away.
    let _ = shutdown_rx.recv().await;
    tracing::info!("shutdown requested by the pool, exiting");
    Ok(())
}
