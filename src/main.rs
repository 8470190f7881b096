// =============================================================================
// Borealis Signal Core — Main Entry Point
// =============================================================================
//
// Boot order: logging -> settings -> store -> streaming supervisor -> HTTP
// API -> wait for ctrl-c -> graceful shutdown. Ingestion faults never take
// the process down; the API keeps serving whatever the store holds.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod providers;
mod settings;
mod signals;
mod storage;
mod streaming;
mod timeframes;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::settings::Settings;
use crate::storage::BarStore;
use crate::streaming::StreamingSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Borealis Signal Core — Starting Up               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let settings = Arc::new(Settings::from_env()?);

    // ── 2. Storage ───────────────────────────────────────────────────────
    let store = Arc::new(BarStore::open(&settings.store_path)?);
    info!(path = %settings.store_path, "bar store opened");

    // ── 3. Streaming supervisor ──────────────────────────────────────────
    let supervisor = Arc::new(StreamingSupervisor::new(settings.clone(), store.clone()));
    let supervisor_handle = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.run().await })
    };

    // ── 4. HTTP API ──────────────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        settings.clone(),
        store.clone(),
        supervisor.status(),
    ));

    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "API server listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received — stopping gracefully");

    supervisor.shutdown();
    let _ = supervisor_handle.await;
    server_handle.abort();

    info!("Borealis Signal Core shut down complete.");
    Ok(())
}
