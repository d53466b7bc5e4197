// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! RunMate API Server
//!
//! Serves the running group API and drives the group lifecycle jobs.

use runmate::{
    config::Config,
    db::{FirestoreDb, MemoryStore, RunningStore},
    services::{GroupService, Scheduler},
    time_utils::SystemClock,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting RunMate API");

    // Select the store backend
    let store: Arc<dyn RunningStore> = match &config.gcp_project_id {
        Some(project_id) => Arc::new(FirestoreDb::new(project_id).await?),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let groups = GroupService::new(store, Arc::new(SystemClock))
        .with_quick_match_title(config.quick_match_title.clone());

    // Start lifecycle jobs
    let scheduler = Scheduler::start(groups.clone(), &config.scheduler);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        groups,
    });

    // Build router
    let app = runmate::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("runmate=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
