//! Distributed-tracing aggregator.
//!
//! Applications link the `agent` module in-process to buffer spans in a
//! bounded ring and serve them over HTTP. This binary is the collector: it
//! scrapes a configured set of agent endpoints, folds the results into a
//! two-tier in-memory span store, and answers a Zipkin-compatible query
//! API over that store.
//!
//! # Architecture
//!
//! - `model`: the `Span`/`Tag`/`Trace` data model and its wire codec
//! - `agent`: the bounded collector ring and its HTTP endpoint
//! - `scraper`: the HTTP scrape adapter and scheduling loop
//! - `storage`: the two-tier mutable/immutable span store
//! - `api`: Zipkin v1 JSON conversion and the query API router
//! - `core`: configuration and error handling
//! - `cli`: command-line entry point

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod api;
pub mod cli;
pub mod core;
pub mod model;
pub mod scraper;
pub mod storage;

use crate::core::{Config, Result};
use crate::scraper::{spawn_scrape_loops, Appender};
use crate::storage::SpanStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// HTTP path the collector's scrape adapter GETs on every configured
/// target; matches the path an embedded `agent::http::router` is normally
/// mounted at.
pub const AGENT_SCRAPE_PATH: &str = "/debug/spans";

/// Build the store, start one scrape loop per configured target, and serve
/// the query API until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<()> {
    let store = Arc::new(SpanStore::new());
    let targets = config.targets(AGENT_SCRAPE_PATH);
    tracing::info!(targets = targets.len(), "starting scrape loops");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let appender: Arc<dyn Appender> = store.clone();
    let scrape_handles = spawn_scrape_loops(targets, appender, shutdown_rx);

    let app = api::router(store).layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(config.server.bind_address).await?;
    tracing::info!(addr = %config.server.bind_address, "query API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    for handle in scrape_handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining scrape loops");
    let _ = shutdown_tx.send(true);
}
