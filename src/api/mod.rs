//! HTTP surface over the dispatch engine.
//!
//! Admin routes live under `/jobs`, `/bids` and `/alerts`. Everything under
//! `/public` is scoped by a capability token or a shareable job id instead.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::DispatchEngine;

pub mod dto;
pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};
pub use handlers::REQUESTER_HEADER;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DispatchEngine>,
}

impl ApiState {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route("/jobs/:id", get(handlers::get_job).patch(handlers::update_job))
        .route("/jobs/:id/open-bidding", post(handlers::open_bidding))
        .route("/jobs/:id/links", get(handlers::get_links))
        .route("/jobs/:id/bids", get(handlers::list_job_bids))
        .route("/jobs/:id/cancel", post(handlers::cancel_job))
        .route("/bids/:key", post(handlers::submit_bid))
        .route("/bids/:key/select", post(handlers::select_bid))
        .route("/public/customer/:token/bids", get(handlers::customer_bids))
        .route("/public/customer/:token/select", post(handlers::customer_select))
        .route("/public/status/:id", get(handlers::public_status))
        .route("/public/vendor/:token", get(handlers::vendor_view))
        .route("/alerts", get(handlers::list_alerts))
        .route("/vendors", get(handlers::list_vendors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled, then drain open connections.
pub async fn run_api(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind API server");
        e
    })?;
    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
