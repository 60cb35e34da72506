//! HTTP API for host creation
//!
//! - `POST /create`: run one creation request
//! - `GET /health`: liveness probe

mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use hostforge_core::Provisioner;
use tokio_util::sync::CancellationToken;

/// Shared state for every request
#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<Provisioner>,
    /// Cancelled when the server shuts down; parent of every request token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(provisioner: Provisioner, shutdown: CancellationToken) -> Self {
        Self {
            provisioner: Arc::new(provisioner),
            shutdown,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/create", post(handlers::create))
        .with_state(state)
}
