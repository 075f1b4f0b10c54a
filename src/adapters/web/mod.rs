//! HTTP JSON API adapter.
//!
//! `POST /api/backtest` runs one backtest from a JSON request; `GET /health`
//! reports liveness. Backtests run on the blocking pool.

mod error;
mod handlers;

pub use error::{ApiError, status_from_error};
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::ports::data_port::DataPort;

pub struct AppState {
    pub data_port: Arc<dyn DataPort + Send + Sync>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/backtest", post(handlers::run_backtest))
        .route("/api/symbols", get(handlers::list_symbols))
        .fallback(handlers::not_found)
        .with_state(Arc::new(state))
}
