//! HTTP request handlers for the JSON API.

use axum::{
    Json,
    body::Bytes,
    extract::State,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::adapters::json::{BacktestRequest, BacktestResponse};
use crate::domain::backtest;
use crate::domain::config_validation::validate_strategy_config;

use super::{ApiError, AppState};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_symbols(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let symbols = state.data_port.list_symbols()?;
    Ok(Json(json!({ "symbols": symbols })))
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BacktestResponse>, ApiError> {
    let config = BacktestRequest::from_json(&body)?.into_config()?;
    // Reject bad configs before touching the data source.
    validate_strategy_config(&config)?;

    tracing::info!(symbol = %config.symbol, "backtest requested");

    let data_port = Arc::clone(&state.data_port);
    let result = tokio::task::spawn_blocking(move || {
        let bars = data_port.fetch_bars(&config.symbol, config.start_date, config.end_date)?;
        backtest::run(&config, &bars)
    })
    .await
    .map_err(|e| ApiError::internal(format!("backtest task failed: {e}")))??;

    Ok(Json(BacktestResponse::from(&result)))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("no such route")
}
