//! HTTP error responses for the JSON API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::adapters::json::ErrorBody;
use crate::domain::error::BacktestError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                field: None,
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<BacktestError> for ApiError {
    fn from(err: BacktestError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "backtest request failed");
        }
        Self {
            status,
            body: ErrorBody::from(&err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn status_from_error(err: &BacktestError) -> StatusCode {
    match err {
        BacktestError::Validation { .. } | BacktestError::ConfigParse { .. } => {
            StatusCode::BAD_REQUEST
        }
        BacktestError::DataGap { .. } | BacktestError::NoData { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BacktestError::DataSource { .. }
        | BacktestError::Internal { .. }
        | BacktestError::Cancelled
        | BacktestError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
