//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for rulebt.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("data gap at {timestamp}: {reason}")]
    DataGap { timestamp: NaiveDate, reason: String },

    #[error("no data for {symbol} between {start_date} and {end_date}")]
    NoData {
        symbol: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error("backtest cancelled")]
    Cancelled,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BacktestError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        BacktestError::Internal {
            reason: reason.into(),
        }
    }

    /// The offending config field, if this is a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            BacktestError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. } | BacktestError::Validation { .. } => 2,
            BacktestError::DataSource { .. } => 3,
            BacktestError::DataGap { .. } | BacktestError::NoData { .. } => 5,
            BacktestError::Internal { .. } | BacktestError::Cancelled => 6,
        };
        std::process::ExitCode::from(code)
    }
}
