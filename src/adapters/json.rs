//! JSON request and response documents.
//!
//! Field names are camelCase on the wire. Rule parameters sit next to the
//! condition lists inside `rules` and may be spelled in camelCase or
//! snake_case.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::backtest::BacktestResult;
use crate::domain::equity::EquityPoint;
use crate::domain::error::BacktestError;
use crate::domain::position::Trade;
use crate::domain::strategy::{
    ExecutionConfig, Parameter, Parameters, SizingPolicy, StrategyConfig, parse_conditions,
    parse_date,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_capital: f64,
    pub rules: RulesRequest,
    #[serde(default)]
    pub execution: Option<ExecutionRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesRequest {
    #[serde(default, alias = "entry_conditions")]
    pub entry_conditions: Vec<String>,
    #[serde(default, alias = "exit_conditions")]
    pub exit_conditions: Vec<String>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionRequest {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub sizing: Option<String>,
}

impl BacktestRequest {
    /// Parse a request body. Malformed JSON is reported as a validation
    /// failure on the `request` field.
    pub fn from_json(body: &[u8]) -> Result<Self, BacktestError> {
        serde_json::from_slice(body)
            .map_err(|e| BacktestError::validation("request", e.to_string()))
    }

    pub fn into_config(self) -> Result<StrategyConfig, BacktestError> {
        let start_date = parse_date("start_date", &self.start_date)?;
        let end_date = parse_date("end_date", &self.end_date)?;

        let entry_conditions = parse_conditions("entry_conditions", &self.rules.entry_conditions)?;
        let exit_conditions = parse_conditions("exit_conditions", &self.rules.exit_conditions)?;
        let parameters = parameters_from_json(&self.rules.parameters)?;

        let execution = match self.execution {
            Some(exec) => ExecutionConfig {
                commission_per_trade: exec.commission_per_trade,
                commission_pct: exec.commission_pct,
                slippage_pct: exec.slippage_pct,
                sizing: match exec.sizing.as_deref() {
                    Some(s) => s.parse::<SizingPolicy>()?,
                    None => SizingPolicy::default(),
                },
            },
            None => ExecutionConfig::default(),
        };

        Ok(StrategyConfig {
            symbol: self.symbol.trim().to_string(),
            start_date,
            end_date,
            initial_capital: self.initial_capital,
            entry_conditions,
            exit_conditions,
            parameters,
            execution,
        })
    }
}

fn parameters_from_json(
    raw: &BTreeMap<String, serde_json::Value>,
) -> Result<Parameters, BacktestError> {
    let mut pairs = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        match value.as_f64() {
            Some(number) => pairs.push((name.as_str(), number)),
            None if name.parse::<Parameter>().is_ok() => {
                return Err(BacktestError::validation(
                    name.as_str(),
                    format!("expected a number, got {value}"),
                ));
            }
            None => tracing::warn!(parameter = %name, "ignoring unknown non-numeric rule field"),
        }
    }
    Parameters::from_pairs(pairs)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub side: String,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub holding_days: i64,
    pub exit_reason: String,
}

impl From<&Trade> for TradeDto {
    fn from(trade: &Trade) -> Self {
        TradeDto {
            entry_date: trade.entry_timestamp,
            exit_date: trade.exit_timestamp,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            quantity: trade.quantity,
            side: trade.side.to_string(),
            pnl: trade.pnl,
            pnl_percent: trade.pnl_percent,
            holding_days: trade.holding_days(),
            exit_reason: trade.exit_reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPointDto {
    pub timestamp: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub positions_value: f64,
}

impl From<&EquityPoint> for EquityPointDto {
    fn from(point: &EquityPoint) -> Self {
        EquityPointDto {
            timestamp: point.timestamp,
            equity: point.equity,
            cash: point.cash,
            positions_value: point.positions_value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResponse {
    pub symbol: String,
    pub trades: Vec<TradeDto>,
    pub total_return: f64,
    pub num_trades: usize,
    pub num_wins: usize,
    pub num_losses: usize,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub profit_factor: Option<f64>,
    pub avg_trade_pnl: f64,
    pub final_equity: f64,
    pub equity_curve: Vec<EquityPointDto>,
}

impl From<&BacktestResult> for BacktestResponse {
    fn from(result: &BacktestResult) -> Self {
        let m = &result.metrics;
        BacktestResponse {
            symbol: result.symbol.clone(),
            trades: result.trades.iter().map(TradeDto::from).collect(),
            total_return: m.total_return,
            num_trades: m.num_trades,
            num_wins: m.num_wins,
            num_losses: m.num_losses,
            win_rate: m.win_rate,
            max_drawdown: m.max_drawdown,
            profit_factor: m.profit_factor,
            avg_trade_pnl: m.avg_trade_pnl,
            final_equity: m.final_equity,
            equity_curve: result.equity_curve.iter().map(EquityPointDto::from).collect(),
        }
    }
}

/// Error document: `{"error": "...", "field": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&BacktestError> for ErrorBody {
    fn from(err: &BacktestError) -> Self {
        ErrorBody {
            error: err.to_string(),
            field: err.field().map(str::to_string),
        }
    }
}
