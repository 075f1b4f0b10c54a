#![allow(dead_code)]

use chrono::NaiveDate;
use rulebt::domain::condition::Condition;
use rulebt::domain::error::BacktestError;
pub use rulebt::domain::ohlcv::PriceBar;
use rulebt::domain::strategy::{ExecutionConfig, Parameter, Parameters, StrategyConfig};
use rulebt::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start_date && b.timestamp <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BacktestError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacktestError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bar whose open is one below the close.
pub fn make_bar(timestamp: &str, close: f64) -> PriceBar {
    PriceBar {
        timestamp: NaiveDate::parse_from_str(timestamp, "%Y-%m-%d").unwrap(),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000,
    }
}

/// Daily bars with open == close, one per calendar day from `start`.
pub fn bars_from_closes(start: &str, closes: &[f64]) -> Vec<PriceBar> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000,
        })
        .collect()
}

/// `count` daily bars swinging around `base` so that RSI visits both extremes.
pub fn generate_bars(start: &str, count: usize, base: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let phase = (i as f64) / 6.0;
            base + 10.0 * phase.sin() + (i % 3) as f64 * 0.25
        })
        .collect();
    bars_from_closes(start, &closes)
}

pub fn rsi_config(symbol: &str, start: NaiveDate, end: NaiveDate) -> StrategyConfig {
    StrategyConfig {
        symbol: symbol.to_string(),
        start_date: start,
        end_date: end,
        initial_capital: 10_000.0,
        entry_conditions: vec![Condition::RsiOversold],
        exit_conditions: vec![Condition::RsiOverbought],
        parameters: Parameters::new()
            .with(Parameter::RsiPeriod, 14.0)
            .with(Parameter::RsiOversold, 30.0)
            .with(Parameter::RsiOverbought, 70.0),
        execution: ExecutionConfig::default(),
    }
}

pub fn sma_cross_config(symbol: &str, start: NaiveDate, end: NaiveDate) -> StrategyConfig {
    StrategyConfig {
        symbol: symbol.to_string(),
        start_date: start,
        end_date: end,
        initial_capital: 10_000.0,
        entry_conditions: vec![Condition::SmaCrossover],
        exit_conditions: vec![Condition::SmaCrossunder],
        parameters: Parameters::new()
            .with(Parameter::SmaPeriod, 3.0)
            .with(Parameter::SmaSlowPeriod, 8.0),
        execution: ExecutionConfig::default(),
    }
}
