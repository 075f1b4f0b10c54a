//! Backtest orchestrator and event loop.
//!
//! One run walks the in-range bars once, in order. For each bar:
//! fill the pending order at the open, update indicators, evaluate the
//! active rule list against the close, record equity. After the last bar an
//! open position is liquidated at the final close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::condition::{self, RuleParams};
use super::config_validation::validate_strategy_config;
use super::equity::{EquityPoint, EquityTracker};
use super::error::BacktestError;
use super::execution::{Fill, PositionStateMachine};
use super::indicator::IndicatorEngine;
use super::metrics::Metrics;
use super::ohlcv::{PriceBar, bars_in_range};
use super::position::Trade;
use super::strategy::StrategyConfig;

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
}

/// Run a single backtest over `bars`.
pub fn run(config: &StrategyConfig, bars: &[PriceBar]) -> Result<BacktestResult, BacktestError> {
    run_with_cancel(config, bars, &CancellationToken::new())
}

/// Run several configurations against the same bar series in parallel.
/// Results come back in the order of `configs`.
pub fn run_many(
    configs: &[StrategyConfig],
    bars: &[PriceBar],
    cancel: &CancellationToken,
) -> Vec<Result<BacktestResult, BacktestError>> {
    configs
        .par_iter()
        .map(|config| run_with_cancel(config, bars, cancel))
        .collect()
}

/// Run a single backtest, checking `cancel` before every bar.
pub fn run_with_cancel(
    config: &StrategyConfig,
    bars: &[PriceBar],
    cancel: &CancellationToken,
) -> Result<BacktestResult, BacktestError> {
    let params = validate_strategy_config(config)?;
    let window = bars_in_range(bars, &config.symbol, config.start_date, config.end_date)?;

    info!(
        symbol = %config.symbol,
        start = %config.start_date,
        end = %config.end_date,
        bars = window.len(),
        "starting backtest"
    );

    let mut backtester = Backtester::new(config, params, window.len());
    for bar in window {
        if cancel.is_cancelled() {
            info!(symbol = %config.symbol, at = %bar.timestamp, "backtest cancelled");
            return Err(BacktestError::Cancelled);
        }
        backtester.step(bar)?;
    }
    let result = backtester.finish(window)?;

    info!(
        symbol = %result.symbol,
        trades = result.metrics.num_trades,
        total_return = result.metrics.total_return,
        "backtest finished"
    );
    Ok(result)
}

/// Mutable state of one run.
struct Backtester<'a> {
    config: &'a StrategyConfig,
    params: RuleParams,
    indicators: IndicatorEngine,
    machine: PositionStateMachine,
    equity: EquityTracker,
}

impl<'a> Backtester<'a> {
    fn new(config: &'a StrategyConfig, params: RuleParams, bars: usize) -> Self {
        Backtester {
            config,
            params,
            indicators: IndicatorEngine::new(&params.indicator_periods()),
            machine: PositionStateMachine::new(config.initial_capital, config.execution.clone()),
            equity: EquityTracker::with_capacity(bars),
        }
    }

    fn step(&mut self, bar: &PriceBar) -> Result<(), BacktestError> {
        if let Some(fill) = self.machine.fill_pending(bar)? {
            self.log_fill(bar, &fill);
        }

        let state = self.indicators.update(bar);

        if self.machine.pending().is_none() {
            if self.machine.is_flat() {
                if condition::evaluate(&self.config.entry_conditions, &state, &self.params) {
                    debug!(at = %bar.timestamp, "entry signal");
                    self.machine.signal_entry(bar.timestamp)?;
                }
            } else if condition::evaluate(&self.config.exit_conditions, &state, &self.params) {
                debug!(at = %bar.timestamp, "exit signal");
                self.machine.signal_exit(bar.timestamp)?;
            }
        }

        self.equity.record(
            bar.timestamp,
            self.machine.cash(),
            self.machine.position(),
            bar.close,
        )?;
        Ok(())
    }

    fn log_fill(&self, bar: &PriceBar, fill: &Fill) {
        match fill {
            Fill::Entered {
                quantity,
                execution_price,
                commission,
            } => debug!(
                at = %bar.timestamp,
                quantity,
                price = execution_price,
                commission,
                "entered long"
            ),
            Fill::InsufficientCapital { execution_price } => warn!(
                at = %bar.timestamp,
                price = execution_price,
                cash = self.machine.cash(),
                "skipping entry: cash does not cover one unit"
            ),
            Fill::Exited(trade) => debug!(
                at = %bar.timestamp,
                quantity = trade.quantity,
                price = trade.exit_price,
                pnl = trade.pnl,
                "exited long"
            ),
        }
    }

    fn finish(mut self, window: &[PriceBar]) -> Result<BacktestResult, BacktestError> {
        let last = window
            .last()
            .ok_or_else(|| BacktestError::internal("finished a run without bars"))?;

        if let Some(trade) = self.machine.liquidate(last)? {
            debug!(
                at = %last.timestamp,
                quantity = trade.quantity,
                price = trade.exit_price,
                pnl = trade.pnl,
                "liquidated at end of data"
            );
            self.equity
                .rewrite_last(self.machine.cash(), self.machine.position(), last.close);
        }

        if self.equity.len() != window.len() {
            return Err(BacktestError::internal(format!(
                "equity curve has {} points for {} bars",
                self.equity.len(),
                window.len()
            )));
        }

        let trades = self.machine.into_trades();
        if let Some(bad) = trades.iter().find(|t| t.quantity.is_nan() || t.quantity <= 0.0) {
            return Err(BacktestError::internal(format!(
                "trade entered {} has quantity {}",
                bad.entry_timestamp, bad.quantity
            )));
        }

        let equity_curve = self.equity.into_points();
        let metrics = Metrics::compute(&trades, &equity_curve, self.config.initial_capital);

        Ok(BacktestResult {
            symbol: self.config.symbol.clone(),
            trades,
            equity_curve,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::Condition;
    use crate::domain::position::ExitReason;
    use crate::domain::strategy::{ExecutionConfig, Parameter, Parameters};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64)
    }

    fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: date(i as u32),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn price_sma_config(entry: Vec<Condition>, exit: Vec<Condition>) -> StrategyConfig {
        StrategyConfig {
            symbol: "TEST".into(),
            start_date: date(0),
            end_date: date(60),
            initial_capital: 1_000.0,
            entry_conditions: entry,
            exit_conditions: exit,
            parameters: Parameters::new().with(Parameter::SmaPeriod, 2.0),
            execution: ExecutionConfig::default(),
        }
    }

    #[test]
    fn entry_fills_at_next_open_and_liquidates() {
        // SMA(2) becomes available on bar 1; close 12 > (10+12)/2 on bar 1.
        let bars = bars_from_closes(&[10.0, 12.0, 14.0, 16.0]);
        let config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);

        let result = run(&config, &bars).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_timestamp, date(2));
        assert_relative_eq!(trade.entry_price, 14.0);
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_timestamp, date(3));
        assert_relative_eq!(trade.exit_price, 16.0);
        // 1000 / 14 → 71 shares, 2 dollars each.
        assert_relative_eq!(trade.quantity, 71.0);
        assert_relative_eq!(trade.pnl, 142.0);

        assert_eq!(result.equity_curve.len(), bars.len());
        assert_relative_eq!(result.metrics.final_equity, 1_142.0);
        assert_relative_eq!(result.metrics.total_return, 14.2, epsilon = 1e-9);
    }

    #[test]
    fn exit_signal_closes_position() {
        let bars = bars_from_closes(&[10.0, 12.0, 14.0, 9.0, 8.0, 7.0]);
        let config = price_sma_config(
            vec![Condition::PriceAboveSma],
            vec![Condition::PriceBelowSma],
        );
        let result = run(&config, &bars).unwrap();

        let first = &result.trades[0];
        assert_eq!(first.entry_timestamp, date(2));
        // Close 9 < (14+9)/2 on bar 3 → exit at bar 4 open.
        assert_eq!(first.exit_timestamp, date(4));
        assert_eq!(first.exit_reason, ExitReason::Signal);
        assert_relative_eq!(first.exit_price, 8.0);
        assert!(first.pnl < 0.0);
        assert_eq!(result.metrics.num_losses, 1);
    }

    #[test]
    fn no_signal_means_flat_curve() {
        let bars = bars_from_closes(&[10.0, 9.0, 8.0, 7.0]);
        let config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        let result = run(&config, &bars).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.equity_curve.iter().all(|p| p.equity == 1_000.0));
        assert_eq!(result.metrics.win_rate, 0.0);
        assert_eq!(result.metrics.total_return, 0.0);
    }

    #[test]
    fn signal_on_last_bar_is_dropped() {
        let bars = bars_from_closes(&[10.0, 9.0, 8.0, 12.0]);
        let config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        let result = run(&config, &bars).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn bars_outside_window_are_ignored() {
        let bars = bars_from_closes(&[10.0, 12.0, 14.0, 16.0, 18.0]);
        let mut config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        config.start_date = date(1);
        config.end_date = date(3);
        let result = run(&config, &bars).unwrap();
        assert_eq!(result.equity_curve.len(), 3);
        assert_eq!(result.equity_curve.first().unwrap().timestamp, date(1));
        assert_eq!(result.equity_curve.last().unwrap().timestamp, date(3));
    }

    #[test]
    fn validation_runs_before_data_checks() {
        let mut config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        config.initial_capital = -5.0;
        let err = run(&config, &[]).unwrap_err();
        assert_eq!(err.field(), Some("initial_capital"));
    }

    #[test]
    fn empty_window_is_no_data() {
        let bars = bars_from_closes(&[10.0, 11.0]);
        let mut config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        config.start_date = date(10);
        config.end_date = date(20);
        assert!(matches!(
            run(&config, &bars),
            Err(BacktestError::NoData { .. })
        ));
    }

    #[test]
    fn cancelled_run_returns_no_result() {
        let bars = bars_from_closes(&[10.0, 12.0, 14.0]);
        let config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            run_with_cancel(&config, &bars, &cancel),
            Err(BacktestError::Cancelled)
        ));
    }

    #[test]
    fn run_many_preserves_order() {
        let bars = bars_from_closes(&[10.0, 12.0, 14.0, 16.0]);
        let good = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        let mut bad = good.clone();
        bad.symbol.clear();

        let results = run_many(&[good.clone(), bad, good], &bars, &CancellationToken::new());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().field(), Some("symbol"));
        assert_eq!(results[0].as_ref().unwrap(), results[2].as_ref().unwrap());
    }

    #[test]
    fn liquidation_costs_reflected_in_final_equity() {
        let bars = bars_from_closes(&[10.0, 12.0, 14.0, 16.0]);
        let mut config = price_sma_config(vec![Condition::PriceAboveSma], vec![]);
        config.execution.commission_per_trade = 1.0;
        let result = run(&config, &bars).unwrap();
        let last = result.equity_curve.last().unwrap();
        assert_eq!(last.positions_value, 0.0);
        assert_relative_eq!(last.equity, result.metrics.final_equity);
        assert_relative_eq!(
            result.metrics.final_equity,
            1_000.0 + result.trades[0].pnl,
            epsilon = 1e-9
        );
    }
}
