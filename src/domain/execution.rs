//! Position state machine and fill simulation.
//!
//! The machine moves between `Flat` and `Long`. A signal on bar *i* only
//! records a pending order; the fill happens at the open of bar *i + 1*, so
//! the signal bar's close never doubles as its own execution price.

use chrono::NaiveDate;

use super::error::BacktestError;
use super::ohlcv::PriceBar;
use super::position::{ExitReason, Position, Side, Trade};
use super::strategy::{ExecutionConfig, SizingPolicy};

/// Tolerance for float drift when checking cash against fill cost.
const CASH_EPSILON: f64 = 1e-9;

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Long exit (sell): execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Largest quantity whose cost plus commission fits in `cash`.
pub fn size_entry(cash: f64, execution_price: f64, config: &ExecutionConfig) -> f64 {
    let spendable = cash - config.commission_per_trade;
    if spendable <= 0.0 || execution_price <= 0.0 {
        return 0.0;
    }
    let unit_cost = execution_price * (1.0 + config.commission_pct / 100.0);
    let quantity = spendable / unit_cost;
    match config.sizing {
        SizingPolicy::WholeShares => quantity.floor(),
        SizingPolicy::Fractional => quantity,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    Flat,
    Long(Position),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOrder {
    Enter { signal_timestamp: NaiveDate },
    Exit { signal_timestamp: NaiveDate },
}

/// Outcome of filling a pending order.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Entered {
        quantity: f64,
        execution_price: f64,
        commission: f64,
    },
    /// Cash could not buy a single unit; the machine stays flat.
    InsufficientCapital { execution_price: f64 },
    Exited(Trade),
}

#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    state: PositionState,
    pending: Option<PendingOrder>,
    cash: f64,
    config: ExecutionConfig,
    trades: Vec<Trade>,
}

impl PositionStateMachine {
    pub fn new(initial_cash: f64, config: ExecutionConfig) -> Self {
        Self {
            state: PositionState::Flat,
            pending: None,
            cash: initial_cash,
            config,
            trades: Vec::new(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            PositionState::Flat => None,
            PositionState::Long(position) => Some(position),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, PositionState::Flat)
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn pending(&self) -> Option<PendingOrder> {
        self.pending
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Queue an entry for the next bar's open. Only valid while flat with
    /// nothing pending.
    pub fn signal_entry(&mut self, timestamp: NaiveDate) -> Result<(), BacktestError> {
        if !self.is_flat() || self.pending.is_some() {
            return Err(BacktestError::internal(format!(
                "entry signal on {timestamp} while not flat or with an order pending"
            )));
        }
        self.pending = Some(PendingOrder::Enter {
            signal_timestamp: timestamp,
        });
        Ok(())
    }

    /// Queue an exit for the next bar's open. Only valid while long with
    /// nothing pending.
    pub fn signal_exit(&mut self, timestamp: NaiveDate) -> Result<(), BacktestError> {
        if self.is_flat() || self.pending.is_some() {
            return Err(BacktestError::internal(format!(
                "exit signal on {timestamp} while flat or with an order pending"
            )));
        }
        self.pending = Some(PendingOrder::Exit {
            signal_timestamp: timestamp,
        });
        Ok(())
    }

    /// Execute the pending order, if any, at `bar.open`.
    pub fn fill_pending(&mut self, bar: &PriceBar) -> Result<Option<Fill>, BacktestError> {
        let Some(order) = self.pending.take() else {
            return Ok(None);
        };
        let fill = match order {
            PendingOrder::Enter { .. } => self.enter_long(bar.open, bar.timestamp)?,
            PendingOrder::Exit { .. } => {
                Fill::Exited(self.exit_long(bar.open, bar.timestamp, ExitReason::Signal)?)
            }
        };
        Ok(Some(fill))
    }

    /// Close any open position at `bar.close` and drop any pending order.
    pub fn liquidate(&mut self, bar: &PriceBar) -> Result<Option<Trade>, BacktestError> {
        self.pending = None;
        if self.is_flat() {
            return Ok(None);
        }
        self.exit_long(bar.close, bar.timestamp, ExitReason::EndOfData)
            .map(Some)
    }

    fn enter_long(&mut self, market_price: f64, timestamp: NaiveDate) -> Result<Fill, BacktestError> {
        let execution_price = apply_slippage_long_entry(market_price, self.config.slippage_pct);
        let quantity = size_entry(self.cash, execution_price, &self.config);

        if !quantity.is_finite() || quantity < 0.0 {
            return Err(BacktestError::internal(format!(
                "computed quantity {quantity} on {timestamp}"
            )));
        }
        if quantity == 0.0 {
            return Ok(Fill::InsufficientCapital { execution_price });
        }

        let cost = quantity * execution_price;
        let commission = calculate_commission(cost, &self.config);
        let total_cost = cost + commission;
        if total_cost > self.cash + CASH_EPSILON {
            return Err(BacktestError::internal(format!(
                "fill cost {total_cost} exceeds cash {} on {timestamp}",
                self.cash
            )));
        }

        self.cash = (self.cash - total_cost).max(0.0);
        self.state = PositionState::Long(Position {
            side: Side::Long,
            quantity,
            entry_price: execution_price,
            entry_timestamp: timestamp,
            entry_commission: commission,
        });

        Ok(Fill::Entered {
            quantity,
            execution_price,
            commission,
        })
    }

    fn exit_long(
        &mut self,
        market_price: f64,
        timestamp: NaiveDate,
        exit_reason: ExitReason,
    ) -> Result<Trade, BacktestError> {
        let position = match std::mem::replace(&mut self.state, PositionState::Flat) {
            PositionState::Long(position) => position,
            PositionState::Flat => {
                return Err(BacktestError::internal(format!(
                    "exit on {timestamp} without an open position"
                )));
            }
        };

        let exit_price = apply_slippage_long_exit(market_price, self.config.slippage_pct);
        let exit_value = position.quantity * exit_price;
        let exit_commission = calculate_commission(exit_value, &self.config);

        let price_pnl = position.unrealized_pnl(exit_price);
        let pnl = price_pnl - position.entry_commission - exit_commission;
        let cost_basis = position.quantity * position.entry_price;
        let pnl_percent = if cost_basis > 0.0 {
            pnl / cost_basis * 100.0
        } else {
            0.0
        };

        self.cash += exit_value - exit_commission;
        if !self.cash.is_finite() {
            return Err(BacktestError::internal(format!(
                "cash became non-finite on {timestamp}"
            )));
        }

        let trade = Trade {
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            entry_timestamp: position.entry_timestamp,
            exit_timestamp: timestamp,
            pnl,
            pnl_percent,
            exit_reason,
        };
        self.trades.push(trade.clone());
        Ok(trade)
    }
}
