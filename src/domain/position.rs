//! Open positions and closed trades.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn direction(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_timestamp: NaiveDate,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.direction() * self.quantity * (price - self.entry_price)
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Exit conditions fired; filled at the next bar's open.
    Signal,
    /// Still open after the last bar; liquidated at its close.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => write!(f, "signal"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_timestamp: NaiveDate,
    pub exit_timestamp: NaiveDate,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn holding_days(&self) -> i64 {
        (self.exit_timestamp - self.entry_timestamp).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_long_position() -> Position {
        Position {
            side: Side::Long,
            quantity: 100.0,
            entry_price: 50.0,
            entry_timestamp: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            entry_commission: 0.0,
        }
    }

    fn sample_short_position() -> Position {
        Position {
            side: Side::Short,
            quantity: 100.0,
            entry_price: 100.0,
            entry_timestamp: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            entry_commission: 0.0,
        }
    }

    #[test]
    fn market_value_long() {
        let pos = sample_long_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_long_profit() {
        let pos = sample_long_position();
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_long_loss() {
        let pos = sample_long_position();
        assert!((pos.unrealized_pnl(45.0) - (-500.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short_profit() {
        let pos = sample_short_position();
        assert!((pos.unrealized_pnl(90.0) - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short_loss() {
        let pos = sample_short_position();
        assert!((pos.unrealized_pnl(110.0) - (-1000.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn side_and_reason_display() {
        assert_eq!(Side::Long.to_string(), "long");
        assert_eq!(Side::Short.to_string(), "short");
        assert_eq!(ExitReason::Signal.to_string(), "signal");
        assert_eq!(ExitReason::EndOfData.to_string(), "end_of_data");
    }

    #[test]
    fn trade_win_and_duration() {
        let trade = Trade {
            side: Side::Long,
            quantity: 100.0,
            entry_price: 50.0,
            exit_price: 50.0,
            entry_timestamp: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            exit_timestamp: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            pnl: 0.0,
            pnl_percent: 0.0,
            exit_reason: ExitReason::Signal,
        };
        assert!(!trade.is_win(), "breakeven is not a win");
        assert_eq!(trade.holding_days(), 5);
    }
}
