//! Per-bar equity tracking.

use chrono::NaiveDate;

use super::error::BacktestError;
use super::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDate,
    pub cash: f64,
    pub positions_value: f64,
    pub equity: f64,
}

impl EquityPoint {
    pub fn new(timestamp: NaiveDate, cash: f64, position: Option<&Position>, close: f64) -> Self {
        let positions_value = position.map_or(0.0, |p| p.market_value(close));
        EquityPoint {
            timestamp,
            cash,
            positions_value,
            equity: cash + positions_value,
        }
    }
}

/// Append-only equity curve, one point per processed bar.
#[derive(Debug, Clone, Default)]
pub struct EquityTracker {
    points: Vec<EquityPoint>,
}

impl EquityTracker {
    pub fn with_capacity(bars: usize) -> Self {
        EquityTracker {
            points: Vec::with_capacity(bars),
        }
    }

    /// Mark the account to `close` and append the resulting point.
    pub fn record(
        &mut self,
        timestamp: NaiveDate,
        cash: f64,
        position: Option<&Position>,
        close: f64,
    ) -> Result<&EquityPoint, BacktestError> {
        if let Some(last) = self.points.last() {
            if timestamp <= last.timestamp {
                return Err(BacktestError::internal(format!(
                    "equity point {timestamp} does not follow {}",
                    last.timestamp
                )));
            }
        }
        let point = EquityPoint::new(timestamp, cash, position, close);
        if !point.equity.is_finite() {
            return Err(BacktestError::internal(format!(
                "non-finite equity at {timestamp}"
            )));
        }
        self.points.push(point);
        Ok(&self.points[self.points.len() - 1])
    }

    /// Replace the last point after the terminal liquidation settled the
    /// account at the same bar.
    pub fn rewrite_last(&mut self, cash: f64, position: Option<&Position>, close: f64) {
        if let Some(last) = self.points.last_mut() {
            *last = EquityPoint::new(last.timestamp, cash, position, close);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn into_points(self) -> Vec<EquityPoint> {
        self.points
    }
}
