//! Performance metrics computed once from a finished run.
//!
//! Returns and rates are reported in percent. A trade with zero pnl counts
//! as a loss, so `num_trades == num_wins + num_losses` always holds.

use super::equity::EquityPoint;
use super::position::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub num_trades: usize,
    pub num_wins: usize,
    pub num_losses: usize,
    pub win_rate: f64,
    pub max_drawdown: f64,
    /// Gross wins over gross losses; `None` when there are wins but no losses.
    pub profit_factor: Option<f64>,
    pub avg_trade_pnl: f64,
    pub final_equity: f64,
}

impl Metrics {
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity / initial_capital - 1.0) * 100.0
        } else {
            0.0
        };

        let mut num_wins = 0usize;
        let mut gross_wins = 0.0_f64;
        let mut gross_losses = 0.0_f64;
        for trade in trades {
            if trade.is_win() {
                num_wins += 1;
                gross_wins += trade.pnl;
            } else {
                gross_losses += trade.pnl.abs();
            }
        }

        let num_trades = trades.len();
        let num_losses = num_trades - num_wins;

        let win_rate = if num_trades > 0 {
            num_wins as f64 / num_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if gross_losses > 0.0 {
            Some(gross_wins / gross_losses)
        } else if gross_wins > 0.0 {
            None
        } else {
            Some(0.0)
        };

        let avg_trade_pnl = if num_trades > 0 {
            trades.iter().map(|t| t.pnl).sum::<f64>() / num_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            num_trades,
            num_wins,
            num_losses,
            win_rate,
            max_drawdown: compute_max_drawdown(equity_curve),
            profit_factor,
            avg_trade_pnl,
            final_equity,
        }
    }
}

/// Largest peak-to-trough decline of the curve, in percent of the peak.
fn compute_max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd * 100.0
}
