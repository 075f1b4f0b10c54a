//! Causal, incremental technical indicators.
//!
//! This module provides:
//! - `IndicatorPeriods`: which indicators to compute, and their lookbacks
//! - `IndicatorState`: the per-bar snapshot handed to the condition evaluator
//! - `IndicatorEngine`: owns the rolling state and produces one snapshot per bar
//!
//! The engine only ever sees bars in the order they are fed to `update`, so a
//! snapshot for bar *i* cannot depend on any later bar.

pub mod rsi;
pub mod sma;

use chrono::NaiveDate;

use crate::domain::ohlcv::PriceBar;
use rsi::WilderRsi;
use sma::RollingSma;

/// Lookbacks for the indicators a strategy needs. `None` means the indicator
/// is not computed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorPeriods {
    pub rsi: Option<usize>,
    pub sma_fast: Option<usize>,
    pub sma_slow: Option<usize>,
}

impl IndicatorPeriods {
    /// Bars needed before every configured indicator is available.
    pub fn warmup(&self) -> usize {
        let rsi = self.rsi.map_or(0, |p| p + 1);
        let fast = self.sma_fast.unwrap_or(0);
        let slow = self.sma_slow.unwrap_or(0);
        rsi.max(fast).max(slow)
    }
}

/// Snapshot of indicator values after one bar. `None` marks an indicator
/// that is not configured or still warming up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorState {
    pub timestamp: NaiveDate,
    pub close: f64,
    pub rsi: Option<f64>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub prev_sma_fast: Option<f64>,
    pub prev_sma_slow: Option<f64>,
}

impl IndicatorState {
    /// Fast SMA moved from at-or-below the slow SMA to strictly above it.
    pub fn sma_crossed_above(&self) -> bool {
        match (self.prev_sma_fast, self.prev_sma_slow, self.sma_fast, self.sma_slow) {
            (Some(pf), Some(ps), Some(f), Some(s)) => pf <= ps && f > s,
            _ => false,
        }
    }

    /// Fast SMA moved from at-or-above the slow SMA to strictly below it.
    pub fn sma_crossed_below(&self) -> bool {
        match (self.prev_sma_fast, self.prev_sma_slow, self.sma_fast, self.sma_slow) {
            (Some(pf), Some(ps), Some(f), Some(s)) => pf >= ps && f < s,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    rsi: Option<WilderRsi>,
    sma_fast: Option<RollingSma>,
    sma_slow: Option<RollingSma>,
    prev_sma_fast: Option<f64>,
    prev_sma_slow: Option<f64>,
}

impl IndicatorEngine {
    pub fn new(periods: &IndicatorPeriods) -> Self {
        Self {
            rsi: periods.rsi.map(WilderRsi::new),
            sma_fast: periods.sma_fast.map(RollingSma::new),
            sma_slow: periods.sma_slow.map(RollingSma::new),
            prev_sma_fast: None,
            prev_sma_slow: None,
        }
    }

    /// Fold the next bar into every configured indicator.
    pub fn update(&mut self, bar: &PriceBar) -> IndicatorState {
        let rsi = self.rsi.as_mut().and_then(|r| r.update(bar.close));
        let sma_fast = self.sma_fast.as_mut().and_then(|s| s.update(bar.close));
        let sma_slow = self.sma_slow.as_mut().and_then(|s| s.update(bar.close));

        let state = IndicatorState {
            timestamp: bar.timestamp,
            close: bar.close,
            rsi,
            sma_fast,
            sma_slow,
            prev_sma_fast: self.prev_sma_fast,
            prev_sma_slow: self.prev_sma_slow,
        };

        self.prev_sma_fast = sma_fast;
        self.prev_sma_slow = sma_slow;
        state
    }
}
