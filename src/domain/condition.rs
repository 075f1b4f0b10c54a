//! Entry/exit conditions and their evaluation.
//!
//! A rule set is an ordered list of [`Condition`]s combined with logical AND:
//! the list holds only when every condition holds on the current bar. A
//! condition that references an indicator which is not yet available
//! evaluates to `false`, so nothing can fire during warmup.

use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::{IndicatorPeriods, IndicatorState};
use crate::domain::strategy::Parameter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// RSI below the oversold threshold.
    RsiOversold,
    /// RSI above the overbought threshold.
    RsiOverbought,
    /// Fast SMA crossed above slow SMA on this bar.
    SmaCrossover,
    /// Fast SMA crossed below slow SMA on this bar.
    SmaCrossunder,
    /// Close above the fast SMA.
    PriceAboveSma,
    /// Close below the fast SMA.
    PriceBelowSma,
}

impl Condition {
    pub const ALL: [Condition; 6] = [
        Condition::RsiOversold,
        Condition::RsiOverbought,
        Condition::SmaCrossover,
        Condition::SmaCrossunder,
        Condition::PriceAboveSma,
        Condition::PriceBelowSma,
    ];

    pub fn identifier(self) -> &'static str {
        match self {
            Condition::RsiOversold => "rsi_oversold",
            Condition::RsiOverbought => "rsi_overbought",
            Condition::SmaCrossover => "sma_crossover",
            Condition::SmaCrossunder => "sma_crossunder",
            Condition::PriceAboveSma => "price_above_sma",
            Condition::PriceBelowSma => "price_below_sma",
        }
    }

    /// Parameters that must be configured for this condition to be usable.
    pub fn required_parameters(self) -> &'static [Parameter] {
        match self {
            Condition::RsiOversold => &[Parameter::RsiPeriod, Parameter::RsiOversold],
            Condition::RsiOverbought => &[Parameter::RsiPeriod, Parameter::RsiOverbought],
            Condition::SmaCrossover | Condition::SmaCrossunder => {
                &[Parameter::SmaPeriod, Parameter::SmaSlowPeriod]
            }
            Condition::PriceAboveSma | Condition::PriceBelowSma => &[Parameter::SmaPeriod],
        }
    }

    pub fn evaluate(self, state: &IndicatorState, params: &RuleParams) -> bool {
        match self {
            Condition::RsiOversold => match (state.rsi, params.rsi_oversold) {
                (Some(rsi), Some(threshold)) => rsi < threshold,
                _ => false,
            },
            Condition::RsiOverbought => match (state.rsi, params.rsi_overbought) {
                (Some(rsi), Some(threshold)) => rsi > threshold,
                _ => false,
            },
            Condition::SmaCrossover => state.sma_crossed_above(),
            Condition::SmaCrossunder => state.sma_crossed_below(),
            Condition::PriceAboveSma => state.sma_fast.is_some_and(|sma| state.close > sma),
            Condition::PriceBelowSma => state.sma_fast.is_some_and(|sma| state.close < sma),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for Condition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Condition::ALL
            .into_iter()
            .find(|c| c.identifier().eq_ignore_ascii_case(wanted))
            .ok_or(())
    }
}

/// Validated rule parameters: lookbacks as bar counts, thresholds as RSI levels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RuleParams {
    pub rsi_period: Option<usize>,
    pub rsi_oversold: Option<f64>,
    pub rsi_overbought: Option<f64>,
    pub sma_period: Option<usize>,
    pub sma_slow_period: Option<usize>,
}

impl RuleParams {
    pub fn indicator_periods(&self) -> IndicatorPeriods {
        IndicatorPeriods {
            rsi: self.rsi_period,
            sma_fast: self.sma_period,
            sma_slow: self.sma_slow_period,
        }
    }
}

/// AND-combine `conditions` against the current snapshot.
///
/// An empty list never fires.
pub fn evaluate(conditions: &[Condition], state: &IndicatorState, params: &RuleParams) -> bool {
    if conditions.is_empty() {
        return false;
    }
    conditions.iter().all(|c| c.evaluate(state, params))
}
