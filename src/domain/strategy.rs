//! Strategy configuration: symbol, date range, capital, rules and parameters.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::condition::Condition;
use crate::domain::error::BacktestError;

/// Numeric indicator parameters a rule set may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    RsiPeriod,
    RsiOversold,
    RsiOverbought,
    SmaPeriod,
    SmaSlowPeriod,
}

impl Parameter {
    pub const ALL: [Parameter; 5] = [
        Parameter::RsiPeriod,
        Parameter::RsiOversold,
        Parameter::RsiOverbought,
        Parameter::SmaPeriod,
        Parameter::SmaSlowPeriod,
    ];

    /// Wire name used in JSON requests.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::RsiPeriod => "rsiPeriod",
            Parameter::RsiOversold => "rsiOversold",
            Parameter::RsiOverbought => "rsiOverbought",
            Parameter::SmaPeriod => "smaPeriod",
            Parameter::SmaSlowPeriod => "smaSlowPeriod",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Parameter {
    type Err = ();

    /// Accepts `rsiPeriod`, `rsi_period` and `rsiperiod` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "rsiperiod" => Ok(Parameter::RsiPeriod),
            "rsioversold" => Ok(Parameter::RsiOversold),
            "rsioverbought" => Ok(Parameter::RsiOverbought),
            "smaperiod" | "smafastperiod" => Ok(Parameter::SmaPeriod),
            "smaslowperiod" => Ok(Parameter::SmaSlowPeriod),
            _ => Err(()),
        }
    }
}

/// Parameter name → value mapping for one strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(BTreeMap<Parameter, f64>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        self.0.insert(parameter, value);
        self
    }

    pub fn insert(&mut self, parameter: Parameter, value: f64) -> Option<f64> {
        self.0.insert(parameter, value)
    }

    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.0.get(&parameter).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Build from raw `(name, value)` pairs. Unknown names are skipped with a
    /// warning; the same parameter given twice under different spellings is
    /// rejected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, BacktestError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut params = Parameters::new();
        for (name, value) in pairs {
            match name.parse::<Parameter>() {
                Ok(parameter) => {
                    if params.insert(parameter, value).is_some() {
                        return Err(BacktestError::validation(
                            parameter.key(),
                            "parameter given more than once",
                        ));
                    }
                }
                Err(()) => tracing::warn!(parameter = name, "ignoring unknown parameter"),
            }
        }
        Ok(params)
    }
}

/// How entry quantity is derived from available cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizingPolicy {
    /// Floor to a whole share count.
    #[default]
    WholeShares,
    /// Invest all available cash, allowing fractional quantities.
    Fractional,
}

impl FromStr for SizingPolicy {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whole" | "whole_shares" | "shares" => Ok(SizingPolicy::WholeShares),
            "fractional" | "notional" => Ok(SizingPolicy::Fractional),
            other => Err(BacktestError::validation(
                "sizing",
                format!("unknown sizing policy '{other}' (expected whole or fractional)"),
            )),
        }
    }
}

/// Fill cost model. All percentages are expressed in percent, not fractions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub sizing: SizingPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub entry_conditions: Vec<Condition>,
    pub exit_conditions: Vec<Condition>,
    pub parameters: Parameters,
    pub execution: ExecutionConfig,
}

/// Parse a list of condition identifiers, rejecting anything outside the
/// supported set. `field` names the list in the error.
pub fn parse_conditions<S: AsRef<str>>(
    field: &str,
    identifiers: &[S],
) -> Result<Vec<Condition>, BacktestError> {
    identifiers
        .iter()
        .map(|id| {
            id.as_ref().parse::<Condition>().map_err(|_| {
                BacktestError::validation(
                    field,
                    format!("unknown condition '{}'", id.as_ref().trim()),
                )
            })
        })
        .collect()
}

/// Parse a `YYYY-MM-DD` date, naming `field` on failure.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, BacktestError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        BacktestError::validation(
            field,
            format!("invalid date '{}' (expected YYYY-MM-DD)", value.trim()),
        )
    })
}

/// Split a comma separated list, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_accepts_camel_and_snake_case() {
        assert_eq!("rsiPeriod".parse::<Parameter>(), Ok(Parameter::RsiPeriod));
        assert_eq!("rsi_period".parse::<Parameter>(), Ok(Parameter::RsiPeriod));
        assert_eq!("rsiperiod".parse::<Parameter>(), Ok(Parameter::RsiPeriod));
        assert_eq!("sma_slow_period".parse::<Parameter>(), Ok(Parameter::SmaSlowPeriod));
        assert_eq!("smaSlowPeriod".parse::<Parameter>(), Ok(Parameter::SmaSlowPeriod));
        assert!("macd_fast".parse::<Parameter>().is_err());
    }

    #[test]
    fn parameter_key_round_trips() {
        for p in Parameter::ALL {
            assert_eq!(p.key().parse::<Parameter>(), Ok(p));
        }
    }

    #[test]
    fn from_pairs_skips_unknown() {
        let params =
            Parameters::from_pairs([("rsiPeriod", 14.0), ("colour", 3.0)]).unwrap();
        assert_eq!(params.get(Parameter::RsiPeriod), Some(14.0));
        assert_eq!(params.iter().count(), 1);
    }

    #[test]
    fn from_pairs_rejects_duplicate_spellings() {
        let err = Parameters::from_pairs([("rsiPeriod", 14.0), ("rsi_period", 10.0)])
            .unwrap_err();
        assert_eq!(err.field(), Some("rsiPeriod"));
    }

    #[test]
    fn sizing_policy_parse() {
        assert_eq!("whole".parse::<SizingPolicy>().unwrap(), SizingPolicy::WholeShares);
        assert_eq!(
            "Fractional".parse::<SizingPolicy>().unwrap(),
            SizingPolicy::Fractional
        );
        assert!("half".parse::<SizingPolicy>().is_err());
    }

    #[test]
    fn parse_conditions_rejects_unknown() {
        let err = parse_conditions("entry_conditions", &["rsi_oversold", "moon_phase"])
            .unwrap_err();
        assert!(
            matches!(err, BacktestError::Validation { field, reason }
                if field == "entry_conditions" && reason.contains("moon_phase"))
        );
    }

    #[test]
    fn parse_conditions_keeps_order() {
        let conds = parse_conditions("exit_conditions", &["sma_crossunder", "rsi_overbought"])
            .unwrap();
        assert_eq!(conds, vec![Condition::SmaCrossunder, Condition::RsiOverbought]);
    }

    #[test]
    fn parse_date_names_field() {
        assert_eq!(
            parse_date("start_date", " 2024-01-02 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        let err = parse_date("start_date", "01/02/2024").unwrap_err();
        assert_eq!(err.field(), Some("start_date"));
    }

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" rsi_oversold , ,sma_crossover"),
            vec!["rsi_oversold".to_string(), "sma_crossover".to_string()]
        );
        assert!(split_list("").is_empty());
    }
}
