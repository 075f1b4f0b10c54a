//! Strategy configuration validation.
//!
//! Runs before any bar is touched and stops at the first violation.

use crate::domain::condition::{Condition, RuleParams};
use crate::domain::error::BacktestError;
use crate::domain::strategy::{ExecutionConfig, Parameter, StrategyConfig};

/// Longest accepted indicator lookback, in bars.
pub const MAX_PERIOD: usize = 10_000;

/// Check every invariant of `config` and resolve the parameters its rules need.
pub fn validate_strategy_config(config: &StrategyConfig) -> Result<RuleParams, BacktestError> {
    validate_symbol(config)?;
    validate_dates(config)?;
    validate_initial_capital(config)?;
    validate_execution(&config.execution)?;
    validate_condition_lists(config)?;
    resolve_parameters(config)
}

fn validate_symbol(config: &StrategyConfig) -> Result<(), BacktestError> {
    if config.symbol.trim().is_empty() {
        return Err(BacktestError::validation("symbol", "symbol must not be empty"));
    }
    check_symbol(&config.symbol)
}

/// Symbols name files under the data directory, so only `[A-Za-z0-9._-]`
/// is allowed and `..` is never part of one.
pub fn check_symbol(symbol: &str) -> Result<(), BacktestError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if symbol.is_empty()
        || !symbol.chars().all(allowed)
        || symbol.starts_with('.')
        || symbol.contains("..")
    {
        return Err(BacktestError::validation(
            "symbol",
            format!("invalid symbol '{symbol}' (allowed: letters, digits, '.', '_', '-')"),
        ));
    }
    Ok(())
}

fn validate_dates(config: &StrategyConfig) -> Result<(), BacktestError> {
    if config.end_date <= config.start_date {
        return Err(BacktestError::validation(
            "end_date",
            format!(
                "end_date {} must be after start_date {}",
                config.end_date, config.start_date
            ),
        ));
    }
    Ok(())
}

fn validate_initial_capital(config: &StrategyConfig) -> Result<(), BacktestError> {
    let value = config.initial_capital;
    if !value.is_finite() || value <= 0.0 {
        return Err(BacktestError::validation(
            "initial_capital",
            format!("initial_capital must be positive, got {value}"),
        ));
    }
    Ok(())
}

fn validate_execution(execution: &ExecutionConfig) -> Result<(), BacktestError> {
    let costs = [
        ("commission_per_trade", execution.commission_per_trade),
        ("commission_pct", execution.commission_pct),
        ("slippage_pct", execution.slippage_pct),
    ];
    for (field, value) in costs {
        if !value.is_finite() || value < 0.0 {
            return Err(BacktestError::validation(
                field,
                format!("{field} must be non-negative"),
            ));
        }
    }
    if execution.slippage_pct >= 100.0 {
        return Err(BacktestError::validation(
            "slippage_pct",
            "slippage_pct must be below 100",
        ));
    }
    Ok(())
}

fn validate_condition_lists(config: &StrategyConfig) -> Result<(), BacktestError> {
    if config.entry_conditions.is_empty() {
        return Err(BacktestError::validation(
            "entry_conditions",
            "at least one entry condition is required",
        ));
    }
    check_duplicates("entry_conditions", &config.entry_conditions)?;
    check_duplicates("exit_conditions", &config.exit_conditions)?;
    Ok(())
}

fn check_duplicates(field: &str, conditions: &[Condition]) -> Result<(), BacktestError> {
    for (i, condition) in conditions.iter().enumerate() {
        if conditions[..i].contains(condition) {
            return Err(BacktestError::validation(
                field,
                format!("condition '{condition}' listed more than once"),
            ));
        }
    }
    Ok(())
}

fn resolve_parameters(config: &StrategyConfig) -> Result<RuleParams, BacktestError> {
    let referenced = config
        .entry_conditions
        .iter()
        .chain(config.exit_conditions.iter());

    let mut params = RuleParams::default();
    for condition in referenced {
        for &parameter in condition.required_parameters() {
            let value = config.parameters.get(parameter).ok_or_else(|| {
                BacktestError::validation(
                    parameter.key(),
                    format!("required by condition '{condition}' but not provided"),
                )
            })?;
            apply_parameter(&mut params, parameter, value)?;
        }
    }

    if let (Some(fast), Some(slow)) = (params.sma_period, params.sma_slow_period) {
        if fast >= slow {
            return Err(BacktestError::validation(
                Parameter::SmaPeriod.key(),
                format!("smaPeriod ({fast}) must be shorter than smaSlowPeriod ({slow})"),
            ));
        }
    }

    Ok(params)
}

fn apply_parameter(
    params: &mut RuleParams,
    parameter: Parameter,
    value: f64,
) -> Result<(), BacktestError> {
    if !value.is_finite() {
        return Err(BacktestError::validation(
            parameter.key(),
            "value must be a finite number",
        ));
    }

    match parameter {
        Parameter::RsiPeriod => params.rsi_period = Some(as_period(parameter, value)?),
        Parameter::SmaPeriod => params.sma_period = Some(as_period(parameter, value)?),
        Parameter::SmaSlowPeriod => params.sma_slow_period = Some(as_period(parameter, value)?),
        Parameter::RsiOversold => params.rsi_oversold = Some(as_threshold(parameter, value)?),
        Parameter::RsiOverbought => params.rsi_overbought = Some(as_threshold(parameter, value)?),
    }
    Ok(())
}

fn as_period(parameter: Parameter, value: f64) -> Result<usize, BacktestError> {
    if value < 1.0 || value.fract() != 0.0 {
        return Err(BacktestError::validation(
            parameter.key(),
            format!("period must be a positive whole number, got {value}"),
        ));
    }
    if value > MAX_PERIOD as f64 {
        return Err(BacktestError::validation(
            parameter.key(),
            format!("period {value} exceeds the maximum of {MAX_PERIOD} bars"),
        ));
    }
    Ok(value as usize)
}

fn as_threshold(parameter: Parameter, value: f64) -> Result<f64, BacktestError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(BacktestError::validation(
            parameter.key(),
            format!("threshold {value} must be between 0 and 100"),
        ));
    }
    Ok(value)
}
