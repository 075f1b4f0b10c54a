//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json::BacktestResponse;
use crate::domain::backtest::{self as backtest_engine, BacktestResult};
use crate::domain::condition::Condition;
use crate::domain::config_validation::validate_strategy_config;
use crate::domain::error::BacktestError;
use crate::domain::strategy::{
    ExecutionConfig, Parameter, Parameters, SizingPolicy, StrategyConfig, parse_conditions,
    parse_date, split_list,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const DEFAULT_DATA_DIR: &str = "data";
#[cfg(feature = "web")]
const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Parser, Debug)]
#[command(name = "rulebt", about = "Rule-based strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <SYMBOL>.csv files; overrides [data] dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Override the configured symbol
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy configuration without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Show the data range for a symbol
    Info {
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Start the HTTP API server
    #[cfg(feature = "web")]
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbol,
            format,
            output,
        } => run_backtest(
            &config,
            data_dir.as_deref(),
            symbol.as_deref(),
            format,
            output.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config, data_dir } => {
            run_list_symbols(config.as_deref(), data_dir.as_deref())
        }
        Command::Info {
            symbol,
            config,
            data_dir,
        } => run_info(&symbol, config.as_deref(), data_dir.as_deref()),
        #[cfg(feature = "web")]
        Command::Serve { config } => run_serve(&config),
    }
}

fn fail(err: &BacktestError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Resolve the CSV directory: explicit flag, then `[data] dir`, then `data`.
pub fn resolve_data_dir(override_dir: Option<&Path>, config: Option<&dyn ConfigPort>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    config
        .and_then(|c| c.get_string("data", "dir"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn required(port: &dyn ConfigPort, section: &str, key: &str) -> Result<String, BacktestError> {
    port.get_string(section, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BacktestError::validation(key, format!("[{section}] {key} is required")))
}

fn optional_number(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, BacktestError> {
    match port.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| BacktestError::validation(key, format!("expected a number, got '{raw}'"))),
    }
}

/// Build a [`StrategyConfig`] from the `[backtest]` and `[rules]` sections.
///
/// Every key of `[rules]` other than the two condition lists is read as a
/// rule parameter.
pub fn build_strategy_config(port: &dyn ConfigPort) -> Result<StrategyConfig, BacktestError> {
    let symbol = required(port, "backtest", "symbol")?.trim().to_string();
    let start_date = parse_date("start_date", &required(port, "backtest", "start_date")?)?;
    let end_date = parse_date("end_date", &required(port, "backtest", "end_date")?)?;
    let initial_capital = optional_number(port, "backtest", "initial_capital")?.ok_or_else(|| {
        BacktestError::validation("initial_capital", "[backtest] initial_capital is required")
    })?;

    let sizing = match port.get_string("backtest", "sizing") {
        Some(s) => s.parse::<SizingPolicy>()?,
        None => SizingPolicy::default(),
    };
    let execution = ExecutionConfig {
        commission_per_trade: optional_number(port, "backtest", "commission_per_trade")?
            .unwrap_or(0.0),
        commission_pct: optional_number(port, "backtest", "commission_pct")?.unwrap_or(0.0),
        slippage_pct: optional_number(port, "backtest", "slippage_pct")?.unwrap_or(0.0),
        sizing,
    };

    let entry = split_list(&port.get_string("rules", "entry_conditions").unwrap_or_default());
    let exit = split_list(&port.get_string("rules", "exit_conditions").unwrap_or_default());
    let entry_conditions = parse_conditions("entry_conditions", &entry)?;
    let exit_conditions = parse_conditions("exit_conditions", &exit)?;

    let mut keys: Vec<String> = port
        .keys("rules")
        .into_iter()
        .filter(|k| k != "entry_conditions" && k != "exit_conditions")
        .collect();
    keys.sort();

    let mut values = Vec::with_capacity(keys.len());
    for key in &keys {
        let raw = port.get_string("rules", key).unwrap_or_default();
        match raw.trim().parse::<f64>() {
            Ok(value) => values.push((key.as_str(), value)),
            Err(_) => match key.parse::<Parameter>() {
                Ok(parameter) => {
                    return Err(BacktestError::validation(
                        parameter.key(),
                        format!("expected a number, got '{raw}'"),
                    ));
                }
                Err(()) => tracing::warn!(key = %key, "ignoring unknown non-numeric rule setting"),
            },
        }
    }
    let parameters = Parameters::from_pairs(values)?;

    Ok(StrategyConfig {
        symbol,
        start_date,
        end_date,
        initial_capital,
        entry_conditions,
        exit_conditions,
        parameters,
        execution,
    })
}

fn run_backtest(
    config_path: &Path,
    data_dir: Option<&Path>,
    symbol_override: Option<&str>,
    format: OutputFormat,
    output_path: Option<&Path>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Build and validate strategy
    let mut config = match build_strategy_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Some(symbol) = symbol_override {
        config.symbol = symbol.trim().to_string();
    }
    if let Err(e) = validate_strategy_config(&config) {
        return fail(&e);
    }

    // Stage 3: Load bars
    let data_dir = resolve_data_dir(data_dir, Some(&adapter as &dyn ConfigPort));
    let data_port = CsvAdapter::new(data_dir.clone());
    eprintln!(
        "Loading {} from {} ({} to {})",
        config.symbol,
        data_dir.display(),
        config.start_date,
        config.end_date
    );
    let bars = match data_port.fetch_bars(&config.symbol, config.start_date, config.end_date) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };

    // Stage 4: Run
    let result = match backtest_engine::run(&config, &bars) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 5: Report
    print_summary(&result);
    match format {
        OutputFormat::Text => ExitCode::SUCCESS,
        OutputFormat::Json => write_json(&result, output_path),
    }
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", result.symbol);
    eprintln!("Total Return:     {:.2}%", m.total_return);
    eprintln!("Final Equity:     {:.2}", m.final_equity);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown);
    eprintln!(
        "Total Trades:     {} ({} won, {} lost)",
        m.num_trades, m.num_wins, m.num_losses
    );
    eprintln!("Win Rate:         {:.1}%", m.win_rate);
    match m.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {pf:.2}"),
        None => eprintln!("Profit Factor:    n/a (no losing trades)"),
    }
    eprintln!("Avg Trade P&L:    {:.2}", m.avg_trade_pnl);

    if !result.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &result.trades {
            let pnl_sign = if t.pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} -> {} ({}d)  {} x {} @ {:.2} -> {:.2}  {}{:.2} ({})",
                t.entry_timestamp,
                t.exit_timestamp,
                t.holding_days(),
                t.side,
                t.quantity,
                t.entry_price,
                t.exit_price,
                pnl_sign,
                t.pnl,
                t.exit_reason,
            );
        }
    }
}

fn write_json(result: &BacktestResult, output_path: Option<&Path>) -> ExitCode {
    let response = BacktestResponse::from(result);
    let json = match serde_json::to_string_pretty(&response) {
        Ok(j) => j,
        Err(e) => return fail(&BacktestError::internal(format!("serializing result: {e}"))),
    };

    match output_path {
        Some(path) => match fs::write(path, json) {
            Ok(()) => {
                eprintln!("\nResult written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&BacktestError::Io(e)),
        },
        None => {
            println!("{json}");
            ExitCode::SUCCESS
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating strategy: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match build_strategy_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let params = match validate_strategy_config(&config) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    eprintln!("\nSymbol:     {}", config.symbol);
    eprintln!("Range:      {} to {}", config.start_date, config.end_date);
    eprintln!("Capital:    {:.2}", config.initial_capital);
    eprintln!("\nEntry:      {}", join_conditions(&config.entry_conditions));
    if config.exit_conditions.is_empty() {
        eprintln!("Exit:       (hold until end of data)");
    } else {
        eprintln!("Exit:       {}", join_conditions(&config.exit_conditions));
    }

    eprintln!("\nParameters:");
    for (parameter, value) in config.parameters.iter() {
        eprintln!("  {parameter}: {value}");
    }
    eprintln!(
        "\nWarm-up:    {} bars",
        params.indicator_periods().warmup()
    );

    eprintln!("\nStrategy configuration is valid.");
    ExitCode::SUCCESS
}

fn join_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(|c| c.identifier())
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn data_port_for(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<CsvAdapter, ExitCode> {
    let adapter = match config_path {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let dir = resolve_data_dir(data_dir, adapter.as_ref().map(|a| a as &dyn ConfigPort));
    Ok(CsvAdapter::new(dir))
}

fn run_list_symbols(config_path: Option<&Path>, data_dir: Option<&Path>) -> ExitCode {
    let port = match data_port_for(config_path, data_dir) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let symbols = match port.list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

fn run_info(symbol: &str, config_path: Option<&Path>, data_dir: Option<&Path>) -> ExitCode {
    let port = match data_port_for(config_path, data_dir) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match port.get_data_range(symbol) {
        Ok(Some((min_date, max_date, count))) => {
            println!("{}: {} bars, {} to {}", symbol, count, min_date, max_date);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("{}: no data found", symbol);
            ExitCode::from(5)
        }
        Err(e) => fail(&e),
    }
}

#[cfg(feature = "web")]
fn run_serve(config_path: &Path) -> ExitCode {
    use crate::adapters::web::{AppState, build_router};
    use std::net::SocketAddr;
    use std::sync::Arc;

    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let data_dir = resolve_data_dir(None, Some(&config as &dyn ConfigPort));
    let bind = config
        .get_string("server", "bind")
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let addr: SocketAddr = match bind.parse() {
        Ok(a) => a,
        Err(_) => {
            return fail(&BacktestError::validation(
                "bind",
                format!("invalid listen address '{bind}'"),
            ));
        }
    };

    let state = AppState {
        data_port: Arc::new(CsvAdapter::new(data_dir)),
    };
    let router = build_router(state);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return fail(&BacktestError::Io(e)),
    };

    tracing::info!(%addr, "starting web server");
    let served: std::io::Result<()> = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await
    });

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&BacktestError::Io(e)),
    }
}
