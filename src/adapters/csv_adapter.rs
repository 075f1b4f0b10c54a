//! CSV file data adapter.
//!
//! One file per symbol, `<base_path>/<SYMBOL>.csv`, with a header row
//! `timestamp,open,high,low,close,volume` (`date` is accepted for the first
//! column). Rows are returned in file order.

use crate::domain::config_validation::check_symbol;
use crate::domain::error::BacktestError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date")]
    timestamp: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<CsvRow> for PriceBar {
    fn from(row: CsvRow) -> Self {
        PriceBar {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.round() as i64,
        }
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Path of the symbol's file; symbols that could leave `base_path` are refused.
    fn csv_path(&self, symbol: &str) -> Result<PathBuf, BacktestError> {
        check_symbol(symbol)?;
        Ok(self.base_path.join(format!("{}.csv", symbol)))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<PriceBar>, BacktestError> {
        let path = self.csv_path(symbol)?;
        let content = fs::read_to_string(&path).map_err(|e| BacktestError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        rdr.deserialize::<CsvRow>()
            .enumerate()
            .map(|(i, row)| {
                row.map(PriceBar::from).map_err(|e| BacktestError::DataSource {
                    // +2: header line, 1-based numbering
                    reason: format!("{}: line {}: {}", path.display(), i + 2, e),
                })
            })
            .collect()
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, BacktestError> {
        let bars = self.read_all(symbol)?;
        let total = bars.len();
        let bars: Vec<PriceBar> = bars
            .into_iter()
            .filter(|b| b.timestamp >= start_date && b.timestamp <= end_date)
            .collect();
        tracing::debug!(symbol, total, in_range = bars.len(), "loaded csv bars");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacktestError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BacktestError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BacktestError> {
        if !self.csv_path(symbol)?.exists() {
            return Ok(None);
        }
        let bars = self.read_all(symbol)?;
        let first = bars.iter().map(|b| b.timestamp).min();
        let last = bars.iter().map(|b| b.timestamp).max();
        Ok(first.zip(last).map(|(first, last)| (first, last, bars.len())))
    }
}
