//! OHLCV price bar representation and series checks.

use chrono::NaiveDate;

use super::error::BacktestError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    fn check_prices(&self) -> Result<(), BacktestError> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (name, price) in prices {
            if !price.is_finite() || price <= 0.0 {
                return Err(BacktestError::DataGap {
                    timestamp: self.timestamp,
                    reason: format!("{name} price {price} is not a positive number"),
                });
            }
        }
        Ok(())
    }
}

/// Select the bars inside `[start_date, end_date]` and check that they form a
/// usable series: strictly increasing timestamps with positive, finite prices.
///
/// Bars outside the window are ignored. The returned slice borrows from `bars`.
pub fn bars_in_range<'a>(
    bars: &'a [PriceBar],
    symbol: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<&'a [PriceBar], BacktestError> {
    let first = bars.iter().position(|b| b.timestamp >= start_date);
    let Some(first) = first else {
        return Err(no_data(symbol, start_date, end_date));
    };
    let last = bars[first..]
        .iter()
        .position(|b| b.timestamp > end_date)
        .map_or(bars.len(), |offset| first + offset);

    let window = &bars[first..last];
    if window.is_empty() {
        return Err(no_data(symbol, start_date, end_date));
    }

    for (i, bar) in window.iter().enumerate() {
        bar.check_prices()?;
        if i > 0 {
            let prev = &window[i - 1];
            if bar.timestamp == prev.timestamp {
                return Err(BacktestError::DataGap {
                    timestamp: bar.timestamp,
                    reason: "duplicate bar".into(),
                });
            }
            if bar.timestamp < prev.timestamp {
                return Err(BacktestError::DataGap {
                    timestamp: bar.timestamp,
                    reason: format!("bar is out of order after {}", prev.timestamp),
                });
            }
        }
    }

    // Anything past the window that sorts back inside it means the input was unordered.
    if let Some(stray) = bars[last..]
        .iter()
        .find(|b| b.timestamp >= start_date && b.timestamp <= end_date)
    {
        return Err(BacktestError::DataGap {
            timestamp: stray.timestamp,
            reason: "bar is out of order".into(),
        });
    }

    Ok(window)
}

fn no_data(symbol: &str, start_date: NaiveDate, end_date: NaiveDate) -> BacktestError {
    BacktestError::NoData {
        symbol: symbol.to_string(),
        start_date,
        end_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            timestamp: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    fn d(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn selects_inclusive_window() {
        let bars = vec![
            bar("2024-01-01", 10.0),
            bar("2024-01-02", 11.0),
            bar("2024-01-03", 12.0),
            bar("2024-01-04", 13.0),
        ];
        let window = bars_in_range(&bars, "SPY", d("2024-01-02"), d("2024-01-03")).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].timestamp, d("2024-01-02"));
        assert_eq!(window[1].timestamp, d("2024-01-03"));
    }

    #[test]
    fn empty_window_is_no_data() {
        let bars = vec![bar("2024-01-01", 10.0)];
        let err = bars_in_range(&bars, "SPY", d("2024-02-01"), d("2024-03-01")).unwrap_err();
        assert!(matches!(err, BacktestError::NoData { symbol, .. } if symbol == "SPY"));
    }

    #[test]
    fn duplicate_bar_is_data_gap() {
        let bars = vec![
            bar("2024-01-01", 10.0),
            bar("2024-01-02", 11.0),
            bar("2024-01-02", 11.5),
        ];
        let err = bars_in_range(&bars, "SPY", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(
            matches!(err, BacktestError::DataGap { timestamp, .. } if timestamp == d("2024-01-02"))
        );
    }

    #[test]
    fn out_of_order_bar_is_data_gap() {
        let bars = vec![
            bar("2024-01-01", 10.0),
            bar("2024-01-03", 11.0),
            bar("2024-01-02", 11.5),
        ];
        let err = bars_in_range(&bars, "SPY", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(
            matches!(err, BacktestError::DataGap { timestamp, .. } if timestamp == d("2024-01-02"))
        );
    }

    #[test]
    fn stray_bar_after_window_is_data_gap() {
        let bars = vec![
            bar("2024-01-01", 10.0),
            bar("2024-02-15", 11.0),
            bar("2024-01-10", 11.5),
        ];
        let err = bars_in_range(&bars, "SPY", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(
            matches!(err, BacktestError::DataGap { timestamp, .. } if timestamp == d("2024-01-10"))
        );
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let mut bad = bar("2024-01-02", 11.0);
        bad.open = 0.0;
        let bars = vec![bar("2024-01-01", 10.0), bad];
        let err = bars_in_range(&bars, "SPY", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(matches!(err, BacktestError::DataGap { reason, .. } if reason.contains("open")));
    }

    #[test]
    fn nan_close_is_rejected() {
        let mut bad = bar("2024-01-01", 10.0);
        bad.close = f64::NAN;
        let bars = vec![bad];
        assert!(bars_in_range(&bars, "SPY", d("2024-01-01"), d("2024-01-31")).is_err());
    }
}
