//! # Normalizer
//!
//! Converts a provider's [`RawPayload`] into canonical [`DailyBar`]s.
//!
//! 1. Header names are flattened (multi-level headers joined with `_`) and
//!    resolved against a keyword table, see [`resolve_columns`].
//! 2. Each row is converted on its own. A row that cannot be converted is
//!    dropped and reported as a [`RowWarning`]; the other rows are kept.
//! 3. Converted rows are ordered by date (a repeated date keeps the later
//!    row) and the derived fields are filled in: `daily_return` per row and
//!    `ma_7` as the trailing mean of seven closes.
//!
//! Values are not sanity-checked beyond being finite numbers: `high < low` or
//! a negative price passes through unchanged.

mod columns;
mod payload;

use std::collections::BTreeMap;

use thiserror::Error;
use time::UtcOffset;

pub use columns::{resolve_columns, ColumnMap};
pub use payload::{ColumnHeader, RawPayload, RawValue};

use crate::{daily_return, DailyBar, Symbol, TradeDate};

/// Bars averaged into `ma_7`.
pub const MOVING_AVERAGE_BARS: usize = 7;

/// Payload-level failure: nothing from this symbol can be stored.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("payload has no close column")]
    MissingCloseColumn,
    #[error("payload has no date column")]
    MissingDateColumn,
}

/// Why one row was dropped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowConversionError {
    #[error("unparseable date {value:?}")]
    InvalidDate { value: String },
    #[error("missing value for {field}")]
    MissingValue { field: &'static str },
    #[error("non-numeric {field} {value:?}")]
    NotNumeric { field: &'static str, value: String },
    #[error("superseded by a later row for {date}")]
    Superseded { date: TradeDate },
}

/// A dropped row, indexed by its position in the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWarning {
    pub row: usize,
    pub error: RowConversionError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Date-ascending, one bar per date.
    pub bars: Vec<DailyBar>,
    pub warnings: Vec<RowWarning>,
}

/// Normalize one symbol's payload.
pub fn normalize(symbol: &Symbol, payload: &RawPayload) -> Result<Normalized, NormalizeError> {
    let columns = resolve_columns(&payload.flattened_headers())?;

    let mut by_date: BTreeMap<TradeDate, (usize, DailyBar)> = BTreeMap::new();
    let mut warnings = Vec::new();
    for (index, row) in payload.rows.iter().enumerate() {
        match convert_row(symbol, &columns, row) {
            Ok(bar) => {
                let date = bar.date;
                if let Some((earlier, _)) = by_date.insert(date, (index, bar)) {
                    warnings.push(RowWarning {
                        row: earlier,
                        error: RowConversionError::Superseded { date },
                    });
                }
            }
            Err(error) => warnings.push(RowWarning { row: index, error }),
        }
    }
    warnings.sort_by_key(|warning| warning.row);

    let mut bars: Vec<DailyBar> = by_date.into_values().map(|(_, bar)| bar).collect();
    fill_moving_average(&mut bars);

    Ok(Normalized { bars, warnings })
}

fn convert_row(
    symbol: &Symbol,
    columns: &ColumnMap,
    row: &[RawValue],
) -> Result<DailyBar, RowConversionError> {
    let cell = |index: usize| row.get(index).unwrap_or(&RawValue::Null);

    let date = parse_date(cell(columns.date))?;
    let open = required_number(cell(columns.open), "open")?;
    let high = required_number(cell(columns.high), "high")?;
    let low = required_number(cell(columns.low), "low")?;
    let close = required_number(cell(columns.close), "close")?;
    let adj_close = match columns.adj_close {
        Some(index) => optional_number(cell(index), "adj_close")?.unwrap_or(close),
        None => close,
    };
    let volume = match columns.volume {
        Some(index) => optional_number(cell(index), "volume")?.unwrap_or(0.0),
        None => 0.0,
    };

    Ok(DailyBar {
        symbol: symbol.clone(),
        date,
        open,
        high,
        low,
        close,
        adj_close,
        volume,
        daily_return: daily_return(open, close),
        ma_7: None,
    })
}

fn fill_moving_average(bars: &mut [DailyBar]) {
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    for (index, bar) in bars.iter_mut().enumerate() {
        bar.ma_7 = (index + 1 >= MOVING_AVERAGE_BARS).then(|| {
            let window = &closes[index + 1 - MOVING_AVERAGE_BARS..=index];
            window.iter().sum::<f64>() / MOVING_AVERAGE_BARS as f64
        });
    }
}

/// `None` for null, NaN and infinite cells.
fn optional_number(
    value: &RawValue,
    field: &'static str,
) -> Result<Option<f64>, RowConversionError> {
    match value {
        RawValue::Null => Ok(None),
        RawValue::Number(number) => Ok(number.is_finite().then_some(*number)),
        RawValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(|number| number.is_finite().then_some(number))
                .map_err(|_| RowConversionError::NotNumeric {
                    field,
                    value: text.clone(),
                })
        }
    }
}

fn required_number(value: &RawValue, field: &'static str) -> Result<f64, RowConversionError> {
    optional_number(value, field)?.ok_or(RowConversionError::MissingValue { field })
}

/// Accepts `YYYY-MM-DD`, anything starting with it (datetimes, RFC3339) and
/// unix seconds.
fn parse_date(value: &RawValue) -> Result<TradeDate, RowConversionError> {
    match value {
        RawValue::Text(text) => {
            let trimmed = text.trim();
            TradeDate::parse(trimmed)
                .or_else(|_| TradeDate::parse(trimmed.get(..10).unwrap_or(trimmed)))
                .map_err(|_| RowConversionError::InvalidDate {
                    value: text.clone(),
                })
        }
        RawValue::Number(seconds) if seconds.is_finite() => {
            TradeDate::from_unix_timestamp(seconds.trunc() as i64, UtcOffset::UTC).map_err(|_| {
                RowConversionError::InvalidDate {
                    value: seconds.to_string(),
                }
            })
        }
        RawValue::Number(seconds) => Err(RowConversionError::InvalidDate {
            value: seconds.to_string(),
        }),
        RawValue::Null => Err(RowConversionError::MissingValue { field: "date" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol() -> Symbol {
        Symbol::parse("INFY.NS").expect("symbol")
    }

    fn ohlcv_payload(rows: &[(&str, f64, f64, f64, f64, f64)]) -> RawPayload {
        let mut payload =
            RawPayload::with_columns(&["Date", "Open", "High", "Low", "Close", "Volume"]);
        for (date, open, high, low, close, volume) in rows {
            payload.push_row(vec![
                RawValue::from(*date),
                RawValue::from(*open),
                RawValue::from(*high),
                RawValue::from(*low),
                RawValue::from(*close),
                RawValue::from(*volume),
            ]);
        }
        payload
    }

    #[test]
    fn single_row_gets_return_but_no_moving_average() {
        let payload = ohlcv_payload(&[("2024-01-02", 100.0, 110.0, 95.0, 105.0, 1000.0)]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        assert_eq!(normalized.bars.len(), 1);
        let bar = &normalized.bars[0];
        assert_eq!(bar.date.to_string(), "2024-01-02");
        assert_eq!(bar.daily_return, Some(0.05));
        assert_eq!(bar.ma_7, None);
        assert_eq!(bar.adj_close, 105.0);
        assert_eq!(bar.volume, 1000.0);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn moving_average_starts_at_the_seventh_bar() {
        let rows: Vec<(String, f64)> = (1..=8)
            .map(|day| (format!("2024-01-{day:02}"), f64::from(day) * 10.0))
            .collect();
        let borrowed: Vec<(&str, f64, f64, f64, f64, f64)> = rows
            .iter()
            .map(|(date, close)| (date.as_str(), *close, *close, *close, *close, 1.0))
            .collect();

        let normalized = normalize(&symbol(), &ohlcv_payload(&borrowed)).expect("normalized");

        let averages: Vec<Option<f64>> = normalized.bars.iter().map(|bar| bar.ma_7).collect();
        assert!(averages[..6].iter().all(Option::is_none));
        assert_eq!(averages[6], Some(40.0));
        assert_eq!(averages[7], Some(50.0));
    }

    #[test]
    fn zero_open_leaves_return_absent() {
        let payload = ohlcv_payload(&[("2024-01-02", 0.0, 1.0, 0.0, 1.0, 0.0)]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        assert_eq!(normalized.bars[0].daily_return, None);
    }

    #[test]
    fn bad_rows_are_skipped_with_warnings() {
        let mut payload = ohlcv_payload(&[("2024-01-02", 100.0, 110.0, 95.0, 105.0, 1000.0)]);
        payload.push_row(vec![
            RawValue::from("not-a-date"),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::from(1.0),
        ]);
        payload.push_row(vec![
            RawValue::from("2024-01-04"),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::from("n/a"),
            RawValue::from(1.0),
        ]);
        payload.push_row(vec![
            RawValue::from("2024-01-05"),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::from(1.0),
            RawValue::Null,
            RawValue::from(1.0),
        ]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        assert_eq!(normalized.bars.len(), 1);
        let rows: Vec<usize> = normalized.warnings.iter().map(|w| w.row).collect();
        assert_eq!(rows, vec![1, 2, 3]);
        assert!(matches!(
            normalized.warnings[0].error,
            RowConversionError::InvalidDate { .. }
        ));
        assert!(matches!(
            normalized.warnings[1].error,
            RowConversionError::NotNumeric { field: "close", .. }
        ));
        assert_eq!(
            normalized.warnings[2].error,
            RowConversionError::MissingValue { field: "close" }
        );
    }

    #[test]
    fn missing_volume_and_adj_close_get_defaults() {
        let mut payload = RawPayload::with_columns(&["Date", "Close", "Adj Close", "Volume"]);
        payload.push_row(vec![
            RawValue::from("2024-01-02"),
            RawValue::from(50.0),
            RawValue::Null,
            RawValue::Number(f64::NAN),
        ]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        let bar = &normalized.bars[0];
        assert_eq!(bar.adj_close, 50.0);
        assert_eq!(bar.volume, 0.0);
        assert_eq!((bar.open, bar.high, bar.low), (50.0, 50.0, 50.0));
        assert_eq!(bar.daily_return, Some(0.0));
    }

    #[test]
    fn multi_level_headers_resolve() {
        let mut payload = RawPayload::new(vec![
            ColumnHeader::multi(["Date", ""]),
            ColumnHeader::multi(["Close", "INFY.NS"]),
            ColumnHeader::multi(["Open", "INFY.NS"]),
        ]);
        payload.push_row(vec![
            RawValue::from("2024-01-02T00:00:00+05:30"),
            RawValue::from(110.0),
            RawValue::from(100.0),
        ]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        assert_eq!(normalized.bars[0].date.to_string(), "2024-01-02");
        assert_eq!(normalized.bars[0].open, 100.0);
        assert_eq!(normalized.bars[0].daily_return, Some(0.1));
    }

    #[test]
    fn unordered_rows_are_sorted_and_duplicates_keep_the_last() {
        let payload = ohlcv_payload(&[
            ("2024-01-03", 10.0, 10.0, 10.0, 12.0, 1.0),
            ("2024-01-02", 10.0, 10.0, 10.0, 11.0, 1.0),
            ("2024-01-03", 10.0, 10.0, 10.0, 13.0, 1.0),
        ]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        let closes: Vec<f64> = normalized.bars.iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![11.0, 13.0]);
        assert_eq!(normalized.warnings.len(), 1);
        assert_eq!(normalized.warnings[0].row, 0);
    }

    #[test]
    fn unix_second_dates_are_read_as_utc() {
        let mut payload = RawPayload::with_columns(&["date", "close"]);
        payload.push_row(vec![RawValue::from(1_704_153_600.0), RawValue::from(1.0)]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        assert_eq!(normalized.bars[0].date.to_string(), "2024-01-02");
    }

    #[test]
    fn missing_close_rejects_the_payload() {
        let mut payload = RawPayload::with_columns(&["Date", "Open", "Volume"]);
        payload.push_row(vec![
            RawValue::from("2024-01-02"),
            RawValue::from(1.0),
            RawValue::from(1.0),
        ]);

        let err = normalize(&symbol(), &payload).expect_err("must fail");
        assert_eq!(err, NormalizeError::MissingCloseColumn);
    }

    #[test]
    fn inverted_high_low_is_accepted() {
        let payload = ohlcv_payload(&[("2024-01-02", 100.0, 90.0, 95.0, 105.0, 1000.0)]);

        let normalized = normalize(&symbol(), &payload).expect("normalized");

        assert_eq!(normalized.bars.len(), 1);
        assert!(normalized.bars[0].high < normalized.bars[0].low);
    }
}
