use crate::error::{CleaningError, Result};
use crate::table::{Table, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

pub const PRICE_COLUMN: &str = "price";
pub const LAST_REVIEW_COLUMN: &str = "last_review";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d", "%d %B %Y", "%B %d, %Y"];

/// Counts from converting one column to datetimes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub parsed: usize,
    pub missing: usize,
    /// Values present but unparseable, now missing.
    pub coerced: usize,
}

/// Keep the rows whose `column` value lies in `[min, max]`, preserving order.
///
/// Missing values never match. A non-numeric value is an error. An inverted
/// range simply matches nothing.
pub fn filter_price_range(table: &Table, column: &str, min: f64, max: f64) -> Result<Table> {
    let idx = table.column_index(column)?;

    let mut prices = Vec::with_capacity(table.len());
    for (row_no, row) in table.rows().iter().enumerate() {
        prices.push(parse_number(&row[idx], row_no, column)?);
    }

    let mut filtered = table.clone();
    let mut keep = prices
        .into_iter()
        .map(|price| price.map_or(false, |p| min <= p && p <= max));
    filtered.retain_rows(|_| keep.next().unwrap_or(false));

    debug!(
        kept = filtered.len(),
        dropped = table.len() - filtered.len(),
        "Applied price range filter"
    );
    Ok(filtered)
}

fn parse_number(value: &Value, row: usize, column: &str) -> Result<Option<f64>> {
    match value {
        Value::Missing => Ok(None),
        Value::Text(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: f64 = trimmed.parse().map_err(|_| CleaningError::InvalidNumber {
                row,
                column: column.to_string(),
                value: raw.clone(),
            })?;
            Ok(if parsed.is_nan() { None } else { Some(parsed) })
        }
        Value::DateTime(dt) => Err(CleaningError::InvalidNumber {
            row,
            column: column.to_string(),
            value: dt.to_string(),
        }),
    }
}

/// Parse the date and datetime spellings found in raw listings exports.
/// Offsets are normalized to UTC.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Replace every value of `column` with a parsed datetime or `Missing`.
/// Row count and order are unchanged.
pub fn convert_datetime_column(table: &mut Table, column: &str) -> Result<ConversionReport> {
    let idx = table.column_index(column)?;
    let mut report = ConversionReport::default();

    for row in table.rows_mut() {
        let converted = match &row[idx] {
            Value::Missing => {
                report.missing += 1;
                Value::Missing
            }
            Value::DateTime(dt) => {
                report.parsed += 1;
                Value::DateTime(*dt)
            }
            Value::Text(raw) => match parse_datetime(raw) {
                Some(dt) => {
                    report.parsed += 1;
                    Value::DateTime(dt)
                }
                None => {
                    debug!(value = %raw, "Unparseable datetime coerced to missing");
                    report.coerced += 1;
                    Value::Missing
                }
            },
        };
        row[idx] = converted;
    }

    Ok(report)
}
