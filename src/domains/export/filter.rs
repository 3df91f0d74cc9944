use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::domains::export::types::{DateRangeFilter, ExportRecord};

/// Fields consulted for a record's timestamp, in priority order.
pub const TIMESTAMP_FIELDS: [&str; 3] = ["createdAt", "date", "timestamp"];

const NAIVE_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Best-available timestamp of a record.
///
/// Null and empty-string values fall through to the next field. Returns `None`
/// when no field is usable or the value does not parse.
pub fn record_timestamp(record: &ExportRecord) -> Option<DateTime<Utc>> {
    let value = TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| record.get(*field))
        .find(|value| !is_blank(value))?;
    parse_timestamp(value)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parse a date-like JSON value. Numbers are Unix epoch milliseconds; naive
/// date strings are read as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Keep the records whose timestamp falls in `[now - window, now]`.
///
/// The cutoff is computed once, so every record is compared against the same
/// instant. Records without a usable timestamp are dropped. The input is
/// never modified.
pub fn filter_by_date_range(
    records: &[ExportRecord],
    range: DateRangeFilter,
    now: DateTime<Utc>,
) -> Vec<ExportRecord> {
    let Some(days) = range.lookback_days() else {
        return records.to_vec();
    };
    if records.is_empty() {
        return Vec::new();
    }

    let cutoff = now - Duration::days(days);
    records
        .iter()
        .filter(|record| within_window(record, cutoff, now))
        .cloned()
        .collect()
}

/// Number of records `filter_by_date_range` would keep.
pub fn preview_count(records: &[ExportRecord], range: DateRangeFilter, now: DateTime<Utc>) -> usize {
    let Some(days) = range.lookback_days() else {
        return records.len();
    };

    let cutoff = now - Duration::days(days);
    records
        .iter()
        .filter(|record| within_window(record, cutoff, now))
        .count()
}

fn within_window(record: &ExportRecord, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    matches!(record_timestamp(record), Some(ts) if ts >= cutoff && ts <= now)
}
