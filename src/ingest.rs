//! CSV ingestion: uploaded text to a validated [`CandleSeries`].
//!
//! Columns are located by case-insensitive substring match on the header:
//! the first header containing `date` or `time`, then `open`, `high`, `low`,
//! `close`, and optionally one containing `vol`. Bad rows are dropped and
//! counted rather than failing the upload; the result is sorted by time with
//! duplicate timestamps removed (first occurrence wins).

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::series::{Candle, CandleSeries};
use crate::{IngestionError, MatchError, OHLCVExt, Result};

/// Datetime layouts tried in order; `%.f` also accepts a missing fraction
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Integer timestamps with at least this many digits are milliseconds
const MILLIS_DIGITS: usize = 13;

/// Parsed upload
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub series: CandleSeries,
    /// Rows dropped as invalid or duplicate
    pub skipped_rows: usize,
}

/// Read and parse a CSV file.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Ingested> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| IngestionError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_csv(&text)
}

/// Parse CSV text with a header row.
///
/// Fails with [`IngestionError::MissingColumns`] when a required column is
/// absent and [`IngestionError::NoValidRows`] when every row was dropped.
pub fn parse_csv(text: &str) -> Result<Ingested> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| IngestionError::Csv(e.to_string()))?
        .clone();
    let columns = Columns::detect(&headers)?;

    let mut candles = Vec::new();
    let mut skipped = 0usize;
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(row, error = %e, "unreadable CSV record dropped");
                skipped += 1;
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }
        match columns.parse_row(&record) {
            Ok(candle) => candles.push(candle),
            Err(fault) => {
                debug!(row, reason = fault, "row dropped");
                skipped += 1;
            }
        }
    }

    candles.sort_by_key(|c| c.time);
    let before = candles.len();
    candles.dedup_by_key(|c| c.time);
    let duplicates = before - candles.len();
    if duplicates > 0 {
        debug!(duplicates, "duplicate timestamps dropped");
    }
    skipped += duplicates;

    if candles.is_empty() {
        warn!(skipped, "upload contained no valid rows");
        return Err(IngestionError::NoValidRows { skipped }.into());
    }
    if skipped > 0 {
        warn!(skipped, kept = candles.len(), "dropped invalid rows during ingestion");
    }

    Ok(Ingested {
        series: CandleSeries::new(candles)?,
        skipped_rows: skipped,
    })
}

/// Parse a single timestamp cell.
///
/// Accepts ISO dates and datetimes, RFC 3339 (converted to UTC),
/// `MM/DD/YYYY` with optional time, and integer Unix seconds or milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = s.parse().ok()?;
        let utc = if s.len() >= MILLIS_DIGITS {
            DateTime::from_timestamp_millis(n)?
        } else {
            DateTime::from_timestamp(n, 0)?
        };
        return Some(utc.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ============================================================
// COLUMN LAYOUT
// ============================================================

#[derive(Debug, Clone, Copy)]
struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn detect(headers: &StringRecord) -> Result<Self> {
        let lower: Vec<String> = headers.iter().map(str::to_lowercase).collect();
        let find = |needles: &[&str]| {
            lower
                .iter()
                .position(|h| needles.iter().any(|n| h.contains(n)))
        };

        let time = find(&["date", "time"]);
        let open = find(&["open"]);
        let high = find(&["high"]);
        let low = find(&["low"]);
        let close = find(&["close"]);

        let missing: Vec<&'static str> = [
            ("time", time),
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
        ]
        .into_iter()
        .filter_map(|(name, idx)| idx.is_none().then_some(name))
        .collect();

        match (time, open, high, low, close) {
            (Some(time), Some(open), Some(high), Some(low), Some(close)) => Ok(Self {
                time,
                open,
                high,
                low,
                close,
                volume: find(&["vol"]),
            }),
            _ => Err(IngestionError::MissingColumns(missing).into()),
        }
    }

    fn parse_row(&self, record: &StringRecord) -> std::result::Result<Candle, &'static str> {
        let time = record
            .get(self.time)
            .and_then(parse_timestamp)
            .ok_or("unparseable timestamp")?;
        let price = |idx: usize| {
            record
                .get(idx)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or("missing or non-finite price")
        };
        let open = price(self.open)?;
        let high = price(self.high)?;
        let low = price(self.low)?;
        let close = price(self.close)?;

        let volume = match self.volume.and_then(|idx| record.get(idx)) {
            None | Some("") => 0.0,
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or("invalid volume")?,
        };

        let candle = Candle::new(time, open, high, low, close, volume);
        match candle.validate() {
            Ok(()) => Ok(candle),
            Err(MatchError::InvalidCandle { reason, .. }) => Err(reason),
            Err(_) => Err("invalid candle"),
        }
    }
}

// ============================================================
// TESTS
// ============================================================
