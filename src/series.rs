//! Candle records and the immutable, time-ordered series the matcher scans.
//!
//! A [`CandleSeries`] is built wholesale (usually by [`crate::ingest`]) and
//! replaced, never mutated, when new data arrives.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{validate_bars, MatchError, Result, OHLCV};

// ============================================================
// CANDLE
// ============================================================

/// One OHLCV observation with a timezone-naive timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        time: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// CANDLE SERIES
// ============================================================

/// Validated candles, strictly increasing by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting invalid candles and out-of-order or duplicate timestamps.
    pub fn new(candles: Vec<Candle>) -> Result<Self> {
        validate_bars(&candles)?;
        if let Some(i) = candles.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(MatchError::InvalidCandle {
                index: i + 1,
                reason: "time not strictly increasing",
            });
        }
        Ok(Self { candles })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    #[inline]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// `len` candles starting at `start`, if the series is long enough
    #[inline]
    pub fn window(&self, start: usize, len: usize) -> Option<&[Candle]> {
        self.candles.get(start..start.checked_add(len)?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.candles.first().map(|c| c.time)
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.candles.last().map(|c| c.time)
    }

    /// Timeframe matching the most common spacing between candles.
    ///
    /// Returns `None` for fewer than two candles or when the modal spacing
    /// is not one of the known timeframes.
    pub fn infer_timeframe(&self) -> Option<Timeframe> {
        let mut intervals: HashMap<i64, usize> = HashMap::new();
        for w in self.candles.windows(2) {
            let diff = (w[1].time - w[0].time).num_seconds();
            *intervals.entry(diff).or_insert(0) += 1;
        }

        // ties resolve to the finer interval
        let (seconds, _) = intervals
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;
        Timeframe::from_seconds(seconds)
    }
}

impl AsRef<[Candle]> for CandleSeries {
    fn as_ref(&self) -> &[Candle] {
        &self.candles
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

impl<'de> Deserialize<'de> for CandleSeries {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let candles = Vec::<Candle>::deserialize(d)?;
        CandleSeries::new(candles).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// TIMEFRAME / SERIES INFO
// ============================================================

/// Bar interval of a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// Interval length in seconds
    pub fn seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 4 * 3600,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 7 * 86_400,
        }
    }

    pub fn from_seconds(seconds: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.seconds() == seconds)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata for the loaded series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl Default for SeriesInfo {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::M1,
        }
    }
}

// ============================================================
// TESTS
// ============================================================
