//! # candlematch - Candlestick pattern similarity search
//!
//! Finds the historical OHLCV windows that look most like a query pattern.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlematch::prelude::*;
//! use chrono::{Duration, NaiveDate};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1)
//!     .unwrap()
//!     .and_hms_opt(0, 0, 0)
//!     .unwrap();
//! let candles: Vec<Candle> = (0..100)
//!     .map(|i| {
//!         let base = 100.0 + (i as f64 * 0.3).sin() * 5.0;
//!         Candle::new(start + Duration::minutes(i), base, base + 1.0, base - 1.0, base + 0.5, 10.0)
//!     })
//!     .collect();
//! let series = CandleSeries::new(candles).unwrap();
//!
//! // Scan for windows of 10 candles, keep the 3 best
//! let engine = EngineBuilder::new(10, 3).overlap_suppression(true).build().unwrap();
//!
//! // Query with one of the series' own windows
//! let query = engine
//!     .resolve_query(&QuerySource::Series(series.candles()[40..50].to_vec()))
//!     .unwrap();
//! let ranked = engine.analyze(&series, &query).unwrap();
//! assert_eq!(ranked.best().unwrap().start_index, 40);
//! ```

use std::sync::Arc;

pub mod ingest;
pub mod metrics;
pub mod params;
pub mod ranker;
pub mod scanner;
pub mod series;
pub mod session;
pub mod signature;

pub mod prelude {
    pub use crate::{
        // Ingestion
        ingest::{load_csv, parse_csv, Ingested},
        // Metrics
        metrics::{
            BuiltinMetric, EuclideanMetric, MeanAbsoluteMetric, MetricId, MetricKind,
            PearsonMetric, SimilarityMetric,
        },
        // Parameters
        params::{get_count, get_flag, ParamMeta, ParamType, Parameterized},
        // Ranking
        ranker::{merge_top_k, rank, MatchCandidate, MatchResult, RankedResult},
        // Scanning
        scanner::{
            CancelToken, OverlapPolicy, ScanControl, ScanOutcome, ScanProgress,
            SimilarityScanner,
        },
        // Data model
        series::{Candle, CandleSeries, SeriesInfo, Timeframe},
        // Session
        session::{AnalysisReport, AnalysisSession, ScanHandle},
        // Signatures
        signature::{
            ImageFeatureExtractor, PatternExtractor, PatternSignature, QuerySource,
            SignatureLayout,
        },
        // Engine and configuration
        EngineBuilder,
        MatchConfig,
        MatchEngine,
        Stride,
        TopK,
        WindowLength,
        // Errors
        IngestionError,
        MatchError,
        Result,
        // Traits
        OHLCVExt,
        OHLCV,
    };
}

use metrics::{BuiltinMetric, MetricId, MetricKind, SimilarityMetric};
use ranker::RankedResult;
use scanner::{OverlapPolicy, ScanControl, ScanOutcome, SimilarityScanner};
use series::CandleSeries;
use signature::{
    ImageFeatureExtractor, PatternExtractor, PatternSignature, QuerySource, SignatureLayout,
};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors returned by the matching engine.
///
/// A cancelled scan is not an error; see [`ScanOutcome::Cancelled`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error("Invalid window: expected {expected} candles, got {got}")]
    InvalidWindow { expected: usize, got: usize },

    #[error("Insufficient data: need {need} candles, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid argument: {field} = {value} ({reason})")]
    InvalidArgument {
        field: &'static str,
        value: usize,
        reason: &'static str,
    },

    #[error("Parameter {field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Signature mismatch: expected {expected}, got {got}")]
    SignatureMismatch {
        expected: SignatureLayout,
        got: SignatureLayout,
    },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("No image extractor configured")]
    NoImageExtractor,

    #[error("Image extraction failed: {0}")]
    ImageExtraction(String),

    #[error("Scan worker disconnected before reporting a result")]
    WorkerDisconnected,
}

/// Errors raised while turning uploaded text into a [`CandleSeries`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestionError {
    #[error("CSV is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("No valid rows in upload ({skipped} skipped)")]
    NoValidRows { skipped: usize },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Cannot read {path}: {reason}")]
    Io { path: String, reason: String },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Generate a validated `usize` newtype with a lower bound and serde support.
macro_rules! validated_count {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal, min = $min:literal, reason = $reason:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            /// Smallest accepted value
            pub const MIN: usize = $min;

            /// Create a new value, rejecting anything below [`Self::MIN`]
            pub fn new(value: usize) -> Result<Self> {
                if value < $min {
                    return Err(MatchError::InvalidArgument {
                        field: $field,
                        value,
                        reason: $reason,
                    });
                }
                Ok(Self(value))
            }

            #[doc(hidden)]
            pub const fn new_const(value: usize) -> Self {
                Self(value)
            }

            #[inline]
            pub fn get(self) -> usize {
                self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                s: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                self.0.serialize(s)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                d: D,
            ) -> std::result::Result<Self, D::Error> {
                let value = usize::deserialize(d)?;
                $name::new(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

validated_count!(
    /// Pattern length in candles (must be >= 2)
    WindowLength,
    field = "window_length",
    min = 2,
    reason = "window length must be >= 2"
);

validated_count!(
    /// Number of matches to return (must be >= 1)
    TopK,
    field = "top_k",
    min = 1,
    reason = "top_k must be >= 1"
);

validated_count!(
    /// Step between consecutive window starts (must be >= 1)
    Stride,
    field = "stride",
    min = 1,
    reason = "stride must be >= 1"
);

impl Default for Stride {
    fn default() -> Self {
        Self::new_const(1)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    /// Lowest of the four price fields
    #[inline]
    fn price_min(&self) -> f64 {
        self.open().min(self.high()).min(self.low()).min(self.close())
    }

    /// Highest of the four price fields
    #[inline]
    fn price_max(&self) -> f64 {
        self.open().max(self.high()).max(self.low()).max(self.close())
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(CandleFault::Nan.at(0));
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(CandleFault::Infinite.at(0));
        }
        if !self.volume().is_finite() {
            return Err(CandleFault::VolumeNotFinite.at(0));
        }
        if self.volume() < 0.0 {
            return Err(CandleFault::NegativeVolume.at(0));
        }
        if self.high() < self.low() {
            return Err(CandleFault::HighBelowLow.at(0));
        }
        let (lo, hi) = (self.low(), self.high());
        if !(lo..=hi).contains(&self.open()) || !(lo..=hi).contains(&self.close()) {
            return Err(CandleFault::BodyOutsideRange.at(0));
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Reasons a candle fails validation
#[derive(Debug, Clone, Copy)]
enum CandleFault {
    Nan,
    Infinite,
    VolumeNotFinite,
    NegativeVolume,
    HighBelowLow,
    BodyOutsideRange,
}

impl CandleFault {
    fn at(self, index: usize) -> MatchError {
        let reason = match self {
            CandleFault::Nan => "NaN in OHLC",
            CandleFault::Infinite => "Infinite value in OHLC",
            CandleFault::VolumeNotFinite => "volume is not finite",
            CandleFault::NegativeVolume => "volume < 0",
            CandleFault::HighBelowLow => "high < low",
            CandleFault::BodyOutsideRange => "open/close outside [low, high]",
        };
        MatchError::InvalidCandle { index, reason }
    }
}

/// Validate every bar, reporting the offending index
pub(crate) fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            MatchError::InvalidCandle { reason, .. } => MatchError::InvalidCandle { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Full configuration surface of a similarity search.
///
/// `window_length` and `top_k` are always explicit. When deserialized, the
/// remaining fields fall back to stride 1, no overlap suppression, the
/// Euclidean metric and no volume channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchConfig {
    pub window_length: WindowLength,
    pub top_k: TopK,
    #[serde(default)]
    pub stride: Stride,
    #[serde(default)]
    pub overlap_suppression: bool,
    #[serde(default)]
    pub metric: MetricKind,
    #[serde(default)]
    pub volume_channel: bool,
}

impl MatchConfig {
    pub fn new(window_length: usize, top_k: usize) -> Result<Self> {
        Ok(Self {
            window_length: WindowLength::new(window_length)?,
            top_k: TopK::new(top_k)?,
            stride: Stride::default(),
            overlap_suppression: false,
            metric: MetricKind::default(),
            volume_channel: false,
        })
    }

    /// Layout of the signatures produced under this configuration
    pub fn layout(&self) -> SignatureLayout {
        SignatureLayout::new(self.window_length, self.volume_channel)
    }
}

// ============================================================
// MATCH ENGINE
// ============================================================

/// Similarity search engine: extraction, scanning and ranking in one place.
pub struct MatchEngine<M: SimilarityMetric = BuiltinMetric> {
    scanner: SimilarityScanner<M>,
    top_k: TopK,
    image_extractor: Option<Arc<dyn ImageFeatureExtractor>>,
}

impl<M: SimilarityMetric> MatchEngine<M> {
    #[inline]
    pub fn scanner(&self) -> &SimilarityScanner<M> {
        &self.scanner
    }

    #[inline]
    pub fn extractor(&self) -> &PatternExtractor {
        self.scanner.extractor()
    }

    #[inline]
    pub fn layout(&self) -> SignatureLayout {
        self.scanner.extractor().layout()
    }

    #[inline]
    pub fn window_length(&self) -> WindowLength {
        self.layout().window_length
    }

    #[inline]
    pub fn top_k(&self) -> TopK {
        self.top_k
    }

    #[inline]
    pub fn metric_id(&self) -> MetricId {
        self.scanner.metric().id()
    }

    /// Turn any query source into a signature comparable with this engine's windows.
    pub fn resolve_query(&self, source: &QuerySource) -> Result<PatternSignature> {
        let extractor = self.scanner.extractor();
        match source {
            QuerySource::Image(bytes) => {
                let image = self
                    .image_extractor
                    .as_deref()
                    .ok_or(MatchError::NoImageExtractor)?;
                extractor.extract_from_image(image, bytes)
            }
            QuerySource::Series(candles) => extractor.extract(candles),
            QuerySource::Signature(signature) => {
                extractor.check_compatible(signature)?;
                Ok(signature.clone())
            }
        }
    }

    /// Check that `series` can be scanned with this engine's window length
    pub fn check_series(&self, series: &CandleSeries) -> Result<()> {
        let need = self.window_length().get();
        if series.len() < need {
            return Err(MatchError::InsufficientData {
                need,
                got: series.len(),
            });
        }
        Ok(())
    }

    /// Scan `series` for `query` and return the ranked top-K.
    ///
    /// An empty result means "no matches", never a failure.
    pub fn analyze<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
    ) -> Result<RankedResult<'a>> {
        self.scanner.scan_top_k(series, query, self.top_k, None)
    }

    /// Like [`analyze`](Self::analyze) but cancellable and observable through `control`.
    pub fn analyze_with<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
        control: &ScanControl,
    ) -> Result<ScanOutcome<RankedResult<'a>>> {
        let ranked = self
            .scanner
            .scan_top_k(series, query, self.top_k, Some(control))?;
        if control.is_cancelled() {
            return Ok(ScanOutcome::Cancelled);
        }
        Ok(ScanOutcome::Completed(ranked))
    }

    /// Resolve `source` and analyze in one step.
    pub fn analyze_source<'a>(
        &self,
        series: &'a CandleSeries,
        source: &QuerySource,
    ) -> Result<RankedResult<'a>> {
        let query = self.resolve_query(source)?;
        self.analyze(series, &query)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating [`MatchEngine`] instances
pub struct EngineBuilder<M: SimilarityMetric = BuiltinMetric> {
    window_length: usize,
    top_k: usize,
    stride: usize,
    overlap_suppression: bool,
    volume_channel: bool,
    metric: M,
    image_extractor: Option<Arc<dyn ImageFeatureExtractor>>,
}

impl EngineBuilder<BuiltinMetric> {
    /// Start a builder; window length and result count are always explicit.
    pub fn new(window_length: usize, top_k: usize) -> Self {
        Self {
            window_length,
            top_k,
            stride: 1,
            overlap_suppression: false,
            volume_channel: false,
            metric: BuiltinMetric::default(),
            image_extractor: None,
        }
    }

    /// Start from a full configuration
    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(config.window_length.get(), config.top_k.get())
            .stride(config.stride.get())
            .overlap_suppression(config.overlap_suppression)
            .volume_channel(config.volume_channel)
            .metric_kind(config.metric)
    }

    /// Select one of the builtin metrics
    pub fn metric_kind(mut self, kind: MetricKind) -> Self {
        self.metric = BuiltinMetric::from(kind);
        self
    }
}

impl<M: SimilarityMetric> EngineBuilder<M> {
    /// Install a custom similarity metric
    pub fn metric<M2: SimilarityMetric>(self, metric: M2) -> EngineBuilder<M2> {
        EngineBuilder {
            window_length: self.window_length,
            top_k: self.top_k,
            stride: self.stride,
            overlap_suppression: self.overlap_suppression,
            volume_channel: self.volume_channel,
            metric,
            image_extractor: self.image_extractor,
        }
    }

    pub fn window_length(mut self, window_length: usize) -> Self {
        self.window_length = window_length;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Drop candidates whose window overlaps a better one
    pub fn overlap_suppression(mut self, enable: bool) -> Self {
        self.overlap_suppression = enable;
        self
    }

    /// Append a normalized volume channel to every signature
    pub fn volume_channel(mut self, enable: bool) -> Self {
        self.volume_channel = enable;
        self
    }

    /// Plug in an image-to-signature capability
    pub fn image_extractor<E: ImageFeatureExtractor + 'static>(mut self, extractor: E) -> Self {
        self.image_extractor = Some(Arc::new(extractor));
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<MatchEngine<M>> {
        let layout = SignatureLayout::new(WindowLength::new(self.window_length)?, self.volume_channel);
        let scanner = SimilarityScanner::new(
            PatternExtractor::new(layout),
            self.metric,
            Stride::new(self.stride)?,
            OverlapPolicy::from_suppression(self.overlap_suppression),
        );
        Ok(MatchEngine {
            scanner,
            top_k: TopK::new(self.top_k)?,
            image_extractor: self.image_extractor,
        })
    }
}

// ============================================================
// TYPE ALIASES
// ============================================================

/// Engine using the builtin metrics
pub type DefaultEngine = MatchEngine<BuiltinMetric>;

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Candle;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    /// Test OHLCV bar
    #[derive(Debug, Clone)]
    struct Bar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
        v: f64,
    }

    impl Bar {
        fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
            Self {
                o,
                h,
                l,
                c,
                v: 1000.0,
            }
        }
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.o
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }

        fn volume(&self) -> f64 {
            self.v
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn make_wave_series(n: usize) -> CandleSeries {
        let candles = (0..n)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.45).sin() * 4.0 + i as f64 * 0.05;
                Candle::new(
                    t0() + Duration::minutes(i as i64),
                    base,
                    base + 1.2,
                    base - 0.8,
                    base + 0.3,
                    500.0 + i as f64,
                )
            })
            .collect();
        CandleSeries::new(candles).unwrap()
    }

    #[test]
    fn test_window_length_validation() {
        assert!(WindowLength::new(2).is_ok());
        assert!(WindowLength::new(50).is_ok());
        assert!(WindowLength::new(1).is_err());
        assert!(WindowLength::new(0).is_err());
    }

    #[test]
    fn test_top_k_and_stride_validation() {
        assert!(TopK::new(1).is_ok());
        assert!(matches!(
            TopK::new(0),
            Err(MatchError::InvalidArgument { field: "top_k", value: 0, .. })
        ));
        assert!(Stride::new(3).is_ok());
        assert!(Stride::new(0).is_err());
        assert_eq!(Stride::default().get(), 1);
    }

    #[test]
    fn test_validate_bar() {
        assert!(Bar::new(100.0, 110.0, 90.0, 105.0).validate().is_ok());
        assert!(Bar::new(100.0, 90.0, 110.0, 105.0).validate().is_err());
        assert!(Bar::new(f64::NAN, 110.0, 90.0, 105.0).validate().is_err());
        assert!(Bar::new(100.0, f64::INFINITY, 90.0, 105.0).validate().is_err());
        // close above high
        assert!(Bar::new(100.0, 110.0, 90.0, 111.0).validate().is_err());

        let mut bar = Bar::new(100.0, 110.0, 90.0, 105.0);
        bar.v = -1.0;
        assert!(bar.validate().is_err());
    }

    #[test]
    fn test_validate_bars_reports_index() {
        let bars = vec![
            Bar::new(100.0, 110.0, 90.0, 105.0),
            Bar::new(100.0, 110.0, 90.0, 105.0),
            Bar::new(100.0, 90.0, 110.0, 105.0),
        ];
        match validate_bars(&bars) {
            Err(MatchError::InvalidCandle { index, reason }) => {
                assert_eq!(index, 2);
                assert_eq!(reason, "high < low");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_price_bounds() {
        let bar = Bar::new(100.0, 110.0, 90.0, 105.0);
        assert_eq!(bar.price_min(), 90.0);
        assert_eq!(bar.price_max(), 110.0);
    }

    #[test]
    fn test_engine_builder() {
        let engine = EngineBuilder::new(10, 5).build();
        assert!(engine.is_ok());

        assert!(EngineBuilder::new(1, 5).build().is_err());
        assert!(EngineBuilder::new(10, 0).build().is_err());
        assert!(EngineBuilder::new(10, 5).stride(0).build().is_err());
    }

    #[test]
    fn test_engine_from_config() {
        let mut config = MatchConfig::new(12, 3).unwrap();
        config.metric = MetricKind::Pearson;
        config.volume_channel = true;

        let engine = EngineBuilder::from_config(&config).build().unwrap();
        assert_eq!(engine.window_length().get(), 12);
        assert_eq!(engine.top_k().get(), 3);
        assert_eq!(engine.metric_id(), MetricId("PEARSON"));
        assert_eq!(engine.layout(), config.layout());
    }

    #[test]
    fn test_insufficient_data() {
        let series = make_wave_series(5);
        let engine = EngineBuilder::new(10, 3).build().unwrap();
        assert!(matches!(
            engine.check_series(&series),
            Err(MatchError::InsufficientData { need: 10, got: 5 })
        ));
    }

    #[test]
    fn test_analyze_self_match() {
        let series = make_wave_series(120);
        let engine = EngineBuilder::new(8, 4).build().unwrap();

        let query = engine.extractor().extract(&series.candles()[60..68]).unwrap();
        let ranked = engine.analyze(&series, &query).unwrap();

        assert_eq!(ranked.len(), 4);
        let best = ranked.best().unwrap();
        assert_eq!(best.start_index, 60);
        assert_eq!(best.end_index, 67);
        assert!((best.score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_with_cancelled_control() {
        let series = make_wave_series(50);
        let engine = EngineBuilder::new(8, 4).build().unwrap();
        let query = engine.extractor().extract(&series.candles()[0..8]).unwrap();

        let control = ScanControl::new();
        control.cancel();
        let outcome = engine.analyze_with(&series, &query, &control).unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_resolve_query_without_image_extractor() {
        let engine = EngineBuilder::new(8, 4).build().unwrap();
        let err = engine
            .resolve_query(&QuerySource::Image(vec![0x89, 0x50, 0x4e, 0x47]))
            .unwrap_err();
        assert!(matches!(err, MatchError::NoImageExtractor));
    }

    #[test]
    fn test_resolve_query_wrong_length() {
        let series = make_wave_series(20);
        let engine = EngineBuilder::new(8, 4).build().unwrap();
        let err = engine
            .resolve_query(&QuerySource::Series(series.candles()[0..5].to_vec()))
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::InvalidWindow {
                expected: 8,
                got: 5
            }
        ));
    }

    #[test]
    fn test_resolve_query_layout_mismatch() {
        let series = make_wave_series(20);
        let with_volume = EngineBuilder::new(8, 4).volume_channel(true).build().unwrap();
        let without_volume = EngineBuilder::new(8, 4).build().unwrap();

        let query = with_volume.extractor().extract(&series.candles()[0..8]).unwrap();
        let err = without_volume
            .resolve_query(&QuerySource::Signature(query))
            .unwrap_err();
        assert!(matches!(err, MatchError::SignatureMismatch { .. }));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: MatchConfig =
            serde_json::from_str(r#"{"window_length": 20, "top_k": 5}"#).unwrap();
        assert_eq!(config.stride.get(), 1);
        assert!(!config.overlap_suppression);
        assert!(!config.volume_channel);
        assert_eq!(config.metric, MetricKind::Euclidean);

        let bad = serde_json::from_str::<MatchConfig>(r#"{"window_length": 1, "top_k": 5}"#);
        assert!(bad.is_err());
    }
}
