//! Integration tests for candlematch similarity search.
//!
//! These tests exercise the public API end to end: building a series,
//! extracting a query, scanning and ranking.

use std::collections::HashSet;

use candlematch::prelude::*;
use chrono::{Duration, NaiveDate, NaiveDateTime};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Candle around a mid price with a fixed half-range
fn candle_at(i: usize, mid: f64, half: f64, up: bool) -> Candle {
    let (o, c) = if up {
        (mid - half * 0.5, mid + half * 0.5)
    } else {
        (mid + half * 0.5, mid - half * 0.5)
    };
    Candle::new(
        t0() + Duration::minutes(i as i64),
        o,
        mid + half,
        mid - half,
        c,
        100.0 + i as f64,
    )
}

/// Zigzag shape used for the planted pattern
const SHAPE: [f64; 10] = [0.0, 3.0, 1.0, 4.0, 2.0, 6.0, 3.0, 5.0, 1.0, 2.0];

/// 100 candles of slow drift with the same 10-candle shape planted at 20
/// (base 100, scale 1) and at 70 (base 200, scale 2).
fn planted_series() -> CandleSeries {
    let candles = (0..100)
        .map(|i| match i {
            20..=29 => candle_at(i, 100.0 + SHAPE[i - 20], 0.5, i % 2 == 0),
            70..=79 => candle_at(i, 200.0 + SHAPE[i - 70] * 2.0, 1.0, i % 2 == 0),
            _ => {
                let x = i as f64;
                let mid = 150.0 + (x * 0.13).sin() * 8.0 + (x * 0.031).cos() * 5.0;
                candle_at(i, mid, 0.3 + (x * 0.7).sin().abs(), (x * 0.9).sin() > 0.0)
            }
        })
        .collect();
    CandleSeries::new(candles).unwrap()
}

fn wave_series(n: usize) -> CandleSeries {
    let candles = (0..n)
        .map(|i| {
            let x = i as f64;
            let mid = 50.0 + (x * 0.29).sin() * 4.0 + (x * 0.017).cos() * 2.0;
            candle_at(i, mid, 0.4 + (x * 1.1).cos().abs() * 0.3, (x * 0.5).sin() > 0.0)
        })
        .collect();
    CandleSeries::new(candles).unwrap()
}

// ============================================================
// END TO END
// ============================================================

#[test]
fn test_finds_pattern_at_two_price_levels() {
    let series = planted_series();
    let engine = EngineBuilder::new(10, 2).build().unwrap();
    let query = QuerySource::Series(series.candles()[20..30].to_vec());

    let ranked = engine.analyze_source(&series, &query).unwrap();
    let starts: Vec<usize> = ranked.iter().map(|m| m.start_index).collect();
    assert_eq!(starts, vec![20, 70]);

    for m in ranked.iter() {
        assert!(m.score > 0.999_999, "score {}", m.score);
        assert_eq!(m.end_index, m.start_index + 9);
        assert_eq!(m.preview.len(), 10);
        assert_eq!(m.timestamp, series.candles()[m.start_index].time);
    }
}

#[test]
fn test_planted_pattern_survives_overlap_suppression() {
    let series = planted_series();
    let engine = EngineBuilder::new(10, 5)
        .overlap_suppression(true)
        .build()
        .unwrap();
    let query = QuerySource::Series(series.candles()[70..80].to_vec());

    let ranked = engine.analyze_source(&series, &query).unwrap();
    let starts: Vec<usize> = ranked.iter().map(|m| m.start_index).collect();
    assert_eq!(&starts[..2], &[20, 70]);

    let matches = ranked.matches();
    for (i, a) in matches.iter().enumerate() {
        for b in &matches[i + 1..] {
            assert!(!a.overlaps(b), "{} overlaps {}", a.start_index, b.start_index);
        }
    }
}

#[test]
fn test_owned_results() {
    let series = planted_series();
    let engine = EngineBuilder::new(10, 2).build().unwrap();
    let query = engine
        .resolve_query(&QuerySource::Series(series.candles()[20..30].to_vec()))
        .unwrap();

    let owned = engine.analyze(&series, &query).unwrap().to_owned_matches();
    assert_eq!(owned.len(), 2);
    assert_eq!(owned[1].start_index, 70);
    assert_eq!(owned[1].end_index, 79);
    assert_eq!(owned[1].preview, series.candles()[70..80].to_vec());
}

// ============================================================
// CANDIDATES AND RANKING
// ============================================================

#[test]
fn test_candidate_count() {
    let series = wave_series(120);
    for (window, stride) in [(5, 1), (10, 1), (10, 3), (50, 7), (120, 1)] {
        let engine = EngineBuilder::new(window, 1).stride(stride).build().unwrap();
        let query = engine.extractor().extract(&series.candles()[..window]).unwrap();
        let candidates = engine.scanner().scan(&series, &query).unwrap();
        let expected = (120 - window) / stride + 1;
        assert_eq!(candidates.len(), expected, "L={window} stride={stride}");
        assert_eq!(engine.scanner().window_count(series.len()), expected);
    }
}

#[test]
fn test_result_length_is_min_of_k_and_candidates() {
    let series = wave_series(30);
    let engine = EngineBuilder::new(25, 10).build().unwrap();
    let query = engine.extractor().extract(&series.candles()[..25]).unwrap();
    assert_eq!(engine.analyze(&series, &query).unwrap().len(), 6);
}

#[test]
fn test_rank_of_empty_candidates() {
    let ranked = rank(Vec::new(), 3).unwrap();
    assert!(ranked.is_empty());
    assert!(ranked.to_owned_matches().is_empty());
}

#[test]
fn test_self_similarity_is_top() {
    let series = wave_series(300);
    let engine = EngineBuilder::new(15, 3).build().unwrap();
    for start in [0, 77, 285] {
        let query = engine
            .extractor()
            .extract(&series.candles()[start..start + 15])
            .unwrap();
        let ranked = engine.analyze(&series, &query).unwrap();
        let best = ranked.best().unwrap();
        assert_eq!(best.start_index, start);
        assert_eq!(best.score, 1.0);
    }
}

#[test]
fn test_flat_window_query() {
    let mut candles: Vec<Candle> = wave_series(60).candles().to_vec();
    for c in &mut candles[30..38] {
        *c = Candle::new(c.time, 42.0, 42.0, 42.0, 42.0, 0.0);
    }
    let series = CandleSeries::new(candles).unwrap();
    let engine = EngineBuilder::new(8, 1).build().unwrap();

    let query = engine.extractor().extract(&series.candles()[30..38]).unwrap();
    assert!(query.values().iter().all(|&v| v == 0.5));

    let ranked = engine.analyze(&series, &query).unwrap();
    assert_eq!(ranked.best().map(|m| m.start_index), Some(30));
}

#[test]
fn test_deterministic_across_runs() {
    let series = wave_series(2500);
    let engine = EngineBuilder::new(20, 5).build().unwrap();
    let query = engine.extractor().extract(&series.candles()[1000..1020]).unwrap();

    let first = engine.analyze(&series, &query).unwrap();
    for _ in 0..3 {
        assert_eq!(engine.analyze(&series, &query).unwrap(), first);
    }
}

// ============================================================
// ERRORS
// ============================================================

#[test]
fn test_series_shorter_than_window() {
    let series = wave_series(9);
    let engine = EngineBuilder::new(10, 3).build().unwrap();
    let query = QuerySource::Series(wave_series(10).candles().to_vec());
    assert!(matches!(
        engine.analyze_source(&series, &query),
        Err(MatchError::InsufficientData { need: 10, got: 9 })
    ));
}

#[test]
fn test_query_of_wrong_length() {
    let series = wave_series(50);
    let engine = EngineBuilder::new(10, 3).build().unwrap();
    let query = QuerySource::Series(series.candles()[..12].to_vec());
    assert!(matches!(
        engine.analyze_source(&series, &query),
        Err(MatchError::InvalidWindow { expected: 10, got: 12 })
    ));
}

#[test]
fn test_invalid_builder_arguments() {
    assert!(EngineBuilder::new(1, 3).build().is_err());
    assert!(EngineBuilder::new(10, 0).build().is_err());
    assert!(EngineBuilder::new(10, 3).stride(0).build().is_err());
}

// ============================================================
// CONFIGURATION
// ============================================================

#[test]
fn test_config_from_json() {
    let config: MatchConfig =
        serde_json::from_str(r#"{"window_length": 10, "top_k": 2, "metric": "pearson"}"#).unwrap();
    assert_eq!(config.stride.get(), 1);
    assert!(!config.overlap_suppression);

    let engine = EngineBuilder::from_config(&config).build().unwrap();
    assert_eq!(engine.metric_id().as_str(), "PEARSON");

    let series = planted_series();
    let query = QuerySource::Series(series.candles()[20..30].to_vec());
    let starts: HashSet<usize> = engine
        .analyze_source(&series, &query)
        .unwrap()
        .iter()
        .map(|m| m.start_index)
        .collect();
    assert_eq!(starts, HashSet::from([20, 70]));
}

#[test]
fn test_config_rejects_invalid_json() {
    assert!(serde_json::from_str::<MatchConfig>(r#"{"window_length": 1, "top_k": 2}"#).is_err());
    assert!(serde_json::from_str::<MatchConfig>(r#"{"window_length": 5, "top_k": 0}"#).is_err());
}

#[test]
fn test_every_builtin_metric_finds_self() {
    let series = wave_series(200);
    for &kind in MetricKind::ALL {
        let engine = EngineBuilder::new(12, 1).metric_kind(kind).build().unwrap();
        let query = engine.extractor().extract(&series.candles()[140..152]).unwrap();
        let ranked = engine.analyze(&series, &query).unwrap();
        assert_eq!(ranked.best().map(|m| m.start_index), Some(140), "{kind:?}");
    }
}

#[test]
fn test_volume_channel_layout() {
    let series = wave_series(80);
    let engine = EngineBuilder::new(10, 3).volume_channel(true).build().unwrap();
    let query = engine.extractor().extract(&series.candles()[5..15]).unwrap();
    assert_eq!(query.len(), 50);
    assert_eq!(query.volumes().map(<[f64]>::len), Some(10));

    let plain = EngineBuilder::new(10, 3).build().unwrap();
    let other = plain.extractor().extract(&series.candles()[5..15]).unwrap();
    assert!(matches!(
        engine.analyze(&series, &other),
        Err(MatchError::SignatureMismatch { .. })
    ));
}

// ============================================================
// IMAGE QUERIES
// ============================================================

/// Decodes a "chart image" that is just the raw signature bytes
struct RawBytesExtractor;

impl ImageFeatureExtractor for RawBytesExtractor {
    fn extract(&self, image: &[u8], layout: SignatureLayout) -> Result<PatternSignature> {
        if image.len() != layout.len() {
            return Err(MatchError::ImageExtraction(format!(
                "expected {} bytes, got {}",
                layout.len(),
                image.len()
            )));
        }
        let values = image.iter().map(|&b| f64::from(b) / 255.0).collect();
        PatternSignature::from_values(layout, values)
    }
}

#[test]
fn test_image_query() {
    let series = wave_series(100);
    let engine = EngineBuilder::new(5, 3)
        .image_extractor(RawBytesExtractor)
        .build()
        .unwrap();

    let ranked = engine
        .analyze_source(&series, &QuerySource::Image(vec![128; 20]))
        .unwrap();
    assert_eq!(ranked.len(), 3);

    assert!(matches!(
        engine.analyze_source(&series, &QuerySource::Image(vec![0; 3])),
        Err(MatchError::ImageExtraction(_))
    ));

    let without = EngineBuilder::new(5, 3).build().unwrap();
    assert!(matches!(
        without.analyze_source(&series, &QuerySource::Image(vec![0; 20])),
        Err(MatchError::NoImageExtractor)
    ));
}
