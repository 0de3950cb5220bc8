//! Distance-based metrics. Both fall monotonically as point-wise deviation grows.

use super::{MetricId, SimilarityMetric};

/// `1 - ||a - b|| / sqrt(n)`, clamped to `[0, 1]`.
///
/// For signatures (all values in `[0, 1]`) the largest possible distance is
/// `sqrt(n)`, so the clamp only matters for externally supplied vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMetric;

impl SimilarityMetric for EuclideanMetric {
    fn id(&self) -> MetricId {
        MetricId("EUCLIDEAN")
    }

    #[inline]
    fn score(&self, a: &[f64], b: &[f64]) -> f64 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        let max = (a.len() as f64).sqrt();
        (1.0 - sum_sq.sqrt() / max).clamp(0.0, 1.0)
    }
}

/// `1 - mean(|a - b|)`, clamped to `[0, 1]`
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteMetric;

impl SimilarityMetric for MeanAbsoluteMetric {
    fn id(&self) -> MetricId {
        MetricId("MEAN_ABSOLUTE")
    }

    #[inline]
    fn score(&self, a: &[f64], b: &[f64]) -> f64 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
        (1.0 - sum / a.len() as f64).clamp(0.0, 1.0)
    }
}
