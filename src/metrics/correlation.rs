//! Correlation-based metric

use super::{MetricId, SimilarityMetric};

/// Pearson correlation rescaled to `[0, 1]` as `(r + 1) / 2`.
///
/// Shape-only: ignores any affine difference between the inputs. A flat
/// (zero-variance) input has no defined correlation; two flat inputs score
/// `1.0` when equal, otherwise a flat input scores `0.5`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonMetric;

impl SimilarityMetric for PearsonMetric {
    fn id(&self) -> MetricId {
        MetricId("PEARSON")
    }

    fn score(&self, a: &[f64], b: &[f64]) -> f64 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        match pearson_correlation(a, b) {
            Some(r) => ((r + 1.0) / 2.0).clamp(0.0, 1.0),
            None if a == b => 1.0,
            None => 0.5,
        }
    }
}

/// Pearson correlation coefficient; `None` when either input has zero variance
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
