//! Similarity metrics between two signatures
//!
//! Every builtin metric maps equal-length signature vectors to `[0.0, 1.0]`,
//! returns `1.0` for identical inputs and is deterministic.
//!
//! # Builtin metrics
//!
//! - **Euclidean** (default): `1 - ||a - b|| / sqrt(n)`
//! - **MeanAbsolute**: `1 - mean(|a - b|)`
//! - **Pearson**: linear correlation rescaled to `(r + 1) / 2`

use serde::{Deserialize, Serialize};

pub mod correlation;
pub mod distance;

pub use correlation::*;
pub use distance::*;

/// Unique identifier for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(pub &'static str);

impl MetricId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Scores how alike two signature vectors are; higher is more similar.
pub trait SimilarityMetric: Send + Sync {
    fn id(&self) -> MetricId;

    /// Score `a` against `b`. Vectors of different length score `0.0`.
    fn score(&self, a: &[f64], b: &[f64]) -> f64;
}

/// Macro to generate the metric selector and its enum-dispatch implementation
macro_rules! define_builtin_metrics {
    (
        $(
            $variant:ident($metric:ty)
        ),* $(,)?
    ) => {
        /// Selector for a builtin metric (configuration surface)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum MetricKind {
            $($variant),*
        }

        impl MetricKind {
            pub const ALL: &'static [MetricKind] = &[$(MetricKind::$variant),*];
        }

        /// All builtin metrics - fast path via enum dispatch
        #[derive(Debug, Clone, Copy)]
        pub enum BuiltinMetric {
            $($variant($metric)),*
        }

        impl BuiltinMetric {
            #[inline]
            pub fn kind(&self) -> MetricKind {
                match self {
                    $(Self::$variant(_) => MetricKind::$variant),*
                }
            }
        }

        impl From<MetricKind> for BuiltinMetric {
            fn from(kind: MetricKind) -> Self {
                match kind {
                    $(MetricKind::$variant => Self::$variant(<$metric>::default())),*
                }
            }
        }

        impl SimilarityMetric for BuiltinMetric {
            #[inline]
            fn id(&self) -> MetricId {
                match self {
                    $(Self::$variant(m) => SimilarityMetric::id(m)),*
                }
            }

            #[inline]
            fn score(&self, a: &[f64], b: &[f64]) -> f64 {
                match self {
                    $(Self::$variant(m) => SimilarityMetric::score(m, a, b)),*
                }
            }
        }
    };
}

define_builtin_metrics! {
    Euclidean(EuclideanMetric),
    MeanAbsolute(MeanAbsoluteMetric),
    Pearson(PearsonMetric),
}

impl Default for MetricKind {
    fn default() -> Self {
        MetricKind::Euclidean
    }
}

impl Default for BuiltinMetric {
    fn default() -> Self {
        BuiltinMetric::from(MetricKind::default())
    }
}
