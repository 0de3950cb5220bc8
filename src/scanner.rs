//! Sliding-window similarity scan.
//!
//! Windows of `L` candles start every `stride` candles from index 0 up to
//! `len - L`. Each window is normalized with the same [`PatternExtractor`]
//! as the query and scored by a [`SimilarityMetric`]. Scanning is pure: the
//! series is only read, and nothing outside the returned candidates changes
//! except the progress counter of an optional [`ScanControl`].
//!
//! Work is split into chunks of window starts. Between chunks the scanner
//! checks for cancellation, so a caller can abandon a long scan (or impose a
//! timeout) without waiting for it to finish.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::metrics::{BuiltinMetric, SimilarityMetric};
use crate::ranker::{self, MatchCandidate, RankedResult};
use crate::series::CandleSeries;
use crate::signature::{PatternExtractor, PatternSignature};
use crate::{MatchError, Result, Stride, TopK};

/// Windows scored per chunk between cancellation checks
pub const CHUNK_WINDOWS: usize = 1024;

// ============================================================
// CANCELLATION / PROGRESS
// ============================================================

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Windows scored so far out of the windows planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanProgress {
    pub scanned: usize,
    pub total: usize,
}

impl ScanProgress {
    /// Completed fraction in `[0, 1]`; an empty scan counts as done
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.scanned as f64 / self.total as f64
        }
    }
}

/// Cancellation and progress handle shared between a scan and its caller
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    token: CancelToken,
    scanned: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancelToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            scanned: self.scanned.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }

    fn begin(&self, total: usize) {
        self.scanned.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self, windows: usize) {
        self.scanned.fetch_add(windows, Ordering::Relaxed);
    }
}

/// Terminal state of a cancellable operation. Cancellation is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> ScanOutcome<T> {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            ScanOutcome::Completed(value) => Some(value),
            ScanOutcome::Cancelled => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ScanOutcome<U> {
        match self {
            ScanOutcome::Completed(value) => ScanOutcome::Completed(f(value)),
            ScanOutcome::Cancelled => ScanOutcome::Cancelled,
        }
    }
}

// ============================================================
// OVERLAP POLICY
// ============================================================

/// What to do with candidates whose windows overlap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// One candidate per window start
    #[default]
    Allow,
    /// Keep only local maxima: a candidate is dropped when its window
    /// overlaps a better-ranked candidate that was kept
    Suppress,
}

impl OverlapPolicy {
    pub fn from_suppression(enable: bool) -> Self {
        if enable {
            OverlapPolicy::Suppress
        } else {
            OverlapPolicy::Allow
        }
    }
}

/// Greedy 1-D non-max suppression. Output is in rank order.
pub fn suppress_overlaps<'a>(
    mut candidates: Vec<MatchCandidate<'a>>,
    series_len: usize,
) -> Vec<MatchCandidate<'a>> {
    candidates.sort_unstable_by(ranker::compare);

    // all windows share one length, so any overlap covers an endpoint
    let mut taken = vec![false; series_len];
    let mut kept = Vec::new();
    for c in candidates {
        let blocked = taken.get(c.start_index).copied().unwrap_or(false)
            || taken.get(c.end_index).copied().unwrap_or(false);
        if blocked {
            continue;
        }
        let end = (c.end_index + 1).min(series_len);
        if let Some(cells) = taken.get_mut(c.start_index..end) {
            cells.fill(true);
        }
        kept.push(c);
    }
    kept
}

// ============================================================
// SCANNER
// ============================================================

/// Slides a window across a series and scores each one against a query
#[derive(Debug, Clone)]
pub struct SimilarityScanner<M: SimilarityMetric = BuiltinMetric> {
    extractor: PatternExtractor,
    metric: M,
    stride: Stride,
    overlap: OverlapPolicy,
}

impl<M: SimilarityMetric> SimilarityScanner<M> {
    pub fn new(extractor: PatternExtractor, metric: M, stride: Stride, overlap: OverlapPolicy) -> Self {
        Self {
            extractor,
            metric,
            stride,
            overlap,
        }
    }

    #[inline]
    pub fn extractor(&self) -> &PatternExtractor {
        &self.extractor
    }

    #[inline]
    pub fn metric(&self) -> &M {
        &self.metric
    }

    #[inline]
    pub fn stride(&self) -> Stride {
        self.stride
    }

    #[inline]
    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap
    }

    /// Number of windows a scan of `series_len` candles visits
    pub fn window_count(&self, series_len: usize) -> usize {
        let window = self.extractor.layout().window_length.get();
        if series_len < window {
            0
        } else {
            (series_len - window) / self.stride.get() + 1
        }
    }

    // ===========================================
    // Sequential
    // ===========================================

    /// Score every window of `series` against `query`.
    ///
    /// With [`OverlapPolicy::Allow`] the candidates come back in window order,
    /// with [`OverlapPolicy::Suppress`] in rank order.
    pub fn scan<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
    ) -> Result<Vec<MatchCandidate<'a>>> {
        let total = self.prepare(series, query)?;
        let candidates = self.score_windows(series, query, 0..total);
        debug!(candidates = candidates.len(), "scan finished");
        Ok(self.apply_overlap_policy(candidates, series.len()))
    }

    /// Chunked sequential scan that stops early once `control` is cancelled.
    pub fn scan_with<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
        control: &ScanControl,
    ) -> Result<ScanOutcome<Vec<MatchCandidate<'a>>>> {
        let total = self.prepare(series, query)?;
        control.begin(total);

        let mut candidates = Vec::with_capacity(total);
        for chunk in chunk_ranges(total) {
            if control.is_cancelled() {
                info!(scanned = control.progress().scanned, total, "scan cancelled");
                return Ok(ScanOutcome::Cancelled);
            }
            let windows = chunk.len();
            candidates.extend(self.score_windows(series, query, chunk));
            control.advance(windows);
        }

        Ok(ScanOutcome::Completed(
            self.apply_overlap_policy(candidates, series.len()),
        ))
    }

    // ===========================================
    // Parallel
    // ===========================================

    /// Parallel version of [`scan`](Self::scan); chunks run on the rayon pool.
    pub fn scan_parallel<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
    ) -> Result<Vec<MatchCandidate<'a>>> {
        let total = self.prepare(series, query)?;
        let candidates = self
            .score_chunks_parallel(series, query, total, None, |c| c)
            .unwrap_or_default()
            .concat();
        Ok(self.apply_overlap_policy(candidates, series.len()))
    }

    /// Parallel, cancellable scan.
    pub fn scan_parallel_with<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
        control: &ScanControl,
    ) -> Result<ScanOutcome<Vec<MatchCandidate<'a>>>> {
        let total = self.prepare(series, query)?;
        control.begin(total);
        match self.score_chunks_parallel(series, query, total, Some(control), |c| c) {
            Some(parts) => Ok(ScanOutcome::Completed(
                self.apply_overlap_policy(parts.concat(), series.len()),
            )),
            None => {
                info!(scanned = control.progress().scanned, total, "scan cancelled");
                Ok(ScanOutcome::Cancelled)
            }
        }
    }

    /// Parallel scan straight to a ranked top-K.
    ///
    /// Without overlap suppression each chunk keeps only its own top-K before
    /// the merge. With suppression every candidate is needed first, since a
    /// window may only be discarded next to a better neighbour.
    /// Returns an empty result if `control` gets cancelled; callers that need
    /// to tell the two apart check the control afterwards.
    pub fn scan_top_k<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
        top_k: TopK,
        control: Option<&ScanControl>,
    ) -> Result<RankedResult<'a>> {
        let total = self.prepare(series, query)?;
        if let Some(control) = control {
            control.begin(total);
        }
        let k = top_k.get();

        let parts = match self.overlap {
            OverlapPolicy::Allow => {
                self.score_chunks_parallel(series, query, total, control, |mut part| {
                    ranker::retain_top_k(&mut part, k);
                    part
                })
            }
            OverlapPolicy::Suppress => self
                .score_chunks_parallel(series, query, total, control, |c| c)
                .map(|parts| vec![suppress_overlaps(parts.concat(), series.len())]),
        };

        match parts {
            Some(parts) => ranker::merge_top_k(parts, k),
            None => {
                info!(total, "scan cancelled");
                Ok(RankedResult::default())
            }
        }
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    /// Validate inputs and return the number of windows to score
    fn prepare(&self, series: &CandleSeries, query: &PatternSignature) -> Result<usize> {
        self.extractor.check_compatible(query)?;
        let need = self.extractor.layout().window_length.get();
        if series.len() < need {
            return Err(MatchError::InsufficientData {
                need,
                got: series.len(),
            });
        }

        let total = self.window_count(series.len());
        debug!(
            windows = total,
            window_length = need,
            stride = self.stride.get(),
            metric = self.metric.id().as_str(),
            "scanning series"
        );
        Ok(total)
    }

    /// Score the windows with ordinals in `ordinals` (window `i` starts at `i * stride`)
    fn score_windows<'a>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
        ordinals: Range<usize>,
    ) -> Vec<MatchCandidate<'a>> {
        let window = self.extractor.layout().window_length.get();
        let stride = self.stride.get();
        let candles = series.candles();

        let mut buf = Vec::with_capacity(self.extractor.layout().len());
        let mut out = Vec::with_capacity(ordinals.len());
        for i in ordinals {
            let start = i * stride;
            let Some(preview) = candles.get(start..start + window) else {
                break;
            };
            self.extractor.normalize_into(preview, &mut buf);
            out.push(MatchCandidate {
                start_index: start,
                end_index: start + window - 1,
                timestamp: preview[0].time,
                score: self.metric.score(&buf, query.values()),
                preview,
            });
        }
        out
    }

    /// Score all chunks on the rayon pool, post-processing each with `finish`.
    /// `None` means the scan was cancelled.
    fn score_chunks_parallel<'a, F>(
        &self,
        series: &'a CandleSeries,
        query: &PatternSignature,
        total: usize,
        control: Option<&ScanControl>,
        finish: F,
    ) -> Option<Vec<Vec<MatchCandidate<'a>>>>
    where
        F: Fn(Vec<MatchCandidate<'a>>) -> Vec<MatchCandidate<'a>> + Sync,
    {
        let cancelled = || control.is_some_and(ScanControl::is_cancelled);

        let parts: Option<Vec<_>> = chunk_ranges(total)
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|chunk| {
                if cancelled() {
                    return None;
                }
                let windows = chunk.len();
                let part = finish(self.score_windows(series, query, chunk));
                if let Some(control) = control {
                    control.advance(windows);
                }
                Some(part)
            })
            .collect();

        if cancelled() {
            return None;
        }
        debug!(chunks = parts.as_ref().map_or(0, Vec::len), "parallel scan finished");
        parts
    }

    fn apply_overlap_policy<'a>(
        &self,
        candidates: Vec<MatchCandidate<'a>>,
        series_len: usize,
    ) -> Vec<MatchCandidate<'a>> {
        match self.overlap {
            OverlapPolicy::Allow => candidates,
            OverlapPolicy::Suppress => suppress_overlaps(candidates, series_len),
        }
    }
}

/// Split `0..total` window ordinals into chunks of [`CHUNK_WINDOWS`]
fn chunk_ranges(total: usize) -> impl Iterator<Item = Range<usize>> {
    (0..total)
        .step_by(CHUNK_WINDOWS)
        .map(move |start| start..(start + CHUNK_WINDOWS).min(total))
}

// ============================================================
// TESTS
// ============================================================
