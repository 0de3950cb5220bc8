//! Analysis session: the loaded series plus at most one background scan.
//!
//! The series is replaced, never mutated, on every upload. Each analysis
//! request runs on the rayon pool and is reported through a [`ScanHandle`].
//! Submitting a new request, or loading a new series, cancels the request
//! in flight; a superseded handle always resolves to
//! [`ScanOutcome::Cancelled`], even if its worker had already finished.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::{BuiltinMetric, SimilarityMetric};
use crate::ranker::MatchResult;
use crate::scanner::{ScanControl, ScanOutcome, ScanProgress};
use crate::series::{CandleSeries, SeriesInfo};
use crate::signature::QuerySource;
use crate::{MatchEngine, MatchError, Result};

type WorkerResult = Result<ScanOutcome<AnalysisReport>>;

/// Finished analysis, owned so it can outlive the series it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub matches: Vec<MatchResult>,
    pub processing_time: Duration,
    pub windows_scanned: usize,
}

// ============================================================
// SCAN HANDLE
// ============================================================

/// Caller's side of one background analysis
#[derive(Debug)]
pub struct ScanHandle {
    control: ScanControl,
    rx: Receiver<WorkerResult>,
}

impl ScanHandle {
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    pub fn progress(&self) -> ScanProgress {
        self.control.progress()
    }

    /// Block until the analysis finishes. Returns at once when cancelled.
    pub fn wait(self) -> WorkerResult {
        if self.is_cancelled() {
            return Ok(ScanOutcome::Cancelled);
        }
        let result = self.rx.recv().map_err(|_| MatchError::WorkerDisconnected)?;
        self.settle(result)
    }

    /// Non-blocking check; `None` while the analysis is still running.
    pub fn try_wait(&self) -> Option<WorkerResult> {
        if self.is_cancelled() {
            return Some(Ok(ScanOutcome::Cancelled));
        }
        match self.rx.try_recv() {
            Ok(result) => Some(self.settle(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MatchError::WorkerDisconnected)),
        }
    }

    /// Results of a cancelled handle are discarded, errors included
    fn settle(&self, result: WorkerResult) -> WorkerResult {
        if self.is_cancelled() {
            return Ok(ScanOutcome::Cancelled);
        }
        result
    }
}

// ============================================================
// SESSION
// ============================================================

/// Owns the current series and the single active analysis
pub struct AnalysisSession<M: SimilarityMetric + 'static = BuiltinMetric> {
    engine: Arc<MatchEngine<M>>,
    series: Option<Arc<CandleSeries>>,
    info: SeriesInfo,
    active: Option<ScanControl>,
}

impl<M: SimilarityMetric + 'static> AnalysisSession<M> {
    pub fn new(engine: MatchEngine<M>) -> Self {
        Self {
            engine: Arc::new(engine),
            series: None,
            info: SeriesInfo::default(),
            active: None,
        }
    }

    pub fn engine(&self) -> &MatchEngine<M> {
        &self.engine
    }

    pub fn series(&self) -> Option<&CandleSeries> {
        self.series.as_deref()
    }

    pub fn info(&self) -> &SeriesInfo {
        &self.info
    }

    /// Replace the series (and its metadata), cancelling any scan of the old one
    pub fn load_series(&mut self, series: CandleSeries, info: SeriesInfo) {
        self.cancel_active();
        info!(
            symbol = %info.symbol,
            timeframe = %info.timeframe,
            candles = series.len(),
            "series loaded"
        );
        self.series = Some(Arc::new(series));
        self.info = info;
    }

    /// Swap in a new engine configuration; the running scan is cancelled
    pub fn set_engine(&mut self, engine: MatchEngine<M>) {
        self.cancel_active();
        self.engine = Arc::new(engine);
    }

    pub fn cancel_active(&mut self) {
        if let Some(control) = self.active.take() {
            if !control.is_cancelled() {
                info!(progress = ?control.progress(), "cancelling in-flight scan");
            }
            control.cancel();
        }
    }

    /// Start analysing `query` against the loaded series in the background.
    ///
    /// Validation errors (no series, bad query) are returned immediately.
    pub fn submit(&mut self, query: &QuerySource) -> Result<ScanHandle> {
        let need = self.engine.window_length().get();
        let series = self
            .series
            .clone()
            .ok_or(MatchError::InsufficientData { need, got: 0 })?;
        self.engine.check_series(&series)?;
        let signature = self.engine.resolve_query(query)?;

        self.cancel_active();
        let control = ScanControl::new();
        self.active = Some(control.clone());

        let (tx, rx) = mpsc::channel();
        let engine = Arc::clone(&self.engine);
        let worker_control = control.clone();
        rayon::spawn(move || {
            let started = Instant::now();
            let result = engine
                .analyze_with(&series, &signature, &worker_control)
                .map(|outcome| {
                    outcome.map(|ranked| AnalysisReport {
                        matches: ranked.to_owned_matches(),
                        processing_time: started.elapsed(),
                        windows_scanned: worker_control.progress().scanned,
                    })
                });
            debug!(elapsed = ?started.elapsed(), "analysis worker done");
            // the handle may already be gone
            let _ = tx.send(result);
        });

        Ok(ScanHandle { control, rx })
    }
}

// ============================================================
// TESTS
// ============================================================
