//! Ordering and truncation of scan candidates.
//!
//! Rank order: score descending, then earliest timestamp, then lowest start
//! index. The last key only separates candidates with equal timestamps, which
//! a valid series cannot produce, so the order is total and deterministic.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::series::Candle;
use crate::{MatchError, Result};

// ============================================================
// CANDIDATES
// ============================================================

/// One scored window, borrowing its candles from the scanned series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate<'a> {
    pub start_index: usize,
    /// Inclusive
    pub end_index: usize,
    /// Time of the first candle in the window
    pub timestamp: NaiveDateTime,
    /// Similarity to the query, higher is better
    pub score: f64,
    pub preview: &'a [Candle],
}

impl MatchCandidate<'_> {
    #[inline]
    pub fn overlaps(&self, other: &MatchCandidate<'_>) -> bool {
        self.start_index <= other.end_index && other.start_index <= self.end_index
    }

    pub fn to_owned_match(&self) -> MatchResult {
        MatchResult {
            timestamp: self.timestamp,
            similarity: self.score,
            start_index: self.start_index,
            end_index: self.end_index,
            preview: self.preview.to_vec(),
        }
    }
}

/// Owned match handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub timestamp: NaiveDateTime,
    pub similarity: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub preview: Vec<Candle>,
}

/// Rank order of two candidates
#[inline]
pub fn compare(a: &MatchCandidate<'_>, b: &MatchCandidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| a.start_index.cmp(&b.start_index))
}

// ============================================================
// RANKED RESULT
// ============================================================

/// At most K candidates in rank order. Empty means "no matches".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedResult<'a> {
    matches: Vec<MatchCandidate<'a>>,
}

impl<'a> RankedResult<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    #[inline]
    pub fn matches(&self) -> &[MatchCandidate<'a>] {
        &self.matches
    }

    #[inline]
    pub fn best(&self) -> Option<&MatchCandidate<'a>> {
        self.matches.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchCandidate<'a>> {
        self.matches.iter()
    }

    pub fn into_vec(self) -> Vec<MatchCandidate<'a>> {
        self.matches
    }

    /// Copy every match out of the borrowed series
    pub fn to_owned_matches(&self) -> Vec<MatchResult> {
        self.matches.iter().map(MatchCandidate::to_owned_match).collect()
    }
}

impl<'a> IntoIterator for RankedResult<'a> {
    type Item = MatchCandidate<'a>;
    type IntoIter = std::vec::IntoIter<MatchCandidate<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

// ============================================================
// RANKING
// ============================================================

/// Sort `candidates` into rank order and keep the first `top_k`.
pub fn rank<'a>(candidates: Vec<MatchCandidate<'a>>, top_k: usize) -> Result<RankedResult<'a>> {
    check_top_k(top_k)?;
    let mut matches = candidates;
    retain_top_k(&mut matches, top_k);
    Ok(RankedResult { matches })
}

/// Merge independently scored parts (e.g. parallel chunks) into one top-K.
pub fn merge_top_k<'a, I>(parts: I, top_k: usize) -> Result<RankedResult<'a>>
where
    I: IntoIterator<Item = Vec<MatchCandidate<'a>>>,
{
    check_top_k(top_k)?;
    let mut merged = Vec::new();
    for mut part in parts {
        retain_top_k(&mut part, top_k);
        merged.append(&mut part);
    }
    retain_top_k(&mut merged, top_k);
    Ok(RankedResult { matches: merged })
}

/// Sort into rank order, keeping only the best `top_k`.
pub(crate) fn retain_top_k(candidates: &mut Vec<MatchCandidate<'_>>, top_k: usize) {
    if candidates.len() > top_k && top_k > 0 {
        candidates.select_nth_unstable_by(top_k - 1, compare);
    }
    candidates.truncate(top_k);
    candidates.sort_unstable_by(compare);
}

fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(MatchError::InvalidArgument {
            field: "top_k",
            value: top_k,
            reason: "top_k must be >= 1",
        });
    }
    Ok(())
}

// ============================================================
// TESTS
// ============================================================
