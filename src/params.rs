//! Parameter metadata for the match configuration
//!
//! This module describes every numeric knob of [`MatchConfig`], enabling:
//! - Parameter sweeps over window length and result count
//! - Parameter documentation
//! - Automatic configuration UI generation (sliders, toggles)
//!
//! # Example
//!
//! ```rust
//! use candlematch::params::Parameterized;
//! use candlematch::MatchConfig;
//!
//! for param in MatchConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::metrics::MetricKind;
use crate::{MatchConfig, MatchError, Result, Stride, TopK, WindowLength};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Non-negative integer (window length, result count, stride)
  Count,
  /// Boolean toggle encoded as 0.0 / 1.0
  Flag,
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name, matching the [`MatchConfig`] field
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// UI range: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn count(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Count, default, range, description }
  }

  pub const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
    Self {
      name,
      param_type: ParamType::Flag,
      default: if default { 1.0 } else { 0.0 },
      range: (0.0, 1.0, 1.0),
      description,
    }
  }

  /// Generate all values for a parameter sweep
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value against the UI range and the parameter type
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if !(min..=max).contains(&value) {
      return Err(MatchError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Count if value.fract() != 0.0 => {
        Err(MatchError::InvalidValue("count must be a whole number"))
      },
      ParamType::Flag if value != 0.0 && value != 1.0 => {
        Err(MatchError::InvalidValue("flag must be 0 or 1"))
      },
      _ => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Types configurable from a flat name/value map
pub trait Parameterized: Sized {
  /// Metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Build from a map of parameter values.
  ///
  /// Missing parameters use their default values. UI ranges are advisory;
  /// only the type's own invariants are enforced.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

const MATCH_CONFIG_PARAMS: &[ParamMeta] = &[
  ParamMeta::count(
    "window_length",
    20.0,
    (5.0, 50.0, 1.0),
    "Candles per pattern window",
  ),
  ParamMeta::count("top_k", 5.0, (1.0, 10.0, 1.0), "Number of matches to return"),
  ParamMeta::count("stride", 1.0, (1.0, 10.0, 1.0), "Step between scanned window starts"),
  ParamMeta::flag(
    "overlap_suppression",
    false,
    "Drop matches overlapping a better one",
  ),
  ParamMeta::flag("volume_channel", false, "Include normalized volume in signatures"),
];

impl Parameterized for MatchConfig {
  fn param_meta() -> &'static [ParamMeta] {
    MATCH_CONFIG_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    Ok(Self {
      window_length: WindowLength::new(get_count(params, "window_length", 20)?)?,
      top_k: TopK::new(get_count(params, "top_k", 5)?)?,
      stride: Stride::new(get_count(params, "stride", 1)?)?,
      overlap_suppression: get_flag(params, "overlap_suppression", false)?,
      metric: MetricKind::default(),
      volume_channel: get_flag(params, "volume_channel", false)?,
    })
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Read a whole, non-negative count with default fallback
pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<usize> {
  match params.get(key).copied() {
    None => Ok(default),
    Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
    Some(_) => Err(MatchError::InvalidValue("count must be a non-negative whole number")),
  }
}

/// Read a 0/1 flag with default fallback
pub fn get_flag(params: &HashMap<&str, f64>, key: &str, default: bool) -> Result<bool> {
  match params.get(key).copied() {
    None => Ok(default),
    Some(v) if v == 0.0 => Ok(false),
    Some(v) if v == 1.0 => Ok(true),
    Some(_) => Err(MatchError::InvalidValue("flag must be 0 or 1")),
  }
}

// ============================================================
// TESTS
// ============================================================
