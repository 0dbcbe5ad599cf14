//! Engine configuration and tunable parameter metadata
//!
//! [`ChanConfig`] is the single configuration struct for [`crate::ChanEngine`].
//! The numeric tunables are also described through [`ParamMeta`], which enables:
//! - Grid search over analysis settings
//! - Building a config from a flat `HashMap<&str, f64>`
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use chanlun::params::ChanConfig;
//!
//! for param in ChanConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut params = HashMap::new();
//! params.insert("min_stroke_span", 4.0);
//! let config = ChanConfig::with_params(&params).unwrap();
//! assert_eq!(config.min_stroke_span, 4);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ChanError, Result};

pub use crate::structures::SegmentStrategy;

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Non-negative integer (bar counts, spans)
  Count,
  /// Boolean encoded as 0.0 / 1.0
  Flag,
}

/// Metadata for a single tunable parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "min_stroke_span")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
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

  /// Generate all values for grid search
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

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(ChanError::OutOfRange { field: self.name, value, min, max });
    }
    if value.fract() != 0.0 {
      return Err(ChanError::InvalidConfig(format!("{} must be a whole number", self.name)));
    }
    Ok(())
  }
}

// ============================================================
// CONFIG
// ============================================================

const PARAMS: &[ParamMeta] = &[
  ParamMeta::count(
    "min_stroke_span",
    0.0,
    (0.0, 20.0, 1.0),
    "Minimum merged bars between the two fractals of a stroke",
  ),
  ParamMeta::flag("merge_centrals", true, "Coalesce overlapping centrals"),
  ParamMeta::flag(
    "full_coverage_segments",
    false,
    "Fall back to direction runs when no canonical segment forms",
  ),
];

/// Analysis settings. Every field has a default, so partial documents
/// deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChanConfig {
  /// Reject non-finite prices, `high < low` and duplicate timestamps
  pub validate_data: bool,
  /// Inputs shorter than this fail with `InsufficientData`. 0 disables the check.
  pub min_bars: usize,
  /// Minimum merged-bar distance between a stroke's fractals. 0 disables the check.
  pub min_stroke_span: usize,
  pub segment_strategy: SegmentStrategy,
  pub merge_centrals: bool,
  /// Run the invariant checkers on every result
  pub check_invariants: bool,
}

impl Default for ChanConfig {
  fn default() -> Self {
    Self {
      validate_data: true,
      min_bars: 0,
      min_stroke_span: 0,
      segment_strategy: SegmentStrategy::BreakDetection,
      merge_centrals: true,
      check_invariants: true,
    }
  }
}

impl ChanConfig {
  /// Metadata for all grid-searchable parameters
  pub fn param_meta() -> &'static [ParamMeta] {
    PARAMS
  }

  /// Build a config from a parameter map. Missing parameters use their
  /// defaults; unknown keys are rejected.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    if let Some(key) = params.keys().find(|k| !PARAMS.iter().any(|m| m.name == **k)) {
      return Err(ChanError::InvalidConfig(format!("unknown parameter: {key}")));
    }

    let full_coverage = get_flag(params, "full_coverage_segments", false)?;
    let config = Self {
      min_stroke_span: get_count(params, "min_stroke_span", 0)?,
      merge_centrals: get_flag(params, "merge_centrals", true)?,
      segment_strategy: if full_coverage {
        SegmentStrategy::FullCoverage
      } else {
        SegmentStrategy::BreakDetection
      },
      ..Self::default()
    };
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    let span = PARAMS.iter().find(|m| m.name == "min_stroke_span");
    if let Some(meta) = span {
      meta.validate(self.min_stroke_span as f64)?;
    }
    if self.min_bars > 0 && self.min_bars < 3 {
      return Err(ChanError::InvalidConfig(format!(
        "min_bars must be 0 or at least 3, got {}",
        self.min_bars
      )));
    }
    Ok(())
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

fn lookup(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  match PARAMS.iter().find(|m| m.name == key) {
    Some(meta) => meta.validate(value).map(|_| value),
    None => Ok(value),
  }
}

/// Helper to get a count from params with default fallback
pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<usize> {
  lookup(params, key, default as f64).map(|v| v as usize)
}

/// Helper to get a flag from params with default fallback
pub fn get_flag(params: &HashMap<&str, f64>, key: &str, default: bool) -> Result<bool> {
  let value = lookup(params, key, if default { 1.0 } else { 0.0 })?;
  if value != 0.0 && value != 1.0 {
    return Err(ChanError::InvalidConfig(format!("{key} must be 0 or 1, got {value}")));
  }
  Ok(value == 1.0)
}

// ============================================================
// TESTS
// ============================================================
