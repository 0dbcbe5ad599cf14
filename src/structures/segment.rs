//! Segment construction - higher-order runs of at least three strokes
//!
//! A segment starts where three consecutive strokes alternate direction and
//! share a common price band. It runs to the end of its initial same-direction
//! stroke run (at least three strokes), and is cut short when an opposite
//! stroke ends beyond that run's extremum.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
  helpers::{band_is_valid, common_band},
  stroke::Stroke,
};
use crate::Direction;

// ============================================================
// SEGMENT
// ============================================================

/// A directional run spanning `stroke_start..=stroke_end` of the stroke list.
/// Shape mirrors [`Stroke`]; the direction is that of the first stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
  pub start_index:  usize,
  pub end_index:    usize,
  pub start_price:  f64,
  pub end_price:    f64,
  pub direction:    Direction,
  pub start_ts:     i64,
  pub end_ts:       i64,
  pub seq:          usize,
  pub stroke_start: usize,
  pub stroke_end:   usize,
}

impl Segment {
  fn from_strokes(strokes: &[Stroke], stroke_start: usize, stroke_end: usize, seq: usize) -> Self {
    let first = &strokes[stroke_start];
    let last = &strokes[stroke_end];
    Self {
      start_index: first.start_index,
      end_index: last.end_index,
      start_price: first.start_price,
      end_price: last.end_price,
      direction: first.direction,
      start_ts: first.start_ts,
      end_ts: last.end_ts,
      seq,
      stroke_start,
      stroke_end,
    }
  }

  #[inline]
  pub fn stroke_count(&self) -> usize {
    self.stroke_end - self.stroke_start + 1
  }

  #[inline]
  pub fn high(&self) -> f64 {
    self.start_price.max(self.end_price)
  }

  #[inline]
  pub fn low(&self) -> f64 {
    self.start_price.min(self.end_price)
  }
}

/// How strokes are grouped into segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentStrategy {
  /// Start detection plus break detection. Every segment spans at least three strokes.
  #[default]
  BreakDetection,
  /// `BreakDetection`, falling back to maximal same-direction runs when it
  /// finds nothing over three or more strokes. Covers every stroke, but the
  /// fallback segments may be shorter than three strokes.
  FullCoverage,
}

// ============================================================
// STATE MACHINE
// ============================================================

/// Strokes `i`, `i+1`, `i+2` alternate direction and share a price band.
pub fn can_form_start(strokes: &[Stroke], i: usize) -> bool {
  let Some(window) = strokes.get(i..i + 3) else {
    return false;
  };
  let (a, b, c) = (&window[0], &window[1], &window[2]);
  if a.direction != c.direction || b.direction == a.direction {
    return false;
  }
  common_band(&[a.range(), b.range(), c.range()]).is_some_and(band_is_valid)
}

#[inline]
fn beyond(direction: Direction, price: f64, reference: f64) -> bool {
  match direction {
    Direction::Up => price > reference,
    Direction::Down => price < reference,
  }
}

/// Last stroke of the run of consecutive strokes sharing `strokes[start]`'s
/// direction, plus the run's extremum (highest high going up, lowest low
/// going down).
pub fn direction_run(strokes: &[Stroke], start: usize) -> (usize, f64) {
  let direction = strokes[start].direction;
  let mut last = start;
  let mut extremum = match direction {
    Direction::Up => strokes[start].high(),
    Direction::Down => strokes[start].low(),
  };

  for (k, stroke) in strokes.iter().enumerate().skip(start + 1) {
    if stroke.direction != direction {
      break;
    }
    extremum = match direction {
      Direction::Up => extremum.max(stroke.high()),
      Direction::Down => extremum.min(stroke.low()),
    };
    last = k;
  }

  (last, extremum)
}

/// End of the initial direction run, clamped to at least `start + 2`.
///
/// Requires `start + 2 < strokes.len()`.
pub fn natural_end(strokes: &[Stroke], start: usize) -> usize {
  direction_run(strokes, start).0.max(start + 2)
}

/// First opposite-direction stroke in `start..=until` whose end breaches the
/// initial run's extremum: above it for an up segment, below it going down.
pub fn find_break_point(strokes: &[Stroke], start: usize, until: usize) -> Option<usize> {
  let direction = strokes[start].direction;
  let (_, extremum) = direction_run(strokes, start);
  let last = until.min(strokes.len().saturating_sub(1));

  (start..=last).find(|&j| {
    strokes[j].direction != direction && beyond(direction, strokes[j].end_price, extremum)
  })
}

/// Final stroke of the segment starting at `start`: one before the break
/// point when there is one, never fewer than three strokes.
pub fn resolve_end(strokes: &[Stroke], start: usize) -> usize {
  let natural = natural_end(strokes, start);
  match find_break_point(strokes, start, natural) {
    Some(point) => point.saturating_sub(1).max(start + 2),
    None => natural,
  }
}

/// Group strokes into segments.
pub fn build_segments(strokes: &[Stroke], strategy: SegmentStrategy) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut start = 0;

  while start + 2 < strokes.len() {
    if can_form_start(strokes, start) {
      let end = resolve_end(strokes, start);
      segments.push(Segment::from_strokes(strokes, start, end, segments.len()));
      start = end + 1;
    } else {
      start += 1;
    }
  }

  if segments.is_empty() && strokes.len() >= 3 && strategy == SegmentStrategy::FullCoverage {
    warn!(strokes = strokes.len(), "no segment start found, grouping by direction runs");
    return group_by_direction_runs(strokes);
  }

  segments
}

/// One segment per maximal run of same-direction strokes.
fn group_by_direction_runs(strokes: &[Stroke]) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut run_start = 0;

  for i in 1..=strokes.len() {
    if i == strokes.len() || strokes[i].direction != strokes[run_start].direction {
      segments.push(Segment::from_strokes(strokes, run_start, i - 1, segments.len()));
      run_start = i;
    }
  }

  segments
}

// ============================================================
// TESTS
// ============================================================
