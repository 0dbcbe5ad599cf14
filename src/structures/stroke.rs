//! Stroke construction - directional moves between opposite fractals
//!
//! Strokes are built from an alternating fractal list. Endpoint prices come
//! from the merged bars (the low under a bottom, the high under a top), not
//! from the fractal itself. Each accepted stroke starts where the previous one
//! ended, so the output is contiguous and alternates direction.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::{
  fractal::{Fractal, FractalKind},
  merge::MergedBar,
};
use crate::Direction;

// ============================================================
// STROKE
// ============================================================

/// Directional price move between two fractals of opposite kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
  /// Merged-bar position of the start fractal
  pub start_index: usize,
  /// Merged-bar position of the end fractal
  pub end_index:   usize,
  pub start_price: f64,
  pub end_price:   f64,
  pub direction:   Direction,
  pub start_ts:    i64,
  pub end_ts:      i64,
  pub seq:         usize,
  /// `seq` of the start fractal
  pub fractal_start: usize,
  /// `seq` of the end fractal
  pub fractal_end:   usize,
}

impl Stroke {
  #[inline]
  pub fn high(&self) -> f64 {
    self.start_price.max(self.end_price)
  }

  #[inline]
  pub fn low(&self) -> f64 {
    self.start_price.min(self.end_price)
  }

  /// Direction-normalized `(low, high)`
  #[inline]
  pub fn range(&self) -> (f64, f64) {
    (self.low(), self.high())
  }

  #[inline]
  pub fn amplitude(&self) -> f64 {
    (self.end_price - self.start_price).abs()
  }

  /// Number of merged bars between the two fractal centres
  #[inline]
  pub fn span(&self) -> usize {
    self.end_index - self.start_index
  }
}

/// Strokes plus the counts of what was refused along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeOutput {
  pub strokes:  Vec<Stroke>,
  /// Opposite-kind candidates refused by the span or direction rule
  pub rejected: usize,
  /// Fractals pointing outside the merged-bar sequence
  pub stale:    usize,
}

// ============================================================
// BUILDER
// ============================================================

/// Candidate stroke from `start` to `end`, or `None` if either index is out of
/// bounds, the kinds match, or price does not move in the stroke's direction.
pub fn stroke_between(
  start: &Fractal,
  end: &Fractal,
  merged: &[MergedBar],
  seq: usize,
) -> Option<Stroke> {
  if start.kind == end.kind || end.index <= start.index {
    return None;
  }
  let from = merged.get(start.index)?;
  let to = merged.get(end.index)?;

  let (direction, start_price, end_price) = match end.kind {
    FractalKind::Top => (Direction::Up, from.low, to.high),
    FractalKind::Bottom => (Direction::Down, from.high, to.low),
  };
  let moves = match direction {
    Direction::Up => end_price > start_price,
    Direction::Down => end_price < start_price,
  };
  if !moves {
    return None;
  }

  Some(Stroke {
    start_index: start.index,
    end_index: end.index,
    start_price,
    end_price,
    direction,
    start_ts: from.timestamp,
    end_ts: to.timestamp,
    seq,
    fractal_start: start.seq,
    fractal_end: end.seq,
  })
}

/// Connect fractals into strokes.
///
/// The last accepted endpoint acts as an anchor. An opposite-kind fractal
/// proposes a stroke from the anchor, accepted when price moves in its
/// direction and it spans at least `min_span` merged bars. A same-kind
/// fractal beyond the anchor conflicts with the last stroke; the longer
/// stroke ending at the new fractal replaces it.
pub fn build_strokes(fractals: &[Fractal], merged: &[MergedBar], min_span: usize) -> StrokeOutput {
  let mut out = StrokeOutput::default();
  let mut anchor: Option<Fractal> = None;
  let mut last_start: Option<Fractal> = None;

  for fractal in fractals {
    if fractal.index >= merged.len() {
      warn!(
        fractal = fractal.seq,
        index = fractal.index,
        len = merged.len(),
        "fractal outside merged bars, skipped"
      );
      out.stale += 1;
      continue;
    }

    let Some(current) = anchor else {
      anchor = Some(*fractal);
      continue;
    };

    if fractal.kind == current.kind {
      if !fractal.is_more_extreme_than(&current) {
        continue;
      }
      match (out.strokes.last_mut(), last_start) {
        (Some(last), Some(start)) => {
          if let Some(longer) = stroke_between(&start, fractal, merged, last.seq) {
            *last = longer;
            anchor = Some(*fractal);
          }
        }
        _ => anchor = Some(*fractal),
      }
      continue;
    }

    match stroke_between(&current, fractal, merged, out.strokes.len()) {
      Some(stroke) if stroke.span() >= min_span => {
        out.strokes.push(stroke);
        last_start = Some(current);
        anchor = Some(*fractal);
      }
      _ => {
        trace!(from = current.seq, to = fractal.seq, "stroke candidate rejected");
        out.rejected += 1;
      }
    }
  }

  out
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  fn mb(ts: i64, high: f64, low: f64) -> MergedBar {
    MergedBar {
      timestamp: ts,
      open: low,
      high,
      low,
      close: high,
      volume: 0.0,
      sources: vec![ts as usize],
    }
  }

  fn top(index: usize, price: f64, seq: usize) -> Fractal {
    Fractal { index, kind: FractalKind::Top, price, timestamp: index as i64, seq }
  }

  fn bottom(index: usize, price: f64, seq: usize) -> Fractal {
    Fractal { index, kind: FractalKind::Bottom, price, timestamp: index as i64, seq }
  }

  /// Zig-zag merged bars: bottoms at 2 and 8, tops at 5 and 11 (roughly)
  fn zigzag() -> Vec<MergedBar> {
    let highs = [10.0, 9.0, 8.0, 10.0, 12.0, 14.0, 12.0, 10.0, 8.5, 10.0, 12.0, 15.0, 13.0];
    highs.iter().enumerate().map(|(i, &h)| mb(i as i64, h, h - 2.0)).collect()
  }

  #[test]
  fn test_endpoint_prices_come_from_merged_bars() {
    let merged = zigzag();
    let fractals = vec![bottom(2, 6.0, 0), top(5, 14.0, 1), bottom(8, 6.5, 2)];
    let out = build_strokes(&fractals, &merged, 0);
    assert_eq!(out.strokes.len(), 2);

    let up = &out.strokes[0];
    assert_eq!(up.direction, Direction::Up);
    assert_eq!(up.start_price, 6.0);
    assert_eq!(up.end_price, 14.0);
    assert_eq!((up.fractal_start, up.fractal_end), (0, 1));

    let down = &out.strokes[1];
    assert_eq!(down.direction, Direction::Down);
    assert_eq!(down.start_price, 14.0);
    assert_eq!(down.end_price, 6.5);
    assert_eq!(down.start_index, up.end_index);
    assert_eq!(down.seq, 1);
  }

  #[test]
  fn test_single_fractal_gives_no_stroke() {
    let merged = zigzag();
    let out = build_strokes(&[bottom(2, 6.0, 0)], &merged, 0);
    assert!(out.strokes.is_empty());
  }

  #[test]
  fn test_stale_fractal_is_counted_and_skipped() {
    let merged = zigzag();
    let fractals = vec![bottom(2, 6.0, 0), top(40, 99.0, 1), top(5, 14.0, 2)];
    let out = build_strokes(&fractals, &merged, 0);
    assert_eq!(out.stale, 1);
    assert_eq!(out.strokes.len(), 1);
    assert_eq!(out.strokes[0].fractal_end, 2);
  }

  #[test]
  fn test_min_span_rejects_short_candidate() {
    let merged = zigzag();
    let fractals = vec![bottom(2, 6.0, 0), top(5, 14.0, 1), bottom(8, 6.5, 2)];
    let out = build_strokes(&fractals, &merged, 4);
    assert!(out.strokes.is_empty());
    assert_eq!(out.rejected, 1);
  }

  #[test]
  fn test_more_extreme_same_kind_extends_last_stroke() {
    let merged = zigzag();
    // The bottom at 8 is refused (too close), then the higher top at 11
    // replaces the stroke's end.
    let fractals = vec![bottom(2, 6.0, 0), top(5, 14.0, 1), bottom(7, 8.0, 2), top(11, 15.0, 3)];
    let out = build_strokes(&fractals, &merged, 3);
    assert_eq!(out.strokes.len(), 1);
    assert_eq!(out.rejected, 1);
    let stroke = &out.strokes[0];
    assert_eq!(stroke.end_index, 11);
    assert_eq!(stroke.end_price, 15.0);
    assert_eq!(stroke.fractal_end, 3);
  }

  #[test]
  fn test_less_extreme_same_kind_is_ignored() {
    let merged = zigzag();
    let fractals = vec![bottom(2, 6.0, 0), bottom(8, 6.5, 1), top(11, 15.0, 2)];
    let out = build_strokes(&fractals, &merged, 0);
    assert_eq!(out.strokes.len(), 1);
    assert_eq!(out.strokes[0].fractal_start, 0);
  }

  #[test]
  fn test_stroke_between_requires_price_move() {
    let merged = vec![mb(0, 10.0, 9.0), mb(1, 20.0, 19.0), mb(2, 8.0, 7.0)];
    // A "top" sitting below the start bottom's low cannot form an up stroke
    let start = bottom(1, 19.0, 0);
    let end = top(2, 8.0, 1);
    assert!(stroke_between(&start, &end, &merged, 0).is_none());
  }
}
