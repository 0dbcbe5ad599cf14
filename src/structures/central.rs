//! Central (consolidation zone) detection and merging
//!
//! A central is the price band shared by three consecutive alternating strokes.
//! Zones are first detected on non-overlapping stroke triples, then every group
//! of zones connected by overlapping price ranges is coalesced into one.

use serde::{Deserialize, Serialize};

use super::{
  helpers::{common_band, ranges_overlap, DisjointSet},
  stroke::Stroke,
};

// ============================================================
// CENTRAL
// ============================================================

/// Consolidation zone bounded by `[low, high]`, with `high > low`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Central {
  pub start_index: usize,
  pub end_index:   usize,
  pub high:        f64,
  pub low:         f64,
  pub start_ts:    i64,
  pub end_ts:      i64,
  /// 1 for zones built directly from strokes
  pub level:       u32,
  /// Constituent strokes in chronological order
  pub strokes:     Vec<Stroke>,
}

impl Central {
  #[inline]
  pub fn overlaps(&self, other: &Central) -> bool {
    ranges_overlap(self.low, self.high, other.low, other.high)
  }

  #[inline]
  pub fn contains_price(&self, price: f64) -> bool {
    (self.low..=self.high).contains(&price)
  }

  #[inline]
  pub fn width(&self) -> f64 {
    self.high - self.low
  }
}

// ============================================================
// DETECTION
// ============================================================

/// Zone formed by strokes `i`, `i+1`, `i+2`, if any.
///
/// Bounds come from strokes `i` and `i+2`; the middle stroke only has to
/// reach into that band. Zero-width bands are not zones.
pub fn central_at(strokes: &[Stroke], i: usize) -> Option<Central> {
  let window = strokes.get(i..i + 3)?;
  let (a, b, c) = (&window[0], &window[1], &window[2]);
  if a.direction != c.direction || b.direction == a.direction {
    return None;
  }

  let (low, high) = common_band(&[a.range(), c.range()])?;
  let (b_low, b_high) = b.range();
  if low.max(b_low) > high.min(b_high) || high <= low {
    return None;
  }

  Some(Central {
    start_index: a.start_index,
    end_index: c.end_index,
    high,
    low,
    start_ts: a.start_ts,
    end_ts: c.end_ts,
    level: 1,
    strokes: vec![*a, *b, *c],
  })
}

/// Scan stroke triples, jumping past a zone once found.
pub fn build_centrals(strokes: &[Stroke]) -> Vec<Central> {
  let mut centrals = Vec::new();
  let mut i = 0;

  while i + 2 < strokes.len() {
    match central_at(strokes, i) {
      Some(central) => {
        centrals.push(central);
        i += 3;
      }
      None => i += 1,
    }
  }

  centrals
}

// ============================================================
// MERGING
// ============================================================

/// Coalesce every connected group of overlapping zones. After this pass no
/// two returned zones overlap. Output is ordered by `start_index`.
pub fn merge_centrals(centrals: Vec<Central>) -> Vec<Central> {
  if centrals.len() < 2 {
    return centrals;
  }

  let mut sets = DisjointSet::new(centrals.len());
  for i in 0..centrals.len() {
    for j in i + 1..centrals.len() {
      if centrals[i].overlaps(&centrals[j]) {
        sets.union(i, j);
      }
    }
  }

  let mut merged: Vec<Central> = sets
    .groups()
    .into_iter()
    .filter_map(|group| match group.as_slice() {
      [] => None,
      [single] => Some(centrals[*single].clone()),
      [first, rest @ ..] => Some(coalesce(&centrals[*first], rest.iter().map(|&k| &centrals[k]))),
    })
    .collect();

  merged.sort_by_key(|c| (c.start_index, c.end_index));
  merged
}

/// Union of a connected group: widest bounds, widest span, and the true
/// earliest/latest timestamps rather than those of the first/last member.
fn coalesce<'a>(first: &Central, rest: impl Iterator<Item = &'a Central>) -> Central {
  let mut acc = first.clone();

  for member in rest {
    acc.high = acc.high.max(member.high);
    acc.low = acc.low.min(member.low);
    acc.start_index = acc.start_index.min(member.start_index);
    acc.end_index = acc.end_index.max(member.end_index);
    acc.start_ts = acc.start_ts.min(member.start_ts);
    acc.end_ts = acc.end_ts.max(member.end_ts);
    acc.level = acc.level.max(member.level);
    acc.strokes.extend_from_slice(&member.strokes);
  }

  acc.strokes.sort_by_key(|s| (s.start_ts, s.seq));
  acc.strokes.dedup_by_key(|s| s.seq);
  if let (Some(first), Some(last)) = (acc.strokes.first(), acc.strokes.last()) {
    acc.start_ts = acc.start_ts.min(first.start_ts);
    acc.end_ts = acc.end_ts.max(last.end_ts);
  }
  acc
}

// ============================================================
// TESTS
// ============================================================
