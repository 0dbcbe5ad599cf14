//! Structural invariant checks
//!
//! Each checker inspects one stage's output and reports the first violation
//! found as [`ChanError::InvariantViolation`]. The engine runs all of them on
//! every result when `check_invariants` is enabled; they are also public so
//! callers can verify results they built or deserialized themselves.

use crate::{
    structures::{can_form_start, Central, MergedBar, Segment, SegmentStrategy, Stroke},
    ChanError, Result,
};

fn violation(check: &'static str, detail: String) -> ChanError {
    ChanError::InvariantViolation { check, detail }
}

/// Merged timestamps strictly increase and the source positions partition
/// `0..source_len`.
pub fn check_merged(merged: &[MergedBar], source_len: usize) -> Result<()> {
    for (i, w) in merged.windows(2).enumerate() {
        if w[1].timestamp <= w[0].timestamp {
            return Err(violation(
                "merged_timestamps",
                format!("merged bar {} at {} does not follow {}", i + 1, w[1].timestamp, w[0].timestamp),
            ));
        }
    }

    let mut seen = vec![false; source_len];
    for (i, bar) in merged.iter().enumerate() {
        if bar.sources.is_empty() {
            return Err(violation("merged_partition", format!("merged bar {i} has no sources")));
        }
        for &pos in &bar.sources {
            match seen.get_mut(pos) {
                None => {
                    return Err(violation(
                        "merged_partition",
                        format!("merged bar {i} references position {pos} of {source_len}"),
                    ))
                }
                Some(true) => {
                    return Err(violation(
                        "merged_partition",
                        format!("position {pos} belongs to more than one merged bar"),
                    ))
                }
                Some(slot) => *slot = true,
            }
        }
    }

    match seen.iter().position(|covered| !covered) {
        Some(pos) => Err(violation("merged_partition", format!("position {pos} is not covered"))),
        None => Ok(()),
    }
}

/// Strokes point into the merged bars, move in their own direction, alternate,
/// and chain end to start.
pub fn check_strokes(strokes: &[Stroke], merged_len: usize) -> Result<()> {
    for (i, stroke) in strokes.iter().enumerate() {
        if stroke.start_index >= stroke.end_index || stroke.end_index >= merged_len {
            return Err(violation(
                "stroke_bounds",
                format!(
                    "stroke {i} spans {}..{} over {merged_len} merged bars",
                    stroke.start_index, stroke.end_index
                ),
            ));
        }
        let moved = (stroke.end_price - stroke.start_price) * f64::from(stroke.direction.sign());
        if moved <= 0.0 {
            return Err(violation(
                "stroke_direction",
                format!("stroke {i} goes {} from {} to {}", stroke.direction, stroke.start_price, stroke.end_price),
            ));
        }
    }

    for (i, w) in strokes.windows(2).enumerate() {
        let (prev, curr) = (&w[0], &w[1]);
        if prev.direction == curr.direction {
            return Err(violation(
                "stroke_alternation",
                format!("strokes {i} and {} both go {}", i + 1, curr.direction),
            ));
        }
        if prev.end_index != curr.start_index || prev.fractal_end != curr.fractal_start {
            return Err(violation(
                "stroke_contiguity",
                format!(
                    "stroke {} starts at {} (fractal {}) but stroke {i} ends at {} (fractal {})",
                    i + 1,
                    curr.start_index,
                    curr.fractal_start,
                    prev.end_index,
                    prev.fractal_end
                ),
            ));
        }
    }

    Ok(())
}

/// Segments are ordered, disjoint stroke ranges. Under
/// [`SegmentStrategy::BreakDetection`] each spans at least three strokes and
/// opens with a valid start.
pub fn check_segments(strokes: &[Stroke], segments: &[Segment], strategy: SegmentStrategy) -> Result<()> {
    let mut next_free = 0;
    for (i, segment) in segments.iter().enumerate() {
        if segment.stroke_start < next_free
            || segment.stroke_end < segment.stroke_start
            || segment.stroke_end >= strokes.len()
        {
            return Err(violation(
                "segment_bounds",
                format!(
                    "segment {i} covers strokes {}..={} of {}",
                    segment.stroke_start,
                    segment.stroke_end,
                    strokes.len()
                ),
            ));
        }
        next_free = segment.stroke_end + 1;

        if strategy == SegmentStrategy::BreakDetection {
            if segment.stroke_count() < 3 {
                return Err(violation(
                    "segment_span",
                    format!("segment {i} spans {} strokes", segment.stroke_count()),
                ));
            }
            if !can_form_start(strokes, segment.stroke_start) {
                return Err(violation(
                    "segment_start",
                    format!("segment {i} opens at stroke {} without overlap", segment.stroke_start),
                ));
            }
        }
    }
    Ok(())
}

/// Every central has `high > low`; once merged, no two overlap.
pub fn check_centrals(centrals: &[Central], merged: bool) -> Result<()> {
    for (i, central) in centrals.iter().enumerate() {
        if central.high <= central.low {
            return Err(violation(
                "central_bounds",
                format!("central {i} has high {} <= low {}", central.high, central.low),
            ));
        }
    }

    if merged {
        for i in 0..centrals.len() {
            for j in i + 1..centrals.len() {
                if centrals[i].overlaps(&centrals[j]) {
                    return Err(violation("central_overlap", format!("centrals {i} and {j} overlap")));
                }
            }
        }
    }

    Ok(())
}

// ============================================================
// TESTS
// ============================================================
