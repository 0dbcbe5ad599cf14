//! Fractal (turning point) detection over merged bars
//!
//! A top fractal is a merged bar whose high and low are both strictly above
//! its two neighbours'; a bottom fractal is the mirror image. Raw detection
//! does not guarantee alternating kinds, so [`enforce_alternation`] thins runs
//! of same-kind fractals down to their most extreme member before strokes are
//! built.

use serde::{Deserialize, Serialize};

use super::merge::MergedBar;

/// Kind of turning point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractalKind {
    Top,
    Bottom,
}

impl FractalKind {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            FractalKind::Top => FractalKind::Bottom,
            FractalKind::Bottom => FractalKind::Top,
        }
    }
}

/// A local extremum in the merged-bar series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fractal {
    /// Position in the merged-bar sequence
    pub index: usize,
    pub kind: FractalKind,
    /// High for a top, low for a bottom
    pub price: f64,
    pub timestamp: i64,
    /// Running number shared by both kinds, in scan order
    pub seq: usize,
}

impl Fractal {
    #[inline]
    pub fn is_top(&self) -> bool {
        self.kind == FractalKind::Top
    }

    #[inline]
    pub fn is_bottom(&self) -> bool {
        self.kind == FractalKind::Bottom
    }

    /// Higher top or lower bottom than `other`. Always false across kinds.
    #[inline]
    pub fn is_more_extreme_than(&self, other: &Fractal) -> bool {
        match (self.kind, other.kind) {
            (FractalKind::Top, FractalKind::Top) => self.price > other.price,
            (FractalKind::Bottom, FractalKind::Bottom) => self.price < other.price,
            _ => false,
        }
    }
}

/// Classify the middle bar of a window of three.
#[inline]
fn classify(left: &MergedBar, mid: &MergedBar, right: &MergedBar) -> Option<FractalKind> {
    if mid.high > left.high && mid.high > right.high && mid.low > left.low && mid.low > right.low
    {
        Some(FractalKind::Top)
    } else if mid.high < left.high
        && mid.high < right.high
        && mid.low < left.low
        && mid.low < right.low
    {
        Some(FractalKind::Bottom)
    } else {
        None
    }
}

/// Scan every interior merged bar. Fewer than three bars yield nothing.
pub fn detect_fractals(merged: &[MergedBar]) -> Vec<Fractal> {
    let mut fractals = Vec::new();
    for (offset, window) in merged.windows(3).enumerate() {
        let Some(kind) = classify(&window[0], &window[1], &window[2]) else {
            continue;
        };
        let mid = &window[1];
        fractals.push(Fractal {
            index: offset + 1,
            kind,
            price: match kind {
                FractalKind::Top => mid.high,
                FractalKind::Bottom => mid.low,
            },
            timestamp: mid.timestamp,
            seq: fractals.len(),
        });
    }
    fractals
}

/// Collapse adjacent same-kind fractals to the more extreme one (the earlier
/// one wins ties). Returns the alternating list and the number discarded.
pub fn enforce_alternation(fractals: Vec<Fractal>) -> (Vec<Fractal>, usize) {
    let mut kept: Vec<Fractal> = Vec::with_capacity(fractals.len());
    let mut discarded = 0;

    for fractal in fractals {
        match kept.last_mut() {
            Some(last) if last.kind == fractal.kind => {
                discarded += 1;
                if fractal.is_more_extreme_than(last) {
                    *last = fractal;
                }
            }
            _ => kept.push(fractal),
        }
    }

    (kept, discarded)
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

    fn fractal(index: usize, kind: FractalKind, price: f64, seq: usize) -> Fractal {
        Fractal {
            index,
            kind,
            price,
            timestamp: index as i64,
            seq,
        }
    }

    #[test]
    fn test_too_few_bars() {
        assert!(detect_fractals(&[]).is_empty());
        assert!(detect_fractals(&[mb(0, 2.0, 1.0), mb(1, 3.0, 2.0)]).is_empty());
    }

    #[test]
    fn test_single_bottom_in_v() {
        let merged = vec![
            mb(0, 10.0, 8.0),
            mb(1, 9.0, 7.0),
            mb(2, 8.0, 6.0),
            mb(3, 9.0, 7.0),
            mb(4, 10.0, 8.0),
        ];
        let fractals = detect_fractals(&merged);
        assert_eq!(fractals.len(), 1);
        assert_eq!(fractals[0].kind, FractalKind::Bottom);
        assert_eq!(fractals[0].index, 2);
        assert_eq!(fractals[0].price, 6.0);
        assert_eq!(fractals[0].seq, 0);
    }

    #[test]
    fn test_strictness_rejects_equal_neighbour() {
        let merged = vec![mb(0, 10.0, 8.0), mb(1, 11.0, 9.0), mb(2, 10.0, 9.0)];
        assert!(detect_fractals(&merged).is_empty());
    }

    #[test]
    fn test_sequence_spans_both_kinds() {
        let merged = vec![
            mb(0, 10.0, 8.0),
            mb(1, 12.0, 10.0),
            mb(2, 11.0, 9.0),
            mb(3, 9.0, 7.0),
            mb(4, 10.0, 8.0),
        ];
        let fractals = detect_fractals(&merged);
        let kinds: Vec<FractalKind> = fractals.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FractalKind::Top, FractalKind::Bottom]);
        assert_eq!(fractals[1].seq, 1);
    }

    #[test]
    fn test_alternation_keeps_more_extreme() {
        let raw = vec![
            fractal(1, FractalKind::Top, 10.0, 0),
            fractal(3, FractalKind::Top, 12.0, 1),
            fractal(5, FractalKind::Bottom, 5.0, 2),
            fractal(7, FractalKind::Bottom, 6.0, 3),
            fractal(9, FractalKind::Top, 11.0, 4),
        ];
        let (kept, discarded) = enforce_alternation(raw);
        assert_eq!(discarded, 2);
        let seqs: Vec<usize> = kept.iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2, 4]);
    }

    #[test]
    fn test_alternation_tie_keeps_earlier() {
        let raw = vec![
            fractal(1, FractalKind::Bottom, 5.0, 0),
            fractal(3, FractalKind::Bottom, 5.0, 1),
        ];
        let (kept, discarded) = enforce_alternation(raw);
        assert_eq!(discarded, 1);
        assert_eq!(kept[0].seq, 0);
    }
}
