//! Bar merging - collapses neighbouring bars in a containment relationship
//!
//! Bars are walked in chronological order against a "current" merged bar. When
//! either bar's range contains the other's, the two are combined with a
//! trend-biased rule taken from the current merged bar's own candle direction:
//! a rising candle keeps the higher high and the higher low, a falling candle
//! keeps the lower high and the lower low.

use serde::{Deserialize, Serialize};

use super::helpers::is_contained;
use crate::{OHLCVExt, OHLCV};

// ============================================================
// MERGED BAR
// ============================================================

/// One or more raw bars collapsed by containment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedBar {
    /// Timestamp of the last absorbed bar
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Sum of the absorbed bars' volumes
    pub volume: f64,
    /// Input positions of the absorbed bars, in chronological order
    pub sources: Vec<usize>,
}

impl MergedBar {
    fn from_bar<T: OHLCV>(position: usize, timestamp: i64, bar: &T) -> Self {
        Self {
            timestamp,
            open: bar.open(),
            high: bar.high(),
            low: bar.low(),
            close: bar.close(),
            volume: bar.volume(),
            sources: vec![position],
        }
    }

    fn absorb<T: OHLCV>(&mut self, position: usize, timestamp: i64, bar: &T) {
        if self.closes_up() {
            self.high = self.high.max(bar.high());
            self.low = self.low.max(bar.low());
        } else {
            self.high = self.high.min(bar.high());
            self.low = self.low.min(bar.low());
        }
        self.close = bar.close();
        self.timestamp = timestamp;
        self.volume += bar.volume();
        self.sources.push(position);
    }
}

impl OHLCV for MergedBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

/// Merged bars plus the table mapping each merged index to its input positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutput {
    pub bars: Vec<MergedBar>,
    pub position_map: Vec<Vec<usize>>,
}

// ============================================================
// MERGING
// ============================================================

/// Input positions in chronological order. Already-ordered input is returned
/// as is; otherwise a stable sort keeps equal timestamps in input order.
pub fn chronological_order<T: OHLCV>(bars: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..bars.len()).collect();
    let sorted = bars
        .windows(2)
        .enumerate()
        .all(|(i, w)| w[0].timestamp_or(i) <= w[1].timestamp_or(i + 1));
    if !sorted {
        order.sort_by_key(|&pos| bars[pos].timestamp_or(pos));
    }
    order
}

/// Merge contained neighbours. Only the current merged bar and the next raw
/// bar are ever compared.
pub fn merge_bars<T: OHLCV>(bars: &[T]) -> MergeOutput {
    let mut merged: Vec<MergedBar> = Vec::with_capacity(bars.len());

    for pos in chronological_order(bars) {
        let bar = &bars[pos];
        let timestamp = bar.timestamp_or(pos);
        match merged.last_mut() {
            Some(current) if is_contained(current.high, current.low, bar.high(), bar.low()) => {
                current.absorb(pos, timestamp, bar);
            }
            _ => merged.push(MergedBar::from_bar(pos, timestamp, bar)),
        }
    }

    let position_map = merged.iter().map(|m| m.sources.clone()).collect();
    MergeOutput {
        bars: merged,
        position_map,
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    #[test]
    fn test_empty_input() {
        let out = merge_bars::<Bar>(&[]);
        assert!(out.bars.is_empty());
        assert!(out.position_map.is_empty());
    }

    #[test]
    fn test_no_containment_keeps_every_bar() {
        let bars = vec![
            Bar::new(1, 10.0, 11.0, 9.0, 10.5),
            Bar::new(2, 10.5, 12.0, 10.0, 11.5),
            Bar::new(3, 11.5, 13.0, 11.0, 12.5),
        ];
        let out = merge_bars(&bars);
        assert_eq!(out.bars.len(), 3);
        assert_eq!(out.position_map, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_rising_candle_keeps_higher_extremes() {
        let bars = vec![
            Bar::new(1, 10.0, 15.0, 8.0, 14.0), // rising
            Bar::new(2, 12.0, 14.0, 9.0, 10.0), // inside
        ];
        let out = merge_bars(&bars);
        assert_eq!(out.bars.len(), 1);
        let m = &out.bars[0];
        assert_eq!(m.high, 15.0);
        assert_eq!(m.low, 9.0);
        assert_eq!(m.open, 10.0);
        assert_eq!(m.close, 10.0);
        assert_eq!(m.timestamp, 2);
        assert_eq!(m.sources, vec![0, 1]);
    }

    #[test]
    fn test_falling_candle_keeps_lower_extremes() {
        let bars = vec![
            Bar::new(1, 14.0, 15.0, 8.0, 9.0),  // falling
            Bar::new(2, 12.0, 16.0, 7.0, 13.0), // outside
        ];
        let out = merge_bars(&bars);
        assert_eq!(out.bars.len(), 1);
        assert_eq!(out.bars[0].high, 15.0);
        assert_eq!(out.bars[0].low, 7.0);
    }

    #[test]
    fn test_flat_candle_counts_as_rising() {
        let bars = vec![
            Bar::new(1, 10.0, 15.0, 8.0, 10.0),
            Bar::new(2, 12.0, 14.0, 9.0, 12.0),
        ];
        let out = merge_bars(&bars);
        assert_eq!(out.bars[0].high, 15.0);
        assert_eq!(out.bars[0].low, 9.0);
    }

    #[test]
    fn test_unsorted_input_is_ordered_and_mapped_back() {
        let bars = vec![
            Bar::new(3, 11.5, 13.0, 11.0, 12.5),
            Bar::new(1, 10.0, 11.0, 9.0, 10.5),
            Bar::new(2, 10.5, 12.0, 10.0, 11.5),
        ];
        let out = merge_bars(&bars);
        let stamps: Vec<i64> = out.bars.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![1, 2, 3]);
        assert_eq!(out.position_map, vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn test_volume_is_accumulated() {
        let bars = vec![
            Bar::new(1, 10.0, 15.0, 8.0, 14.0).with_volume(100.0),
            Bar::new(2, 12.0, 14.0, 9.0, 10.0).with_volume(50.0),
        ];
        let out = merge_bars(&bars);
        assert_eq!(out.bars[0].volume, 150.0);
    }
}
