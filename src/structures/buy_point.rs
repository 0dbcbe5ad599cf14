//! Buy-point queries over finished structures
//!
//! Read-only heuristics that look at the most recent centrals and the strokes
//! around them. Each query answers with the input position of the bar carrying
//! the signal, found by mapping the signalling stroke's end back through its
//! merged bar to the source bar with the extreme low.

use serde::{Deserialize, Serialize};

use super::{central::Central, merge::MergedBar, stroke::Stroke};
use crate::{Direction, OHLCV};

/// Buy-point class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuyPointClass {
    /// Divergent new low after leaving a central downwards
    First,
    /// First higher low after a first-class buy point
    Second,
    /// Pullback that stays above a central after breaking out of it
    Third,
}

/// A located buy point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyPoint {
    pub class: BuyPointClass,
    /// Index of the signalling stroke
    pub stroke: usize,
    /// Input position of the signalling bar
    pub position: usize,
}

/// Source bar with the lowest low inside `merged[index]`. `None` when the
/// merged bar or any of its sources is out of bounds for `bars`.
pub fn lowest_source<T: OHLCV>(merged: &[MergedBar], bars: &[T], index: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &pos in &merged.get(index)?.sources {
        let low = bars.get(pos)?.low();
        if best.map_or(true, |(_, b)| low < b) {
            best = Some((pos, low));
        }
    }
    best.map(|(pos, _)| pos)
}

/// Index of a down stroke that leaves a central below its low, makes a new low
/// against the previous down stroke, and does so with a smaller amplitude.
/// Centrals are tried from the most recent one backwards; within a central the
/// latest qualifying stroke wins.
pub fn first_buy_stroke(centrals: &[Central], strokes: &[Stroke]) -> Option<usize> {
    centrals.iter().rev().find_map(|central| {
        (2..strokes.len()).rev().find(|&k| {
            let (current, previous) = (&strokes[k], &strokes[k - 2]);
            current.direction == Direction::Down
                && previous.direction == Direction::Down
                && current.start_index >= central.end_index
                && current.end_price < central.low
                && current.end_price < previous.end_price
                && current.amplitude() < previous.amplitude()
        })
    })
}

/// Index of the down stroke right after the first buy point, if it holds
/// above the first buy point's low.
pub fn second_buy_stroke(centrals: &[Central], strokes: &[Stroke]) -> Option<usize> {
    let first = first_buy_stroke(centrals, strokes)?;
    let low = strokes[first].end_price;

    let next = (first + 1..strokes.len()).find(|&k| strokes[k].direction == Direction::Down)?;
    (strokes[next].end_price > low).then_some(next)
}

/// Index of the pullback after the first up stroke that breaks out above a
/// central, if that pullback stays above the central's high. Centrals are
/// tried from the most recent one backwards.
pub fn third_buy_stroke(centrals: &[Central], strokes: &[Stroke]) -> Option<usize> {
    centrals.iter().rev().find_map(|central| {
        let breakout = strokes.iter().position(|stroke| {
            stroke.direction == Direction::Up
                && stroke.start_index >= central.end_index
                && stroke.end_price > central.high
        })?;
        let pullback = breakout + 1;
        let stroke = strokes.get(pullback)?;
        (stroke.direction == Direction::Down && stroke.end_price > central.high).then_some(pullback)
    })
}

fn locate<T: OHLCV>(
    class: BuyPointClass,
    stroke: Option<usize>,
    strokes: &[Stroke],
    merged: &[MergedBar],
    bars: &[T],
) -> Option<BuyPoint> {
    let stroke = stroke?;
    let position = lowest_source(merged, bars, strokes.get(stroke)?.end_index)?;
    Some(BuyPoint {
        class,
        stroke,
        position,
    })
}

/// All buy points found, in class order.
pub fn find_buy_points<T: OHLCV>(
    centrals: &[Central],
    strokes: &[Stroke],
    merged: &[MergedBar],
    bars: &[T],
) -> Vec<BuyPoint> {
    [
        (BuyPointClass::First, first_buy_stroke(centrals, strokes)),
        (BuyPointClass::Second, second_buy_stroke(centrals, strokes)),
        (BuyPointClass::Third, third_buy_stroke(centrals, strokes)),
    ]
    .into_iter()
    .filter_map(|(class, stroke)| locate(class, stroke, strokes, merged, bars))
    .collect()
}

/// Locate one class of buy point.
pub fn find_buy_point<T: OHLCV>(
    class: BuyPointClass,
    centrals: &[Central],
    strokes: &[Stroke],
    merged: &[MergedBar],
    bars: &[T],
) -> Option<BuyPoint> {
    let stroke = match class {
        BuyPointClass::First => first_buy_stroke(centrals, strokes),
        BuyPointClass::Second => second_buy_stroke(centrals, strokes),
        BuyPointClass::Third => third_buy_stroke(centrals, strokes),
    };
    locate(class, stroke, strokes, merged, bars)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::central::build_centrals;
    use crate::Bar;

    /// Strokes through `prices`, each turning point sitting on merged bar `i`.
    fn path(prices: &[f64]) -> Vec<Stroke> {
        prices
            .windows(2)
            .enumerate()
            .map(|(i, w)| Stroke {
                start_index: i,
                end_index: i + 1,
                start_price: w[0],
                end_price: w[1],
                direction: if w[1] > w[0] { Direction::Up } else { Direction::Down },
                start_ts: i as i64,
                end_ts: (i + 1) as i64,
                seq: i,
                fractal_start: i,
                fractal_end: i + 1,
            })
            .collect()
    }

    /// One merged bar per turning point, each built from two source bars; the
    /// second source carries the lower low.
    fn fixture(prices: &[f64]) -> (Vec<MergedBar>, Vec<Bar>) {
        let mut merged = Vec::new();
        let mut bars = Vec::new();
        for (i, &p) in prices.iter().enumerate() {
            bars.push(Bar::new((2 * i) as i64, p, p + 1.0, p - 0.5, p));
            bars.push(Bar::new((2 * i + 1) as i64, p, p + 0.5, p - 1.0, p));
            merged.push(MergedBar {
                timestamp: (2 * i + 1) as i64,
                open: p,
                high: p + 1.0,
                low: p - 1.0,
                close: p,
                volume: 0.0,
                sources: vec![2 * i, 2 * i + 1],
            });
        }
        (merged, bars)
    }

    #[test]
    fn test_lowest_source() {
        let (merged, bars) = fixture(&[100.0, 110.0]);
        assert_eq!(lowest_source(&merged, &bars, 1), Some(3));
        assert_eq!(lowest_source(&merged, &bars, 5), None);
        assert_eq!(lowest_source(&merged, &bars[..2], 1), None);
    }

    #[test]
    fn test_first_and_second_buy_points() {
        // Zone 100..104, a leg down to 96, a shorter leg to a new low at 94,
        // then a higher low at 95.
        let prices = [110.0, 100.0, 104.0, 96.0, 99.0, 94.0, 98.0, 95.0];
        let strokes = path(&prices);
        let centrals = build_centrals(&strokes);
        assert_eq!(centrals.len(), 2);

        let first = first_buy_stroke(&centrals, &strokes).unwrap();
        assert_eq!(first, 4);
        assert_eq!(strokes[first].end_price, 94.0);

        let second = second_buy_stroke(&centrals, &strokes).unwrap();
        assert_eq!(second, 6);
        assert_eq!(strokes[second].end_price, 95.0);

        let (merged, bars) = fixture(&prices);
        let point =
            find_buy_point(BuyPointClass::First, &centrals, &strokes, &merged, &bars).unwrap();
        assert_eq!(point.stroke, 4);
        assert_eq!(point.position, 2 * 5 + 1);
    }

    #[test]
    fn test_no_first_buy_without_divergence() {
        // Second leg down is longer than the first: no divergence
        let prices = [110.0, 100.0, 104.0, 98.0, 103.0, 90.0, 95.0, 70.0];
        let strokes = path(&prices);
        let centrals = build_centrals(&strokes);
        assert!(first_buy_stroke(&centrals, &strokes).is_none());
        assert!(second_buy_stroke(&centrals, &strokes).is_none());
    }

    #[test]
    fn test_third_buy_point() {
        // Zone 100..104, breakout to 115, pullback holds at 108. The strokes
        // after the breakout form a newer central of their own.
        let prices = [95.0, 104.0, 100.0, 106.0, 102.0, 115.0, 108.0, 120.0];
        let strokes = path(&prices);
        let centrals = build_centrals(&strokes);
        let third = third_buy_stroke(&centrals, &strokes).unwrap();
        assert_eq!(strokes[third].end_price, 108.0);

        let (merged, bars) = fixture(&prices);
        let points = find_buy_points(&centrals, &strokes, &merged, &bars);
        assert!(points.iter().any(|p| p.class == BuyPointClass::Third));
    }

    #[test]
    fn test_third_buy_fails_when_pullback_reenters() {
        let prices = [95.0, 104.0, 100.0, 106.0, 102.0, 115.0, 101.0];
        let strokes = path(&prices);
        let centrals = build_centrals(&strokes);
        assert!(third_buy_stroke(&centrals, &strokes).is_none());
    }

    #[test]
    fn test_no_central_no_buy_point() {
        let strokes = path(&[100.0, 110.0]);
        assert!(first_buy_stroke(&[], &strokes).is_none());
        assert!(third_buy_stroke(&[], &strokes).is_none());
    }
}
