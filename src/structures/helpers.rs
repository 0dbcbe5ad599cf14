//! Common geometric helpers shared by the structure builders
//!
//! Containment and band-overlap predicates, plus the disjoint-set used by the
//! central merge pass.

// ============================================================
// PRICE RANGE PREDICATES
// ============================================================

/// True when either `[a_low, a_high]` contains `[b_low, b_high]` or vice versa.
/// Bounds are inclusive, so equal ranges are contained.
#[inline]
pub fn is_contained(a_high: f64, a_low: f64, b_high: f64, b_low: f64) -> bool {
    (a_high >= b_high && a_low <= b_low) || (b_high >= a_high && b_low <= a_low)
}

/// Common band of several `(low, high)` ranges: `(max of lows, min of highs)`.
///
/// The band is only meaningful when `low <= high`; see [`band_is_valid`].
/// Returns `None` for an empty input.
#[inline]
pub fn common_band(ranges: &[(f64, f64)]) -> Option<(f64, f64)> {
    let (first, rest) = ranges.split_first()?;
    Some(rest.iter().fold(*first, |(low, high), &(l, h)| (low.max(l), high.min(h))))
}

/// A band is valid when its low does not exceed its high.
#[inline]
pub fn band_is_valid(band: (f64, f64)) -> bool {
    band.0 <= band.1
}

/// Closed-interval overlap: `max(low1, low2) <= min(high1, high2)`.
#[inline]
pub fn ranges_overlap(a_low: f64, a_high: f64, b_low: f64, b_high: f64) -> bool {
    a_low.max(b_low) <= a_high.min(b_high)
}

// ============================================================
// DISJOINT SET
// ============================================================

/// Union-find over `0..n` with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    /// Representative of `x`'s set.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Join the sets of `a` and `b`. Returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }

    /// All sets as member lists. Members are ascending and sets are ordered
    /// by their smallest member, so the output is deterministic.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for x in 0..self.len() {
            let root = self.find(x);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(x),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![x]);
                }
            }
        }
        groups
    }
}

// ============================================================
// TESTS
// ============================================================
