//! # chanlun - structural pattern extraction for price bars
//!
//! Turns a time-ordered series of OHLC bars into the layered structures of
//! Chan theory: merged bars, fractals, strokes, segments and centrals, plus
//! first/second/third class buy-point queries over the finished result.
//!
//! ## Quick Start
//!
//! ```rust
//! use chanlun::prelude::*;
//!
//! // Any type implementing OHLCV works; `Bar` is the bundled one
//! let bars: Vec<Bar> = (0..60)
//!     .map(|i| {
//!         let mid = 100.0 + (i as f64 * 0.4).sin() * 10.0;
//!         Bar::new(i, mid - 0.2, mid + 1.0, mid - 1.0, mid + 0.2)
//!     })
//!     .collect();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let result = engine.process(&bars).unwrap();
//!
//! for stroke in result.strokes() {
//!     println!("{} {} -> {}", stroke.direction, stroke.start_price, stroke.end_price);
//! }
//! if let Some(position) = result.third_buy_point(&bars) {
//!     println!("third-class buy point at bar {position}");
//! }
//! ```

use std::{collections::HashSet, fmt};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod invariants;
pub mod params;
pub mod structures;

use params::ChanConfig;
use structures::*;

pub mod prelude {
    pub use crate::{
        // Parallel
        analyze_parallel,
        // Parameters
        params::{get_count, get_flag, ChanConfig, ParamMeta, ParamType},
        // Structures
        structures::*,
        AnalysisError,
        AnalysisResult,
        // Types
        Bar,
        // Errors
        ChanError,
        // Engine
        ChanEngine,
        ChanResult,
        Diagnostics,
        Direction,
        EngineBuilder,
        // Core traits
        OHLCVExt,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ChanError>;

/// Errors that make an analysis unavailable. An `Ok` result with empty
/// collections means no structures were found.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChanError {
    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Stale index in {stage}: {index} outside 0..{len}")]
    StaleIndex {
        stage: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invariant {check} violated: {detail}")]
    InvariantViolation { check: &'static str, detail: String },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Blanket impl for references to dyn OHLCV
impl OHLCV for &dyn OHLCV {
    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (*self).timestamp()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    /// Rising or flat candle
    #[inline]
    fn closes_up(&self) -> bool {
        self.close() >= self.open()
    }

    /// Timestamp, or the bar's input position when it carries none
    #[inline]
    fn timestamp_or(&self, position: usize) -> i64 {
        self.timestamp().unwrap_or(position as i64)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(ChanError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(ChanError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(ChanError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// BASIC TYPES
// ============================================================

/// Plain timestamped price bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

impl OHLCV for Bar {
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
        self.volume.unwrap_or(0.0)
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

/// Direction of a stroke or segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// +1 for up, -1 for down
    #[inline]
    pub fn sign(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    #[inline]
    pub fn is_up(self) -> bool {
        matches!(self, Direction::Up)
    }

    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, Direction::Down)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
        })
    }
}

// ============================================================
// RESULT
// ============================================================

/// What the pipeline dropped or refused along the way
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Same-kind neighbours dropped to keep fractals alternating
    pub fractals_discarded: usize,
    /// Stroke candidates refused by the span or direction rule
    pub strokes_rejected: usize,
    /// Fractal references outside the merged bars
    pub stale_indices: usize,
    /// Centrals absorbed by the merge pass
    pub centrals_merged: usize,
}

/// Owned output of one analysis run. Every call to [`ChanEngine::process`]
/// builds a fresh one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChanResult {
    merged: Vec<MergedBar>,
    position_map: Vec<Vec<usize>>,
    fractals: Vec<Fractal>,
    strokes: Vec<Stroke>,
    segments: Vec<Segment>,
    centrals: Vec<Central>,
    diagnostics: Diagnostics,
}

impl ChanResult {
    #[inline]
    pub fn merged(&self) -> &[MergedBar] {
        &self.merged
    }

    /// Input positions absorbed by each merged bar
    #[inline]
    pub fn position_map(&self) -> &[Vec<usize>] {
        &self.position_map
    }

    #[inline]
    pub fn fractals(&self) -> &[Fractal] {
        &self.fractals
    }

    #[inline]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[inline]
    pub fn centrals(&self) -> &[Central] {
        &self.centrals
    }

    #[inline]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Input positions behind merged bar `index`
    pub fn source_positions(&self, index: usize) -> Result<&[usize]> {
        self.position_map
            .get(index)
            .map(Vec::as_slice)
            .ok_or(ChanError::StaleIndex {
                stage: "merged",
                index,
                len: self.position_map.len(),
            })
    }

    /// No structure above the merged bars was found
    pub fn is_empty(&self) -> bool {
        self.fractals.is_empty()
            && self.strokes.is_empty()
            && self.segments.is_empty()
            && self.centrals.is_empty()
    }

    /// Input position of the first-class buy point, if any. `bars` must be
    /// the series this result was built from.
    pub fn first_buy_point<T: OHLCV>(&self, bars: &[T]) -> Option<usize> {
        self.buy_point(BuyPointClass::First, bars)
    }

    pub fn second_buy_point<T: OHLCV>(&self, bars: &[T]) -> Option<usize> {
        self.buy_point(BuyPointClass::Second, bars)
    }

    pub fn third_buy_point<T: OHLCV>(&self, bars: &[T]) -> Option<usize> {
        self.buy_point(BuyPointClass::Third, bars)
    }

    /// Every buy point found, in class order
    pub fn buy_points<T: OHLCV>(&self, bars: &[T]) -> Vec<BuyPoint> {
        find_buy_points(&self.centrals, &self.strokes, &self.merged, bars)
    }

    fn buy_point<T: OHLCV>(&self, class: BuyPointClass, bars: &[T]) -> Option<usize> {
        find_buy_point(class, &self.centrals, &self.strokes, &self.merged, bars).map(|p| p.position)
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Stateless analysis engine. Holds only its configuration, so one engine
/// can be shared across threads and reused on unrelated series.
#[derive(Debug, Clone, Default)]
pub struct ChanEngine {
    config: ChanConfig,
}

impl ChanEngine {
    pub fn new(config: ChanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ChanConfig {
        &self.config
    }

    /// Run the full pipeline over `bars`.
    pub fn process<T: OHLCV>(&self, bars: &[T]) -> Result<ChanResult> {
        let config = &self.config;
        if config.min_bars > 0 && bars.len() < config.min_bars {
            return Err(ChanError::InsufficientData {
                need: config.min_bars,
                got: bars.len(),
            });
        }
        if config.validate_data {
            validate_bars(bars)?;
        }

        let MergeOutput {
            bars: merged,
            position_map,
        } = merge_bars(bars);
        let (fractals, fractals_discarded) = enforce_alternation(detect_fractals(&merged));
        let StrokeOutput {
            strokes,
            rejected,
            stale,
        } = build_strokes(&fractals, &merged, config.min_stroke_span);
        let segments = build_segments(&strokes, config.segment_strategy);

        let detected = build_centrals(&strokes);
        let found = detected.len();
        let centrals = if config.merge_centrals {
            merge_centrals(detected)
        } else {
            detected
        };

        let diagnostics = Diagnostics {
            fractals_discarded,
            strokes_rejected: rejected,
            stale_indices: stale,
            centrals_merged: found - centrals.len(),
        };

        debug!(
            bars = bars.len(),
            merged = merged.len(),
            fractals = fractals.len(),
            strokes = strokes.len(),
            segments = segments.len(),
            centrals = centrals.len(),
            fractals_discarded,
            strokes_rejected = rejected,
            centrals_merged = diagnostics.centrals_merged,
            "analysis complete"
        );

        let result = ChanResult {
            merged,
            position_map,
            fractals,
            strokes,
            segments,
            centrals,
            diagnostics,
        };
        if config.check_invariants {
            self.check(&result, bars.len())?;
        }
        Ok(result)
    }

    fn check(&self, result: &ChanResult, source_len: usize) -> Result<()> {
        invariants::check_merged(&result.merged, source_len)?;
        invariants::check_strokes(&result.strokes, result.merged.len())?;
        invariants::check_segments(&result.strokes, &result.segments, self.config.segment_strategy)?;
        invariants::check_centrals(&result.centrals, self.config.merge_centrals)
    }
}

fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            ChanError::InvalidOHLCV { reason, .. } => ChanError::InvalidOHLCV { index: i, reason },
            other => other,
        })?;
        if !seen.insert(bar.timestamp_or(i)) {
            return Err(ChanError::InvalidOHLCV {
                index: i,
                reason: "duplicate timestamp",
            });
        }
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ChanEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: ChanConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete config
    pub fn config(mut self, config: ChanConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Fail inputs shorter than `bars` with `InsufficientData`
    pub fn min_bars(mut self, bars: usize) -> Self {
        self.config.min_bars = bars;
        self
    }

    pub fn min_stroke_span(mut self, span: usize) -> Self {
        self.config.min_stroke_span = span;
        self
    }

    pub fn segment_strategy(mut self, strategy: SegmentStrategy) -> Self {
        self.config.segment_strategy = strategy;
        self
    }

    pub fn merge_centrals(mut self, enable: bool) -> Self {
        self.config.merge_centrals = enable;
        self
    }

    pub fn check_invariants(mut self, enable: bool) -> Self {
        self.config.check_invariants = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<ChanEngine> {
        ChanEngine::new(self.config)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

/// Result of analysing a single instrument
#[derive(Debug)]
pub struct AnalysisResult {
    pub symbol: String,
    pub result: ChanResult,
}

/// Error from analysing a single instrument
#[derive(Debug)]
pub struct AnalysisError {
    pub symbol: String,
    pub error: ChanError,
}

/// Parallel analysis of multiple instruments
pub fn analyze_parallel<'a, T, I>(
    engine: &ChanEngine,
    instruments: I,
) -> (Vec<AnalysisResult>, Vec<AnalysisError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .process(bars)
                .map(|result| AnalysisResult {
                    symbol: symbol.to_string(),
                    result,
                })
                .map_err(|error| AnalysisError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
