//! Structure builders
//!
//! Each stage consumes the previous stage's output:
//!
//! - **merge**: raw bars -> merged bars (containment collapsed)
//! - **fractal**: merged bars -> alternating turning points
//! - **stroke**: fractals -> contiguous, alternating strokes
//! - **segment**: strokes -> runs of three or more strokes
//! - **central**: strokes -> non-overlapping consolidation zones
//! - **buy_point**: read-only queries over finished centrals and strokes

pub mod helpers;

pub mod buy_point;
pub mod central;
pub mod fractal;
pub mod merge;
pub mod segment;
pub mod stroke;

// Re-export all stages for convenience
pub use buy_point::*;
pub use central::*;
pub use fractal::*;
pub use helpers::*;
pub use merge::*;
pub use segment::*;
pub use stroke::*;
