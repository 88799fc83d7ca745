//! Grid line detection on binary masks.
//!
//! - `hough`: band-limited Hough accumulator and peak extraction.
//! - `cluster`: 1D single-linkage clustering of segment positions.
//! - `finder`: the full segment → cluster pipeline.
pub(crate) mod cluster;
pub mod finder;
pub mod hough;

pub use finder::{GridLineFinder, LineCluster, LineFinderOptions, LineFinderOutput, LineSegment};
pub use hough::{HoughAccumulator, HoughPeak};
