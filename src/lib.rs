#![doc = include_str!("../README.md")]

// Entry points.
pub mod adaptive;
pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod types;

// Building blocks, usable on their own.
pub mod angle;
pub mod edges;
pub mod fit;
pub mod grid;
pub mod lines;
pub mod morphology;
pub mod pyramid;
pub mod quality;
pub mod signal;

// --- High-level re-exports -------------------------------------------------

pub use crate::adaptive::{AdaptiveOptions, AdaptiveOutcome, AdaptiveProcessor, AttemptRecord};
pub use crate::batch::{BatchItem, BatchJob, BatchOptions, BatchProcessor};
pub use crate::config::DigitizerConfig;
pub use crate::error::{DigitizeError, Result};
pub use crate::pipeline::{Digitization, DigitizationResult, Digitizer, Metadata};
pub use crate::types::{LeadRegion, LeadSignal, LeadStatus, ProcessingStatus, STANDARD_LEADS};

// --- Prelude ---------------------------------------------------------------

/// Everything needed to digitize a scan.
///
/// ```no_run
/// use ecg_digitizer::prelude::*;
///
/// # fn main() {
/// let (w, h) = (1100usize, 850usize);
/// let gray = vec![255u8; w * h];
/// let img = RasterImage::Gray(ImageF32::from_u8(&ImageU8::packed(w, h, &gray)));
///
/// let digitizer = Digitizer::new(DigitizerConfig::default());
/// let regions = vec![LeadRegion::new("II", 0, 600, 1100, 200)];
/// match digitizer.process(&img, &regions) {
///     Ok(out) => println!("{}", out.status_line()),
///     Err(e) => eprintln!("{e}"),
/// }
/// # }
/// ```
pub mod prelude {
    pub use crate::image::{ImageF32, ImageRgbF32, ImageU8, RasterImage};
    pub use crate::{
        Digitization, DigitizationResult, Digitizer, DigitizerConfig, LeadRegion, LeadSignal,
        ProcessingStatus,
    };
}
