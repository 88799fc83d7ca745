//! Waveform extraction and conditioning.
pub mod extractor;
pub mod filters;
pub mod postprocess;

pub use extractor::{resample, ExtractionOptions, SignalExtractor};
pub use filters::{filtfilt, Biquad};
pub use postprocess::{FilterOptions, FilterStage, SignalPostProcessor};
