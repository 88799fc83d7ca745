//! Pre-flight image gates and post-hoc quality scoring.
pub mod assessor;
pub mod gates;

pub use assessor::{band_snr_db, clarity, Completeness, QualityAssessor, QualityOptions, QualityReport};
pub use gates::{GateCheck, GateKind, GateOptions, GateReport, QualityGates};
