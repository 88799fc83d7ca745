//! Polynomial models for possibly distorted grid lines.
pub mod oscillation;
pub mod polynomial;
pub mod types;

pub use oscillation::{OscillationOptions, OscillationValidator};
pub use polynomial::{FitOptions, PolynomialLineFitter};
pub use types::{Curvature, DeviationHistogram, GridLine, PolyFit};
