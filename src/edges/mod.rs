//! Derivative operators used by the quality checks.
//!
//! - Sobel gradients (`gx`, `gy`, magnitude) for edge density.
//! - A 4-neighbour Laplacian whose variance is the classic focus measure.
//!
//! Borders clamp (replicate) so every output pixel is defined.

pub mod grad;
pub mod laplacian;

pub use grad::{edge_density, sobel_gradients, Grad};
pub use laplacian::{laplacian, laplacian_variance};
