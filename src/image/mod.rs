//! Raster types used by the digitizer.
//!
//! - [`ImageF32`]: owned single-channel intensity image in `[0, 1]`.
//! - [`ImageRgbF32`]: owned interleaved RGB image in `[0, 1]`.
//! - [`ImageU8`]: borrowed 8-bit view used to ingest caller buffers.
//! - [`BinaryMask`]: boolean line masks produced by morphology.
//! - [`RasterImage`]: the gray-or-color input accepted by the pipeline.
pub mod f32;
pub mod io;
pub mod mask;
pub mod rgb;
pub mod traits;
pub mod u8;

pub use self::f32::ImageF32;
pub use self::mask::BinaryMask;
pub use self::rgb::{ImageRgbF32, RasterImage};
pub use self::traits::{ImageView, ImageViewMut};
pub use self::u8::ImageU8;
