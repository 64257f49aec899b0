//! webpify core - pixel buffers, resampling and WebP encoding
//!
//! This crate holds the synchronous building blocks of the webpify pipeline:
//! the RGBA8 [`PixelBuffer`] and its validation, the bilinear resampler, the
//! encoder adapter over libwebp, and an optional decoder for source files.
//! The off-thread job pipeline lives in `webpify-worker`.

pub mod decode;
pub mod encode;
pub mod pixel;
pub mod resize;

pub use encode::{EncodeBackend, EncodeError, EncoderAdapter, WebpBackend};
pub use pixel::{ConversionOptions, PixelBuffer, ValidationError};
pub use resize::{fit_dimensions, resize, resize_for_options, resize_keep_aspect};
