//! WebP encoding for webpify.
//!
//! This module provides:
//! - The [`EncodeBackend`] boundary: an encode capability with its own memory
//!   space (create buffer, encode, read result, free)
//! - [`EncoderAdapter`], which turns that boundary into
//!   `encode(&PixelBuffer, quality) -> Vec<u8>` and never leaks an allocation
//! - [`WebpBackend`], the libwebp implementation
//!
//! # Architecture
//!
//! The adapter is owned by the worker runtime and is only touched from its
//! thread. All operations are synchronous.
//!
//! # Examples
//!
//! ```ignore
//! use webpify_core::encode::{EncoderAdapter, WebpBackend};
//! use webpify_core::PixelBuffer;
//!
//! let mut adapter = EncoderAdapter::new();
//! adapter.install(WebpBackend::initialize()?)?;
//! let pixels = PixelBuffer::filled(100, 100, [128, 128, 128, 255]);
//! let webp_bytes = adapter.encode(&pixels, 80)?;
//! println!("Encoded {} bytes", webp_bytes.len());
//! ```

mod adapter;
mod backend;
mod libwebp;

pub use adapter::EncoderAdapter;
pub use backend::{BufferId, EncodeBackend, EncodeError, ResultId};
pub use libwebp::WebpBackend;
