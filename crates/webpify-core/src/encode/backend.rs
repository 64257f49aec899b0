//! The encoder capability boundary.
//!
//! A backend owns its own memory space: callers ask it for an input buffer,
//! fill it, run the encode, and read the result through a view. Every
//! allocation handed out must be returned through `destroy_buffer` or
//! `free_result`.

use thiserror::Error;

use crate::pixel::ValidationError;

/// Handle to an input buffer living inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Handle to an encode result living inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId(pub u32);

/// Errors that can occur while encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Encode called before the backend was installed.
    #[error("Encoder not initialized")]
    NotInitialized,

    /// A backend was installed twice.
    #[error("Encoder already initialized")]
    AlreadyInitialized,

    /// Backend construction failed.
    #[error("Encoder initialization failed: {0}")]
    InitFailed(String),

    /// Pixel data or quality rejected before touching the backend.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// Backend could not provide an input buffer of the requested size.
    #[error("Failed to allocate a {width}x{height} input buffer")]
    AllocationFailed { width: u32, height: u32 },

    /// A handle did not name a live allocation.
    #[error("Unknown encoder buffer {0}")]
    UnknownBuffer(u32),

    /// The encoder itself reported a failure.
    #[error("WebP encoding failed: {0}")]
    EncodingFailed(String),

    /// Encode returned without producing a result.
    #[error("Encoder produced no result")]
    NoResult,
}

/// Low-level encode capability with caller-managed buffers.
pub trait EncodeBackend {
    /// Human readable encoder name for logs.
    fn name(&self) -> &'static str;

    /// Allocate an input buffer of `width * height * 4` bytes.
    fn create_buffer(&mut self, width: u32, height: u32) -> Result<BufferId, EncodeError>;

    /// Writable view of an input buffer.
    fn input_mut(&mut self, buffer: BufferId) -> Option<&mut [u8]>;

    /// Release an input buffer. Unknown handles are ignored.
    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Encode the contents of `buffer`, storing the output as the current result.
    fn encode(
        &mut self,
        buffer: BufferId,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<(), EncodeError>;

    /// Current result handle and its size in bytes.
    fn result(&self) -> Option<(ResultId, usize)>;

    /// Read-only view of a result.
    fn result_bytes(&self, result: ResultId) -> Option<&[u8]>;

    /// Release a result. Unknown handles are ignored.
    fn free_result(&mut self, result: ResultId);
}
