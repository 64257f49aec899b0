//! Safe, owned-bytes encoding on top of an [`EncodeBackend`].

use tracing::debug;

use super::backend::{BufferId, EncodeBackend, EncodeError, ResultId};
use crate::pixel::{PixelBuffer, ValidationError};

/// Backend allocations held for the duration of one encode.
///
/// Dropping the guard releases the result and the input buffer, whichever
/// were acquired, regardless of how the encode ended.
struct Allocations<'a, B: EncodeBackend> {
    backend: &'a mut B,
    input: Option<BufferId>,
    result: Option<ResultId>,
}

impl<'a, B: EncodeBackend> Allocations<'a, B> {
    fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            input: None,
            result: None,
        }
    }

    /// Allocate the input buffer and copy the pixels into it.
    fn load(&mut self, pixels: &PixelBuffer) -> Result<BufferId, EncodeError> {
        let id = self.backend.create_buffer(pixels.width, pixels.height)?;
        self.input = Some(id);

        let dst = self
            .backend
            .input_mut(id)
            .ok_or(EncodeError::UnknownBuffer(id.0))?;
        if dst.len() != pixels.bytes.len() {
            return Err(EncodeError::AllocationFailed {
                width: pixels.width,
                height: pixels.height,
            });
        }
        dst.copy_from_slice(&pixels.bytes);
        Ok(id)
    }

    /// Run the encode and take ownership of whatever result it left behind.
    fn run(
        &mut self,
        input: BufferId,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<(), EncodeError> {
        let outcome = self.backend.encode(input, width, height, quality);
        self.result = self.backend.result().map(|(id, _)| id);
        outcome
    }

    /// Copy the result view into an independently owned vector.
    fn copy_result(&self) -> Result<Vec<u8>, EncodeError> {
        let (id, size) = self.backend.result().ok_or(EncodeError::NoResult)?;
        let view = self
            .backend
            .result_bytes(id)
            .ok_or(EncodeError::UnknownBuffer(id.0))?;
        let view = view.get(..size).ok_or(EncodeError::NoResult)?;
        Ok(view.to_vec())
    }
}

impl<B: EncodeBackend> Drop for Allocations<'_, B> {
    fn drop(&mut self) {
        if let Some(result) = self.result.take() {
            self.backend.free_result(result);
        }
        if let Some(input) = self.input.take() {
            self.backend.destroy_buffer(input);
        }
    }
}

/// Encoder wrapper that is unusable until a backend is installed.
///
/// Installing happens once, after the backend's (possibly slow) initialization
/// has finished. Encoding before that returns `EncodeError::NotInitialized`
/// and leaves the adapter ready to be installed and retried.
pub struct EncoderAdapter<B> {
    backend: Option<B>,
}

impl<B> Default for EncoderAdapter<B> {
    fn default() -> Self {
        Self { backend: None }
    }
}

impl<B: EncodeBackend> EncoderAdapter<B> {
    /// Create an adapter with no backend installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the initialized backend. Only the first call succeeds.
    pub fn install(&mut self, backend: B) -> Result<(), EncodeError> {
        if self.backend.is_some() {
            return Err(EncodeError::AlreadyInitialized);
        }
        self.backend = Some(backend);
        Ok(())
    }

    /// Whether a backend has been installed.
    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    /// The installed backend, if any.
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Encode a validated RGBA8 buffer to owned bytes.
    ///
    /// # Errors
    ///
    /// * `NotInitialized` - no backend installed yet
    /// * `InvalidInput` - malformed buffer or quality above 100
    /// * any backend error; allocations are released before returning
    pub fn encode(&mut self, pixels: &PixelBuffer, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let backend = self.backend.as_mut().ok_or(EncodeError::NotInitialized)?;

        pixels.validate()?;
        if quality > 100 {
            return Err(ValidationError::QualityOutOfRange(quality).into());
        }

        let mut scope = Allocations::new(backend);
        let input = scope.load(pixels)?;
        scope.run(input, pixels.width, pixels.height, quality)?;
        let bytes = scope.copy_result()?;

        debug!(
            width = pixels.width,
            height = pixels.height,
            quality,
            bytes = bytes.len(),
            "encoded pixel buffer"
        );
        Ok(bytes)
    }
}
