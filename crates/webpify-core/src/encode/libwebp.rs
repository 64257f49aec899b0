//! libwebp backend via the `webp` crate.

use std::collections::HashMap;

use tracing::info;
use webp::{Encoder, WebPMemory};

use super::backend::{BufferId, EncodeBackend, EncodeError, ResultId};
use crate::pixel::{expected_len, ValidationError};

/// Lossy WebP encoder backed by libwebp.
///
/// Input buffers live in a handle table; the current result is libwebp-owned
/// memory, released when freed or replaced by the next encode.
#[derive(Default)]
pub struct WebpBackend {
    buffers: HashMap<BufferId, Vec<u8>>,
    result: Option<(ResultId, WebPMemory)>,
    next_id: u32,
}

impl WebpBackend {
    /// Build the backend. Runs on the thread that will own it.
    pub fn initialize() -> Result<Self, EncodeError> {
        info!("libwebp encoder initialized");
        Ok(Self::default())
    }

    /// Number of input buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Whether an encode result is currently held.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

impl EncodeBackend for WebpBackend {
    fn name(&self) -> &'static str {
        "libwebp"
    }

    fn create_buffer(&mut self, width: u32, height: u32) -> Result<BufferId, EncodeError> {
        let len = match expected_len(width, height) {
            Some(len) if len > 0 => len,
            _ => return Err(EncodeError::AllocationFailed { width, height }),
        };
        let id = BufferId(self.next_id());
        self.buffers.insert(id, vec![0u8; len]);
        Ok(id)
    }

    fn input_mut(&mut self, buffer: BufferId) -> Option<&mut [u8]> {
        self.buffers.get_mut(&buffer).map(|b| b.as_mut_slice())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn encode(
        &mut self,
        buffer: BufferId,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<(), EncodeError> {
        // Drop the previous result so only one is ever held
        self.result = None;

        let input = self
            .buffers
            .get(&buffer)
            .ok_or(EncodeError::UnknownBuffer(buffer.0))?;
        let expected = expected_len(width, height)
            .ok_or(ValidationError::DimensionsOverflow { width, height })?;
        if input.len() != expected {
            return Err(ValidationError::LengthMismatch {
                expected,
                actual: input.len(),
            }
            .into());
        }

        let memory = Encoder::from_rgba(input, width, height)
            .encode_simple(false, f32::from(quality.min(100)))
            .map_err(|e| EncodeError::EncodingFailed(format!("{e:?}")))?;

        let id = ResultId(self.next_id());
        self.result = Some((id, memory));
        Ok(())
    }

    fn result(&self) -> Option<(ResultId, usize)> {
        self.result.as_ref().map(|(id, memory)| (*id, memory.len()))
    }

    fn result_bytes(&self, result: ResultId) -> Option<&[u8]> {
        match &self.result {
            Some((id, memory)) if *id == result => Some(&memory[..]),
            _ => None,
        }
    }

    fn free_result(&mut self, result: ResultId) {
        if matches!(&self.result, Some((id, _)) if *id == result) {
            self.result = None;
        }
    }
}
