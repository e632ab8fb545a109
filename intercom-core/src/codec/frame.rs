//! The 32-byte radio frame and its wire representation.
//!
//! ## Wire format
//!
//! ```text
//! byte:   0   1   2   3        30  31
//!       ┌───┬───┬───┬───┬ ─ ─ ┬───┬───┐
//!       │ s0 LE │ s1 LE │ ... │s15 LE │   16 × i16, little-endian
//!       └───┴───┴───┴───┴ ─ ─ ┴───┴───┘
//! ```
//!
//! A frame whose 16 samples are all zero is the end-of-message terminator.

use crate::error::{IntercomError, Result};

/// PCM amplitude, mono.
pub type Sample = i16;

/// Samples carried by one frame.
pub const FRAME_SAMPLES: usize = 16;

/// Bytes on the wire per frame. Every link operation moves exactly this many.
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// Fixed-capacity transport unit: exactly 16 samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame(pub [Sample; FRAME_SAMPLES]);

impl Frame {
    /// The all-zero end-of-message frame.
    pub const TERMINATOR: Frame = Frame([0; FRAME_SAMPLES]);

    pub fn new(samples: [Sample; FRAME_SAMPLES]) -> Self {
        Self(samples)
    }

    pub fn samples(&self) -> &[Sample; FRAME_SAMPLES] {
        &self.0
    }

    /// True iff all 16 samples are zero.
    ///
    /// Sixteen samples of genuine silence look exactly like this, so a silent
    /// audio frame also ends the message.
    pub fn is_terminator(&self) -> bool {
        self.0.iter().all(|&s| s == 0)
    }

    /// Serialize to the 32-byte little-endian wire form.
    pub fn to_bytes(&self) -> [u8; FRAME_BYTES] {
        let mut out = [0u8; FRAME_BYTES];
        for (chunk, sample) in out.chunks_exact_mut(2).zip(self.0.iter()) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        out
    }

    /// Parse the 32-byte little-endian wire form.
    pub fn from_bytes(bytes: &[u8; FRAME_BYTES]) -> Self {
        let mut samples = [0 as Sample; FRAME_SAMPLES];
        for (sample, chunk) in samples.iter_mut().zip(bytes.chunks_exact(2)) {
            *sample = Sample::from_le_bytes([chunk[0], chunk[1]]);
        }
        Self(samples)
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = IntercomError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let fixed: &[u8; FRAME_BYTES] = bytes
            .try_into()
            .map_err(|_| IntercomError::FrameSize { len: bytes.len() })?;
        Ok(Self::from_bytes(fixed))
    }
}
