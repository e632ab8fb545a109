//! Frame codec: captured PCM ⇄ fixed 16-sample radio frames.
//!
//! ## Encoding
//!
//! ```text
//! capture ─► 64-sample blocks ─► every 4th sample ─► ×2 gain ─► Frame (16 samples)
//!                 │
//!                 └─ trailing block shorter than 64 samples is dropped
//! ```
//!
//! This is decimation without a low-pass filter and without resampling on the
//! way back: `decode` simply concatenates frame payloads. The receiving side
//! plays the result at a fixed rate that has no relation to the capture rate.

pub mod frame;

use serde::{Deserialize, Serialize};

pub use frame::{Frame, Sample, FRAME_BYTES, FRAME_SAMPLES};

/// Keep one sample out of every `DECIMATION`.
pub const DECIMATION: usize = 4;

/// Input samples consumed per frame.
pub const BLOCK_SAMPLES: usize = FRAME_SAMPLES * DECIMATION;

/// Amplitude multiplier applied to each kept sample.
pub const GAIN: i16 = 2;

/// What happens when `sample × GAIN` leaves the i16 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Two's-complement wraparound (loud peaks flip sign).
    #[default]
    Wrap,
    /// Clamp to `i16::MIN..=i16::MAX`.
    Saturate,
}

impl OverflowPolicy {
    fn apply_gain(self, sample: Sample) -> Sample {
        match self {
            OverflowPolicy::Wrap => sample.wrapping_mul(GAIN),
            OverflowPolicy::Saturate => sample.saturating_mul(GAIN),
        }
    }
}

/// Stateless encoder/decoder parameterised by its overflow policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    overflow: OverflowPolicy,
}

impl FrameCodec {
    pub fn new(overflow: OverflowPolicy) -> Self {
        Self { overflow }
    }

    /// Number of frames `encode` yields for `sample_count` input samples.
    pub fn frame_count(sample_count: usize) -> usize {
        sample_count / BLOCK_SAMPLES
    }

    /// Split `audio` into frames. A buffer of `64k + r` samples gives `k` frames.
    pub fn encode(&self, audio: &[Sample]) -> Vec<Frame> {
        audio
            .chunks_exact(BLOCK_SAMPLES)
            .map(|block| {
                let mut payload = [0 as Sample; FRAME_SAMPLES];
                for (out, &sample) in payload
                    .iter_mut()
                    .zip(block.iter().step_by(DECIMATION))
                {
                    *out = self.overflow.apply_gain(sample);
                }
                Frame::new(payload)
            })
            .collect()
    }

    /// Concatenate frame payloads in arrival order.
    pub fn decode<'a, I>(&self, frames: I) -> Vec<Sample>
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        let mut out = Vec::new();
        for frame in frames {
            out.extend_from_slice(frame.samples());
        }
        out
    }

    pub fn is_terminator(frame: &Frame) -> bool {
        frame.is_terminator()
    }

    pub fn terminator() -> Frame {
        Frame::TERMINATOR
    }
}
