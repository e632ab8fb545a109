//! Sample-rate conversion for playback using a rubato `FastFixedIn` resampler.
//!
//! Received messages are played at a fixed nominal rate (11.1 kHz) but output
//! devices run at their own native rate (commonly 44.1 or 48 kHz).
//! `RateConverter` bridges that gap so the clip *sounds* like it is playing at
//! the nominal rate. When both rates match it is a passthrough and no rubato
//! session is created.
//!
//! ```ignore
//! let mut rc = RateConverter::new(11_100, 48_000, 256)?;
//! let mut out = rc.process(&clip);
//! out.extend(rc.flush());
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{IntercomError, Result};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == device rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input chunks between calls.
    input_buf: Vec<f32>,
    /// How many input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
    ratio: f64,
}

impl RateConverter {
    /// # Errors
    /// Returns `IntercomError::AudioDevice` if rubato fails to initialise.
    pub fn new(source_rate: u32, device_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == device_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
                ratio: 1.0,
            });
        }

        let ratio = device_rate as f64 / source_rate as f64;

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| IntercomError::AudioDevice(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        tracing::debug!(source_rate, device_rate, chunk_size, "playback resampling");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
            ratio,
        })
    }

    /// Process incoming samples, returning converted output (may be empty).
    ///
    /// Input is accumulated until a full `chunk_size` block is available; any
    /// remainder waits for the next call or for `flush`.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];

            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }

            self.input_buf.drain(..self.chunk_size);
        }

        result
    }

    /// Zero-pad and convert whatever is left, trimmed to the remainder's
    /// share of the output.
    pub fn flush(&mut self) -> Vec<f32> {
        if self.resampler.is_none() || self.input_buf.is_empty() {
            self.input_buf.clear();
            return Vec::new();
        }
        let remainder = self.input_buf.len();
        let keep = (remainder as f64 * self.ratio).round() as usize;
        let pad = self.chunk_size - remainder;
        let mut out = self.process(&vec![0f32; pad]);
        out.truncate(keep);
        out
    }

    /// Returns `true` when both rates are equal (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
