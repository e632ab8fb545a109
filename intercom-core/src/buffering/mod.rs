//! Lock-free SPSC ring buffers between the cpal callbacks and the control loop.
//!
//! Uses `ringbuf::HeapRb<f32>`, whose `push_slice` / `try_pop` are wait-free
//! and safe to call from a real-time audio callback.

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

use crate::codec::Sample;

/// Producer half, held by whichever side writes (capture callback, playback loader).
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by whichever side reads (control loop, playback callback).
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Capture capacity: 2^22 = 4 194 304 f32 samples ≈ 87.4 s at 48 kHz.
/// One push-to-talk session never gets close.
pub const CAPTURE_RING_CAPACITY: usize = 1 << 22;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_audio_ring(capacity: usize) -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(capacity.max(1)).split()
}

/// Pop everything currently queued.
pub fn drain_all(consumer: &mut AudioConsumer) -> Vec<f32> {
    let mut out = vec![0f32; consumer.occupied_len()];
    let n = consumer.pop_slice(&mut out);
    out.truncate(n);
    out
}

/// `[-1.0, 1.0]` float to PCM, clamping out-of-range input.
pub fn f32_to_sample(value: f32) -> Sample {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as Sample
}

/// PCM to `[-1.0, 1.0]` float.
pub fn sample_to_f32(value: Sample) -> f32 {
    value as f32 / 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn drain_returns_everything_in_order() {
        let (mut prod, mut cons) = create_audio_ring(16);
        prod.push_slice(&[0.1, 0.2, 0.3]);
        assert_eq!(drain_all(&mut cons), vec![0.1, 0.2, 0.3]);
        assert!(drain_all(&mut cons).is_empty());
    }

    #[test]
    fn float_conversion_clamps_and_rounds() {
        assert_eq!(f32_to_sample(0.0), 0);
        assert_eq!(f32_to_sample(1.0), i16::MAX);
        assert_eq!(f32_to_sample(3.5), i16::MAX);
        assert_eq!(f32_to_sample(-7.0), -i16::MAX);
        assert_abs_diff_eq!(sample_to_f32(i16::MIN), -1.0);
        assert_abs_diff_eq!(sample_to_f32(16384), 0.5, epsilon = 1e-6);
    }
}
