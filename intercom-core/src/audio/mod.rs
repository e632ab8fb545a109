//! Audio capture/playback capability.
//!
//! `AudioDevice` is what the push-to-talk controller consumes. `CpalAudio` is
//! the production implementation; tests substitute scripted devices.
//!
//! Capture runs at the input device's default rate while playback uses a fixed
//! nominal rate (`PLAYBACK_SAMPLE_RATE`). The two are deliberately not matched.

pub mod capture;
pub mod device;
pub mod playback;
pub mod resample;

use std::sync::{atomic::AtomicBool, Arc};

use tracing::{debug, info};

use crate::{
    buffering::{create_audio_ring, drain_all, f32_to_sample, AudioConsumer, CAPTURE_RING_CAPACITY},
    codec::Sample,
    error::{IntercomError, Result},
};

pub use capture::AudioCapture;
pub use device::{list_input_devices, DeviceInfo};

/// Nominal rate received messages are played at (Hz).
pub const PLAYBACK_SAMPLE_RATE: u32 = 11_100;

/// Contract for audio backends.
pub trait AudioDevice {
    /// Open the microphone and start buffering. Non-blocking.
    fn start_capture(&mut self) -> Result<()>;

    /// Stop buffering and hand back everything captured since `start_capture`.
    fn stop_capture(&mut self) -> Result<Vec<Sample>>;

    /// Play a clip at `sample_rate`, blocking until it finishes.
    fn play(&mut self, samples: &[Sample], sample_rate: u32) -> Result<()>;

    /// Whether the host can capture audio at all.
    fn is_available(&self) -> bool;

    fn list_devices(&self) -> Vec<String>;
}

struct ActiveCapture {
    stream: AudioCapture,
    consumer: AudioConsumer,
}

/// cpal-backed microphone + speaker.
///
/// **Not `Send`** while capturing: `cpal::Stream` stays on its creation thread.
pub struct CpalAudio {
    preferred_input: Option<String>,
    active: Option<ActiveCapture>,
}

impl CpalAudio {
    pub fn new(preferred_input: Option<String>) -> Self {
        Self {
            preferred_input,
            active: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }
}

impl AudioDevice for CpalAudio {
    fn start_capture(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(IntercomError::CaptureAlreadyRunning);
        }
        let (producer, consumer) = create_audio_ring(CAPTURE_RING_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let stream =
            AudioCapture::open_with_preference(producer, running, self.preferred_input.as_deref())?;
        info!(sample_rate = stream.sample_rate, "capture started");
        self.active = Some(ActiveCapture { stream, consumer });
        Ok(())
    }

    fn stop_capture(&mut self) -> Result<Vec<Sample>> {
        let ActiveCapture {
            stream,
            mut consumer,
        } = self.active.take().ok_or(IntercomError::CaptureNotRunning)?;
        stream.stop();
        let sample_rate = stream.sample_rate;
        // Dropping the stream releases the device on this thread.
        drop(stream);

        let samples: Vec<Sample> = drain_all(&mut consumer)
            .into_iter()
            .map(f32_to_sample)
            .collect();
        debug!(samples = samples.len(), sample_rate, "capture stopped");
        Ok(samples)
    }

    fn play(&mut self, samples: &[Sample], sample_rate: u32) -> Result<()> {
        playback::play_blocking(samples, sample_rate)
    }

    fn is_available(&self) -> bool {
        device::capture_available()
    }

    fn list_devices(&self) -> Vec<String> {
        list_input_devices().into_iter().map(|d| d.name).collect()
    }
}

impl std::fmt::Debug for CpalAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalAudio")
            .field("preferred_input", &self.preferred_input)
            .field("capturing", &self.is_capturing())
            .finish()
    }
}
