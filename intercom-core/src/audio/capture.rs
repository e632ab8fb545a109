//! Microphone capture via cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority. It
//! must not allocate after warm-up, block, or do I/O. Samples are mixed to mono
//! and written straight into an SPSC ring producer; the control loop drains the
//! consumer when the button is released.
//!
//! `cpal::Stream` is `!Send` on most platforms, so `AudioCapture` is created and
//! dropped on the control-loop thread.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    buffering::AudioProducer,
    error::{IntercomError, Result},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active capture stream. **Not `Send`.**
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

/// Mix interleaved frames down to mono into `out`, converting each sample with `to_f32`.
#[cfg(feature = "audio-cpal")]
fn mix_to_mono<T: Copy>(data: &[T], channels: usize, out: &mut Vec<f32>, to_f32: impl Fn(T) -> f32) {
    let frames = data.len() / channels;
    out.resize(frames, 0.0);
    for (f, slot) in out.iter_mut().enumerate() {
        let base = f * channels;
        let sum: f32 = data[base..base + channels].iter().map(|&s| to_f32(s)).sum();
        *slot = sum / channels as f32;
    }
}

#[cfg(feature = "audio-cpal")]
fn push_or_warn(producer: &mut AudioProducer, samples: &[f32]) {
    use crate::buffering::Producer;

    let written = producer.push_slice(samples);
    if written < samples.len() {
        warn!("capture ring full: dropped {} samples", samples.len() - written);
    }
}

impl AudioCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available one.
    ///
    /// Capture runs at the device's default rate.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        mut producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut selected_device = None;

        if let Some(preferred_name) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected_device = devices.find(|device| {
                        device
                            .name()
                            .map(|name| name == preferred_name)
                            .unwrap_or(false)
                    });

                    if selected_device.is_none() {
                        warn!(
                            "preferred input device '{}' not found, falling back",
                            preferred_name
                        );
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = if let Some(device) = selected_device {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| IntercomError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(IntercomError::NoDefaultInputDevice)?;
            warn!("no default input device, falling back to first available input");
            fallback
        };

        let supported = device
            .default_input_config()
            .map_err(|e| IntercomError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        info!(
            device = device.name().unwrap_or_default().as_str(),
            sample_rate, channels, "capture device opened"
        );

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ch = channels.max(1) as usize;
        let flag = Arc::clone(&running);
        let mut mix_buf: Vec<f32> = Vec::new();
        let err_fn = |err| error!("capture stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    if ch == 1 {
                        push_or_warn(&mut producer, data);
                        return;
                    }
                    mix_to_mono(data, ch, &mut mix_buf, |s| s);
                    push_or_warn(&mut producer, &mix_buf);
                },
                err_fn,
                None,
            ),

            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    mix_to_mono(data, ch, &mut mix_buf, |s| s as f32 / 32768.0);
                    push_or_warn(&mut producer, &mix_buf);
                },
                err_fn,
                None,
            ),

            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _info| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    mix_to_mono(data, ch, &mut mix_buf, |s| (s as f32 - 32768.0) / 32768.0);
                    push_or_warn(&mut producer, &mix_buf);
                },
                err_fn,
                None,
            ),

            fmt => {
                return Err(IntercomError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| IntercomError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| IntercomError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(IntercomError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

#[cfg(all(test, not(feature = "audio-cpal")))]
mod tests {
    use super::*;
    use crate::buffering::create_audio_ring;

    #[test]
    fn stub_build_reports_missing_backend() {
        let (producer, _consumer) = create_audio_ring(16);
        let running = Arc::new(AtomicBool::new(true));
        let result = AudioCapture::open_with_preference(producer, running, None);
        assert!(matches!(result, Err(IntercomError::AudioStream(_))));
    }
}
