//! Blocking clip playback via cpal.
//!
//! The clip is converted to the output device's native rate up front, loaded
//! into a ring sized to fit it, and drained by the output callback. The caller
//! sleeps in short intervals until the callback reports the ring empty.

#[cfg(feature = "audio-cpal")]
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "audio-cpal")]
use tracing::{debug, error, warn};

#[cfg(any(feature = "audio-cpal", test))]
use crate::buffering::{create_audio_ring, Producer};
use crate::{
    audio::resample::RateConverter,
    buffering::{sample_to_f32, AudioConsumer, Consumer},
    codec::Sample,
    error::{IntercomError, Result},
};

/// Input block size handed to rubato per call.
const RESAMPLE_CHUNK: usize = 256;

/// How often the caller checks whether playback finished.
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Extra time allowed past the clip length before giving up on the device.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Convert a fixed-rate PCM clip into f32 samples at `device_rate`.
pub fn prepare_clip(samples: &[Sample], clip_rate: u32, device_rate: u32) -> Result<Vec<f32>> {
    let floats: Vec<f32> = samples.iter().map(|&s| sample_to_f32(s)).collect();
    let mut converter = RateConverter::new(clip_rate, device_rate, RESAMPLE_CHUNK)?;
    let mut out = converter.process(&floats);
    out.extend(converter.flush());
    Ok(out)
}

/// Pops mono samples and fans each one out to every channel of a frame.
///
/// Sets `drained` once the ring runs dry; the rest of the buffer is silence.
fn fill_frames<T: Copy>(
    data: &mut [T],
    channels: usize,
    consumer: &mut AudioConsumer,
    drained: &AtomicBool,
    silence: T,
    from_f32: impl Fn(f32) -> T,
) {
    for frame in data.chunks_mut(channels) {
        let value = match consumer.try_pop() {
            Some(v) => from_f32(v),
            None => {
                drained.store(true, Ordering::Release);
                silence
            }
        };
        frame.fill(value);
    }
}

/// Wait until `drained` is set or `budget` runs out.
fn wait_for_drain(drained: &AtomicBool, budget: Duration) -> bool {
    let start = Instant::now();
    while !drained.load(Ordering::Acquire) {
        if start.elapsed() >= budget {
            return false;
        }
        std::thread::sleep(DRAIN_POLL);
    }
    true
}

/// Play `samples` at `clip_rate` on the default output device, blocking until done.
#[cfg(feature = "audio-cpal")]
pub fn play_blocking(samples: &[Sample], clip_rate: u32) -> Result<()> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SampleFormat;

    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(IntercomError::NoDefaultOutputDevice)?;
    let supported = device
        .default_output_config()
        .map_err(|e| IntercomError::AudioDevice(e.to_string()))?;
    let device_rate = supported.sample_rate().0;
    let channels = supported.channels().max(1) as usize;
    let format = supported.sample_format();

    let clip = prepare_clip(samples, clip_rate, device_rate)?;
    let (mut producer, mut consumer) = create_audio_ring(clip.len());
    producer.push_slice(&clip);

    debug!(
        samples = samples.len(),
        clip_rate,
        device_rate,
        channels,
        "starting playback"
    );

    let drained = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&drained);
    let config: cpal::StreamConfig = supported.into();
    let err_fn = |err| error!("playback stream error: {err}");

    let stream = match format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _| fill_frames(data, channels, &mut consumer, &flag, 0.0, |v| v),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _| {
                fill_frames(data, channels, &mut consumer, &flag, 0, |v| {
                    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                })
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _| {
                fill_frames(data, channels, &mut consumer, &flag, 32768, |v| {
                    ((v.clamp(-1.0, 1.0) * 32767.0) as i32 + 32768) as u16
                })
            },
            err_fn,
            None,
        ),
        fmt => {
            return Err(IntercomError::AudioStream(format!(
                "unsupported output sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| IntercomError::AudioStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| IntercomError::AudioStream(e.to_string()))?;

    let clip_len = Duration::from_secs_f64(clip.len() as f64 / device_rate as f64);
    if !wait_for_drain(&drained, clip_len + DRAIN_GRACE) {
        warn!("playback did not drain in time; stopping early");
    }
    drop(stream);
    Ok(())
}

#[cfg(not(feature = "audio-cpal"))]
pub fn play_blocking(_samples: &[Sample], _clip_rate: u32) -> Result<()> {
    Err(IntercomError::AudioStream(
        "compiled without audio-cpal feature".into(),
    ))
}
