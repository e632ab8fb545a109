//! Push a WAV file through the intercom transport and write what the far end hears.
//!
//! ```text
//! loopback <input.wav> <output.wav> [--saturate] [--drop-every N] [--guard-ms N]
//! ```
//!
//! The input is mixed to mono, encoded, sent over an in-memory link, reassembled
//! by the receive pipeline and written at the fixed playback rate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use intercom_core::{
    buffering::f32_to_sample,
    codec::{Frame, FrameCodec, OverflowPolicy, Sample},
    engine::{ReceivePipeline, RxPoll, StationDiagnostics, TransmitPipeline},
    error::Result as LinkResult,
    link::{LinkMode, LoopbackLink, RadioLink, Received},
    PLAYBACK_SAMPLE_RATE,
};

#[derive(Debug)]
struct Args {
    input: PathBuf,
    output: PathBuf,
    overflow: OverflowPolicy,
    drop_every: Option<usize>,
    guard: Duration,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut overflow = OverflowPolicy::Wrap;
    let mut drop_every = None;
    let mut guard = Duration::from_millis(50);

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--saturate" => overflow = OverflowPolicy::Saturate,
            "--drop-every" => {
                let raw = it.next().context("--drop-every needs a value")?;
                let n: usize = raw.parse().context("--drop-every must be a number")?;
                if n == 0 {
                    bail!("--drop-every must be at least 1");
                }
                drop_every = Some(n);
            }
            "--guard-ms" => {
                let raw = it.next().context("--guard-ms needs a value")?;
                guard = Duration::from_millis(raw.parse().context("--guard-ms must be a number")?);
            }
            "-h" | "--help" => {
                println!(
                    "usage: loopback <input.wav> <output.wav> [--saturate] [--drop-every N] [--guard-ms N]"
                );
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown flag: {other}"),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let [input, output]: [PathBuf; 2] = positional
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected <input.wav> <output.wav>"))?;

    Ok(Args {
        input,
        output,
        overflow,
        drop_every,
        guard,
    })
}

/// Drops every n-th frame on send, the way a noisy channel would.
struct LossyLink {
    inner: LoopbackLink,
    drop_every: Option<usize>,
    sent: usize,
    dropped: usize,
}

impl RadioLink for LossyLink {
    fn send(&mut self, frame: &Frame) -> LinkResult<()> {
        self.sent += 1;
        if let Some(n) = self.drop_every {
            if self.sent % n == 0 {
                self.dropped += 1;
                return Ok(());
            }
        }
        self.inner.send(frame)
    }

    fn poll(&mut self) -> LinkResult<Option<Received>> {
        self.inner.poll()
    }

    fn set_mode(&mut self, mode: LinkMode) -> LinkResult<()> {
        self.inner.set_mode(mode)
    }

    fn mode(&self) -> LinkMode {
        self.inner.mode()
    }
}

fn read_mono(path: &PathBuf) -> anyhow::Result<(Vec<Sample>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| f32_to_sample(frame.iter().sum::<f32>() / frame.len() as f32))
        .collect();
    Ok((mono, spec.sample_rate))
}

fn write_mono(path: &PathBuf, samples: &[Sample]) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: PLAYBACK_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    let (capture, capture_rate) = read_mono(&args.input)?;

    let (near, mut far) = LoopbackLink::pair();
    let mut link = LossyLink {
        inner: near,
        drop_every: args.drop_every,
        sent: 0,
        dropped: 0,
    };

    let diagnostics = Arc::new(StationDiagnostics::default());
    let transmitter = TransmitPipeline::new(
        FrameCodec::new(args.overflow),
        args.guard,
        Arc::clone(&diagnostics),
    );
    let mut receiver = ReceivePipeline::new(Arc::clone(&diagnostics));

    let report = transmitter.transmit(&mut link, &capture)?;

    let mut messages = Vec::new();
    loop {
        match receiver.poll(&mut far) {
            RxPoll::NoFrame => break,
            RxPoll::FrameAppended => {}
            RxPoll::MessageComplete => {
                if let Some(message) = receiver.drain_completed_message() {
                    messages.push(message);
                }
            }
        }
    }
    if receiver.is_receiving() {
        eprintln!(
            "terminator lost: {} samples never completed",
            receiver.pending_len()
        );
    }

    let heard: Vec<Sample> = messages.concat();
    write_mono(&args.output, &heard)?;

    println!(
        "{} samples @ {} Hz -> {} frames sent ({} dropped) -> {} message(s), {} samples @ {} Hz",
        capture.len(),
        capture_rate,
        report.frames_sent,
        link.dropped,
        messages.len(),
        heard.len(),
        PLAYBACK_SAMPLE_RATE
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("loopback failed: {e:#}");
        std::process::exit(1);
    }
}
