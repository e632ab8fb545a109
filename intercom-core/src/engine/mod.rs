//! `Station`: the push-to-talk controller.
//!
//! ## State machine
//!
//! ```text
//!            button held, capture opened
//!   ┌──────┐ ─────────────────────────────► ┌───────────┐
//!   │ Idle │                                │ Recording │
//!   └──────┘ ◄───────────────────────────── └───────────┘
//!            button up: stop capture, transmit (blocking)
//! ```
//!
//! Every iteration, whatever the state, the receive pipeline is polled once
//! and a completed message is played back (blocking).
//!
//! ## Threading
//!
//! Everything runs on one thread. Transmission and playback block the loop,
//! so nothing is polled meanwhile: a message finishing during a transmission
//! is only noticed afterwards, and frames arriving during playback depend on
//! the link's own queue. A button release cannot cancel a transmission, and
//! a lost terminator leaves reception waiting indefinitely.

pub mod diagnostics;
pub mod receive;
pub mod transmit;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
    audio::{AudioDevice, PLAYBACK_SAMPLE_RATE},
    codec::{FrameCodec, OverflowPolicy, Sample, FRAME_SAMPLES},
    error::Result,
    events::{StationStatus, StationStatusEvent, StatusReporter},
    input::PushButton,
    link::{LinkMode, RadioLink},
};

pub use diagnostics::{DiagnosticsSnapshot, StationDiagnostics};
pub use receive::{ReceivePipeline, RxPoll};
pub use transmit::{TransmitPipeline, TransmitReport};

/// Configuration for `Station`.
#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Pause between the last data frame and the terminator. Default: 50 ms.
    pub guard_interval: Duration,
    /// Sleep after an iteration that found nothing on the link. Default: 1 ms.
    pub poll_interval: Duration,
    /// Rate received messages are played at (Hz). Default: 11 100.
    pub playback_sample_rate: u32,
    /// Gain overflow handling in the encoder. Default: wrap.
    pub overflow: OverflowPolicy,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            guard_interval: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            overflow: OverflowPolicy::Wrap,
        }
    }
}

/// Controller state. Transmitting and playing are blocking actions, not states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttState {
    Idle,
    Recording,
}

/// One intercom endpoint: button, link and audio driven by a single loop.
pub struct Station<B, L, A> {
    config: StationConfig,
    button: B,
    link: L,
    audio: A,
    state: PttState,
    transmitter: TransmitPipeline,
    receiver: ReceivePipeline,
    status: StatusReporter,
    diagnostics: Arc<StationDiagnostics>,
    /// Set while capture keeps failing for the current press.
    capture_retrying: bool,
}

impl<B, L, A> Station<B, L, A>
where
    B: PushButton,
    L: RadioLink,
    A: AudioDevice,
{
    /// Build a station and put the link in `Listening`.
    pub fn new(config: StationConfig, button: B, mut link: L, audio: A) -> Result<Self> {
        link.set_mode(LinkMode::Listening)?;

        let diagnostics = Arc::new(StationDiagnostics::default());
        let transmitter = TransmitPipeline::new(
            FrameCodec::new(config.overflow),
            config.guard_interval,
            Arc::clone(&diagnostics),
        );
        let receiver = ReceivePipeline::new(Arc::clone(&diagnostics));

        Ok(Self {
            config,
            button,
            link,
            audio,
            state: PttState::Idle,
            transmitter,
            receiver,
            status: StatusReporter::new(),
            diagnostics,
            capture_retrying: false,
        })
    }

    pub fn state(&self) -> PttState {
        self.state
    }

    pub fn status(&self) -> StationStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> tokio::sync::broadcast::Receiver<StationStatusEvent> {
        self.status.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    /// Run one loop iteration and report what the receive poll saw.
    pub fn tick(&mut self) -> RxPoll {
        let pressed = self.button.is_pressed();
        match (self.state, pressed) {
            (PttState::Idle, true) => self.begin_recording(),
            (PttState::Recording, false) => self.finish_recording(),
            (PttState::Idle, false) => self.capture_retrying = false,
            (PttState::Recording, true) => {}
        }

        let poll = self.receiver.poll(&mut self.link);
        match poll {
            RxPoll::FrameAppended => {
                if self.receiver.pending_len() == FRAME_SAMPLES {
                    self.status
                        .set(StationStatus::Receiving, Some("STANDBY RX".into()));
                }
            }
            RxPoll::MessageComplete => {
                if let Some(message) = self.receiver.drain_completed_message() {
                    self.play_message(&message);
                }
            }
            RxPoll::NoFrame => {}
        }
        poll
    }

    /// Loop until `running` is cleared. Idle iterations sleep `poll_interval`.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("station loop started");
        while running.load(Ordering::Relaxed) {
            if self.tick() == RxPoll::NoFrame {
                std::thread::sleep(self.config.poll_interval);
            }
        }
        if self.state == PttState::Recording {
            // Shutdown while keyed: discard the capture rather than transmit.
            if let Err(e) = self.audio.stop_capture() {
                warn!("failed to stop capture on shutdown: {e}");
            }
            self.state = PttState::Idle;
        }
        info!(diagnostics = ?self.diagnostics.snapshot(), "station loop stopped");
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn begin_recording(&mut self) {
        match self.audio.start_capture() {
            Ok(()) => {
                self.state = PttState::Recording;
                self.capture_retrying = false;
                self.status.set(StationStatus::Recording, None);
                debug!("button pressed, recording");
            }
            Err(e) => {
                StationDiagnostics::bump(&self.diagnostics.capture_failures);
                if !self.capture_retrying {
                    warn!("failed to start audio capture: {e}");
                    self.status.set(
                        StationStatus::Idle,
                        Some(format!("capture failed: {e}")),
                    );
                }
                self.capture_retrying = true;
            }
        }
    }

    fn finish_recording(&mut self) {
        self.state = PttState::Idle;
        let audio = match self.audio.stop_capture() {
            Ok(samples) => samples,
            Err(e) => {
                error!("failed to stop audio capture: {e}");
                self.status
                    .set(StationStatus::Idle, Some(format!("capture failed: {e}")));
                return;
            }
        };

        self.status
            .set(StationStatus::Transmitting, Some("STANDBY TX".into()));
        match self.transmitter.transmit(&mut self.link, &audio) {
            Ok(report) => self.status.set(
                StationStatus::Idle,
                Some(format!("OK ({} frames)", report.frames_sent)),
            ),
            Err(e) => {
                error!("transmission failed: {e}");
                self.status
                    .set(StationStatus::Idle, Some(format!("transmit failed: {e}")));
            }
        }
    }

    fn play_message(&mut self, message: &[Sample]) {
        if message.is_empty() {
            debug!("empty message completed, nothing to play");
            return;
        }
        self.status.set(StationStatus::Playing, None);
        let outcome = self.audio.play(message, self.config.playback_sample_rate);
        if let Err(e) = &outcome {
            StationDiagnostics::bump(&self.diagnostics.playback_errors);
            warn!("playback failed: {e}");
        }
        let resume = match self.state {
            PttState::Idle => StationStatus::Idle,
            PttState::Recording => StationStatus::Recording,
        };
        let detail = match outcome {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("playback failed: {e}"),
        };
        self.status.set(resume, Some(detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use crate::codec::{Frame, BLOCK_SAMPLES};
    use crate::error::IntercomError;
    use crate::input::SharedButton;
    use crate::link::LoopbackLink;

    #[derive(Default)]
    struct ScriptedAudio {
        captures: VecDeque<Vec<Sample>>,
        start_failures: usize,
        capturing: bool,
        played: Vec<(Vec<Sample>, u32)>,
    }

    impl AudioDevice for ScriptedAudio {
        fn start_capture(&mut self) -> Result<()> {
            if self.start_failures > 0 {
                self.start_failures -= 1;
                return Err(IntercomError::AudioDevice("device busy".into()));
            }
            self.capturing = true;
            Ok(())
        }

        fn stop_capture(&mut self) -> Result<Vec<Sample>> {
            if !self.capturing {
                return Err(IntercomError::CaptureNotRunning);
            }
            self.capturing = false;
            Ok(self.captures.pop_front().unwrap_or_default())
        }

        fn play(&mut self, samples: &[Sample], sample_rate: u32) -> Result<()> {
            self.played.push((samples.to_vec(), sample_rate));
            Ok(())
        }

        fn is_available(&self) -> bool {
            true
        }

        fn list_devices(&self) -> Vec<String> {
            vec!["scripted".into()]
        }
    }

    fn fast_config() -> StationConfig {
        StationConfig {
            guard_interval: Duration::from_millis(1),
            ..StationConfig::default()
        }
    }

    fn station(
        audio: ScriptedAudio,
    ) -> (
        Station<SharedButton, LoopbackLink, ScriptedAudio>,
        SharedButton,
        LoopbackLink,
    ) {
        let button = SharedButton::new();
        let (near, far) = LoopbackLink::pair();
        let station = Station::new(fast_config(), button.clone(), near, audio).unwrap();
        (station, button, far)
    }

    fn drain_far(far: &mut LoopbackLink) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(rx) = far.poll().unwrap() {
            frames.push(rx.frame);
        }
        frames
    }

    #[test]
    fn capture_failure_is_retried_while_button_held() {
        let audio = ScriptedAudio {
            start_failures: 2,
            ..Default::default()
        };
        let (mut station, button, _far) = station(audio);

        button.press();
        station.tick();
        assert_eq!(station.state(), PttState::Idle);
        station.tick();
        assert_eq!(station.state(), PttState::Idle);
        station.tick();
        assert_eq!(station.state(), PttState::Recording);
        assert_eq!(station.diagnostics_snapshot().capture_failures, 2);
    }

    #[test]
    fn release_transmits_the_capture_and_returns_to_idle() {
        let capture: Vec<Sample> = (1..=(BLOCK_SAMPLES * 4 + 10) as i16).collect();
        let audio = ScriptedAudio {
            captures: VecDeque::from(vec![capture.clone()]),
            ..Default::default()
        };
        let (mut station, button, mut far) = station(audio);

        button.press();
        station.tick();
        assert_eq!(station.state(), PttState::Recording);
        assert!(drain_far(&mut far).is_empty(), "nothing sent while recording");

        button.release();
        station.tick();
        assert_eq!(station.state(), PttState::Idle);
        assert_eq!(station.link().mode(), LinkMode::Listening);

        let frames = drain_far(&mut far);
        let mut expected = FrameCodec::default().encode(&capture);
        expected.push(Frame::TERMINATOR);
        assert_eq!(frames, expected);
    }

    #[test]
    fn completed_message_is_played_at_the_fixed_rate() {
        let (mut station, _button, mut far) = station(ScriptedAudio::default());
        let payload = Frame::new([42; FRAME_SAMPLES]);

        far.set_mode(LinkMode::Transmitting).unwrap();
        far.send(&payload).unwrap();
        far.send(&payload).unwrap();
        far.send(&Frame::TERMINATOR).unwrap();

        assert_eq!(station.tick(), RxPoll::FrameAppended);
        assert_eq!(station.status(), StationStatus::Receiving);
        assert_eq!(station.tick(), RxPoll::FrameAppended);
        assert_eq!(station.tick(), RxPoll::MessageComplete);
        assert_eq!(station.tick(), RxPoll::NoFrame);

        let played = &station.audio().played;
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].0, vec![42; FRAME_SAMPLES * 2]);
        assert_eq!(played[0].1, PLAYBACK_SAMPLE_RATE);
        assert_eq!(station.status(), StationStatus::Idle);
    }

    #[test]
    fn empty_message_is_not_played() {
        let (mut station, _button, mut far) = station(ScriptedAudio::default());
        far.set_mode(LinkMode::Transmitting).unwrap();
        far.send(&Frame::TERMINATOR).unwrap();

        assert_eq!(station.tick(), RxPoll::MessageComplete);
        assert!(station.audio().played.is_empty());
        assert_eq!(station.diagnostics_snapshot().messages_received, 1);
    }

    #[test]
    fn status_events_follow_a_push_to_talk_cycle() {
        let audio = ScriptedAudio {
            captures: VecDeque::from(vec![vec![9; BLOCK_SAMPLES * 2]]),
            ..Default::default()
        };
        let (mut station, button, _far) = station(audio);
        let mut events = station.subscribe_status();

        button.press();
        station.tick();
        button.release();
        station.tick();

        let mut seen = Vec::new();
        while let Ok(ev) = events.try_recv() {
            seen.push((ev.status, ev.detail));
        }
        assert_eq!(
            seen,
            vec![
                (StationStatus::Recording, None),
                (StationStatus::Transmitting, Some("STANDBY TX".to_string())),
                (StationStatus::Idle, Some("OK (2 frames)".to_string())),
            ]
        );
    }

    #[test]
    fn run_stops_when_flag_cleared() {
        let (mut station, _button, _far) = station(ScriptedAudio::default());
        let running = AtomicBool::new(false);
        station.run(&running);
        assert_eq!(station.state(), PttState::Idle);
    }
}
