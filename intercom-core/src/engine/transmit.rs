//! Transmit pipeline: one captured buffer → one message on the link.
//!
//! ```text
//! set_mode(Transmitting) → send data frames → guard delay → send terminator → set_mode(Listening)
//! ```
//!
//! The whole sequence blocks the caller. There is no acknowledgment, retry or
//! cancellation; a failed send just shortens the message at the receiver.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    codec::{FrameCodec, Sample},
    engine::diagnostics::StationDiagnostics,
    error::Result,
    link::{LinkMode, RadioLink},
};

/// What actually went out during one `transmit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitReport {
    pub frames_sent: usize,
    pub frames_failed: usize,
    pub terminator_sent: bool,
}

pub struct TransmitPipeline {
    codec: FrameCodec,
    guard_interval: Duration,
    diagnostics: Arc<StationDiagnostics>,
}

impl TransmitPipeline {
    pub fn new(
        codec: FrameCodec,
        guard_interval: Duration,
        diagnostics: Arc<StationDiagnostics>,
    ) -> Self {
        Self {
            codec,
            guard_interval,
            diagnostics,
        }
    }

    /// Encode `audio` and send it as one message.
    ///
    /// A buffer too short for a single frame still produces the terminator.
    ///
    /// # Errors
    /// Only mode switches fail the call. The link is always asked to return
    /// to `Listening`, even when the switch to `Transmitting` failed.
    pub fn transmit<L: RadioLink + ?Sized>(
        &self,
        link: &mut L,
        audio: &[Sample],
    ) -> Result<TransmitReport> {
        if let Err(e) = link.set_mode(LinkMode::Transmitting) {
            let _ = link.set_mode(LinkMode::Listening);
            return Err(e);
        }

        let frames = self.codec.encode(audio);
        let mut report = TransmitReport::default();

        for (idx, frame) in frames.iter().enumerate() {
            match link.send(frame) {
                Ok(()) => {
                    report.frames_sent += 1;
                    StationDiagnostics::bump(&self.diagnostics.frames_sent);
                }
                Err(e) => {
                    report.frames_failed += 1;
                    StationDiagnostics::bump(&self.diagnostics.send_errors);
                    warn!(frame = idx, "frame send failed: {e}");
                }
            }
        }

        // Let the last data frame clear the air before the terminator.
        std::thread::sleep(self.guard_interval);

        match link.send(&FrameCodec::terminator()) {
            Ok(()) => report.terminator_sent = true,
            Err(e) => {
                StationDiagnostics::bump(&self.diagnostics.send_errors);
                warn!("terminator send failed, receiver will not complete: {e}");
            }
        }

        link.set_mode(LinkMode::Listening)?;
        StationDiagnostics::bump(&self.diagnostics.messages_sent);

        if frames.is_empty() {
            debug!(samples = audio.len(), "buffer shorter than one block, sent terminator only");
        }
        info!(
            samples = audio.len(),
            frames = report.frames_sent,
            failed = report.frames_failed,
            "message transmitted"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Frame, BLOCK_SAMPLES};
    use crate::error::IntercomError;
    use crate::link::Received;
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Mode(LinkMode),
        Send(Frame),
        Poll,
    }

    #[derive(Default)]
    struct RecordingLink {
        calls: Vec<Call>,
        mode: Option<LinkMode>,
        fail_sends: Vec<usize>,
        sends: usize,
        sent_at: Vec<Instant>,
    }

    impl RadioLink for RecordingLink {
        fn send(&mut self, frame: &Frame) -> Result<()> {
            let idx = self.sends;
            self.sends += 1;
            if self.fail_sends.contains(&idx) {
                return Err(IntercomError::LinkClosed);
            }
            self.calls.push(Call::Send(*frame));
            self.sent_at.push(Instant::now());
            Ok(())
        }

        fn poll(&mut self) -> Result<Option<Received>> {
            self.calls.push(Call::Poll);
            Ok(None)
        }

        fn set_mode(&mut self, mode: LinkMode) -> Result<()> {
            self.mode = Some(mode);
            self.calls.push(Call::Mode(mode));
            Ok(())
        }

        fn mode(&self) -> LinkMode {
            self.mode.unwrap_or(LinkMode::Listening)
        }
    }

    fn pipeline() -> TransmitPipeline {
        TransmitPipeline::new(
            FrameCodec::default(),
            Duration::from_millis(1),
            Arc::new(StationDiagnostics::default()),
        )
    }

    #[test]
    fn sends_frames_then_terminator_between_mode_switches() {
        let audio: Vec<Sample> = (1..=(BLOCK_SAMPLES * 2) as i16).collect();
        let expected = FrameCodec::default().encode(&audio);
        let mut link = RecordingLink::default();

        let report = pipeline().transmit(&mut link, &audio).unwrap();

        assert_eq!(
            link.calls,
            vec![
                Call::Mode(LinkMode::Transmitting),
                Call::Send(expected[0]),
                Call::Send(expected[1]),
                Call::Send(Frame::TERMINATOR),
                Call::Mode(LinkMode::Listening),
            ]
        );
        assert_eq!(
            report,
            TransmitReport {
                frames_sent: 2,
                frames_failed: 0,
                terminator_sent: true
            }
        );
        assert_eq!(link.mode(), LinkMode::Listening);
    }

    #[test]
    fn short_buffer_sends_terminator_only() {
        let mut link = RecordingLink::default();
        let report = pipeline().transmit(&mut link, &[5; 63]).unwrap();
        assert_eq!(
            link.calls,
            vec![
                Call::Mode(LinkMode::Transmitting),
                Call::Send(Frame::TERMINATOR),
                Call::Mode(LinkMode::Listening),
            ]
        );
        assert_eq!(report.frames_sent, 0);
        assert!(report.terminator_sent);
    }

    #[test]
    fn failed_sends_are_skipped_not_retried() {
        let audio: Vec<Sample> = vec![7; BLOCK_SAMPLES * 3];
        let mut link = RecordingLink {
            fail_sends: vec![1],
            ..Default::default()
        };
        let tx = pipeline();

        let report = tx.transmit(&mut link, &audio).unwrap();

        assert_eq!(report.frames_sent, 2);
        assert_eq!(report.frames_failed, 1);
        assert_eq!(link.sends, 4, "three data frames plus terminator, no retries");
        let snap = tx.diagnostics.snapshot();
        assert_eq!(snap.send_errors, 1);
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.messages_sent, 1);
    }

    #[test]
    fn never_polls_while_transmitting() {
        let mut link = RecordingLink::default();
        pipeline()
            .transmit(&mut link, &vec![1; BLOCK_SAMPLES * 4])
            .unwrap();
        assert!(!link.calls.contains(&Call::Poll));
    }

    #[test]
    fn terminator_waits_out_the_guard_interval() {
        let guard = Duration::from_millis(40);
        let tx = TransmitPipeline::new(
            FrameCodec::default(),
            guard,
            Arc::new(StationDiagnostics::default()),
        );
        let mut link = RecordingLink::default();

        tx.transmit(&mut link, &vec![3; BLOCK_SAMPLES * 2]).unwrap();

        assert_eq!(link.sent_at.len(), 3);
        let last_data = link.sent_at[1];
        let terminator = link.sent_at[2];
        assert!(
            terminator.duration_since(last_data) >= guard,
            "terminator followed last data frame after {:?}",
            terminator.duration_since(last_data)
        );
    }
}
