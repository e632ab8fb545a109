//! Receive pipeline: reassemble inbound frames into messages.
//!
//! Each `poll` takes at most one frame off the link. Data frames grow the
//! pending buffer; the all-zero terminator completes the message. A frame of
//! genuine silence is indistinguishable from the terminator and also completes
//! the message; this is part of the wire protocol.
//!
//! A completed message must be drained before reception resumes: until then
//! `poll` keeps reporting `MessageComplete` and leaves the link untouched.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    codec::{FrameCodec, Sample, FRAME_SAMPLES},
    engine::diagnostics::StationDiagnostics,
    link::RadioLink,
};

/// Outcome of one receive poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxPoll {
    NoFrame,
    FrameAppended,
    MessageComplete,
}

pub struct ReceivePipeline {
    pending: Vec<Sample>,
    completed: bool,
    diagnostics: Arc<StationDiagnostics>,
}

impl ReceivePipeline {
    pub fn new(diagnostics: Arc<StationDiagnostics>) -> Self {
        Self {
            pending: Vec::new(),
            completed: false,
            diagnostics,
        }
    }

    /// Query the link once.
    ///
    /// Link errors are logged and counted, and read as `NoFrame`.
    pub fn poll<L: RadioLink + ?Sized>(&mut self, link: &mut L) -> RxPoll {
        if self.completed {
            return RxPoll::MessageComplete;
        }

        let received = match link.poll() {
            Ok(Some(received)) => received,
            Ok(None) => return RxPoll::NoFrame,
            Err(e) => {
                StationDiagnostics::bump(&self.diagnostics.link_errors);
                warn!("link poll failed: {e}");
                return RxPoll::NoFrame;
            }
        };
        StationDiagnostics::bump(&self.diagnostics.frames_received);

        if FrameCodec::is_terminator(&received.frame) {
            self.completed = true;
            StationDiagnostics::bump(&self.diagnostics.messages_received);
            debug!(
                samples = self.pending.len(),
                pipe = received.pipe,
                "message complete"
            );
            return RxPoll::MessageComplete;
        }

        self.pending.extend_from_slice(received.frame.samples());
        RxPoll::FrameAppended
    }

    /// Hand off the completed message and start a new one.
    ///
    /// `None` unless the last poll reported `MessageComplete`.
    pub fn drain_completed_message(&mut self) -> Option<Vec<Sample>> {
        if !self.completed {
            return None;
        }
        self.completed = false;
        Some(std::mem::take(&mut self.pending))
    }

    /// Samples accumulated for the message in progress.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Frames accumulated for the message in progress.
    pub fn pending_frames(&self) -> usize {
        self.pending.len() / FRAME_SAMPLES
    }

    /// True between a message's first data frame and its terminator.
    pub fn is_receiving(&self) -> bool {
        !self.pending.is_empty() && !self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Frame, FRAME_SAMPLES};
    use crate::error::{IntercomError, Result};
    use crate::link::{LinkMode, Received, DEFAULT_PIPE};
    use std::collections::VecDeque;

    /// Link that replays a fixed script of poll results.
    struct ScriptedLink {
        script: VecDeque<Result<Option<Frame>>>,
        polls: usize,
    }

    impl ScriptedLink {
        fn frames(frames: &[Frame]) -> Self {
            Self {
                script: frames.iter().map(|f| Ok(Some(*f))).collect(),
                polls: 0,
            }
        }
    }

    impl RadioLink for ScriptedLink {
        fn send(&mut self, _frame: &Frame) -> Result<()> {
            Ok(())
        }

        fn poll(&mut self) -> Result<Option<Received>> {
            self.polls += 1;
            match self.script.pop_front() {
                Some(Ok(Some(frame))) => Ok(Some(Received {
                    frame,
                    pipe: DEFAULT_PIPE,
                })),
                Some(Ok(None)) | None => Ok(None),
                Some(Err(e)) => Err(e),
            }
        }

        fn set_mode(&mut self, _mode: LinkMode) -> Result<()> {
            Ok(())
        }

        fn mode(&self) -> LinkMode {
            LinkMode::Listening
        }
    }

    fn frame(base: i16) -> Frame {
        let mut samples = [0; FRAME_SAMPLES];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = base + i as i16;
        }
        Frame::new(samples)
    }

    fn receiver() -> ReceivePipeline {
        ReceivePipeline::new(Arc::new(StationDiagnostics::default()))
    }

    #[test]
    fn reassembles_message_up_to_terminator() {
        let f1 = frame(1);
        let f2 = frame(100);
        let mut link = ScriptedLink::frames(&[f1, f2, Frame::TERMINATOR]);
        let mut rx = receiver();

        assert_eq!(rx.poll(&mut link), RxPoll::FrameAppended);
        assert!(rx.is_receiving());
        assert_eq!(rx.drain_completed_message(), None);
        assert_eq!(rx.poll(&mut link), RxPoll::FrameAppended);
        assert_eq!(rx.pending_frames(), 2);
        assert_eq!(rx.poll(&mut link), RxPoll::MessageComplete);

        let message = rx.drain_completed_message().expect("message complete");
        assert_eq!(message, FrameCodec::default().decode(&[f1, f2]));
        assert_eq!(rx.pending_len(), 0);
        assert!(!rx.is_receiving());
        assert_eq!(rx.drain_completed_message(), None);
        assert_eq!(rx.poll(&mut link), RxPoll::NoFrame);
    }

    #[test]
    fn silent_audio_frame_ends_the_message() {
        // Sixteen zero samples of real audio read as the terminator; the
        // frame after it starts a new message.
        let silence = Frame::new([0; FRAME_SAMPLES]);
        let mut link = ScriptedLink::frames(&[frame(5), silence, frame(9), Frame::TERMINATOR]);
        let mut rx = receiver();

        assert_eq!(rx.poll(&mut link), RxPoll::FrameAppended);
        assert_eq!(rx.poll(&mut link), RxPoll::MessageComplete);
        assert_eq!(rx.drain_completed_message().map(|m| m.len()), Some(FRAME_SAMPLES));

        assert_eq!(rx.poll(&mut link), RxPoll::FrameAppended);
        assert_eq!(rx.poll(&mut link), RxPoll::MessageComplete);
        assert_eq!(
            rx.drain_completed_message(),
            Some(frame(9).samples().to_vec())
        );
    }

    #[test]
    fn lone_terminator_completes_an_empty_message() {
        let mut link = ScriptedLink::frames(&[Frame::TERMINATOR]);
        let mut rx = receiver();
        assert_eq!(rx.poll(&mut link), RxPoll::MessageComplete);
        assert_eq!(rx.drain_completed_message(), Some(vec![]));
    }

    #[test]
    fn undrained_message_holds_off_the_link() {
        let mut link = ScriptedLink::frames(&[Frame::TERMINATOR, frame(3)]);
        let mut rx = receiver();
        assert_eq!(rx.poll(&mut link), RxPoll::MessageComplete);
        assert_eq!(rx.poll(&mut link), RxPoll::MessageComplete);
        assert_eq!(link.polls, 1);
        rx.drain_completed_message();
        assert_eq!(rx.poll(&mut link), RxPoll::FrameAppended);
    }

    #[test]
    fn link_errors_read_as_no_frame() {
        let mut link = ScriptedLink {
            script: VecDeque::from(vec![Err(IntercomError::LinkClosed), Ok(Some(frame(2)))]),
            polls: 0,
        };
        let mut rx = receiver();
        assert_eq!(rx.poll(&mut link), RxPoll::NoFrame);
        assert_eq!(rx.poll(&mut link), RxPoll::FrameAppended);
        let snap = rx.diagnostics.snapshot();
        assert_eq!(snap.link_errors, 1);
        assert_eq!(snap.frames_received, 1);
    }
}
