//! In-memory link pair: what one endpoint sends, the other polls.
//!
//! Frames are carried as 32-byte wire buffers over unbounded crossbeam
//! channels, so the byte format is exercised exactly as on air.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::codec::{Frame, FRAME_BYTES};
use crate::error::{IntercomError, Result};
use crate::link::{LinkMode, RadioLink, Received, DEFAULT_PIPE};

/// One end of a simulated point-to-point radio.
#[derive(Debug)]
pub struct LoopbackLink {
    tx: Sender<[u8; FRAME_BYTES]>,
    rx: Receiver<[u8; FRAME_BYTES]>,
    mode: LinkMode,
}

impl LoopbackLink {
    /// Create two connected endpoints, both starting in `Listening`.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (
            Self {
                tx: a_tx,
                rx: a_rx,
                mode: LinkMode::Listening,
            },
            Self {
                tx: b_tx,
                rx: b_rx,
                mode: LinkMode::Listening,
            },
        )
    }

    /// Frames waiting on this endpoint.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }
}

impl RadioLink for LoopbackLink {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        if self.mode != LinkMode::Transmitting {
            return Err(IntercomError::WrongLinkMode {
                expected: LinkMode::Transmitting,
                actual: self.mode,
            });
        }
        self.tx
            .send(frame.to_bytes())
            .map_err(|_| IntercomError::LinkClosed)
    }

    fn poll(&mut self) -> Result<Option<Received>> {
        // A transmitting radio hears nothing; queued frames wait.
        if self.mode != LinkMode::Listening {
            return Ok(None);
        }
        match self.rx.try_recv() {
            Ok(bytes) => Ok(Some(Received {
                frame: Frame::from_bytes(&bytes),
                pipe: DEFAULT_PIPE,
            })),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(IntercomError::LinkClosed),
        }
    }

    fn set_mode(&mut self, mode: LinkMode) -> Result<()> {
        if self.mode != mode {
            debug!(?mode, "loopback link mode change");
        }
        self.mode = mode;
        Ok(())
    }

    fn mode(&self) -> LinkMode {
        self.mode
    }
}
