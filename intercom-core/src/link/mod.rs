//! Link driver abstraction over a half-duplex packet radio.
//!
//! The `RadioLink` trait is the seam between the protocol and whatever moves
//! 32-byte frames: a real radio driver, `UdpLink` between two hosts, or
//! `LoopbackLink` in tests. Delivery is best-effort and FIFO per pipe, with
//! no acknowledgment and no retry.

pub mod loopback;
pub mod udp;

pub use loopback::LoopbackLink;
pub use udp::UdpLink;

use serde::{Deserialize, Serialize};

use crate::codec::Frame;
use crate::error::Result;

/// Reading pipe used by the single point-to-point address.
pub const DEFAULT_PIPE: u8 = 1;

/// Half-duplex radio mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Listening,
    Transmitting,
}

/// A frame taken off the link together with the pipe it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub frame: Frame,
    pub pipe: u8,
}

/// Contract for link drivers.
pub trait RadioLink {
    /// Put one frame on the air. Best effort: callers never retry.
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Non-blocking: `Ok(None)` when no frame is queued.
    fn poll(&mut self) -> Result<Option<Received>>;

    fn set_mode(&mut self, mode: LinkMode) -> Result<()>;

    fn mode(&self) -> LinkMode;
}

impl<L: RadioLink + ?Sized> RadioLink for &mut L {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn poll(&mut self) -> Result<Option<Received>> {
        (**self).poll()
    }

    fn set_mode(&mut self, mode: LinkMode) -> Result<()> {
        (**self).set_mode(mode)
    }

    fn mode(&self) -> LinkMode {
        (**self).mode()
    }
}

impl<L: RadioLink + ?Sized> RadioLink for Box<L> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn poll(&mut self) -> Result<Option<Received>> {
        (**self).poll()
    }

    fn set_mode(&mut self, mode: LinkMode) -> Result<()> {
        (**self).set_mode(mode)
    }

    fn mode(&self) -> LinkMode {
        (**self).mode()
    }
}
