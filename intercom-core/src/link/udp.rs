//! UDP stand-in for the radio medium.
//!
//! Each datagram carries exactly one 32-byte frame. Datagrams of any other
//! size are discarded. Like a half-duplex radio, the link hears nothing while
//! transmitting: anything that queued up in the socket during a transmission
//! is flushed when the link returns to `Listening`.
//!
//! The socket is connected to the peer, so datagrams from any other sender
//! never reach us. An unreachable peer (ICMP refused/reset) is not an error
//! for a radio: the frame is simply lost.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use tracing::{debug, info, warn};

use crate::codec::{Frame, FRAME_BYTES};
use crate::error::{IntercomError, Result};
use crate::link::{LinkMode, RadioLink, Received, DEFAULT_PIPE};

/// Largest datagram we bother reading; anything bigger is truncated and dropped.
const RECV_BUF: usize = 512;

pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
    mode: LinkMode,
    scratch: [u8; RECV_BUF],
}

impl UdpLink {
    /// Bind `local` and address every frame to `peer`. Starts in `Listening`.
    pub fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        socket.set_nonblocking(true)?;
        info!(local = %socket.local_addr()?, %peer, "udp link bound");
        Ok(Self {
            socket,
            peer,
            mode: LinkMode::Listening,
            scratch: [0; RECV_BUF],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Read one datagram. `Ok(None)` when the socket is empty.
    fn recv_datagram(&mut self) -> Result<Option<usize>> {
        loop {
            match self.socket.recv(&mut self.scratch) {
                Ok(len) => return Ok(Some(len)),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
                    ) =>
                {
                    debug!(peer = %self.peer, "peer unreachable: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush_pending(&mut self) -> Result<usize> {
        let mut flushed = 0usize;
        while self.recv_datagram()?.is_some() {
            flushed += 1;
        }
        Ok(flushed)
    }
}

impl RadioLink for UdpLink {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        if self.mode != LinkMode::Transmitting {
            return Err(IntercomError::WrongLinkMode {
                expected: LinkMode::Transmitting,
                actual: self.mode,
            });
        }
        let sent = match self.socket.send(&frame.to_bytes()) {
            Ok(sent) => sent,
            // Nobody listening at the peer: the frame is lost, as on air.
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(peer = %self.peer, "peer unreachable: {e}");
                FRAME_BYTES
            }
            Err(e) => return Err(e.into()),
        };
        if sent != FRAME_BYTES {
            return Err(IntercomError::FrameSize { len: sent });
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Received>> {
        if self.mode != LinkMode::Listening {
            return Ok(None);
        }
        while let Some(len) = self.recv_datagram()? {
            match Frame::try_from(&self.scratch[..len]) {
                Ok(frame) => {
                    return Ok(Some(Received {
                        frame,
                        pipe: DEFAULT_PIPE,
                    }))
                }
                Err(e) => warn!("discarding datagram: {e}"),
            }
        }
        Ok(None)
    }

    fn set_mode(&mut self, mode: LinkMode) -> Result<()> {
        let previous = std::mem::replace(&mut self.mode, mode);
        if mode == LinkMode::Listening && previous == LinkMode::Transmitting {
            // The switch stands even if the flush fails.
            match self.flush_pending() {
                Ok(0) => {}
                Ok(flushed) => debug!(flushed, "dropped datagrams received while transmitting"),
                Err(e) => warn!("flush after transmit failed: {e}"),
            }
        }
        Ok(())
    }

    fn mode(&self) -> LinkMode {
        self.mode
    }
}
