//! # intercom-core
//!
//! Half-duplex push-to-talk voice transport over a 32-byte packet link.
//!
//! ## Architecture
//!
//! ```text
//! button ─► Station ─► AudioDevice::stop_capture ─► TransmitPipeline ─► FrameCodec::encode
//!              │                                          │
//!              │                                   RadioLink::send  ⇄  medium
//!              │                                                          │
//!              └─◄ AudioDevice::play ◄─ ReceivePipeline ◄─ RadioLink::poll ◄┘
//! ```
//!
//! One thread drives everything. The cpal callbacks only touch lock-free
//! ring buffers.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod codec;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod link;

// Convenience re-exports for downstream crates
pub use audio::{AudioDevice, CpalAudio, PLAYBACK_SAMPLE_RATE};
pub use codec::{Frame, FrameCodec, OverflowPolicy, Sample};
pub use engine::{PttState, RxPoll, Station, StationConfig};
pub use error::IntercomError;
pub use events::{StationStatus, StationStatusEvent};
pub use input::{PushButton, SharedButton};
pub use link::{LinkMode, LoopbackLink, RadioLink, UdpLink};
