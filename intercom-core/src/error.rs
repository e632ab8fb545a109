use thiserror::Error;

use crate::link::LinkMode;

/// All errors produced by intercom-core.
#[derive(Debug, Error)]
pub enum IntercomError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("audio capture is not running")]
    CaptureNotRunning,

    #[error("audio capture is already running")]
    CaptureAlreadyRunning,

    #[error("frame must be exactly 32 bytes, got {len}")]
    FrameSize { len: usize },

    #[error("link is {actual:?}, operation requires {expected:?}")]
    WrongLinkMode { expected: LinkMode, actual: LinkMode },

    #[error("link peer disconnected")]
    LinkClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IntercomError>;
