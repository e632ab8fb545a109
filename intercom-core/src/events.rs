//! Station status events for operator feedback.
//!
//! The controller publishes a `StationStatusEvent` on every state change. The
//! console front-end turns them into the classic `STANDBY TX ... OK` /
//! `STANDBY RX ... OK` lines.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Broadcast channel capacity: status events buffered for slow consumers.
pub const STATUS_CHANNEL_CAP: usize = 64;

/// What the station is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    /// Listening for inbound frames, button up.
    Idle,
    /// Button held, microphone open.
    Recording,
    /// Sending a message; the loop is blocked.
    Transmitting,
    /// Inbound message in progress.
    Receiving,
    /// Playing a completed inbound message; the loop is blocked.
    Playing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatusEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub status: StationStatus,
    /// Optional human-readable detail (frame counts, error text).
    pub detail: Option<String>,
}

/// Shared status cell plus its broadcast channel.
///
/// Cloning is cheap; all clones publish to the same subscribers.
#[derive(Clone)]
pub struct StatusReporter {
    status: Arc<Mutex<StationStatus>>,
    tx: broadcast::Sender<StationStatusEvent>,
    seq: Arc<AtomicU64>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATUS_CHANNEL_CAP);
        Self {
            status: Arc::new(Mutex::new(StationStatus::Idle)),
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StationStatusEvent> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StationStatus {
        *self.status.lock()
    }

    pub fn set(&self, status: StationStatus, detail: Option<String>) {
        *self.status.lock() = status;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine.
        let _ = self.tx.send(StationStatusEvent {
            seq,
            status,
            detail,
        });
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter")
            .field("status", &self.current())
            .finish_non_exhaustive()
    }
}
