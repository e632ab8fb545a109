use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Running counters shared by the pipelines and the controller.
#[derive(Debug, Default)]
pub struct StationDiagnostics {
    pub frames_sent: AtomicUsize,
    pub send_errors: AtomicUsize,
    pub frames_received: AtomicUsize,
    pub link_errors: AtomicUsize,
    pub messages_sent: AtomicUsize,
    pub messages_received: AtomicUsize,
    pub capture_failures: AtomicUsize,
    pub playback_errors: AtomicUsize,
}

impl StationDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            playback_errors: self.playback_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub frames_sent: usize,
    pub send_errors: usize,
    pub frames_received: usize,
    pub link_errors: usize,
    pub messages_sent: usize,
    pub messages_received: usize,
    pub capture_failures: usize,
    pub playback_errors: usize,
}
