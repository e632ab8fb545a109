//! Console front-end: Enter toggles the push-to-talk level, status events are
//! printed as operator lines.

use std::io::{BufRead, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};

use intercom_core::{SharedButton, StationStatus, StationStatusEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Read stdin lines: an empty line toggles the button, `q` stops the station.
pub fn spawn_button_reader(button: SharedButton, running: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "q" | "quit" => break,
                _ => {
                    let pressed = button.toggle();
                    debug!(pressed, "console button toggled");
                }
            }
            if !running.load(Ordering::Relaxed) {
                return;
            }
        }
        // EOF or quit: release the key and stop the loop.
        button.release();
        running.store(false, Ordering::SeqCst);
    })
}

/// Operator line for a status event, if it warrants one.
pub fn status_line(event: &StationStatusEvent) -> Option<String> {
    match event.status {
        StationStatus::Recording => Some("REC  (Enter to send)".into()),
        StationStatus::Transmitting => Some("STANDBY TX".into()),
        StationStatus::Receiving => Some("STANDBY RX".into()),
        StationStatus::Playing => None,
        StationStatus::Idle => event.detail.clone(),
    }
}

pub fn spawn_status_printer(
    mut rx: broadcast::Receiver<StationStatusEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match rx.blocking_recv() {
            Ok(event) => {
                if let Some(line) = status_line(&event) {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{line}");
                    let _ = out.flush();
                }
            }
            Err(RecvError::Lagged(n)) => warn!("status printer lagged by {n} events"),
            Err(RecvError::Closed) => break,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: StationStatus, detail: Option<&str>) -> StationStatusEvent {
        StationStatusEvent {
            seq: 0,
            status,
            detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn maps_statuses_to_operator_lines() {
        assert_eq!(
            status_line(&event(StationStatus::Transmitting, Some("STANDBY TX"))).as_deref(),
            Some("STANDBY TX")
        );
        assert_eq!(
            status_line(&event(StationStatus::Receiving, None)).as_deref(),
            Some("STANDBY RX")
        );
        assert_eq!(
            status_line(&event(StationStatus::Idle, Some("OK"))).as_deref(),
            Some("OK")
        );
        assert_eq!(status_line(&event(StationStatus::Idle, None)), None);
        assert_eq!(status_line(&event(StationStatus::Playing, None)), None);
    }
}
