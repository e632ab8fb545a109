//! Audio device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
}

/// Order devices for display: default first, then by name.
pub fn sort_for_display(devices: &mut [DeviceInfo]) {
    devices.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
}

/// List all available audio input devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect::<Vec<_>>();
            sort_for_display(&mut list);
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            default_name
                .map(|name| {
                    vec![DeviceInfo {
                        name,
                        is_default: true,
                    }]
                })
                .unwrap_or_default()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}

/// True when the host exposes at least one input device.
#[cfg(feature = "audio-cpal")]
pub fn capture_available() -> bool {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();
    host.default_input_device().is_some()
        || host
            .input_devices()
            .map(|mut devices| devices.next().is_some())
            .unwrap_or(false)
}

#[cfg(not(feature = "audio-cpal"))]
pub fn capture_available() -> bool {
    false
}
