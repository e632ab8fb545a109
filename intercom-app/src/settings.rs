//! Persistent station settings (JSON file in the user data directory).
//!
//! Environment variables override the file: `INTERCOM_INPUT_DEVICE`,
//! `INTERCOM_LOCAL_ADDR`, `INTERCOM_PEER_ADDR`, `INTERCOM_GUARD_MS`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use intercom_core::{OverflowPolicy, StationConfig, PLAYBACK_SAMPLE_RATE};
use serde::{Deserialize, Serialize};

const DEFAULT_LOCAL_ADDR: &str = "0.0.0.0:4242";
const DEFAULT_PEER_ADDR: &str = "127.0.0.1:4243";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preferred_input_device: Option<String>,
    pub local_addr: String,
    pub peer_addr: String,
    pub guard_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub playback_sample_rate: u32,
    pub overflow_policy: OverflowPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preferred_input_device: None,
            local_addr: DEFAULT_LOCAL_ADDR.into(),
            peer_addr: DEFAULT_PEER_ADDR.into(),
            guard_interval_ms: 50,
            poll_interval_ms: 1,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            overflow_policy: OverflowPolicy::Wrap,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.local_addr = normalize_addr(&self.local_addr, DEFAULT_LOCAL_ADDR);
        self.peer_addr = normalize_addr(&self.peer_addr, DEFAULT_PEER_ADDR);
        self.guard_interval_ms = self.guard_interval_ms.clamp(1, 1_000);
        self.poll_interval_ms = self.poll_interval_ms.clamp(1, 100);
        self.playback_sample_rate = self.playback_sample_rate.clamp(4_000, 96_000);
    }

    /// Apply `INTERCOM_*` environment overrides, then re-normalize.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(device) = std::env::var("INTERCOM_INPUT_DEVICE") {
            self.preferred_input_device = Some(device);
        }
        if let Ok(addr) = std::env::var("INTERCOM_LOCAL_ADDR") {
            self.local_addr = addr;
        }
        if let Ok(addr) = std::env::var("INTERCOM_PEER_ADDR") {
            self.peer_addr = addr;
        }
        if let Some(ms) = std::env::var("INTERCOM_GUARD_MS")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
        {
            self.guard_interval_ms = ms;
        }
        self.normalize();
    }

    pub fn station_config(&self) -> StationConfig {
        StationConfig {
            guard_interval: Duration::from_millis(self.guard_interval_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            playback_sample_rate: self.playback_sample_rate,
            overflow: self.overflow_policy,
        }
    }

    pub fn local_socket(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.local_addr.parse()?)
    }

    pub fn peer_socket(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.peer_addr.parse()?)
    }
}

fn normalize_addr(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.parse::<SocketAddr>().is_ok() {
        trimmed.into()
    } else {
        fallback.into()
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("intercom")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("intercom")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"peerAddr":"10.0.0.2:5000"}"#).expect("parse settings");
        assert_eq!(settings.peer_addr, "10.0.0.2:5000");
        assert_eq!(settings.guard_interval_ms, 50);
        assert_eq!(settings.playback_sample_rate, PLAYBACK_SAMPLE_RATE);
        assert_eq!(settings.overflow_policy, OverflowPolicy::Wrap);
    }

    #[test]
    fn normalize_clamps_and_repairs() {
        let mut settings = AppSettings {
            preferred_input_device: Some("   ".into()),
            local_addr: "not an address".into(),
            guard_interval_ms: 0,
            poll_interval_ms: 5_000,
            playback_sample_rate: 100,
            ..AppSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.preferred_input_device, None);
        assert_eq!(settings.local_addr, DEFAULT_LOCAL_ADDR);
        assert_eq!(settings.guard_interval_ms, 1);
        assert_eq!(settings.poll_interval_ms, 100);
        assert_eq!(settings.playback_sample_rate, 4_000);
    }

    #[test]
    fn station_config_carries_settings() {
        let settings = AppSettings {
            guard_interval_ms: 80,
            overflow_policy: OverflowPolicy::Saturate,
            ..AppSettings::default()
        };
        let config = settings.station_config();
        assert_eq!(config.guard_interval, Duration::from_millis(80));
        assert_eq!(config.overflow, OverflowPolicy::Saturate);
        assert_eq!(config.playback_sample_rate, PLAYBACK_SAMPLE_RATE);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = std::env::temp_dir().join(format!("intercom-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = AppSettings {
            preferred_input_device: Some("USB Mic".into()),
            peer_addr: "192.168.1.20:4243".into(),
            ..AppSettings::default()
        };
        save_settings(&path, &settings).expect("save settings");
        let loaded = load_settings(&path);
        assert_eq!(loaded.preferred_input_device.as_deref(), Some("USB Mic"));
        assert_eq!(loaded.peer_addr, "192.168.1.20:4243");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn default_path_is_per_user_settings_file() {
        let path = default_settings_path();
        assert!(path.ends_with(Path::new("intercom").join("settings.json")));
        #[cfg(target_os = "windows")]
        if let Some(appdata) = std::env::var_os("APPDATA") {
            assert!(path.starts_with(appdata));
        }
        #[cfg(not(target_os = "windows"))]
        if let Some(data_home) = std::env::var_os("XDG_DATA_HOME") {
            assert!(path.starts_with(data_home));
        }
    }
}
