//! Intercom station entry point.
//!
//! Wires the cpal audio backend, a UDP link and a console-driven push button
//! into a `Station` and runs its loop on the main thread (`cpal::Stream` is
//! `!Send`, so capture must stay here).
//!
//! ```text
//! intercom [--settings <path>] [--list-devices] [--save-settings]
//! ```

mod console;
mod settings;

use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, Arc};

use anyhow::{bail, Context};
use intercom_core::{AudioDevice, CpalAudio, SharedButton, Station, UdpLink};
use settings::{default_settings_path, load_settings, save_settings};
use tracing::info;

#[derive(Debug, Default)]
struct Args {
    settings_path: Option<PathBuf>,
    list_devices: bool,
    save_settings: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let path = it.next().context("--settings needs a path")?;
                args.settings_path = Some(PathBuf::from(path));
            }
            "--list-devices" => args.list_devices = true,
            "--save-settings" => args.save_settings = true,
            "-h" | "--help" => {
                println!("usage: intercom [--settings <path>] [--list-devices] [--save-settings]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    let settings_path = args.settings_path.unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    settings.apply_env_overrides();

    let audio = CpalAudio::new(settings.preferred_input_device.clone());

    if args.list_devices {
        for name in audio.list_devices() {
            println!("{name}");
        }
        return Ok(());
    }

    if args.save_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("writing {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    if !audio.is_available() {
        bail!("audio capture unavailable on this system");
    }

    let link = UdpLink::bind(settings.local_socket()?, settings.peer_socket()?)
        .context("opening radio link")?;

    let button = SharedButton::new();
    let running = Arc::new(AtomicBool::new(true));

    let mut station = Station::new(settings.station_config(), button.clone(), link, audio)
        .context("starting station")?;

    let printer = console::spawn_status_printer(station.subscribe_status());
    let _reader = console::spawn_button_reader(button, Arc::clone(&running));

    println!("Ready. Press Enter to start talking, Enter again to send, q to quit.");
    station.run(&running);

    // Dropping the station closes the status channel and ends the printer.
    let snapshot = station.diagnostics_snapshot();
    drop(station);
    let _ = printer.join();
    info!(
        diagnostics = %serde_json::to_string(&snapshot).unwrap_or_default(),
        "station stopped"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intercom=info,intercom_core=info".into()),
        )
        .init();

    info!("intercom starting");
    if let Err(e) = run() {
        eprintln!("intercom failed: {e:#}");
        std::process::exit(1);
    }
}
