//! SongLed bridge: entry point.
//!
//! Connects a SongLed device (ESP32 knob and display) to this machine's
//! audio system.  The device asks for the master volume, changes it, toggles
//! mute and picks the default speaker over a USB-serial line protocol; this
//! process answers.
//!
//! # Usage
//!
//! ```text
//! songled-bridge [OPTIONS]
//!
//! Options:
//!   --config <PATH>     Config file [default: platform config dir]
//!   --port <NAME>       Serial port; skips discovery
//!   --baud <RATE>       Baud rate [default: from config, 115200]
//!   --vid <HEX>         USB vendor id filter
//!   --pid <HEX>         USB product id filter
//!   --backend <KIND>    system | memory
//!   --no-reconnect      Exit when the link drops instead of retrying
//!   --list-ports        Print the serial ports found and exit
//! ```
//!
//! Every option also reads a `SONGLED_*` environment variable; the command
//! line wins over the environment, which wins over the config file.
//!
//! # Threads
//!
//! ```text
//! tokio runtime
//!   ├─ Ctrl+C listener ── clears `running`
//!   └─ spawn_blocking ─── Supervisor (serial reads block ≤ read timeout)
//!                           └─ BridgeSession ─ Dispatcher ─ AudioBackend
//! ```
//!
//! The audio backend is created inside the blocking task: on Windows its COM
//! objects must stay on the thread that created them.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use songled_bridge::application::audio_control::AudioEndpointController;
use songled_bridge::application::supervisor::Supervisor;
use songled_bridge::infrastructure::audio::{open_backend, BackendKind};
use songled_bridge::infrastructure::storage::config::{load_config, AppConfig};
use songled_bridge::infrastructure::transport::serial::{list_ports, SerialLinkProvider};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// SongLed device-to-host audio bridge.
#[derive(Debug, Parser)]
#[command(
    name = "songled-bridge",
    about = "Serves volume, mute and speaker requests from a SongLed device",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "SONGLED_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port to use (e.g. `COM6`, `/dev/ttyACM0`).
    ///
    /// Skips VID/PID filtering and the HELLO probe.
    #[arg(long, env = "SONGLED_PORT")]
    port: Option<String>,

    /// Serial baud rate.
    #[arg(long, env = "SONGLED_BAUD")]
    baud: Option<u32>,

    /// USB vendor id filter, hex.
    #[arg(long, env = "SONGLED_VID")]
    vid: Option<String>,

    /// USB product id filter, hex.
    #[arg(long, env = "SONGLED_PID")]
    pid: Option<String>,

    /// Audio backend.
    #[arg(long, value_enum, env = "SONGLED_BACKEND")]
    backend: Option<BackendKind>,

    /// Exit when the link drops instead of reconnecting.
    #[arg(long, env = "SONGLED_NO_RECONNECT")]
    no_reconnect: bool,

    /// Print the serial ports found and exit.
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file config.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        if let Some(vid) = &self.vid {
            config.serial.vid = Some(vid.clone());
        }
        if let Some(pid) = &self.pid {
            config.serial.pid = Some(pid.clone());
        }
        if let Some(backend) = self.backend {
            config.bridge.backend = backend;
        }
        if self.no_reconnect {
            config.reconnect.enabled = false;
        }
    }
}

fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_to(&mut config);

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the config's `log_level`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.bridge.log_level)),
        )
        .init();

    if cli.list_ports {
        return print_ports();
    }

    let settings = config
        .serial
        .settings()
        .context("invalid [serial] configuration")?;
    let provider = SerialLinkProvider::system(settings, config.serial.opener());
    let session_config = config.session.to_session_config();
    let policy = config.reconnect.policy();
    let backend_kind = config.bridge.backend;

    info!(
        "SongLed bridge starting: backend={backend_kind:?}, port={}, reconnect={}",
        config.serial.port.as_deref().unwrap_or("auto"),
        policy.enabled
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Supervisor on a blocking thread ───────────────────────────────────────
    let bridge = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let backend = open_backend(backend_kind).context("failed to open audio backend")?;
        let supervisor = Supervisor::new(
            provider,
            AudioEndpointController::new(backend),
            session_config,
            policy,
        );
        supervisor.run(&running)?;
        Ok(())
    });

    bridge.await.context("bridge thread panicked")??;

    info!("SongLed bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
