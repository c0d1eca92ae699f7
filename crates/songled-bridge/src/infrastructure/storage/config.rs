//! TOML-based configuration for the bridge.
//!
//! Default location:
//! - Windows:  `%APPDATA%\SongLed\config.toml`
//! - Linux:    `~/.config/songled/config.toml`
//! - macOS:    `~/Library/Application Support/SongLed/config.toml`
//!
//! Every section and field is optional; missing ones take the defaults
//! below, so an absent file and an empty file behave the same.
//!
//! ```toml
//! [bridge]
//! log_level = "info"
//! backend = "system"          # or "memory"
//!
//! [serial]
//! # port = "COM6"             # skip discovery entirely
//! baud = 115200
//! # vid = "303A"              # USB filter, hex
//! # pid = "1001"
//! read_timeout_ms = 100
//! probe_window_ms = 1200
//! settle_delay_ms = 1200
//!
//! [session]
//! keepalive_interval_secs = 5
//! await_greeting = false
//! handshake_timeout_ms = 2000
//! sync_on_connect = true
//! sync_on_hello = false
//! # idle_timeout_secs = 30
//!
//! [reconnect]
//! enabled = true
//! interval_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use songled_core::protocol::DEFAULT_MAX_UNTERMINATED;
use thiserror::Error;

use crate::application::session::SessionConfig;
use crate::application::supervisor::ReconnectPolicy;
use crate::infrastructure::audio::BackendKind;
use crate::infrastructure::transport::locator::LocatorConfig;
use crate::infrastructure::transport::serial::{SerialPortOpener, SerialSettings};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A USB id is not a 16-bit hex number.
    #[error("invalid USB {field} {value:?}: expected 1-4 hex digits")]
    InvalidUsbId { field: &'static str, value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level bridge configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub serial: SerialSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub backend: BackendKind,
}

/// Which serial port to use and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialSection {
    /// Explicit port name; disables VID/PID filtering and probing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// USB vendor id filter, hex (`"303A"` or `"0x303A"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vid: Option<String>,
    /// USB product id filter, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Per-port wait for a `HELLO` answer while probing.
    #[serde(default = "default_probe_window_ms")]
    pub probe_window_ms: u64,
    /// Pause after opening the port (covers the board reset on DTR).
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default)]
    pub await_greeting: bool,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub sync_on_connect: bool,
    #[serde(default)]
    pub sync_on_hello: bool,
    /// Close the link after this long without any inbound byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

/// Reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_secs")]
    pub interval_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_baud() -> u32 {
    115_200
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_probe_window_ms() -> u64 {
    1200
}
fn default_settle_delay_ms() -> u64 {
    1200
}
fn default_keepalive_secs() -> u64 {
    5
}
fn default_handshake_timeout_ms() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}
fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_UNTERMINATED
}
fn default_reconnect_secs() -> u64 {
    5
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            backend: BackendKind::default(),
        }
    }
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_baud(),
            vid: None,
            pid: None,
            read_timeout_ms: default_read_timeout_ms(),
            probe_window_ms: default_probe_window_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: default_keepalive_secs(),
            await_greeting: false,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            sync_on_connect: default_true(),
            sync_on_hello: false,
            idle_timeout_secs: None,
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_reconnect_secs(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Parses a USB id written as hex, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUsbId`] for anything that is not 1-4 hex
/// digits.
pub fn parse_usb_id(field: &'static str, value: &str) -> Result<u16, ConfigError> {
    let digits = value
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if digits.is_empty() || digits.len() > 4 {
        return Err(ConfigError::InvalidUsbId {
            field,
            value: value.to_string(),
        });
    }
    u16::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidUsbId {
        field,
        value: value.to_string(),
    })
}

impl SerialSection {
    /// Port-selection settings for the serial link provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUsbId`] for a malformed VID or PID.
    pub fn settings(&self) -> Result<SerialSettings, ConfigError> {
        let vid = self
            .vid
            .as_deref()
            .map(|v| parse_usb_id("vid", v))
            .transpose()?;
        let pid = self
            .pid
            .as_deref()
            .map(|p| parse_usb_id("pid", p))
            .transpose()?;
        Ok(SerialSettings {
            port: self.port.clone(),
            vid,
            pid,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            locator: LocatorConfig {
                probe_window: Duration::from_millis(self.probe_window_ms),
                ..LocatorConfig::default()
            },
        })
    }

    pub fn opener(&self) -> SerialPortOpener {
        SerialPortOpener {
            baud: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs),
            await_greeting: self.await_greeting,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            sync_on_connect: self.sync_on_connect,
            sync_on_hello: self.sync_on_hello,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            max_line_bytes: self.max_line_bytes,
            ..SessionConfig::default()
        }
    }
}

impl ReconnectSection {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.enabled,
            interval: Duration::from_secs(self.interval_secs),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from `explicit` if given, otherwise from the default
/// location.  A missing file yields `AppConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match explicit {
        Some(path) => load_from(path),
        None => load_from(&config_file_path()?),
    }
}

/// Loads the config at `path`, or the defaults if it does not exist.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the `SongLed` folder.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SongLed"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("songled"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SongLed")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("songled-config-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_serial_section_matches_firmware() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.serial.baud, 115_200);
        assert_eq!(cfg.serial.probe_window_ms, 1200);
        assert_eq!(cfg.serial.settle_delay_ms, 1200);
        assert!(cfg.serial.port.is_none());
    }

    #[test]
    fn test_default_session_section_matches_session_defaults() {
        // Arrange
        let from_file = SessionSection::default().to_session_config();
        let built_in = SessionConfig::default();

        // Assert
        assert_eq!(from_file.keepalive_interval, built_in.keepalive_interval);
        assert_eq!(from_file.handshake_timeout, built_in.handshake_timeout);
        assert_eq!(from_file.sync_on_connect, built_in.sync_on_connect);
        assert_eq!(from_file.idle_timeout, None);
    }

    #[test]
    fn test_default_reconnect_policy_is_enabled_every_five_seconds() {
        let policy = ReconnectSection::default().policy();
        assert!(policy.enabled);
        assert_eq!(policy.interval, Duration::from_secs(5));
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_override_only_named_fields() {
        // Arrange
        let toml_str = r#"
[bridge]
backend = "memory"

[serial]
port = "COM6"

[session]
idle_timeout_secs = 30
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.bridge.backend, BackendKind::Memory);
        assert_eq!(cfg.bridge.log_level, "info");
        assert_eq!(cfg.serial.port.as_deref(), Some("COM6"));
        assert_eq!(cfg.serial.baud, 115_200);
        assert_eq!(
            cfg.session.to_session_config().idle_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_unknown_backend_is_a_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[bridge]\nbackend = \"alsa\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let mut cfg = AppConfig::default();
        cfg.serial.vid = Some("303A".into());
        cfg.reconnect.enabled = false;

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&text).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    // ── USB ids ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_usb_id_accepts_plain_and_prefixed_hex() {
        assert_eq!(parse_usb_id("vid", "303A").unwrap(), 0x303A);
        assert_eq!(parse_usb_id("vid", "0x303a").unwrap(), 0x303A);
        assert_eq!(parse_usb_id("pid", "1").unwrap(), 1);
    }

    #[test]
    fn test_parse_usb_id_rejects_garbage() {
        for bad in ["", "0x", "12345", "ZZZZ", "-1"] {
            assert!(
                matches!(
                    parse_usb_id("vid", bad),
                    Err(ConfigError::InvalidUsbId { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serial_settings_carry_filter_and_timing() {
        // Arrange
        let section = SerialSection {
            vid: Some("303A".into()),
            pid: Some("1001".into()),
            probe_window_ms: 500,
            ..SerialSection::default()
        };

        // Act
        let settings = section.settings().unwrap();

        // Assert
        assert_eq!(settings.vid, Some(0x303A));
        assert_eq!(settings.pid, Some(0x1001));
        assert_eq!(settings.locator.probe_window, Duration::from_millis(500));
        assert_eq!(settings.settle_delay, Duration::from_millis(1200));
    }

    // ── File I/O ──────────────────────────────────────────────────────────────

    #[test]
    fn test_load_from_missing_file_returns_defaults() {
        let path = scratch_path("absent.toml");
        assert_eq!(load_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips_through_disk() {
        // Arrange
        let path = scratch_path("config.toml");
        let mut cfg = AppConfig::default();
        cfg.serial.port = Some("/dev/ttyACM0".into());
        cfg.session.sync_on_hello = true;

        // Act
        save_to(&path, &cfg).unwrap();
        let loaded = load_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_load_from_malformed_file_is_parse_error() {
        let path = scratch_path("broken.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
