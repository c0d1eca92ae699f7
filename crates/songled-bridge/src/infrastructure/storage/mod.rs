//! Storage infrastructure: the TOML configuration file.
//!
//! `config` reads the bridge settings from the platform config directory (or
//! an explicit `--config` path), falls back to defaults on first run, and
//! converts the sections into the settings types the transport and session
//! layers take.

pub mod config;
