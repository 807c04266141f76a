//! TOML-based configuration persistence for the host application.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\serial-kvm\config.toml`
//! - Linux:    `~/.config/serial-kvm/config.toml`
//! - macOS:    `~/Library/Application Support/serial-kvm/config.toml`
//!
//! A missing file yields `AppConfig::default()`; fields missing from an
//! older file fall back to their serde defaults, so upgrades never require
//! hand-editing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skvm_core::domain::report::MouseMode;
use skvm_core::keymap::KeySpace;
use thiserror::Error;

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
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

/// General host behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bound on how long `connect` may spend opening both devices, in ms.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Serial link settings for the CH9329.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    /// Port path, e.g. `"/dev/ttyUSB0"` or `"COM3"`.  Absent means discover
    /// the CH340 bridge by USB VID/PID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Baud rate; the chip's factory default is 9600.
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Outbound frame queue depth.
    #[serde(default = "default_queue_depth")]
    pub write_queue_depth: usize,
    /// How long a send may wait on a full queue before failing, in ms.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

/// Input translation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Key space the shell's raw key codes live in.
    #[serde(default = "default_key_space")]
    pub key_space: KeySpace,
    /// Mouse report family, fixed for the whole session.
    #[serde(default = "default_mouse_mode")]
    pub mouse_mode: MouseMode,
    /// Width of the coordinate space mouse positions arrive in.
    #[serde(default = "default_capture_width")]
    pub capture_width: u32,
    /// Height of the coordinate space mouse positions arrive in.
    #[serde(default = "default_capture_height")]
    pub capture_height: u32,
}

/// Video capture settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoConfig {
    /// UVC device index of the capture stick.
    #[serde(default)]
    pub device_index: u32,
    /// Per-frame poll bound, in ms; exceeding it reports `NoSignal`.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_baud() -> u32 {
    9_600
}
fn default_queue_depth() -> usize {
    128
}
fn default_write_timeout_ms() -> u64 {
    500
}
fn default_key_space() -> KeySpace {
    #[cfg(target_os = "windows")]
    {
        KeySpace::WindowsVk
    }
    #[cfg(not(target_os = "windows"))]
    {
        KeySpace::X11Keysym
    }
}
fn default_mouse_mode() -> MouseMode {
    MouseMode::Absolute
}
fn default_capture_width() -> u32 {
    1920
}
fn default_capture_height() -> u32 {
    1080
}
fn default_poll_timeout_ms() -> u64 {
    500
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: default_baud(),
            write_queue_depth: default_queue_depth(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            key_space: default_key_space(),
            mouse_mode: default_mouse_mode(),
            capture_width: default_capture_width(),
            capture_height: default_capture_height(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from disk, returning `AppConfig::default()` if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the directory if needed.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("serial-kvm"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("serial-kvm"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("serial-kvm")
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

    #[test]
    fn test_default_serial_settings_match_chip_factory_state() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.serial.baud, 9_600);
        assert!(cfg.serial.port.is_none(), "default is VID/PID discovery");
    }

    #[test]
    fn test_default_mouse_mode_is_absolute() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.input.mouse_mode, MouseMode::Absolute);
    }

    #[test]
    fn test_default_log_level_is_info() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.host.log_level, "info");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.serial.port = Some("/dev/ttyUSB0".to_string());
        cfg.input.mouse_mode = MouseMode::Relative;
        cfg.video.device_index = 2;

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        // Arrange - only the serial section, only the port key.
        let partial = r#"
            [serial]
            port = "COM3"
        "#;

        // Act
        let cfg: AppConfig = toml::from_str(partial).expect("deserialize");

        // Assert
        assert_eq!(cfg.serial.port.as_deref(), Some("COM3"));
        assert_eq!(cfg.serial.baud, 9_600);
        assert_eq!(cfg.input.capture_width, 1920);
        assert_eq!(cfg.video.poll_timeout_ms, 500);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_key_space_uses_snake_case_names() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [input]
            key_space = "x11_keysym"
            mouse_mode = "relative"
        "#,
        )
        .expect("deserialize");
        assert_eq!(cfg.input.key_space, KeySpace::X11Keysym);
        assert_eq!(cfg.input.mouse_mode, MouseMode::Relative);
    }
}
