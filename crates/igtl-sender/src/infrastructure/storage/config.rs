//! TOML-based configuration for the sender binary.
//!
//! Read from an explicit `--config` path or from the platform-appropriate
//! config file:
//! - Windows:  `%APPDATA%\igtl-sender\config.toml`
//! - Linux:    `~/.config/igtl-sender/config.toml`
//! - macOS:    `~/Library/Application Support/igtl-sender/config.toml`
//!
//! ```toml
//! [sender]
//! port = 18944
//! device_name = "IGTLSender"
//! autostart = true
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! client_write_timeout_ms = 500
//! shutdown_timeout_ms = 2000
//! ```
//!
//! Every field has a default, so a missing platform file, an empty file, or a
//! file written by an older version all load cleanly.

use std::net::{AddrParseError, IpAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use igtl_core::{DeviceName, DeviceNameError, DEFAULT_DEVICE_NAME};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::application::sender_service::{SenderSettings, DEFAULT_PORT};

/// Error type for configuration loading and validation.
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

    /// `sender.device_name` is not a valid device name.
    #[error("invalid device name: {0}")]
    InvalidDeviceName(#[from] DeviceNameError),

    /// `network.bind_address` is not an IP address.
    #[error("invalid bind address '{value}': {source}")]
    InvalidBindAddress {
        value: String,
        #[source]
        source: AddrParseError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// What is sent and how the process behaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SenderConfig {
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Tag attached to every outgoing object (1 to 20 bytes).
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Whether the binary starts sending right after launch.
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address to bind the listener to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// A client whose write takes longer than this is dropped.
    #[serde(default = "default_client_write_timeout_ms")]
    pub client_write_timeout_ms: u64,
    /// Upper bound on a graceful unbind.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_client_write_timeout_ms() -> u64 {
    500
}
fn default_shutdown_timeout_ms() -> u64 {
    2000
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            device_name: default_device_name(),
            autostart: default_true(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            client_write_timeout_ms: default_client_write_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Validates the file values and builds the service settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDeviceName`] for an empty, overlong or
    /// control-character device name.
    pub fn sender_settings(&self) -> Result<SenderSettings, ConfigError> {
        Ok(SenderSettings {
            port: self.sender.port,
            device_name: DeviceName::new(&self.sender.device_name)?,
            shutdown_timeout: Duration::from_millis(self.network.shutdown_timeout_ms),
        })
    }

    /// Parses `network.bind_address`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if it is not an IP address.
    pub fn bind_address(&self) -> Result<IpAddr, ConfigError> {
        self.network
            .bind_address
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddress {
                value: self.network.bind_address.clone(),
                source,
            })
    }

    /// Per-client write timeout.
    pub fn client_write_timeout(&self) -> Duration {
        Duration::from_millis(self.network.client_write_timeout_ms)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the platform config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration.
///
/// With `explicit` set, that file must exist.  Otherwise the platform file is
/// read, and a missing file (or a missing platform directory) yields
/// [`AppConfig::default()`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let path = match config_file_path() {
        Ok(path) => path,
        Err(ConfigError::NoPlatformConfigDir) => {
            debug!("no platform config directory; using defaults");
            return Ok(AppConfig::default());
        }
        Err(e) => return Err(e),
    };

    match read_config(&path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}; using defaults", path.display());
            Ok(AppConfig::default())
        }
        other => other,
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: AppConfig = toml::from_str(&content)?;
    debug!("loaded config from {}", path.display());
    Ok(cfg)
}

/// Resolves the platform config directory for this application.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("igtl-sender"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("igtl-sender"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("igtl-sender")
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

    fn temp_file(tag: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "igtl_sender_test_{tag}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_match_documented_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.sender.port, 18944);
        assert_eq!(cfg.sender.device_name, "IGTLSender");
        assert!(cfg.sender.autostart);
        assert_eq!(cfg.sender.log_level, "info");
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.network.client_write_timeout_ms, 500);
        assert_eq!(cfg.network.shutdown_timeout_ms, 2000);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_given_fields() {
        // Arrange
        let toml_str = r#"
[sender]
port = 20000
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.sender.port, 20000);
        assert_eq!(cfg.sender.device_name, "IGTLSender");
        assert_eq!(cfg.network, NetworkConfig::default());
    }

    #[test]
    fn test_sender_settings_carry_port_name_and_timeout() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.sender.device_name = "Probe".to_string();
        cfg.network.shutdown_timeout_ms = 750;

        // Act
        let settings = cfg.sender_settings().unwrap();

        // Assert
        assert_eq!(settings.port, 18944);
        assert_eq!(settings.device_name.as_str(), "Probe");
        assert_eq!(settings.shutdown_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_overlong_device_name_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.sender.device_name = "x".repeat(21);

        assert!(matches!(
            cfg.sender_settings(),
            Err(ConfigError::InvalidDeviceName(DeviceNameError::TooLong { len: 21 }))
        ));
    }

    #[test]
    fn test_bind_address_must_be_an_ip() {
        let mut cfg = AppConfig::default();
        assert!(cfg.bind_address().is_ok());

        cfg.network.bind_address = "localhost".to_string();

        assert!(matches!(
            cfg.bind_address(),
            Err(ConfigError::InvalidBindAddress { .. })
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        // Arrange
        let path = temp_file(
            "explicit",
            "[sender]\ndevice_name = \"Tracker\"\n[network]\nclient_write_timeout_ms = 50\n",
        );

        // Act
        let cfg = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(cfg.sender.device_name, "Tracker");
        assert_eq!(cfg.client_write_timeout(), Duration::from_millis(50));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_load_missing_explicit_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_malformed_file_returns_parse_error() {
        let path = temp_file("malformed", "[[[ not valid toml");

        let result = load_config(Some(&path));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("igtl-sender/config.toml"),
                "unexpected config path {path:?}"
            );
        }
    }
}
