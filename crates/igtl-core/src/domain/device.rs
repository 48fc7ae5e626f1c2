//! Validated device name attached to every outgoing payload.
//!
//! The device name identifies the logical data source (for example the
//! tracked probe a transform belongs to).  Receivers use it to route incoming
//! objects, so it is fixed when the sender is configured and never changes
//! while the sender is alive.
//!
//! # Length limit
//!
//! OpenIGTLink headers reserve a 20-byte field for the device name.  The same
//! limit is enforced here so that a name accepted by the sender can always be
//! forwarded unchanged to an OpenIGTLink bridge downstream.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a device name in bytes (UTF-8 encoded).
pub const MAX_DEVICE_NAME_LEN: usize = 20;

/// Name used when no device name is configured.
pub const DEFAULT_DEVICE_NAME: &str = "IGTLSender";

/// Reasons a string is rejected as a device name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceNameError {
    /// The name is empty or consists only of whitespace.
    #[error("device name must not be empty")]
    Empty,

    /// The UTF-8 encoding of the name exceeds [`MAX_DEVICE_NAME_LEN`].
    #[error("device name is {len} bytes long; the limit is {MAX_DEVICE_NAME_LEN}")]
    TooLong { len: usize },

    /// The name contains a control character (newline, NUL, ...).
    #[error("device name contains a control character")]
    ControlCharacter,
}

/// A non-empty device name of at most [`MAX_DEVICE_NAME_LEN`] bytes.
///
/// # Examples
///
/// ```rust
/// use igtl_core::DeviceName;
///
/// let name = DeviceName::new("Probe").unwrap();
/// assert_eq!(name.as_str(), "Probe");
/// assert!(DeviceName::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    /// Validates `name` and wraps it.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceNameError`] if the trimmed name is empty, too long, or
    /// contains control characters.
    pub fn new(name: impl AsRef<str>) -> Result<Self, DeviceNameError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DeviceNameError::Empty);
        }
        if trimmed.len() > MAX_DEVICE_NAME_LEN {
            return Err(DeviceNameError::TooLong { len: trimmed.len() });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(DeviceNameError::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the UTF-8 bytes of the name.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for DeviceName {
    fn default() -> Self {
        Self(DEFAULT_DEVICE_NAME.to_string())
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceName {
    type Error = DeviceNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for DeviceName {
    type Error = DeviceNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> Self {
        name.0
    }
}

impl AsRef<str> for DeviceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
