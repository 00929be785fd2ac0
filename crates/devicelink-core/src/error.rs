//! Error types shared across the device boundary.
//!
//! [`BackendError`] is what a platform backend reports to the channel above
//! it. [`Error`] covers the few core-level failures that are not tied to a
//! device, such as a bad logging filter.

use thiserror::Error;

/// Errors reported by a backend handle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// No device with this identifier could be opened.
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    /// The backend does not implement this operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The device sent or accepted something malformed.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Low-level I/O failure from the native driver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create a new device not found error.
    pub fn device_not_found(device_id: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            device_id: device_id.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Core errors not tied to a particular device.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
