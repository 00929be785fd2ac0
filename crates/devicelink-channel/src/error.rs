//! Error types for device channel operations.
//!
//! Every [`ChannelError`] names the device and the operation that failed so a
//! log line or a surfaced error can be traced back without extra context.
//! Framing failures are detected before any backend call is made.

use crate::lifecycle::LifecycleState;
use devicelink_core::BackendError;
use std::fmt;

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Public operation of a device channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    Read,
    Write,
    Close,
    Dispose,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => write!(f, "initialize"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Close => write!(f, "close"),
            Self::Dispose => write!(f, "dispose"),
        }
    }
}

/// Errors raised by the pure framing functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// No default report ID is configured and the data has no first byte
    /// to take one from.
    #[error("A report ID must be specified: no default is configured and the data is empty")]
    MissingReportId,

    /// An inbound frame was too short to carry a report ID.
    #[error("Inbound report is empty")]
    EmptyReport,
}

/// Errors that can occur during device channel operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// The channel has been disposed.
    #[error("Device {device_id} has been disposed ({operation})")]
    Disposed {
        device_id: String,
        operation: Operation,
    },

    /// A read was started while another read on the same channel is unresolved.
    #[error("Device {device_id}: a read is already in progress ({operation})")]
    ReentrantRead {
        device_id: String,
        operation: Operation,
    },

    /// A write was attempted on a device opened in read-only mode.
    #[error("Device {device_id} was opened in read-only mode ({operation})")]
    ReadOnly {
        device_id: String,
        operation: Operation,
    },

    /// Write framing could not determine a report ID.
    #[error("Device {device_id}: a report ID must be specified ({operation})")]
    MissingReportId {
        device_id: String,
        operation: Operation,
    },

    /// Any other framing failure.
    #[error("Device {device_id}: framing failed during {operation}: {source}")]
    Framing {
        device_id: String,
        operation: Operation,
        #[source]
        source: FramingError,
    },

    /// Backend I/O failed. Callers may retry.
    #[error("Device {device_id}: I/O failure during {operation}: {source}")]
    TransferIo {
        device_id: String,
        operation: Operation,
        #[source]
        source: BackendError,
    },

    /// The caller cancelled the operation.
    #[error("Device {device_id}: {operation} was cancelled")]
    Cancelled {
        device_id: String,
        operation: Operation,
    },

    /// The backend handle could not be opened or queried.
    #[error("Device {device_id}: initialization failed: {source}")]
    InitializationFailed {
        device_id: String,
        #[source]
        source: BackendError,
    },

    /// The operation is not valid in the current lifecycle state.
    #[error("Device {device_id}: cannot {operation} while {state}")]
    InvalidState {
        device_id: String,
        operation: Operation,
        state: LifecycleState,
    },

    /// A pending read was released because the channel closed.
    #[error("Device {device_id}: channel closed during {operation}")]
    Closed {
        device_id: String,
        operation: Operation,
    },
}

impl ChannelError {
    /// Create a new disposed error.
    pub fn disposed(device_id: impl Into<String>, operation: Operation) -> Self {
        Self::Disposed {
            device_id: device_id.into(),
            operation,
        }
    }

    /// Create a new reentrant read error.
    pub fn reentrant_read(device_id: impl Into<String>) -> Self {
        Self::ReentrantRead {
            device_id: device_id.into(),
            operation: Operation::Read,
        }
    }

    /// Create a new read-only error.
    pub fn read_only(device_id: impl Into<String>) -> Self {
        Self::ReadOnly {
            device_id: device_id.into(),
            operation: Operation::Write,
        }
    }

    /// Map a framing failure, keeping `MissingReportId` as its own variant.
    pub fn framing(
        device_id: impl Into<String>,
        operation: Operation,
        source: FramingError,
    ) -> Self {
        match source {
            FramingError::MissingReportId => Self::MissingReportId {
                device_id: device_id.into(),
                operation,
            },
            source => Self::Framing {
                device_id: device_id.into(),
                operation,
                source,
            },
        }
    }

    /// Wrap a backend I/O failure.
    pub fn transfer_io(
        device_id: impl Into<String>,
        operation: Operation,
        source: BackendError,
    ) -> Self {
        Self::TransferIo {
            device_id: device_id.into(),
            operation,
            source,
        }
    }

    /// Create a new cancellation error.
    pub fn cancelled(device_id: impl Into<String>, operation: Operation) -> Self {
        Self::Cancelled {
            device_id: device_id.into(),
            operation,
        }
    }

    /// Create a new initialization failure.
    pub fn initialization_failed(device_id: impl Into<String>, source: BackendError) -> Self {
        Self::InitializationFailed {
            device_id: device_id.into(),
            source,
        }
    }

    /// Create a new invalid state error.
    pub fn invalid_state(
        device_id: impl Into<String>,
        operation: Operation,
        state: LifecycleState,
    ) -> Self {
        Self::InvalidState {
            device_id: device_id.into(),
            operation,
            state,
        }
    }

    /// Create a new closed error.
    pub fn closed(device_id: impl Into<String>, operation: Operation) -> Self {
        Self::Closed {
            device_id: device_id.into(),
            operation,
        }
    }

    /// Identifier of the device the failure belongs to.
    pub fn device_id(&self) -> &str {
        match self {
            Self::Disposed { device_id, .. }
            | Self::ReentrantRead { device_id, .. }
            | Self::ReadOnly { device_id, .. }
            | Self::MissingReportId { device_id, .. }
            | Self::Framing { device_id, .. }
            | Self::TransferIo { device_id, .. }
            | Self::Cancelled { device_id, .. }
            | Self::InitializationFailed { device_id, .. }
            | Self::InvalidState { device_id, .. }
            | Self::Closed { device_id, .. } => device_id,
        }
    }

    /// Operation that was attempted.
    pub fn operation(&self) -> Operation {
        match self {
            Self::InitializationFailed { .. } => Operation::Initialize,
            Self::Disposed { operation, .. }
            | Self::ReentrantRead { operation, .. }
            | Self::ReadOnly { operation, .. }
            | Self::MissingReportId { operation, .. }
            | Self::Framing { operation, .. }
            | Self::TransferIo { operation, .. }
            | Self::Cancelled { operation, .. }
            | Self::InvalidState { operation, .. }
            | Self::Closed { operation, .. } => *operation,
        }
    }

    /// True if the caller aborted the operation, as opposed to a device fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// True if repeating the operation on the same channel may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransferIo { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_disposed_error() {
        let error = ChannelError::disposed("hid-1", Operation::Initialize);
        assert!(matches!(error, ChannelError::Disposed { .. }));
        assert_eq!(
            error.to_string(),
            "Device hid-1 has been disposed (initialize)"
        );
    }

    #[test]
    fn test_framing_maps_missing_report_id() {
        let error = ChannelError::framing("hid-1", Operation::Write, FramingError::MissingReportId);
        assert!(matches!(error, ChannelError::MissingReportId { .. }));

        let error = ChannelError::framing("hid-1", Operation::Read, FramingError::EmptyReport);
        assert!(matches!(error, ChannelError::Framing { .. }));
        assert_eq!(error.operation(), Operation::Read);
    }

    #[test]
    fn test_transfer_io_keeps_cause() {
        let cause = BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "usb timeout",
        ));
        let error = ChannelError::transfer_io("usb-7", Operation::Write, cause);

        assert!(error.is_retryable());
        assert_eq!(error.device_id(), "usb-7");
        let source = error.source().expect("cause is kept");
        assert!(source.to_string().contains("usb timeout"));
    }

    #[test]
    fn test_cancelled_is_not_retryable() {
        let error = ChannelError::cancelled("hid-1", Operation::Read);
        assert!(error.is_cancelled());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_invalid_state_display() {
        let error =
            ChannelError::invalid_state("hid-1", Operation::Read, LifecycleState::Uninitialized);
        assert_eq!(
            error.to_string(),
            "Device hid-1: cannot read while uninitialized"
        );
    }

    #[test]
    fn test_initialization_failed_operation() {
        let error =
            ChannelError::initialization_failed("hid-1", BackendError::device_not_found("hid-1"));
        assert_eq!(error.operation(), Operation::Initialize);
        assert_eq!(error.device_id(), "hid-1");
    }

    #[test]
    fn test_every_error_names_device() {
        let errors = vec![
            ChannelError::disposed("dev", Operation::Dispose),
            ChannelError::reentrant_read("dev"),
            ChannelError::read_only("dev"),
            ChannelError::closed("dev", Operation::Read),
        ];

        for error in errors {
            assert!(error.to_string().contains("dev"));
            let _ = format!("{:?}", error);
        }
    }
}
