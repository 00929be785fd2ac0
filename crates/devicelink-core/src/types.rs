use crate::constants::REPORT_ID_LENGTH;
use crate::error::BackendError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of device behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeviceType {
    /// Human interface device exchanging report-framed transfers.
    Hid,

    /// Generic USB device exchanging raw bulk/interrupt transfers.
    Usb,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hid => write!(f, "HID"),
            Self::Usb => write!(f, "USB"),
        }
    }
}

/// Direction of a transfer relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Device to host.
    Inbound,

    /// Host to device.
    Outbound,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// Result of one read or write: the buffer plus the number of bytes the
/// device actually moved.
///
/// `bytes_transferred` never exceeds the buffer length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    data: Bytes,
    bytes_transferred: usize,
}

impl TransferResult {
    /// Create a transfer where the whole buffer was moved.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let bytes_transferred = data.len();
        Self {
            data,
            bytes_transferred,
        }
    }

    /// Create a transfer that moved only part of its buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Protocol`] if `bytes_transferred` is larger
    /// than the buffer.
    pub fn with_count(
        data: impl Into<Bytes>,
        bytes_transferred: usize,
    ) -> Result<Self, BackendError> {
        let data = data.into();
        if bytes_transferred > data.len() {
            return Err(BackendError::protocol(format!(
                "Transferred count {} exceeds buffer length {}",
                bytes_transferred,
                data.len()
            )));
        }
        Ok(Self {
            data,
            bytes_transferred,
        })
    }

    /// The transfer buffer.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of bytes actually moved.
    pub fn bytes_transferred(&self) -> usize {
        self.bytes_transferred
    }

    /// The bytes that were actually moved.
    pub fn transferred(&self) -> &[u8] {
        &self.data[..self.bytes_transferred]
    }

    /// Consume the result and return the buffer.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// One framed HID report: the report identifier split off from the payload.
///
/// The identifier is always present, even for devices that only use
/// report 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReport {
    report_id: u8,
    transfer_result: TransferResult,
}

impl ReadReport {
    /// Create a report from an identifier and its payload.
    pub fn new(report_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            report_id,
            transfer_result: TransferResult::new(payload),
        }
    }

    /// Create a report around an existing transfer result.
    pub fn from_transfer(report_id: u8, transfer_result: TransferResult) -> Self {
        Self {
            report_id,
            transfer_result,
        }
    }

    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    pub fn transfer_result(&self) -> &TransferResult {
        &self.transfer_result
    }

    /// The logical payload, without the report identifier.
    pub fn payload(&self) -> &Bytes {
        self.transfer_result.data()
    }

    /// Drop the report identifier and keep the payload transfer.
    pub fn into_transfer_result(self) -> TransferResult {
        self.transfer_result
    }

    /// Wire length of this report including the identifier byte.
    pub fn frame_len(&self) -> usize {
        self.transfer_result.data().len() + REPORT_ID_LENGTH
    }
}

/// Capabilities a backend reports once its handle is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Device class behind the handle.
    pub device_type: DeviceType,

    /// Input report or endpoint size, if the device advertises one.
    pub read_buffer_size: Option<u16>,

    /// Output report or endpoint size, if the device advertises one.
    pub write_buffer_size: Option<u16>,

    /// True when the handle could only be opened for reading.
    pub is_read_only: bool,
}

impl DeviceCapabilities {
    /// Create capabilities for a writable device with unknown buffer sizes.
    pub fn new(device_type: DeviceType) -> Self {
        Self {
            device_type,
            read_buffer_size: None,
            write_buffer_size: None,
            is_read_only: false,
        }
    }

    /// Set both report sizes.
    pub fn with_buffer_sizes(mut self, read: u16, write: u16) -> Self {
        self.read_buffer_size = Some(read);
        self.write_buffer_size = Some(write);
        self
    }

    /// Mark the handle as read-only.
    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }
}

/// Negotiated description of an open device.
///
/// Produced once while a channel initializes and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedDeviceDefinition {
    /// Platform identifier of the device (path, instance id, ...).
    pub device_id: String,

    /// Device class.
    pub device_type: DeviceType,

    /// Input report size, if known.
    pub read_buffer_size: Option<u16>,

    /// Output report size, if known.
    pub write_buffer_size: Option<u16>,
}

impl ConnectedDeviceDefinition {
    /// Create a definition with unknown buffer sizes.
    pub fn new(device_id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            device_id: device_id.into(),
            device_type,
            read_buffer_size: None,
            write_buffer_size: None,
        }
    }

    /// Build the definition from the capabilities a backend reported.
    pub fn from_capabilities(device_id: impl Into<String>, caps: &DeviceCapabilities) -> Self {
        Self {
            device_id: device_id.into(),
            device_type: caps.device_type,
            read_buffer_size: caps.read_buffer_size,
            write_buffer_size: caps.write_buffer_size,
        }
    }

    /// Set the input report size.
    pub fn with_read_buffer_size(mut self, size: u16) -> Self {
        self.read_buffer_size = Some(size);
        self
    }

    /// Set the output report size.
    pub fn with_write_buffer_size(mut self, size: u16) -> Self {
        self.write_buffer_size = Some(size);
        self
    }
}
