//! Channel configuration.
//!
//! [`ChannelConfig`] is accepted when a channel is built. Every field is
//! optional and can be overridden on its own for devices with nonstandard
//! framing. [`ChannelSettings`] is the serializable subset that can be loaded
//! from a configuration file.

use crate::framer::{ReadReportTransform, WriteReportTransform};
use crate::trace::{LogTracer, TransferTracer};
use devicelink_core::DeviceType;
use devicelink_core::constants::NO_REPORT_ID;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How transfers on a channel are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Leading report-ID byte is stripped on read and supplied on write.
    Report,

    /// Bytes pass through untouched.
    Raw,
}

impl Framing {
    /// The framing a device type uses unless overridden.
    pub fn for_device_type(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Hid => Self::Report,
            _ => Self::Raw,
        }
    }
}

/// Configuration accepted at channel construction.
///
/// # Examples
///
/// ```
/// use devicelink_channel::config::{ChannelConfig, Framing};
///
/// let config = ChannelConfig::default()
///     .with_default_write_report_id(5)
///     .with_framing(Framing::Report);
///
/// assert_eq!(config.default_write_report_id, Some(5));
/// ```
#[derive(Clone)]
pub struct ChannelConfig {
    /// Report ID used for every write. When `None`, the first byte of the
    /// written data is taken as the report ID.
    pub default_write_report_id: Option<u8>,

    /// Framing override. When `None`, the device type decides.
    pub framing: Option<Framing>,

    /// Replaces the default inbound report conversion.
    pub read_transform: Option<ReadReportTransform>,

    /// Replaces the default outbound framing.
    pub write_transform: Option<WriteReportTransform>,

    /// Receiver of data transfer trace events.
    pub tracer: Arc<dyn TransferTracer>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_write_report_id: None,
            framing: None,
            read_transform: None,
            write_transform: None,
            tracer: Arc::new(LogTracer),
        }
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("default_write_report_id", &self.default_write_report_id)
            .field("framing", &self.framing)
            .field("read_transform", &self.read_transform.is_some())
            .field("write_transform", &self.write_transform.is_some())
            .field("tracer", &self.tracer)
            .finish()
    }
}

impl ChannelConfig {
    /// Configuration for HID devices without numbered reports: writes go out
    /// under report ID 0.
    pub fn hid() -> Self {
        Self::default().with_default_write_report_id(NO_REPORT_ID)
    }

    /// Set the report ID used for every write.
    pub fn with_default_write_report_id(mut self, report_id: u8) -> Self {
        self.default_write_report_id = Some(report_id);
        self
    }

    /// Override the framing chosen from the device type.
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = Some(framing);
        self
    }

    /// Replace the inbound report conversion.
    pub fn with_read_transform(mut self, transform: ReadReportTransform) -> Self {
        self.read_transform = Some(transform);
        self
    }

    /// Replace the outbound framing.
    pub fn with_write_transform(mut self, transform: WriteReportTransform) -> Self {
        self.write_transform = Some(transform);
        self
    }

    /// Inject the transfer tracer.
    pub fn with_tracer(mut self, tracer: Arc<dyn TransferTracer>) -> Self {
        self.tracer = tracer;
        self
    }
}

/// Serializable channel settings.
///
/// # Examples
///
/// ```
/// use devicelink_channel::config::{ChannelSettings, Framing};
///
/// let settings: ChannelSettings =
///     serde_json::from_str(r#"{"default_write_report_id": 2, "framing": "raw"}"#).unwrap();
/// let config = settings.into_config();
///
/// assert_eq!(config.default_write_report_id, Some(2));
/// assert_eq!(config.framing, Some(Framing::Raw));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelSettings {
    pub default_write_report_id: Option<u8>,
    pub framing: Option<Framing>,
}

impl ChannelSettings {
    /// Build a configuration with the default tracer and transforms.
    pub fn into_config(self) -> ChannelConfig {
        ChannelConfig {
            default_write_report_id: self.default_write_report_id,
            framing: self.framing,
            ..ChannelConfig::default()
        }
    }
}

impl From<ChannelSettings> for ChannelConfig {
    fn from(settings: ChannelSettings) -> Self {
        settings.into_config()
    }
}
