//! Enum wrappers for backend dispatch.
//!
//! [`DeviceBackend`] and [`ReportSource`] return `impl Future`, so they cannot
//! be used as `Box<dyn ...>`. When the backend is only known at runtime, wrap
//! it in one of these enums instead; each variant is dispatched statically.
//!
//! # Examples
//!
//! ```
//! use devicelink_channel::devices::AnyBackend;
//! use devicelink_channel::mock::MockBackend;
//! use devicelink_channel::{ChannelConfig, DeviceChannel};
//!
//! let (backend, _handle) = MockBackend::hid("hid-1");
//! let channel = DeviceChannel::new(AnyBackend::Mock(backend), ChannelConfig::hid());
//!
//! assert_eq!(channel.device_id(), "hid-1");
//! ```

use crate::mock::{MockBackend, MockSource};
use crate::queue::InboundSink;
use crate::traits::{DeviceBackend, ReportSource};
use bytes::Bytes;
use devicelink_core::{BackendError, DeviceCapabilities};

/// Enum wrapper for device backend dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyBackend {
    /// Mock backend for development and testing.
    Mock(MockBackend),
}

impl From<MockBackend> for AnyBackend {
    fn from(backend: MockBackend) -> Self {
        Self::Mock(backend)
    }
}

impl DeviceBackend for AnyBackend {
    fn device_id(&self) -> &str {
        match self {
            Self::Mock(backend) => backend.device_id(),
        }
    }

    async fn open(&self, inbound: InboundSink) -> Result<(), BackendError> {
        match self {
            Self::Mock(backend) => backend.open(inbound).await,
        }
    }

    async fn capabilities(&self) -> Result<DeviceCapabilities, BackendError> {
        match self {
            Self::Mock(backend) => backend.capabilities().await,
        }
    }

    async fn write_bytes(&self, report_id: Option<u8>, data: &[u8]) -> Result<usize, BackendError> {
        match self {
            Self::Mock(backend) => backend.write_bytes(report_id, data).await,
        }
    }

    fn close(&self) -> Result<(), BackendError> {
        match self {
            Self::Mock(backend) => backend.close(),
        }
    }

    fn release(&self) -> Result<(), BackendError> {
        match self {
            Self::Mock(backend) => backend.release(),
        }
    }
}

/// Enum wrapper for pull-style source dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySource {
    /// Mock source for development and testing.
    Mock(MockSource),
}

impl From<MockSource> for AnySource {
    fn from(source: MockSource) -> Self {
        Self::Mock(source)
    }
}

impl ReportSource for AnySource {
    async fn read_bytes(&mut self, max_len: usize) -> Result<Bytes, BackendError> {
        match self {
            Self::Mock(source) => source.read_bytes(max_len).await,
        }
    }
}
