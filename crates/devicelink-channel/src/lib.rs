//! Uniform asynchronous device channel for HID and USB devices.
//!
//! This crate turns a platform backend handle into a [`DeviceChannel`] with
//! one read/write surface regardless of the device class behind it. Callers
//! never deal with HID report identifiers, inbound buffering, or lifecycle
//! bookkeeping themselves.
//!
//! # Design Philosophy
//!
//! - **Async-first**: reads and writes are `async` and cancellable through a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken).
//! - **Backend-agnostic**: platform code lives behind the
//!   [`DeviceBackend`] trait; the channel owns exactly one backend.
//! - **Shared access**: every operation takes `&self`, so a channel can be
//!   read from one task and written from another.
//! - **Error-aware**: every failure is a [`ChannelError`] naming the device
//!   and the operation.
//!
//! # Framing
//!
//! HID devices exchange reports whose first byte is a report identifier.
//! On report-framed channels that byte is stripped from every read and
//! supplied on every write by [`ReportFramer`]; raw channels pass bytes
//! through untouched. See [`framer`] for the write report ID rules.
//!
//! # Usage
//!
//! ```
//! use devicelink_channel::{ChannelConfig, DeviceChannel};
//! use devicelink_channel::mock::MockBackend;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> devicelink_channel::Result<()> {
//!     let (backend, handle) = MockBackend::hid("hid-1");
//!     let channel = DeviceChannel::new(backend, ChannelConfig::hid());
//!     let cancel = CancellationToken::new();
//!
//!     channel.initialize(&cancel).await?;
//!
//!     handle.deliver(vec![0x00, 0x3F, 0x23]).unwrap();
//!     let result = channel.read(&cancel).await?;
//!     assert_eq!(result.transferred(), &[0x3F, 0x23]);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Mock Implementations
//!
//! [`mock`] provides a controllable backend and pull-style source for
//! development and testing without hardware.

pub mod channel;
pub mod config;
pub mod devices;
pub mod error;
pub mod framer;
pub mod lifecycle;
pub mod mock;
pub mod pump;
pub mod queue;
pub mod trace;
pub mod traits;

// Re-export commonly used types for convenience
pub use channel::DeviceChannel;
pub use config::{ChannelConfig, ChannelSettings, Framing};
pub use error::{ChannelError, FramingError, Operation, Result};
pub use framer::{ReadReportTransform, ReportFramer, WriteReportTransform};
pub use lifecycle::LifecycleState;
pub use queue::{InboundSink, TransferQueue};
pub use trace::{LogTracer, NullTracer, RecordingTracer, TraceEvent, TransferTracer};
pub use traits::{DeviceBackend, ReportSource};

pub use devicelink_core::{
    BackendError, ConnectedDeviceDefinition, DeviceCapabilities, DeviceType, ReadReport,
    TransferDirection, TransferResult,
};
