//! Backend collaborator traits.
//!
//! A [`DeviceBackend`] is the platform-specific open connection to one device
//! (a hidraw node, a WinUSB handle, an IOKit interface, ...). The channel owns
//! exactly one backend and moves bytes through it; the backend delivers
//! inbound transfers into the [`InboundSink`] it receives when opened, from
//! whatever thread or callback its driver completes on.
//!
//! A [`ReportSource`] is the pull-style alternative for drivers that only
//! offer a blocking or awaited "read N bytes" call. A
//! [`ReadPump`](crate::pump::ReadPump) turns such a source into arrivals on an
//! [`InboundSink`].
//!
//! # Send futures
//!
//! Methods return `impl Future + Send` instead of using bare `async fn` so
//! that channel operations stay spawnable for any backend type. Implementors
//! can still write `async fn` in their impl blocks.
//!
//! # Object Safety
//!
//! These traits are not object safe. Use generics, or the enum wrapper in
//! [`devices`](crate::devices) when the backend is chosen at runtime.

use crate::queue::InboundSink;
use bytes::Bytes;
use devicelink_core::{BackendError, DeviceCapabilities};
use std::future::Future;

/// Platform backend handle for one device.
///
/// # Examples
///
/// ```no_run
/// use devicelink_channel::traits::DeviceBackend;
/// use devicelink_core::BackendError;
///
/// async fn send_ping<B: DeviceBackend>(backend: &B) -> Result<usize, BackendError> {
///     backend.write_bytes(Some(0), &[0x01, 0x00]).await
/// }
/// ```
pub trait DeviceBackend: Send + Sync {
    /// Platform identifier of the device.
    fn device_id(&self) -> &str;

    /// Open the connection and start delivering inbound transfers to
    /// `inbound`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DeviceNotFound`] if the device is gone, or
    /// any other error the platform reports while opening.
    fn open(&self, inbound: InboundSink) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Report the capabilities of the open handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot be queried.
    fn capabilities(
        &self,
    ) -> impl Future<Output = Result<DeviceCapabilities, BackendError>> + Send;

    /// Write one transfer.
    ///
    /// `report_id` is `Some` for report-framed devices and `None` for raw
    /// transfers. Returns the number of payload bytes written, excluding the
    /// report ID.
    ///
    /// # Errors
    ///
    /// Returns an error on any I/O failure.
    fn write_bytes(
        &self,
        report_id: Option<u8>,
        data: &[u8],
    ) -> impl Future<Output = Result<usize, BackendError>> + Send;

    /// Close the connection. Calling it again must be harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform reports one; the channel logs it and
    /// carries on.
    fn close(&self) -> Result<(), BackendError>;

    /// Release any resources left after [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform reports one; the channel logs it and
    /// carries on.
    fn release(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Pull-style inbound source.
pub trait ReportSource: Send {
    /// Read one transfer of at most `max_len` bytes.
    ///
    /// An empty buffer means nothing was available before the source's own
    /// timeout; the caller polls again.
    ///
    /// # Errors
    ///
    /// Returns an error if the device faulted or disconnected. The source is
    /// not read again afterwards.
    fn read_bytes(
        &mut self,
        max_len: usize,
    ) -> impl Future<Output = Result<Bytes, BackendError>> + Send;
}
