//! Device channel.
//!
//! [`DeviceChannel`] is the uniform read/write surface over one backend
//! handle. It composes the [`ReportFramer`], a [`TransferQueue`], and the
//! [`Lifecycle`] state machine.
//!
//! # Architecture
//!
//! ```text
//!            write(data)                         read()
//!                │                                 ▲
//!                ▼                                 │
//!   ReportFramer::frame                  ReportFramer::strip
//!                │                                 ▲
//!                ▼                                 │
//!   DeviceBackend::write_bytes            TransferQueue (FIFO + slot)
//!                │                                 ▲
//!                ▼                                 │
//!          native driver ───────────────► InboundSink (backend read loop)
//! ```
//!
//! # Lifecycle
//!
//! 1. Build the channel with a backend and a [`ChannelConfig`]
//! 2. [`initialize`](DeviceChannel::initialize) opens the backend and records
//!    the [`ConnectedDeviceDefinition`]
//! 3. [`read`](DeviceChannel::read) and [`write`](DeviceChannel::write)
//! 4. [`close`](DeviceChannel::close) drops buffered transfers and closes the
//!    backend; the channel cannot be reopened
//! 5. [`dispose`](DeviceChannel::dispose) closes and releases the backend;
//!    dropping the channel disposes it
//!
//! # Concurrency
//!
//! Every operation takes `&self`, so a channel can be shared through an
//! `Arc` by a reading task and a writing task. Only one read may be
//! outstanding; a second fails with [`ChannelError::ReentrantRead`].
//! Overlapping writes are not serialized by the channel and must be avoided
//! by the caller.
//!
//! # Examples
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
//!     channel.write(&[0x01, 0x02], &cancel).await?;
//!     assert_eq!(handle.writes(), vec![(Some(0), vec![0x01, 0x02])]);
//!
//!     handle.deliver(vec![0x00, 0xAA, 0xBB]).unwrap();
//!     let result = channel.read(&cancel).await?;
//!     assert_eq!(result.transferred(), &[0xAA, 0xBB]);
//!
//!     channel.dispose();
//!     Ok(())
//! }
//! ```

use crate::config::{ChannelConfig, Framing};
use crate::error::{ChannelError, Operation, Result};
use crate::framer::{ReadReportTransform, ReportFramer, WriteReportTransform};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::queue::{Dequeue, InboundSink, QueueError, TransferQueue};
use crate::trace::TraceEvent;
use crate::traits::DeviceBackend;
use bytes::Bytes;
use devicelink_core::constants::NO_REPORT_ID;
use devicelink_core::{
    BackendError, ConnectedDeviceDefinition, ReadReport, TransferDirection, TransferResult,
};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// What initialization negotiated with the backend.
#[derive(Debug)]
struct Negotiated {
    definition: ConnectedDeviceDefinition,
    is_read_only: bool,
    framing: Framing,
}

/// Uniform asynchronous read/write channel over one device backend.
pub struct DeviceChannel<B: DeviceBackend> {
    device_id: String,
    backend: B,
    queue: TransferQueue,
    lifecycle: Lifecycle,
    negotiated: OnceLock<Negotiated>,
    config: ChannelConfig,
    read_transform: ReadReportTransform,
    write_transform: WriteReportTransform,
}

impl<B: DeviceBackend> std::fmt::Debug for DeviceChannel<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("device_id", &self.device_id)
            .field("state", &self.lifecycle.state())
            .field("buffered", &self.queue.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<B: DeviceBackend> DeviceChannel<B> {
    /// Create an uninitialized channel that owns `backend`.
    pub fn new(backend: B, config: ChannelConfig) -> Self {
        let device_id = backend.device_id().to_string();
        let read_transform = config
            .read_transform
            .clone()
            .unwrap_or_else(ReportFramer::default_read_transform);
        let write_transform = config
            .write_transform
            .clone()
            .unwrap_or_else(ReportFramer::default_write_transform);

        Self {
            queue: TransferQueue::new(device_id.clone()),
            device_id,
            backend,
            lifecycle: Lifecycle::new(),
            negotiated: OnceLock::new(),
            config,
            read_transform,
            write_transform,
        }
    }

    /// Open the backend and negotiate the device definition.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Disposed`] after disposal
    /// - [`ChannelError::Cancelled`] if `cancel` fires first; an already
    ///   cancelled token fails before the backend is touched
    /// - [`ChannelError::InitializationFailed`] if the backend cannot be
    ///   opened or queried; the channel returns to `Uninitialized`
    /// - [`ChannelError::InvalidState`] if already initialized or closed
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<()> {
        let span = info_span!("device_channel", device_id = %self.device_id, call = "initialize");
        self.initialize_inner(cancel).instrument(span).await
    }

    async fn initialize_inner(&self, cancel: &CancellationToken) -> Result<()> {
        const OP: Operation = Operation::Initialize;

        if self.lifecycle.is_disposed() {
            return Err(ChannelError::disposed(&self.device_id, OP));
        }
        if cancel.is_cancelled() {
            return Err(ChannelError::cancelled(&self.device_id, OP));
        }

        self.lifecycle
            .begin_initialize()
            .map_err(|state| self.state_error(OP, state))?;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(None),
            result = self.backend.open(self.queue.sink()) => result.map_err(Some),
        };
        if let Err(cause) = opened {
            return Err(self.abort_initialize(cause));
        }

        // A close or dispose that ran while the backend was opening owns the
        // state now; the handle it could not close is closed here.
        let state = self.lifecycle.state();
        if state != LifecycleState::Initializing {
            self.close_overtaken_backend();
            return Err(self.state_error(OP, state));
        }

        let queried = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(None),
            result = self.backend.capabilities() => result.map_err(Some),
        };
        let capabilities = match queried {
            Ok(capabilities) => capabilities,
            Err(cause) => return Err(self.abort_initialize(cause)),
        };

        let definition =
            ConnectedDeviceDefinition::from_capabilities(&self.device_id, &capabilities);
        let framing = self
            .config
            .framing
            .unwrap_or_else(|| Framing::for_device_type(definition.device_type));

        if capabilities.is_read_only {
            warn!("Device opened in read-only mode");
        }

        if self
            .negotiated
            .set(Negotiated {
                definition,
                is_read_only: capabilities.is_read_only,
                framing,
            })
            .is_err()
        {
            debug!("Device definition already negotiated");
        }

        if let Err(state) = self.lifecycle.finish_initialize() {
            self.close_overtaken_backend();
            return Err(self.state_error(OP, state));
        }

        info!(
            device_type = %capabilities.device_type,
            read_buffer_size = ?capabilities.read_buffer_size,
            write_buffer_size = ?capabilities.write_buffer_size,
            "Device initialized"
        );
        Ok(())
    }

    /// Undo a failed or cancelled open. `None` means cancellation.
    fn abort_initialize(&self, cause: Option<BackendError>) -> ChannelError {
        const OP: Operation = Operation::Initialize;

        if let Err(e) = self.backend.close() {
            warn!(error = %e, "Failed to close backend after aborted initialization");
        }
        self.lifecycle.abort_initialize();

        match cause {
            Some(source) => {
                error!(error = %source, "Could not initialize device");
                ChannelError::initialization_failed(&self.device_id, source)
            }
            None => {
                warn!("Initialization cancelled");
                ChannelError::cancelled(&self.device_id, OP)
            }
        }
    }

    fn close_overtaken_backend(&self) {
        warn!(state = %self.lifecycle.state(), "Initialization overtaken by close");
        if let Err(e) = self.backend.close() {
            error!(error = %e, "Could not close device");
        }
    }

    /// Read the next inbound transfer.
    ///
    /// On report-framed channels the report ID is stripped and the read
    /// transform applied; raw channels return the transfer untouched.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::ReentrantRead`] if another read is outstanding
    /// - [`ChannelError::Cancelled`] if `cancel` fires first; a transfer that
    ///   arrives at the same time stays queued for the next read
    /// - [`ChannelError::TransferIo`] if the backend reported a read fault
    /// - [`ChannelError::Closed`] if the channel closes while waiting
    pub async fn read(&self, cancel: &CancellationToken) -> Result<TransferResult> {
        let span = info_span!("device_channel", device_id = %self.device_id, call = "read");
        async {
            let raw = self.next_inbound(cancel).await?;
            let result = match self.framing() {
                Framing::Report => (self.read_transform)(self.strip(raw)?),
                Framing::Raw => raw,
            };
            self.trace(
                TransferDirection::Inbound,
                Bytes::copy_from_slice(result.transferred()),
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Read the next inbound transfer as a report, keeping its report ID.
    ///
    /// Raw channels wrap the transfer with report ID 0.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub async fn read_report(&self, cancel: &CancellationToken) -> Result<ReadReport> {
        let span = info_span!("device_channel", device_id = %self.device_id, call = "read_report");
        async {
            let raw = self.next_inbound(cancel).await?;
            let report = match self.framing() {
                Framing::Report => self.strip(raw)?,
                Framing::Raw => ReadReport::from_transfer(NO_REPORT_ID, raw),
            };
            self.trace(
                TransferDirection::Inbound,
                Bytes::copy_from_slice(report.transfer_result().transferred()),
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn next_inbound(&self, cancel: &CancellationToken) -> Result<TransferResult> {
        const OP: Operation = Operation::Read;

        self.ensure_ready(OP)?;
        if cancel.is_cancelled() {
            return Err(ChannelError::cancelled(&self.device_id, OP));
        }

        let pending = match self.queue.dequeue() {
            Ok(Dequeue::Ready(transfer)) => return Ok(transfer),
            Ok(Dequeue::Pending(pending)) => pending,
            Err(e) => return Err(self.queue_error(e)),
        };

        tokio::select! {
            biased;
            result = pending.wait() => result.map_err(|e| self.queue_error(e)),
            _ = cancel.cancelled() => {
                debug!("Read cancelled");
                Err(ChannelError::cancelled(&self.device_id, OP))
            }
        }
    }

    fn strip(&self, raw: TransferResult) -> Result<ReadReport> {
        ReportFramer::strip(&raw)
            .map_err(|e| ChannelError::framing(&self.device_id, Operation::Read, e))
    }

    /// Write `data` to the device.
    ///
    /// On report-framed channels the write transform picks the report ID:
    /// the configured default, or else the first byte of `data`. Raw channels
    /// forward `data` without a report ID. Returns the byte count the backend
    /// reported, excluding the report ID.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::ReadOnly`] if the device was opened read-only; the
    ///   backend is not called
    /// - [`ChannelError::MissingReportId`] if no report ID can be determined;
    ///   the backend is not called
    /// - [`ChannelError::TransferIo`] wrapping any backend failure
    /// - [`ChannelError::Cancelled`] if `cancel` fires first
    pub async fn write(&self, data: &[u8], cancel: &CancellationToken) -> Result<usize> {
        let span = info_span!("device_channel", device_id = %self.device_id, call = "write");
        async {
            self.check_writable(cancel)?;

            match self.framing() {
                Framing::Report => {
                    let report = (self.write_transform)(data, self.config.default_write_report_id)
                        .map_err(|e| ChannelError::framing(&self.device_id, Operation::Write, e))?;
                    self.transmit(Some(report.report_id()), report.payload(), cancel)
                        .await
                }
                Framing::Raw => self.transmit(None, data, cancel).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Write `data` under an explicit report ID, bypassing the write
    /// transform.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write), except that no framing error occurs.
    pub async fn write_report(
        &self,
        data: &[u8],
        report_id: u8,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let span =
            info_span!("device_channel", device_id = %self.device_id, call = "write_report");
        async {
            self.check_writable(cancel)?;
            self.transmit(Some(report_id), data, cancel).await
        }
        .instrument(span)
        .await
    }

    fn check_writable(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_ready(Operation::Write)?;
        if cancel.is_cancelled() {
            return Err(ChannelError::cancelled(&self.device_id, Operation::Write));
        }
        if self.is_read_only() == Some(true) {
            return Err(ChannelError::read_only(&self.device_id));
        }
        Ok(())
    }

    async fn transmit(
        &self,
        report_id: Option<u8>,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        const OP: Operation = Operation::Write;

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Write cancelled");
                return Err(ChannelError::cancelled(&self.device_id, OP));
            }
            result = self.backend.write_bytes(report_id, payload) => result,
        };

        match written {
            Ok(bytes_written) => {
                self.trace(TransferDirection::Outbound, Bytes::copy_from_slice(payload));
                Ok(bytes_written)
            }
            Err(source) => {
                error!(error = %source, ?report_id, "Write failed");
                Err(ChannelError::transfer_io(&self.device_id, OP, source))
            }
        }
    }

    /// Close the channel.
    ///
    /// Buffered transfers are discarded, a waiting reader is released with
    /// [`ChannelError::Closed`], and the backend is closed. Idempotent; a
    /// call made while another close is running returns immediately. Backend
    /// failures are logged, never returned.
    pub fn close(&self) {
        let Some(previous) = self.lifecycle.begin_close() else {
            return;
        };
        let _span =
            info_span!("device_channel", device_id = %self.device_id, call = "close").entered();

        let discarded = self.queue.close();

        if previous != LifecycleState::Uninitialized
            && let Err(e) = self.backend.close()
        {
            error!(error = %e, "Could not close device");
        }

        self.lifecycle.finish_close();
        debug!(discarded, "Device closed");
    }

    /// Dispose the channel: close it, release the backend, and fail every
    /// later operation with [`ChannelError::Disposed`].
    ///
    /// Never fails. Calling it again only logs a warning.
    pub fn dispose(&self) {
        let _span =
            info_span!("device_channel", device_id = %self.device_id, call = "dispose").entered();

        let Some(previous) = self.lifecycle.begin_dispose() else {
            warn!("Device already disposed");
            return;
        };

        info!("Disposing device");
        let discarded = self.queue.close();

        // A close already running, or already finished, has handled the backend.
        if matches!(
            previous,
            LifecycleState::Initializing | LifecycleState::Ready
        ) && let Err(e) = self.backend.close()
        {
            error!(error = %e, "Could not close device");
        }

        if let Err(e) = self.backend.release() {
            error!(error = %e, "Could not release device");
        }

        self.lifecycle.finish_dispose();
        debug!(discarded, "Device disposed");
    }

    /// Platform identifier of the device.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Check if the channel is ready for I/O.
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.state() == LifecycleState::Ready
    }

    /// Whether the device was opened read-only; `None` before initialization.
    pub fn is_read_only(&self) -> Option<bool> {
        self.negotiated.get().map(|n| n.is_read_only)
    }

    /// The negotiated device definition; `None` before initialization.
    pub fn connected_device_definition(&self) -> Option<&ConnectedDeviceDefinition> {
        self.negotiated.get().map(|n| &n.definition)
    }

    /// Input report size, if the device advertised one.
    pub fn read_buffer_size(&self) -> Option<u16> {
        self.connected_device_definition()
            .and_then(|d| d.read_buffer_size)
    }

    /// Output report size, if the device advertised one.
    pub fn write_buffer_size(&self) -> Option<u16> {
        self.connected_device_definition()
            .and_then(|d| d.write_buffer_size)
    }

    /// Report ID used for writes when the caller does not supply one.
    pub fn default_write_report_id(&self) -> Option<u8> {
        self.config.default_write_report_id
    }

    /// Framing in effect. Before initialization only a configured override
    /// is known; report framing is assumed otherwise.
    pub fn framing(&self) -> Framing {
        self.negotiated
            .get()
            .map(|n| n.framing)
            .or(self.config.framing)
            .unwrap_or(Framing::Report)
    }

    /// Number of received transfers waiting to be read.
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    /// Arrival side of the inbound queue, for collaborators that feed it
    /// directly (for example a [`ReadPump`](crate::pump::ReadPump)).
    pub fn inbound_sink(&self) -> InboundSink {
        self.queue.sink()
    }

    /// The owned backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn ensure_ready(&self, operation: Operation) -> Result<()> {
        match self.lifecycle.state() {
            LifecycleState::Ready => Ok(()),
            state => Err(self.state_error(operation, state)),
        }
    }

    fn state_error(&self, operation: Operation, state: LifecycleState) -> ChannelError {
        match state {
            state if state.is_disposed() => ChannelError::disposed(&self.device_id, operation),
            state => ChannelError::invalid_state(&self.device_id, operation, state),
        }
    }

    fn queue_error(&self, error: QueueError) -> ChannelError {
        const OP: Operation = Operation::Read;
        match error {
            QueueError::Reentrant => {
                warn!("Read attempted while another read is in progress");
                ChannelError::reentrant_read(&self.device_id)
            }
            QueueError::Closed if self.lifecycle.is_disposed() => {
                ChannelError::disposed(&self.device_id, OP)
            }
            QueueError::Closed => ChannelError::closed(&self.device_id, OP),
            QueueError::Fault(source) => {
                error!(error = %source, "Read failed");
                ChannelError::transfer_io(&self.device_id, OP, source)
            }
        }
    }

    fn trace(&self, direction: TransferDirection, payload: Bytes) {
        self.config
            .tracer
            .trace(&TraceEvent::new(direction, &self.device_id, payload));
    }
}

impl<B: DeviceBackend> Drop for DeviceChannel<B> {
    fn drop(&mut self) {
        if !self.lifecycle.is_disposed() {
            self.dispose();
        }
    }
}
