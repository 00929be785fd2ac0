//! Read pump for pull-style sources.
//!
//! Some drivers only expose "read up to N bytes" and never push. A
//! [`ReadPump`] polls such a [`ReportSource`] in its own task and delivers
//! every non-empty read to an [`InboundSink`], so the channel above sees the
//! same arrivals it would from a push-style backend.
//!
//! ```text
//! ┌──────────────┐  read_bytes  ┌──────────┐  deliver  ┌───────────────┐
//! │ ReportSource │─────────────►│ pump task│──────────►│ TransferQueue │
//! └──────────────┘              └──────────┘   fault   └───────────────┘
//! ```
//!
//! The task ends when the sink's channel closes, when the source faults
//! (the fault is forwarded first), or on [`ReadPumpHandle::shutdown`].
//!
//! # Examples
//!
//! ```
//! use devicelink_channel::mock::{MockBackend, MockSource};
//! use devicelink_channel::pump::ReadPump;
//! use devicelink_channel::{ChannelConfig, DeviceChannel};
//! use devicelink_core::constants::DEFAULT_READ_LENGTH;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> devicelink_channel::Result<()> {
//!     let (backend, _handle) = MockBackend::hid("hid-1");
//!     let channel = DeviceChannel::new(backend, ChannelConfig::hid());
//!     let cancel = CancellationToken::new();
//!     channel.initialize(&cancel).await?;
//!
//!     let (source, feed) = MockSource::new();
//!     let pump = ReadPump::spawn(source, channel.inbound_sink(), DEFAULT_READ_LENGTH);
//!
//!     feed.push(vec![0x00, 0x42]).unwrap();
//!     let result = channel.read(&cancel).await?;
//!     assert_eq!(result.transferred(), &[0x42]);
//!
//!     pump.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::queue::InboundSink;
use crate::traits::ReportSource;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

/// Minimum delay between polls that returned nothing.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Why a pump task stopped on its own terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The receiving channel closed.
    SinkClosed,

    /// The source faulted; the fault was forwarded to the sink.
    SourceFaulted,

    /// Shutdown was requested.
    Stopped,
}

/// How a pump task terminated, as seen from its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpTermination {
    /// The task returned.
    Exited(PumpExit),

    /// The task was aborted before it could return.
    Aborted,

    /// The task panicked.
    Panicked,
}

/// Spawns pump tasks.
#[derive(Debug)]
pub struct ReadPump;

impl ReadPump {
    /// Start polling `source` for reads of at most `max_len` bytes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(source: S, sink: InboundSink, max_len: usize) -> ReadPumpHandle
    where
        S: ReportSource + 'static,
    {
        let cancel = CancellationToken::new();
        let span = info_span!("read_pump", device_id = %sink.device_id());
        let task = tokio::spawn(Self::run(source, sink, max_len, cancel.clone()).instrument(span));
        ReadPumpHandle { task, cancel }
    }

    async fn run<S: ReportSource>(
        mut source: S,
        sink: InboundSink,
        max_len: usize,
        cancel: CancellationToken,
    ) -> PumpExit {
        debug!(max_len, "Read pump started");

        loop {
            let start = Instant::now();

            if sink.is_closed() {
                debug!("Read pump stopping: channel closed");
                return PumpExit::SinkClosed;
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PumpExit::Stopped,
                read = source.read_bytes(max_len) => read,
            };

            match read {
                Ok(data) if !data.is_empty() => {
                    sink.deliver(data);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Read pump stopping: source fault");
                    sink.fault(e);
                    return PumpExit::SourceFaulted;
                }
            }

            // Nothing was read; keep idle polling below MIN_POLL_INTERVAL.
            let elapsed = start.elapsed();
            if elapsed < MIN_POLL_INTERVAL {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return PumpExit::Stopped,
                    _ = tokio::time::sleep(MIN_POLL_INTERVAL - elapsed) => {}
                }
            }
        }
    }
}

/// Handle to a running pump task.
#[derive(Debug)]
pub struct ReadPumpHandle {
    task: JoinHandle<PumpExit>,
    cancel: CancellationToken,
}

impl ReadPumpHandle {
    /// Check if the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the task to stop and wait for it.
    pub async fn shutdown(self) -> PumpTermination {
        self.cancel.cancel();
        let termination = Self::classify_task_result(self.task.await);
        debug!(?termination, "Read pump shut down");
        termination
    }

    /// Abort the task without waiting for its current read.
    pub async fn abort(self) -> PumpTermination {
        self.task.abort();
        Self::classify_task_result(self.task.await)
    }

    /// Wait for the task to stop on its own.
    pub async fn join(self) -> PumpTermination {
        Self::classify_task_result(self.task.await)
    }

    fn classify_task_result(result: Result<PumpExit, JoinError>) -> PumpTermination {
        match result {
            Ok(exit) => PumpTermination::Exited(exit),
            Err(e) if e.is_cancelled() => PumpTermination::Aborted,
            Err(_) => PumpTermination::Panicked,
        }
    }
}
