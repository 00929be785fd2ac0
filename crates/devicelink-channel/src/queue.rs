//! Inbound transfer queue.
//!
//! Decouples the arrival of inbound transfers, driven by a backend on its own
//! thread or callback context, from a reader awaiting them.
//!
//! ```text
//! Backend read loop ──► InboundSink ──► TransferQueue ──► DeviceChannel::read
//!                                        │        ▲
//!                                        ▼        │
//!                                   [FIFO]   pending slot (one reader)
//! ```
//!
//! An arrival is handed straight to a waiting reader when there is one and
//! buffered at the tail otherwise. At most one reader may wait at a time;
//! a second one fails with [`QueueError::Reentrant`]. A reader that is
//! cancelled or dropped releases the slot, and anything handed to it in the
//! meantime goes back to the head of the queue.
//!
//! The lock is held only while checking and updating the queue, never across
//! an await.

use bytes::Bytes;
use devicelink_core::{BackendError, TransferResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, trace};

type Arrival = Result<TransferResult, BackendError>;
type Delivery = Result<TransferResult, QueueError>;

/// Errors surfaced by [`TransferQueue`].
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Another reader is already waiting.
    #[error("A read is already in progress")]
    Reentrant,

    /// The queue was closed.
    #[error("Transfer queue closed")]
    Closed,

    /// The backend reported a fault in place of a transfer.
    #[error("Backend fault: {0}")]
    Fault(#[source] BackendError),
}

#[derive(Debug, Default)]
struct QueueState {
    transfers: VecDeque<Arrival>,
    pending: Option<oneshot::Sender<Delivery>>,
    reading: bool,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    device_id: Arc<str>,
    state: Mutex<QueueState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Every critical section leaves the state consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Thread-safe FIFO of received transfers with a single pending-reader slot.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct TransferQueue {
    shared: Arc<Shared>,
}

/// Outcome of [`TransferQueue::dequeue`].
#[derive(Debug)]
pub enum Dequeue {
    /// A buffered transfer was available.
    Ready(TransferResult),

    /// Nothing was buffered; await the next arrival.
    Pending(PendingRead),
}

impl TransferQueue {
    /// Create an empty queue for the given device.
    pub fn new(device_id: impl Into<String>) -> Self {
        let device_id: String = device_id.into();
        Self {
            shared: Arc::new(Shared {
                device_id: Arc::from(device_id),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Add a received transfer.
    ///
    /// Completes the pending reader if there is one, otherwise appends to the
    /// tail. Dropped if the queue has been closed.
    pub fn enqueue(&self, transfer: TransferResult) {
        self.arrive(Ok(transfer));
    }

    /// Report a backend fault in place of a transfer.
    ///
    /// The fault reaches the pending reader, or the next reader if none is
    /// waiting, and is then gone from the queue.
    pub fn fail(&self, error: BackendError) {
        self.arrive(Err(error));
    }

    fn arrive(&self, arrival: Arrival) {
        let mut state = self.shared.lock();

        if state.closed {
            debug!(
                device_id = %self.shared.device_id,
                "Discarding inbound transfer for closed channel"
            );
            return;
        }

        let Some(tx) = state.pending.take() else {
            state.transfers.push_back(arrival);
            trace!(
                device_id = %self.shared.device_id,
                buffered = state.transfers.len(),
                "Buffered inbound transfer"
            );
            return;
        };

        let delivery = arrival.map_err(QueueError::Fault);
        match tx.send(delivery) {
            Ok(()) => {
                trace!(device_id = %self.shared.device_id, "Handed transfer to waiting reader");
            }
            // The reader vanished without releasing its slot.
            Err(Ok(transfer)) => state.transfers.push_back(Ok(transfer)),
            Err(Err(QueueError::Fault(error))) => state.transfers.push_back(Err(error)),
            Err(Err(_)) => {}
        }
    }

    /// Take the oldest transfer, or register as the pending reader.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Reentrant`] if another reader is waiting
    /// - [`QueueError::Fault`] if the oldest entry is a backend fault
    /// - [`QueueError::Closed`] if the queue is closed and empty
    pub fn dequeue(&self) -> Result<Dequeue, QueueError> {
        let mut state = self.shared.lock();

        if state.reading {
            return Err(QueueError::Reentrant);
        }

        if let Some(arrival) = state.transfers.pop_front() {
            return arrival.map(Dequeue::Ready).map_err(QueueError::Fault);
        }

        if state.closed {
            return Err(QueueError::Closed);
        }

        let (tx, rx) = oneshot::channel();
        state.pending = Some(tx);
        state.reading = true;

        Ok(Dequeue::Pending(PendingRead {
            shared: Arc::clone(&self.shared),
            rx: Some(rx),
        }))
    }

    /// Dequeue and wait for the transfer if none is buffered.
    pub async fn next(&self) -> Result<TransferResult, QueueError> {
        match self.dequeue()? {
            Dequeue::Ready(transfer) => Ok(transfer),
            Dequeue::Pending(pending) => pending.wait().await,
        }
    }

    /// Close the queue.
    ///
    /// Buffered transfers are discarded, a pending reader is completed with
    /// [`QueueError::Closed`], and later arrivals are dropped. Returns the
    /// number of discarded transfers.
    pub fn close(&self) -> usize {
        let mut state = self.shared.lock();
        state.closed = true;

        let discarded = state.transfers.len();
        state.transfers.clear();

        if let Some(tx) = state.pending.take() {
            let _ = tx.send(Err(QueueError::Closed));
        }

        discarded
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.shared.lock().transfers.len()
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().transfers.is_empty()
    }

    /// Check if a reader is currently waiting.
    pub fn has_pending_reader(&self) -> bool {
        self.shared.lock().reading
    }

    /// Check if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Handle for the arrival side of this queue.
    pub fn sink(&self) -> InboundSink {
        InboundSink {
            queue: self.clone(),
        }
    }
}

/// The registered reader of a [`TransferQueue`].
///
/// Dropping it before completion releases the reader slot and returns any
/// transfer handed to it to the head of the queue.
#[derive(Debug)]
pub struct PendingRead {
    shared: Arc<Shared>,
    rx: Option<oneshot::Receiver<Delivery>>,
}

impl PendingRead {
    /// Wait for the next arrival.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Fault`] for a backend fault and
    /// [`QueueError::Closed`] if the queue closes first.
    pub async fn wait(mut self) -> Result<TransferResult, QueueError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(QueueError::Closed);
        };
        let delivery = rx.await;
        self.rx = None;
        delivery.unwrap_or(Err(QueueError::Closed))
    }
}

impl Drop for PendingRead {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.reading = false;

        let Some(mut rx) = self.rx.take() else {
            return;
        };

        if state.pending.take().is_some() {
            // Nothing was handed over.
            return;
        }

        match rx.try_recv() {
            Ok(Ok(transfer)) => state.transfers.push_front(Ok(transfer)),
            Ok(Err(QueueError::Fault(error))) => state.transfers.push_front(Err(error)),
            _ => return,
        }
        debug!(
            device_id = %self.shared.device_id,
            "Returned transfer from cancelled read to queue"
        );
    }
}

/// Arrival side of a [`TransferQueue`], handed to backends.
#[derive(Debug, Clone)]
pub struct InboundSink {
    queue: TransferQueue,
}

impl InboundSink {
    /// Deliver received bytes as a complete transfer.
    pub fn deliver(&self, data: impl Into<Bytes>) {
        self.queue.enqueue(TransferResult::new(data));
    }

    /// Deliver a transfer with an explicit count.
    pub fn deliver_transfer(&self, transfer: TransferResult) {
        self.queue.enqueue(transfer);
    }

    /// Report a read fault.
    pub fn fault(&self, error: BackendError) {
        self.queue.fail(error);
    }

    /// Check if the receiving channel has closed.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Device the receiving queue belongs to.
    pub fn device_id(&self) -> &str {
        &self.queue.shared.device_id
    }
}
