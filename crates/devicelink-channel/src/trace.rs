//! Data transfer tracing.
//!
//! A channel reports every successful read and write to an injected
//! [`TransferTracer`]. The default [`LogTracer`] forwards events to `tracing`
//! at trace level; [`RecordingTracer`] keeps them in memory.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use devicelink_core::TransferDirection;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// One traced transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    /// Inbound for reads, outbound for writes.
    pub direction: TransferDirection,

    /// Device the transfer belongs to.
    pub device_id: String,

    /// Logical payload as seen by the caller.
    pub payload: Bytes,

    /// When the transfer completed.
    pub timestamp: DateTime<Utc>,
}

impl TraceEvent {
    /// Create an event stamped with the current time.
    pub fn new(direction: TransferDirection, device_id: impl Into<String>, payload: Bytes) -> Self {
        Self {
            direction,
            device_id: device_id.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Payload as uppercase hex.
    pub fn payload_hex(&self) -> String {
        self.payload.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

/// Receiver of transfer trace events.
pub trait TransferTracer: Send + Sync + fmt::Debug {
    fn trace(&self, event: &TraceEvent);
}

/// Emits each event as a `tracing` trace-level event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl TransferTracer for LogTracer {
    fn trace(&self, event: &TraceEvent) {
        tracing::trace!(
            device_id = %event.device_id,
            direction = %event.direction,
            len = event.payload.len(),
            payload = %event.payload_hex(),
            "Data transfer"
        );
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl TransferTracer for NullTracer {
    fn trace(&self, _event: &TraceEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recorded events in one direction.
    pub fn events_for(&self, direction: TransferDirection) -> Vec<TraceEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.direction == direction)
            .collect()
    }
}

impl TransferTracer for RecordingTracer {
    fn trace(&self, event: &TraceEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
