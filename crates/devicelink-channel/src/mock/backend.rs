//! Mock device backend for testing and development.
//!
//! [`MockBackend`] records every call made on it and delivers inbound
//! transfers that a test pushes through its [`MockBackendHandle`].

use crate::queue::InboundSink;
use crate::traits::DeviceBackend;
use devicelink_core::{BackendError, DeviceCapabilities, DeviceType};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One call observed by a [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Open,
    Capabilities,
    Write { report_id: Option<u8>, data: Vec<u8> },
    Close,
    Release,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<BackendCall>,
    sink: Option<InboundSink>,
    open: bool,
    open_error: Option<BackendError>,
    write_error: Option<BackendError>,
    close_error: Option<BackendError>,
    release_error: Option<BackendError>,
    open_delay: Duration,
    write_delay: Duration,
}

/// Mock backend handle.
///
/// # Examples
///
/// ```
/// use devicelink_channel::mock::{BackendCall, MockBackend};
/// use devicelink_channel::traits::DeviceBackend;
///
/// #[tokio::main]
/// async fn main() {
///     let (backend, handle) = MockBackend::hid("hid-1");
///
///     backend.write_bytes(Some(0), &[0x01]).await.unwrap();
///
///     assert_eq!(
///         handle.calls(),
///         vec![BackendCall::Write { report_id: Some(0), data: vec![0x01] }]
///     );
/// }
/// ```
#[derive(Debug)]
pub struct MockBackend {
    device_id: String,
    capabilities: DeviceCapabilities,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a mock backend reporting `capabilities` once opened.
    ///
    /// Returns a tuple of (MockBackend, MockBackendHandle) where the handle
    /// drives and inspects the backend.
    pub fn new(
        device_id: impl Into<String>,
        capabilities: DeviceCapabilities,
    ) -> (Self, MockBackendHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let backend = Self {
            device_id: device_id.into(),
            capabilities,
            state: Arc::clone(&state),
        };
        (backend, MockBackendHandle { state })
    }

    /// A full-speed HID device with 65-byte reports.
    pub fn hid(device_id: impl Into<String>) -> (Self, MockBackendHandle) {
        Self::new(
            device_id,
            DeviceCapabilities::new(DeviceType::Hid).with_buffer_sizes(65, 65),
        )
    }

    /// A raw USB device with 64-byte endpoints.
    pub fn usb(device_id: impl Into<String>) -> (Self, MockBackendHandle) {
        Self::new(
            device_id,
            DeviceCapabilities::new(DeviceType::Usb).with_buffer_sizes(64, 64),
        )
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceBackend for MockBackend {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn open(&self, inbound: InboundSink) -> Result<(), BackendError> {
        let (delay, failure) = {
            let mut state = self.lock();
            state.calls.push(BackendCall::Open);
            (state.open_delay, state.open_error.take())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let mut state = self.lock();
        state.sink = Some(inbound);
        state.open = true;
        Ok(())
    }

    async fn capabilities(&self) -> Result<DeviceCapabilities, BackendError> {
        self.lock().calls.push(BackendCall::Capabilities);
        Ok(self.capabilities.clone())
    }

    async fn write_bytes(&self, report_id: Option<u8>, data: &[u8]) -> Result<usize, BackendError> {
        let (delay, failure) = {
            let mut state = self.lock();
            state.calls.push(BackendCall::Write {
                report_id,
                data: data.to_vec(),
            });
            (state.write_delay, state.write_error.take())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(data.len()),
        }
    }

    fn close(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Close);
        state.open = false;
        match state.close_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn release(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Release);
        state.sink = None;
        match state.release_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Handle for driving and inspecting a mock backend.
///
/// Cloneable; every clone controls the same backend.
#[derive(Debug, Clone)]
pub struct MockBackendHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockBackendHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sink(&self) -> Result<InboundSink, BackendError> {
        self.lock()
            .sink
            .clone()
            .ok_or_else(|| BackendError::other("Mock backend is not open"))
    }

    /// Simulate an inbound transfer, exactly as the device sent it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend has not been opened.
    pub fn deliver(&self, data: impl Into<bytes::Bytes>) -> Result<(), BackendError> {
        self.sink()?.deliver(data);
        Ok(())
    }

    /// Simulate an inbound read fault.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend has not been opened.
    pub fn fault(&self, error: BackendError) -> Result<(), BackendError> {
        self.sink()?.fault(error);
        Ok(())
    }

    /// Make the next open fail with `error`.
    pub fn fail_open(&self, error: BackendError) {
        self.lock().open_error = Some(error);
    }

    /// Make the next write fail with `error`.
    pub fn fail_next_write(&self, error: BackendError) {
        self.lock().write_error = Some(error);
    }

    /// Make the next close fail with `error`.
    pub fn fail_close(&self, error: BackendError) {
        self.lock().close_error = Some(error);
    }

    /// Make the next release fail with `error`.
    pub fn fail_release(&self, error: BackendError) {
        self.lock().release_error = Some(error);
    }

    /// Delay every open by `delay`.
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    /// Delay every write by `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// The writes made so far as (report ID, payload) pairs.
    pub fn writes(&self) -> Vec<(Option<u8>, Vec<u8>)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Write { report_id, data } => Some((*report_id, data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching `predicate`.
    pub fn call_count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Check if the backend is open.
    pub fn is_open(&self) -> bool {
        self.lock().open
    }
}
