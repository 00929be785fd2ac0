//! Mock pull-style report source.

use crate::traits::ReportSource;
use bytes::Bytes;
use devicelink_core::BackendError;
use tokio::sync::mpsc;

/// Report source fed through a [`MockSourceHandle`].
///
/// Each read returns the next pushed item, truncated to the requested
/// length. Once every handle is dropped and the buffer drained, reads fail
/// as if the device was unplugged.
///
/// # Examples
///
/// ```
/// use devicelink_channel::mock::MockSource;
/// use devicelink_channel::traits::ReportSource;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut source, handle) = MockSource::new();
///
///     handle.push(vec![0x00, 0x01, 0x02]).unwrap();
///     let data = source.read_bytes(2).await.unwrap();
///
///     assert_eq!(data.as_ref(), &[0x00, 0x01]);
/// }
/// ```
#[derive(Debug)]
pub struct MockSource {
    rx: mpsc::UnboundedReceiver<Result<Bytes, BackendError>>,
}

impl MockSource {
    /// Create a new mock source and its controlling handle.
    pub fn new() -> (Self, MockSourceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, MockSourceHandle { tx })
    }
}

impl ReportSource for MockSource {
    async fn read_bytes(&mut self, max_len: usize) -> Result<Bytes, BackendError> {
        match self.rx.recv().await {
            Some(Ok(mut data)) => {
                data.truncate(max_len);
                Ok(data)
            }
            Some(Err(error)) => Err(error),
            None => Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Mock source disconnected",
            ))),
        }
    }
}

/// Handle for feeding a mock source.
#[derive(Debug, Clone)]
pub struct MockSourceHandle {
    tx: mpsc::UnboundedSender<Result<Bytes, BackendError>>,
}

impl MockSourceHandle {
    /// Queue one transfer for the next read.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has been dropped.
    pub fn push(&self, data: impl Into<Bytes>) -> Result<(), BackendError> {
        self.send(Ok(data.into()))
    }

    /// Queue an empty read, as a driver returns when its poll timed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has been dropped.
    pub fn idle(&self) -> Result<(), BackendError> {
        self.send(Ok(Bytes::new()))
    }

    /// Make the next read fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has been dropped.
    pub fn fail(&self, error: BackendError) -> Result<(), BackendError> {
        self.send(Err(error))
    }

    fn send(&self, item: Result<Bytes, BackendError>) -> Result<(), BackendError> {
        self.tx
            .send(item)
            .map_err(|_| BackendError::other("Mock source dropped"))
    }
}
