//! Mock backends for testing and development.
//!
//! These simulate a device without hardware and can be controlled
//! programmatically from tests.

pub mod backend;
pub mod source;

pub use backend::{BackendCall, MockBackend, MockBackendHandle};
pub use source::{MockSource, MockSourceHandle};
