//! Leaf types shared by every devicelink crate.
//!
//! This crate holds the data that crosses the boundary between a device
//! channel and the platform backend underneath it: transfer buffers, framed
//! reports, negotiated device definitions, and the error type a backend may
//! report. It performs no I/O.

pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{BackendError, Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
