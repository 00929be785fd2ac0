//! Report framing constants.
//!
//! HID devices exchange reports whose first byte on the wire is the report
//! identifier. Devices that do not declare numbered reports still carry the
//! byte, set to [`NO_REPORT_ID`].
//!
//! ```text
//! ┌───────────┬──────────────────────────────┐
//! │ report id │ payload (report size - 1)    │
//! └───────────┴──────────────────────────────┘
//!    1 byte
//! ```

/// Number of bytes the report identifier occupies at the head of a frame.
pub const REPORT_ID_LENGTH: usize = 1;

/// Report identifier used by devices without numbered reports.
pub const NO_REPORT_ID: u8 = 0;

/// Largest interrupt payload of a full-speed USB HID device.
pub const FULL_SPEED_REPORT_SIZE: usize = 64;

/// Default read length handed to pull-style report sources when the device
/// did not advertise an input report size. Covers a full-speed report plus
/// its report ID byte.
pub const DEFAULT_READ_LENGTH: usize = FULL_SPEED_REPORT_SIZE + REPORT_ID_LENGTH;
