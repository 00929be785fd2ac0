//! Report framing.
//!
//! HID transfers carry the report identifier in their first byte. The framer
//! splits that byte off inbound frames and decides, for outbound data, which
//! report identifier to use. Both directions are pure and keep no state.
//!
//! # Write report ID policy
//!
//! When a default write report ID is configured, caller data is sent as-is
//! under that ID. When none is configured, the **first byte of the caller's
//! data becomes the report ID** and the remaining bytes are the payload. The
//! two modes therefore interpret the same buffer differently:
//!
//! ```
//! use devicelink_channel::framer::ReportFramer;
//!
//! let configured = ReportFramer::frame(&[0x05, 0xAA], Some(0)).unwrap();
//! assert_eq!(configured.report_id(), 0);
//! assert_eq!(configured.payload().as_ref(), &[0x05, 0xAA]);
//!
//! let derived = ReportFramer::frame(&[0x05, 0xAA], None).unwrap();
//! assert_eq!(derived.report_id(), 5);
//! assert_eq!(derived.payload().as_ref(), &[0xAA]);
//! ```

use crate::error::FramingError;
use bytes::Bytes;
use devicelink_core::{ReadReport, TransferResult};
use std::sync::Arc;

/// Converts an inbound report into the value handed to readers.
pub type ReadReportTransform = Arc<dyn Fn(ReadReport) -> TransferResult + Send + Sync>;

/// Decides the report ID and payload for outbound data.
///
/// Receives the caller's data and the configured default report ID.
pub type WriteReportTransform =
    Arc<dyn Fn(&[u8], Option<u8>) -> Result<ReadReport, FramingError> + Send + Sync>;

/// Pure report framing functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFramer;

impl ReportFramer {
    /// Split a raw inbound frame into its report ID and payload.
    ///
    /// The payload's transferred count is one less than the raw count.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::EmptyReport`] if the frame has no bytes.
    pub fn strip(raw: &TransferResult) -> Result<ReadReport, FramingError> {
        let data = raw.data();
        if data.is_empty() || raw.bytes_transferred() == 0 {
            return Err(FramingError::EmptyReport);
        }

        let report_id = data[0];
        let payload = data.slice(1..);
        let transferred = raw.bytes_transferred() - 1;
        let result = TransferResult::with_count(payload, transferred)
            .map_err(|_| FramingError::EmptyReport)?;

        Ok(ReadReport::from_transfer(report_id, result))
    }

    /// Choose the report ID for outbound data.
    ///
    /// With a configured default the data passes through unchanged. Without
    /// one, the first byte of `data` is taken as the report ID.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::MissingReportId`] if no default is configured
    /// and `data` is empty.
    pub fn frame(data: &[u8], default_report_id: Option<u8>) -> Result<ReadReport, FramingError> {
        match (default_report_id, data.split_first()) {
            (Some(report_id), _) => Ok(ReadReport::new(report_id, Bytes::copy_from_slice(data))),
            (None, Some((&report_id, payload))) => {
                Ok(ReadReport::new(report_id, Bytes::copy_from_slice(payload)))
            }
            (None, None) => Err(FramingError::MissingReportId),
        }
    }

    /// Inverse of [`strip`](Self::strip): the report ID followed by the payload.
    pub fn to_wire(report: &ReadReport) -> Bytes {
        let mut frame = Vec::with_capacity(report.frame_len());
        frame.push(report.report_id());
        frame.extend_from_slice(report.payload());
        Bytes::from(frame)
    }

    /// The default read transform: hand readers the payload without the ID.
    pub fn default_read_transform() -> ReadReportTransform {
        Arc::new(ReadReport::into_transfer_result)
    }

    /// The default write transform: [`frame`](Self::frame).
    pub fn default_write_transform() -> WriteReportTransform {
        Arc::new(Self::frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_strip_splits_report_id() {
        let raw = TransferResult::new(vec![0x03, 0x10, 0x20]);
        let report = ReportFramer::strip(&raw).unwrap();

        assert_eq!(report.report_id(), 3);
        assert_eq!(report.payload().as_ref(), &[0x10, 0x20]);
        assert_eq!(report.transfer_result().bytes_transferred(), 2);
    }

    #[test]
    fn test_strip_partial_transfer() {
        let raw = TransferResult::with_count(vec![0x00, 0x01, 0x02, 0x00], 3).unwrap();
        let report = ReportFramer::strip(&raw).unwrap();

        assert_eq!(report.report_id(), 0);
        assert_eq!(report.transfer_result().bytes_transferred(), 2);
        assert_eq!(report.transfer_result().transferred(), &[0x01, 0x02]);
    }

    #[test]
    fn test_strip_report_id_only() {
        let raw = TransferResult::new(vec![0x07]);
        let report = ReportFramer::strip(&raw).unwrap();

        assert_eq!(report.report_id(), 7);
        assert!(report.payload().is_empty());
    }

    #[test]
    fn test_strip_empty_frame() {
        let raw = TransferResult::new(Vec::new());
        assert_eq!(ReportFramer::strip(&raw), Err(FramingError::EmptyReport));
    }

    #[rstest]
    #[case(&[0xAA, 0xBB], Some(5), 5, &[0xAA, 0xBB])]
    #[case(&[], Some(0), 0, &[])]
    #[case(&[0x02, 0xAA, 0xBB], None, 2, &[0xAA, 0xBB])]
    #[case(&[0x09], None, 9, &[])]
    fn test_frame(
        #[case] data: &[u8],
        #[case] default_report_id: Option<u8>,
        #[case] expected_id: u8,
        #[case] expected_payload: &[u8],
    ) {
        let report = ReportFramer::frame(data, default_report_id).unwrap();
        assert_eq!(report.report_id(), expected_id);
        assert_eq!(report.payload().as_ref(), expected_payload);
    }

    #[test]
    fn test_frame_without_default_or_data() {
        assert_eq!(
            ReportFramer::frame(&[], None),
            Err(FramingError::MissingReportId)
        );
    }

    #[test]
    fn test_default_transforms() {
        let read = ReportFramer::default_read_transform();
        let result = read(ReadReport::new(4, vec![1, 2]));
        assert_eq!(result.transferred(), &[1, 2]);

        let write = ReportFramer::default_write_transform();
        assert_eq!(write(&[], None), Err(FramingError::MissingReportId));
    }

    proptest! {
        #[test]
        fn prop_strip_inverts_frame(
            data in prop::collection::vec(any::<u8>(), 0..128),
            report_id in any::<u8>(),
        ) {
            let framed = ReportFramer::frame(&data, Some(report_id)).unwrap();
            let wire = ReportFramer::to_wire(&framed);
            let stripped = ReportFramer::strip(&TransferResult::new(wire)).unwrap();

            prop_assert_eq!(stripped.report_id(), report_id);
            prop_assert_eq!(stripped.payload().as_ref(), data.as_slice());
        }

        #[test]
        fn prop_derived_report_id_is_first_byte(
            data in prop::collection::vec(any::<u8>(), 1..128),
        ) {
            let framed = ReportFramer::frame(&data, None).unwrap();
            prop_assert_eq!(framed.report_id(), data[0]);
            let wire = ReportFramer::to_wire(&framed);
            prop_assert_eq!(wire.as_ref(), data.as_slice());
        }
    }
}
