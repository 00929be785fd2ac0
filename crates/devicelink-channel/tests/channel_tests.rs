//! Integration tests for device channel behavior.
//!
//! Exercises the public channel surface end to end over the mock backend:
//! lifecycle, framing, inbound ordering, reentrancy, cancellation, and
//! error propagation.

mod common;

use common::{HID_DEVICE_ID, ready_hid, ready_read_only, ready_usb, token};
use devicelink_channel::mock::{BackendCall, MockBackend};
use devicelink_channel::{
    BackendError, ChannelConfig, ChannelError, DeviceChannel, LifecycleState, Operation,
};
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_initialize_after_dispose_fails() {
    let (backend, handle) = MockBackend::hid(HID_DEVICE_ID);
    let channel = DeviceChannel::new(backend, ChannelConfig::default());
    channel.dispose();

    let error = channel.initialize(&token()).await.unwrap_err();
    assert!(matches!(error, ChannelError::Disposed { .. }));
    assert_eq!(error.operation(), Operation::Initialize);
    assert!(!handle.calls().contains(&BackendCall::Open));
}

#[tokio::test]
async fn test_initialize_with_cancelled_token_touches_nothing() {
    let (backend, handle) = MockBackend::hid(HID_DEVICE_ID);
    let channel = DeviceChannel::new(backend, ChannelConfig::default());
    let cancel = token();
    cancel.cancel();

    let error = channel.initialize(&cancel).await.unwrap_err();
    assert!(error.is_cancelled());
    assert!(handle.calls().is_empty());
    assert_eq!(channel.state(), LifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_cancel_during_open_rolls_back() {
    let (backend, handle) = MockBackend::hid(HID_DEVICE_ID);
    handle.set_open_delay(Duration::from_millis(200));
    let channel = DeviceChannel::new(backend, ChannelConfig::hid());
    let cancel = token();
    let canceller = cancel.clone();

    let (result, ()) = tokio::join!(channel.initialize(&cancel), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let error = result.unwrap_err();
    assert!(error.is_cancelled());
    assert_eq!(error.operation(), Operation::Initialize);
    assert_eq!(channel.state(), LifecycleState::Uninitialized);
    assert_eq!(handle.calls(), vec![BackendCall::Open, BackendCall::Close]);
    assert!(!handle.is_open());

    handle.set_open_delay(Duration::ZERO);
    channel.initialize(&token()).await.unwrap();
    assert!(channel.is_initialized());
    assert!(handle.is_open());
}

#[tokio::test]
async fn test_failed_open_reports_initialization_failure() {
    let (backend, handle) = MockBackend::hid(HID_DEVICE_ID);
    handle.fail_open(BackendError::device_not_found(HID_DEVICE_ID));
    let channel = DeviceChannel::new(backend, ChannelConfig::default());

    let error = channel.initialize(&token()).await.unwrap_err();
    assert!(matches!(
        error,
        ChannelError::InitializationFailed {
            source: BackendError::DeviceNotFound { .. },
            ..
        }
    ));
    assert_eq!(error.device_id(), HID_DEVICE_ID);
    assert_eq!(channel.state(), LifecycleState::Uninitialized);

    // A failed open can be retried.
    channel.initialize(&token()).await.unwrap();
    assert!(channel.is_initialized());
}

#[tokio::test]
async fn test_closed_channel_cannot_reopen() {
    let (channel, _handle) = ready_hid(ChannelConfig::hid()).await;
    channel.close();
    assert_eq!(channel.state(), LifecycleState::Closed);

    let error = channel.initialize(&token()).await.unwrap_err();
    assert!(matches!(
        error,
        ChannelError::InvalidState {
            state: LifecycleState::Closed,
            ..
        }
    ));

    let error = channel.write(&[1], &token()).await.unwrap_err();
    assert!(matches!(error, ChannelError::InvalidState { .. }));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;

    channel.close();
    channel.close();

    assert_eq!(handle.call_count(|c| *c == BackendCall::Close), 1);
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_close_uninitialized_skips_backend() {
    let (backend, handle) = MockBackend::hid(HID_DEVICE_ID);
    let channel = DeviceChannel::new(backend, ChannelConfig::default());

    channel.close();

    assert_eq!(channel.state(), LifecycleState::Closed);
    assert!(handle.calls().is_empty());
}

#[tokio::test]
async fn test_dispose_twice_is_idempotent() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;

    channel.dispose();
    let calls_after_first = handle.calls();
    assert_eq!(
        &calls_after_first[2..],
        &[BackendCall::Close, BackendCall::Release]
    );

    channel.dispose();
    assert_eq!(handle.calls(), calls_after_first);
    assert_eq!(channel.state(), LifecycleState::Disposed);
}

#[tokio::test]
async fn test_dispose_swallows_backend_failures() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    handle.fail_close(BackendError::other("device busy"));
    handle.fail_release(BackendError::other("handle leaked"));

    channel.dispose();

    assert_eq!(channel.state(), LifecycleState::Disposed);
}

#[tokio::test]
async fn test_operations_after_dispose_fail() {
    let (channel, _handle) = ready_hid(ChannelConfig::hid()).await;
    channel.dispose();

    let read = channel.read(&token()).await.unwrap_err();
    assert!(matches!(read, ChannelError::Disposed { operation: Operation::Read, .. }));

    let write = channel.write(&[1], &token()).await.unwrap_err();
    assert!(matches!(write, ChannelError::Disposed { operation: Operation::Write, .. }));
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_read_only_write_makes_no_backend_call() {
    let (channel, handle) = ready_read_only().await;
    assert_eq!(channel.is_read_only(), Some(true));

    for data in [&[0x01, 0x02][..], &[][..], &[0xFF; 64][..]] {
        let error = channel.write(data, &token()).await.unwrap_err();
        assert!(matches!(error, ChannelError::ReadOnly { .. }));
    }
    let error = channel.write_report(&[1], 3, &token()).await.unwrap_err();
    assert!(matches!(error, ChannelError::ReadOnly { .. }));

    assert!(handle.writes().is_empty());
    assert_eq!(
        handle.calls(),
        vec![BackendCall::Open, BackendCall::Capabilities]
    );
}

#[tokio::test]
async fn test_default_report_id_is_sent_separately() {
    let config = ChannelConfig::default().with_default_write_report_id(5);
    let (channel, handle) = ready_hid(config).await;

    let written = channel.write(&[0xAA, 0xBB], &token()).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(handle.writes(), vec![(Some(5), vec![0xAA, 0xBB])]);
}

#[tokio::test]
async fn test_first_byte_is_report_id_without_default() {
    let (channel, handle) = ready_hid(ChannelConfig::default()).await;

    let written = channel.write(&[0x02, 0xAA, 0xBB], &token()).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(handle.writes(), vec![(Some(2), vec![0xAA, 0xBB])]);
}

#[tokio::test]
async fn test_empty_write_without_default_fails_before_backend() {
    let (channel, handle) = ready_hid(ChannelConfig::default()).await;

    let error = channel.write(&[], &token()).await.unwrap_err();

    assert!(matches!(
        error,
        ChannelError::MissingReportId {
            operation: Operation::Write,
            ..
        }
    ));
    assert!(handle.writes().is_empty());
}

#[tokio::test]
async fn test_backend_write_failure_is_wrapped() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    handle.fail_next_write(BackendError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "endpoint stalled",
    )));

    let error = channel.write(&[1, 2], &token()).await.unwrap_err();

    assert!(matches!(
        error,
        ChannelError::TransferIo {
            operation: Operation::Write,
            source: BackendError::Io(_),
            ..
        }
    ));
    assert!(error.is_retryable());
    assert!(error.to_string().contains(HID_DEVICE_ID));

    // The channel stays usable.
    assert_eq!(channel.write(&[1, 2], &token()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_cancelled_write_reports_cancellation() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    handle.set_write_delay(Duration::from_secs(5));
    let cancel = token();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        })
    };

    let error = channel.write(&[1], &cancel).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(
        error,
        ChannelError::Cancelled {
            operation: Operation::Write,
            ..
        }
    ));
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_reads_return_transfers_in_arrival_order() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;

    for i in 0..10u8 {
        handle.deliver(vec![0x00, i, i.wrapping_mul(3)]).unwrap();
    }
    assert_eq!(channel.buffered(), 10);

    for i in 0..10u8 {
        let result = channel.read(&token()).await.unwrap();
        assert_eq!(result.transferred(), &[i, i.wrapping_mul(3)]);
        assert_eq!(result.bytes_transferred(), 2);
    }
    assert_eq!(channel.buffered(), 0);
}

#[tokio::test]
async fn test_waiting_read_receives_next_arrival() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    let channel = Arc::new(channel);

    let reader = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move { channel.read(&token()).await })
    };
    tokio::task::yield_now().await;

    handle.deliver(vec![0x00, 0x42]).unwrap();

    let result = reader.await.unwrap().unwrap();
    assert_eq!(result.transferred(), &[0x42]);
    assert_eq!(channel.buffered(), 0);
}

#[tokio::test]
async fn test_second_read_while_first_pending_fails() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    let channel = Arc::new(channel);

    let first = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move { channel.read(&token()).await })
    };
    tokio::task::yield_now().await;

    let second = channel.read(&token()).await.unwrap_err();
    assert!(matches!(second, ChannelError::ReentrantRead { .. }));

    handle.deliver(vec![0x00, 0x07]).unwrap();
    let result = first.await.unwrap().unwrap();
    assert_eq!(result.transferred(), &[0x07]);
}

#[tokio::test]
async fn test_cancelled_read_keeps_later_transfer() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    let cancel = token();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        }
    };
    let (result, ()) = tokio::join!(channel.read(&cancel), canceller);
    assert!(result.unwrap_err().is_cancelled());

    handle.deliver(vec![0x00, 0x99]).unwrap();

    let next = channel.read(&token()).await.unwrap();
    assert_eq!(next.transferred(), &[0x99]);
}

#[tokio::test]
async fn test_timed_out_read_releases_slot() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;

    let timed_out = tokio::time::timeout(Duration::from_millis(10), channel.read(&token())).await;
    assert!(timed_out.is_err());

    handle.deliver(vec![0x00, 0x01]).unwrap();
    assert_eq!(channel.read(&token()).await.unwrap().transferred(), &[0x01]);
}

#[tokio::test]
async fn test_read_fault_is_wrapped_and_queue_stays_empty() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    let channel = Arc::new(channel);

    let reader = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move { channel.read(&token()).await })
    };
    tokio::task::yield_now().await;

    handle
        .fault(BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "device unplugged",
        )))
        .unwrap();

    let error = reader.await.unwrap().unwrap_err();
    assert!(matches!(
        error,
        ChannelError::TransferIo {
            operation: Operation::Read,
            source: BackendError::Io(_),
            ..
        }
    ));
    assert_eq!(channel.buffered(), 0);

    handle.deliver(vec![0x00, 0x05]).unwrap();
    assert_eq!(channel.read(&token()).await.unwrap().transferred(), &[0x05]);
}

#[tokio::test]
async fn test_close_releases_waiting_reader_and_discards_buffer() {
    let (channel, handle) = ready_hid(ChannelConfig::hid()).await;
    let channel = Arc::new(channel);

    let reader = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move { channel.read(&token()).await })
    };
    tokio::task::yield_now().await;

    channel.close();

    let error = reader.await.unwrap().unwrap_err();
    assert!(matches!(error, ChannelError::Closed { .. }));

    // Arrivals after close are dropped.
    handle.deliver(vec![0x00, 0x01]).unwrap();
    assert_eq!(channel.buffered(), 0);
}

#[tokio::test]
async fn test_zero_length_transfer_is_not_absence() {
    let (channel, handle) = ready_usb().await;

    handle.deliver(Vec::new()).unwrap();
    let result = channel.read(&token()).await.unwrap();

    assert_eq!(result.bytes_transferred(), 0);
    assert!(result.transferred().is_empty());
}

// ============================================================================
// Framing
// ============================================================================

#[rstest]
#[case(0, vec![0x3F, 0x23, 0x23])]
#[case(1, vec![0x01])]
#[case(5, vec![0xAA, 0xBB])]
#[case(255, vec![0x00; 64])]
#[tokio::test]
async fn test_written_report_reads_back(#[case] report_id: u8, #[case] payload: Vec<u8>) {
    let config = ChannelConfig::default().with_default_write_report_id(report_id);
    let (channel, handle) = ready_hid(config).await;

    channel.write(&payload, &token()).await.unwrap();
    let (sent_id, sent_payload) = handle.writes().remove(0);

    // Echo the frame back as the device would send it.
    let mut wire = vec![sent_id.unwrap()];
    wire.extend_from_slice(&sent_payload);
    handle.deliver(wire).unwrap();

    let report = channel.read_report(&token()).await.unwrap();
    assert_eq!(report.report_id(), report_id);
    assert_eq!(report.payload().as_ref(), payload.as_slice());
}

proptest! {
    #[test]
    fn prop_report_channel_round_trips(
        report_id in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (read_back, writes) = runtime.block_on(async {
            let config = ChannelConfig::default().with_default_write_report_id(report_id);
            let (channel, handle) = ready_hid(config).await;

            channel.write(&payload, &token()).await.unwrap();
            let mut wire = vec![report_id];
            wire.extend_from_slice(&payload);
            handle.deliver(wire).unwrap();

            let read_back = channel.read(&token()).await.unwrap();
            (read_back, handle.writes())
        });

        prop_assert_eq!(read_back.transferred(), payload.as_slice());
        prop_assert_eq!(writes, vec![(Some(report_id), payload.clone())]);
    }
}
