//! Common helpers for channel integration tests.

#![allow(dead_code)]

use devicelink_channel::mock::{MockBackend, MockBackendHandle};
use devicelink_channel::{ChannelConfig, DeviceCapabilities, DeviceChannel, DeviceType};
use tokio_util::sync::CancellationToken;

/// Standard HID test device ID.
pub const HID_DEVICE_ID: &str = "\\\\?\\hid#vid_534c&pid_0001&mi_00";

/// Standard USB test device ID.
pub const USB_DEVICE_ID: &str = "usb-1209-53c1";

pub fn token() -> CancellationToken {
    CancellationToken::new()
}

/// An initialized HID channel over a mock backend.
pub async fn ready_hid(config: ChannelConfig) -> (DeviceChannel<MockBackend>, MockBackendHandle) {
    let (backend, handle) = MockBackend::hid(HID_DEVICE_ID);
    let channel = DeviceChannel::new(backend, config);
    channel
        .initialize(&token())
        .await
        .expect("Mock HID channel failed to initialize");
    (channel, handle)
}

/// An initialized raw USB channel over a mock backend.
pub async fn ready_usb() -> (DeviceChannel<MockBackend>, MockBackendHandle) {
    let (backend, handle) = MockBackend::usb(USB_DEVICE_ID);
    let channel = DeviceChannel::new(backend, ChannelConfig::default());
    channel
        .initialize(&token())
        .await
        .expect("Mock USB channel failed to initialize");
    (channel, handle)
}

/// An initialized HID channel whose device only opened for reading.
pub async fn ready_read_only() -> (DeviceChannel<MockBackend>, MockBackendHandle) {
    let caps = DeviceCapabilities::new(DeviceType::Hid)
        .with_buffer_sizes(65, 65)
        .read_only();
    let (backend, handle) = MockBackend::new(HID_DEVICE_ID, caps);
    let channel = DeviceChannel::new(backend, ChannelConfig::hid());
    channel
        .initialize(&token())
        .await
        .expect("Mock read-only channel failed to initialize");
    (channel, handle)
}
