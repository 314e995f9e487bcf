//! Device abstraction layer for Stream Deck devices.
//!
//! Hardware access is split in two traits: a [`DeckTransport`] that
//! enumerates and opens devices, and the [`DeckHandle`] it hands out for one
//! opened device. Handles are never used directly; they are owned by a
//! [`DeviceSession`], which serializes every operation through one lock.

mod info;
pub mod mock;
mod real;
mod session;
mod watch;
mod workers;

pub use info::{
    ButtonEvent, DeviceDescriptor, DeviceModel, ImageEncoding, KeyImageFormat, KeyLayout, Mirror,
    Rotation,
};
pub use real::ElgatoTransport;
pub use session::{DeviceSession, ExclusiveGuard, SessionOptions};
pub use watch::InputWatcher;
pub use workers::{BackgroundWorkers, StopSignal};

use std::time::Duration;

use crate::error::{DeviceError, TransportError};

/// Raw operations on one opened device.
///
/// # Implementation Notes
///
/// - Calls block until the transport has completed or failed
/// - Key indices are 0-based, left-to-right, top-to-bottom, and already
///   bounds-checked by the session
/// - `set_key_image` receives bytes in the device's native layout
pub trait DeckHandle: Send {
    /// Clear all keys and restore the device's idle state.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Set display brightness (0-100).
    fn set_brightness(&mut self, percent: u8) -> Result<(), TransportError>;

    /// Write pre-encoded image bytes to one key.
    fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for a change in button states.
    ///
    /// Returns `Ok(None)` when nothing changed. Transports without input
    /// support keep the default.
    fn read_buttons(&mut self, timeout: Duration) -> Result<Option<Vec<bool>>, TransportError> {
        let _ = timeout;
        Ok(None)
    }

    /// Release transport resources. The handle is dropped afterwards.
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Discovery and connection capability of a hardware backend.
pub trait DeckTransport {
    /// List every connected device.
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, DeviceError>;

    /// Acquire the handle for a previously enumerated device.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if the device disappeared,
    /// [`DeviceError::Busy`] if it cannot be claimed.
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeckHandle>, DeviceError>;
}

/// Pick a device from an enumeration result.
///
/// With no `id` the first device is used.
///
/// # Errors
///
/// [`DeviceError::NoDevices`] when nothing is connected,
/// [`DeviceError::NotFound`] when `id` matches no device.
pub fn select_device(
    devices: Vec<DeviceDescriptor>,
    id: Option<&str>,
) -> Result<DeviceDescriptor, DeviceError> {
    if devices.is_empty() {
        return Err(DeviceError::NoDevices);
    }
    match id {
        Some(id) => devices
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| DeviceError::NotFound { id: id.to_string() }),
        None => devices.into_iter().next().ok_or(DeviceError::NoDevices),
    }
}
