//! Exclusive, serialized access to one opened device.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, instrument, trace, warn};

use super::{DeckHandle, DeckTransport, DeviceDescriptor};
use crate::error::{DeviceError, TransportError};
use crate::render::NativeKeyImage;

/// Tunables for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Longest wait for the session lock before reporting the device busy.
    /// `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Some(Duration::from_secs(5)),
        }
    }
}

struct SessionInner {
    descriptor: DeviceDescriptor,
    options: SessionOptions,
    /// `None` once the session is closed.
    handle: Mutex<Option<Box<dyn DeckHandle>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.get_mut().take() {
            warn!(id = %self.descriptor.id, "Session dropped while open, closing");
            if let Err(e) = handle.close() {
                warn!(id = %self.descriptor.id, error = %e, "Implicit close failed");
            }
        }
    }
}

/// The live handle to one device between open and close.
///
/// Clones share the same handle; background pollers hold a clone. Every
/// operation goes through [`DeviceSession::exclusive`], so no two operations
/// ever reach the transport at the same time.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.inner.descriptor.id)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Claim the device described by `descriptor`.
    #[instrument(skip_all, fields(id = %descriptor.id))]
    pub fn open(
        transport: &dyn DeckTransport,
        descriptor: &DeviceDescriptor,
        options: SessionOptions,
    ) -> Result<Self, DeviceError> {
        let handle = transport.open(descriptor)?;
        info!(
            device_type = %descriptor.type_name,
            key_count = descriptor.key_count,
            "Device session opened"
        );
        Ok(Self {
            inner: Arc::new(SessionInner {
                descriptor: descriptor.clone(),
                options,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.inner.descriptor
    }

    pub fn id(&self) -> &str {
        &self.inner.descriptor.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.handle.lock().is_none()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Box<dyn DeckHandle>>>, DeviceError> {
        match self.inner.options.lock_timeout {
            Some(timeout) => self.inner.handle.try_lock_for(timeout).ok_or_else(|| {
                DeviceError::Busy {
                    id: self.id().to_string(),
                    reason: format!("session lock not acquired within {timeout:?}"),
                }
            }),
            None => Ok(self.inner.handle.lock()),
        }
    }

    /// Acquire sole access to the device.
    ///
    /// The returned guard is the only way to operate the handle; dropping it
    /// releases the lock, whichever way the holder's scope ends.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Closed`] after [`close`](Self::close),
    /// [`DeviceError::Busy`] if the lock timeout elapses.
    pub fn exclusive(&self) -> Result<ExclusiveGuard<'_>, DeviceError> {
        let slot = self.lock()?;
        let handle = MutexGuard::try_map(slot, Option::as_mut).map_err(|_| DeviceError::Closed {
            id: self.id().to_string(),
        })?;
        trace!(id = %self.id(), "Acquired exclusive access");
        Ok(ExclusiveGuard {
            descriptor: &self.inner.descriptor,
            handle,
        })
    }

    /// Run `f` with sole access to the device.
    pub fn scoped_exclusive<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ExclusiveGuard<'_>) -> Result<T, E>,
        E: From<DeviceError>,
    {
        let mut guard = self.exclusive()?;
        f(&mut guard)
    }

    /// Release the device. Only the first call succeeds.
    pub fn close(&self) -> Result<(), DeviceError> {
        let mut slot = self.lock()?;
        let mut handle = slot.take().ok_or_else(|| DeviceError::Closed {
            id: self.id().to_string(),
        })?;
        drop(slot);

        let result = handle.close().map_err(|source| DeviceError::Transport {
            id: self.id().to_string(),
            operation: "close",
            source,
        });
        info!(id = %self.id(), "Device session closed");
        result
    }
}

/// Proof of exclusive access to an open device.
pub struct ExclusiveGuard<'a> {
    descriptor: &'a DeviceDescriptor,
    handle: MappedMutexGuard<'a, Box<dyn DeckHandle>>,
}

impl ExclusiveGuard<'_> {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        self.descriptor
    }

    fn transport_error(&self, operation: &'static str, source: TransportError) -> DeviceError {
        DeviceError::Transport {
            id: self.descriptor.id.clone(),
            operation,
            source,
        }
    }

    pub fn reset(&mut self) -> Result<(), DeviceError> {
        debug!(id = %self.descriptor.id, "Resetting device");
        self.handle
            .reset()
            .map_err(|e| self.transport_error("reset", e))
    }

    /// Set display brightness (0-100).
    pub fn set_brightness(&mut self, percent: u8) -> Result<(), DeviceError> {
        if percent > 100 {
            return Err(DeviceError::InvalidBrightness { value: percent });
        }
        debug!(id = %self.descriptor.id, percent, "Setting brightness");
        self.handle
            .set_brightness(percent)
            .map_err(|e| self.transport_error("set_brightness", e))
    }

    /// Push a rendered image to one key.
    ///
    /// Nothing is written when `index` is outside the device's keys.
    pub fn update_key(&mut self, index: usize, image: &NativeKeyImage) -> Result<(), DeviceError> {
        if !self.descriptor.is_visual() {
            return Err(DeviceError::NonVisual {
                id: self.descriptor.id.clone(),
            });
        }
        let key_count = self.descriptor.key_count;
        let key = u8::try_from(index)
            .ok()
            .filter(|key| *key < key_count)
            .ok_or(DeviceError::KeyIndex { index, key_count })?;

        debug!(
            id = %self.descriptor.id,
            key,
            encoding = %image.encoding,
            bytes = image.bytes.len(),
            "Updating key image"
        );
        self.handle
            .set_key_image(key, &image.bytes)
            .map_err(|e| self.transport_error("update_key", e))
    }

    /// Wait up to `timeout` for a change in button states.
    pub fn read_buttons(&mut self, timeout: Duration) -> Result<Option<Vec<bool>>, DeviceError> {
        self.handle
            .read_buttons(timeout)
            .map_err(|e| self.transport_error("read_buttons", e))
    }
}
