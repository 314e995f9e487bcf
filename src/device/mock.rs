//! Instrumented fake transport for testing without hardware.
//!
//! A [`MockDeck`] is shared between the test and the handle the transport
//! gives out, so everything the session did can be asserted afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use ambiance::device::mock::{MockDeck, MockTransport, Operation};
//! use ambiance::device::{DeviceModel, DeviceSession, SessionOptions};
//!
//! let deck = MockDeck::new(DeviceModel::Xl);
//! let transport = MockTransport::new().with_deck(deck.clone());
//! let session = DeviceSession::open(&transport, deck.descriptor(), SessionOptions::default())?;
//! session.exclusive()?.set_brightness(50)?;
//!
//! deck.assert_operations(&[Operation::SetBrightness { percent: 50 }]);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{DeckHandle, DeckTransport, DeviceDescriptor, DeviceModel};
use crate::error::{DeviceError, TransportError};

/// Recorded transport operation. Only successful operations are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Reset,
    SetBrightness { percent: u8 },
    SetKeyImage { key: u8, len: usize },
    Close,
}

#[derive(Debug)]
struct MockState {
    descriptor: DeviceDescriptor,
    brightness: AtomicU8,
    keys: Mutex<Vec<Option<Vec<u8>>>>,
    operation_log: Mutex<Vec<Operation>>,
    input_queue: Mutex<VecDeque<Vec<bool>>>,
    error_injection: Mutex<Option<TransportError>>,
    failing_keys: Mutex<Vec<u8>>,
    op_delay: Mutex<Duration>,
    busy: AtomicBool,
    opened: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    button_reads: AtomicUsize,
}

/// A fake device plus the record of everything done to it.
#[derive(Debug, Clone)]
pub struct MockDeck {
    state: Arc<MockState>,
}

impl MockDeck {
    /// Create a mock of the given model with a derived id such as `MOCK-Xl-001`.
    pub fn new(model: DeviceModel) -> Self {
        Self::with_descriptor(model.descriptor(format!("MOCK-{model:?}-001")))
    }

    pub fn with_descriptor(descriptor: DeviceDescriptor) -> Self {
        debug!(id = %descriptor.id, "Creating mock deck");
        let key_count = usize::from(descriptor.key_count);
        Self {
            state: Arc::new(MockState {
                descriptor,
                brightness: AtomicU8::new(100),
                keys: Mutex::new(vec![None; key_count]),
                operation_log: Mutex::new(Vec::new()),
                input_queue: Mutex::new(VecDeque::new()),
                error_injection: Mutex::new(None),
                failing_keys: Mutex::new(Vec::new()),
                op_delay: Mutex::new(Duration::ZERO),
                busy: AtomicBool::new(false),
                opened: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                button_reads: AtomicUsize::new(0),
            }),
        }
    }

    /// Give the mock a specific id.
    pub fn with_id(model: DeviceModel, id: &str) -> Self {
        Self::with_descriptor(model.descriptor(id))
    }

    // === Configuration ===

    /// Keys whose image writes fail.
    pub fn with_failing_keys(self, keys: &[u8]) -> Self {
        self.state.failing_keys.lock().extend_from_slice(keys);
        self
    }

    /// Make every operation take at least `delay`.
    pub fn with_op_delay(self, delay: Duration) -> Self {
        *self.state.op_delay.lock() = delay;
        self
    }

    /// Refuse to be opened, as if another process held the device.
    pub fn busy(self) -> Self {
        self.state.busy.store(true, Ordering::SeqCst);
        self
    }

    /// Fail the next operation with `error`.
    pub fn inject_error(&self, error: TransportError) {
        *self.state.error_injection.lock() = Some(error);
    }

    // === Input Simulation ===

    /// Queue a full button state snapshot for the next read.
    pub fn queue_buttons(&self, states: Vec<bool>) {
        self.state.input_queue.lock().push_back(states);
    }

    /// Queue a press then a release of `key`.
    pub fn queue_tap(&self, key: u8) {
        let count = usize::from(self.state.descriptor.key_count);
        let mut pressed = vec![false; count];
        if let Some(slot) = pressed.get_mut(usize::from(key)) {
            *slot = true;
        }
        self.queue_buttons(pressed);
        self.queue_buttons(vec![false; count]);
    }

    // === Assertions ===

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.state.descriptor
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state.operation_log.lock().clone()
    }

    pub fn operation_count(&self) -> usize {
        self.state.operation_log.lock().len()
    }

    /// Number of times the transport opened this deck.
    pub fn open_count(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Highest number of transport calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn button_reads(&self) -> usize {
        self.state.button_reads.load(Ordering::SeqCst)
    }

    pub fn brightness(&self) -> u8 {
        self.state.brightness.load(Ordering::SeqCst)
    }

    /// Bytes last written to `key`.
    pub fn key_image(&self, key: u8) -> Option<Vec<u8>> {
        self.state
            .keys
            .lock()
            .get(usize::from(key))
            .cloned()
            .flatten()
    }

    /// Keys with an image, in index order.
    pub fn keys_with_images(&self) -> Vec<u8> {
        self.state
            .keys
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, image)| image.is_some())
            .filter_map(|(key, _)| u8::try_from(key).ok())
            .collect()
    }

    /// Assert specific operations were performed.
    ///
    /// # Panics
    ///
    /// Panics if the operations don't match.
    pub fn assert_operations(&self, expected: &[Operation]) {
        let actual = self.operations();
        assert_eq!(
            actual, expected,
            "Operation mismatch.\nExpected: {expected:#?}\nActual: {actual:#?}",
        );
    }

    /// Assert no operations were performed.
    ///
    /// # Panics
    ///
    /// Panics if any operations were recorded.
    pub fn assert_no_operations(&self) {
        let ops = self.operations();
        assert!(ops.is_empty(), "Expected no operations, but found: {ops:#?}");
    }
}

/// Handle given out by [`MockTransport::open`].
struct MockHandle {
    state: Arc<MockState>,
}

/// Tracks one transport call for the overlap counters.
struct InFlight<'a>(&'a MockState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a MockState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *state.op_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockHandle {
    fn check_error(&self) -> Result<(), TransportError> {
        self.state.error_injection.lock().take().map_or(Ok(()), Err)
    }

    fn record_op(&self, op: Operation) {
        trace!(?op, "Recording operation");
        self.state.operation_log.lock().push(op);
    }
}

impl DeckHandle for MockHandle {
    fn reset(&mut self) -> Result<(), TransportError> {
        let _call = InFlight::enter(&self.state);
        self.check_error()?;
        self.state.keys.lock().iter_mut().for_each(|key| *key = None);
        self.record_op(Operation::Reset);
        Ok(())
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), TransportError> {
        let _call = InFlight::enter(&self.state);
        self.check_error()?;
        self.state.brightness.store(percent, Ordering::SeqCst);
        self.record_op(Operation::SetBrightness { percent });
        Ok(())
    }

    fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), TransportError> {
        let _call = InFlight::enter(&self.state);
        self.check_error()?;
        if self.state.failing_keys.lock().contains(&key) {
            return Err(TransportError::new(format!("Mock key {key} configured to fail")));
        }
        let mut keys = self.state.keys.lock();
        let slot = keys
            .get_mut(usize::from(key))
            .ok_or_else(|| TransportError::new(format!("Mock key {key} does not exist")))?;
        *slot = Some(image.to_vec());
        drop(keys);
        self.record_op(Operation::SetKeyImage {
            key,
            len: image.len(),
        });
        Ok(())
    }

    fn read_buttons(&mut self, timeout: Duration) -> Result<Option<Vec<bool>>, TransportError> {
        let _call = InFlight::enter(&self.state);
        self.check_error()?;
        self.state.button_reads.fetch_add(1, Ordering::SeqCst);
        let next = self.state.input_queue.lock().pop_front();
        if next.is_none() {
            // Behave like a blocking read that timed out, capped to keep tests fast.
            thread::sleep(timeout.min(Duration::from_millis(5)));
        }
        Ok(next)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let _call = InFlight::enter(&self.state);
        self.check_error()?;
        self.record_op(Operation::Close);
        Ok(())
    }
}

/// Transport over a fixed set of [`MockDeck`]s.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    decks: Vec<MockDeck>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deck(mut self, deck: MockDeck) -> Self {
        self.decks.push(deck);
        self
    }
}

impl DeckTransport for MockTransport {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        Ok(self.decks.iter().map(|d| d.descriptor().clone()).collect())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeckHandle>, DeviceError> {
        let deck = self
            .decks
            .iter()
            .find(|d| d.descriptor().id == descriptor.id)
            .ok_or_else(|| DeviceError::NotFound {
                id: descriptor.id.clone(),
            })?;
        if deck.state.busy.load(Ordering::SeqCst) {
            return Err(DeviceError::Busy {
                id: descriptor.id.clone(),
                reason: "mock device is held elsewhere".to_string(),
            });
        }
        deck.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            state: Arc::clone(&deck.state),
        }))
    }
}
