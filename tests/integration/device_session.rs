//! Integration tests for device sessions.
//!
//! Tests verify that transport calls never overlap, that sessions close
//! exactly once, and that background workers are always drained.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ambiance::device::mock::{MockDeck, MockTransport, Operation};
use ambiance::device::{
    BackgroundWorkers, ButtonEvent, DeckTransport, DeviceModel, DeviceSession, ImageEncoding,
    InputWatcher, SessionOptions, select_device,
};
use ambiance::error::{DeviceError, TransportError};
use ambiance::render::NativeKeyImage;
use parking_lot::Mutex;

use crate::common::init_test_logging;

fn key_image(len: usize) -> NativeKeyImage {
    NativeKeyImage {
        encoding: ImageEncoding::Jpeg,
        width: 96,
        height: 96,
        bytes: vec![0xAB; len],
    }
}

fn open(deck: &MockDeck, options: SessionOptions) -> DeviceSession {
    let transport = MockTransport::new().with_deck(deck.clone());
    DeviceSession::open(&transport, deck.descriptor(), options).unwrap()
}

#[test]
fn test_writers_and_watcher_never_overlap() {
    init_test_logging();
    let deck = MockDeck::new(DeviceModel::Xl).with_op_delay(Duration::from_millis(1));
    deck.queue_tap(3);
    let session = open(&deck, SessionOptions::default());
    let workers = BackgroundWorkers::new();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    InputWatcher {
        poll_interval: Duration::from_millis(2),
    }
    .spawn(&session, &workers, move |event| sink.lock().push(event))
    .unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let session = session.clone();
            thread::spawn(move || {
                for key in (t..32).step_by(4) {
                    session.exclusive().unwrap().update_key(key, &key_image(key + 1)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    // Give the watcher a chance to drain the queued tap.
    for _ in 0..200 {
        if events.lock().len() >= 2 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(workers.shutdown(), 1);
    session.close().unwrap();

    assert_eq!(deck.max_in_flight(), 1);
    assert_eq!(deck.keys_with_images().len(), 32);
    assert_eq!(deck.key_image(7).map(|b| b.len()), Some(8));
    assert_eq!(
        *events.lock(),
        vec![
            ButtonEvent { key: 3, pressed: true },
            ButtonEvent { key: 3, pressed: false },
        ]
    );
}

#[test]
fn test_held_lock_reports_busy_to_other_clients() {
    let deck = MockDeck::new(DeviceModel::Mk2);
    let session = open(
        &deck,
        SessionOptions {
            lock_timeout: Some(Duration::from_millis(20)),
        },
    );

    let holder = session.exclusive().unwrap();
    let other = session.clone();
    let result = thread::spawn(move || other.exclusive().map(|_| ()))
        .join()
        .unwrap();
    drop(holder);

    assert!(matches!(result, Err(DeviceError::Busy { .. })));
    assert!(session.exclusive().is_ok());
}

#[test]
fn test_close_is_final_for_every_clone() {
    let deck = MockDeck::new(DeviceModel::Mini);
    let session = open(&deck, SessionOptions::default());
    let clone = session.clone();

    session.close().unwrap();
    assert!(clone.is_closed());
    assert!(matches!(clone.close(), Err(DeviceError::Closed { .. })));
    assert!(matches!(
        clone.exclusive().map(|_| ()),
        Err(DeviceError::Closed { .. })
    ));
    deck.assert_operations(&[Operation::Close]);
}

#[test]
fn test_dropped_session_closes_device() {
    let deck = MockDeck::new(DeviceModel::Original);
    {
        let session = open(&deck, SessionOptions::default());
        session.exclusive().unwrap().reset().unwrap();
    }
    deck.assert_operations(&[Operation::Reset, Operation::Close]);
}

#[test]
fn test_out_of_range_key_writes_nothing() {
    let deck = MockDeck::new(DeviceModel::Mini);
    let session = open(&deck, SessionOptions::default());

    for index in [6, 255, 256, usize::MAX] {
        let err = session
            .exclusive()
            .unwrap()
            .update_key(index, &key_image(4))
            .unwrap_err();
        assert!(matches!(err, DeviceError::KeyIndex { key_count: 6, .. }), "{index}");
    }
    deck.assert_no_operations();
}

#[test]
fn test_transport_failure_names_operation_and_device() {
    let deck = MockDeck::with_id(DeviceModel::Xl, "XL-77");
    let session = open(&deck, SessionOptions::default());
    deck.inject_error(TransportError::new("usb pipe stalled"));

    let err = session.exclusive().unwrap().reset().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("XL-77"), "{message}");
    assert!(message.contains("reset"), "{message}");
    assert!(message.contains("usb pipe stalled"), "{message}");

    // The injected error is one-shot; the session stays usable.
    session.exclusive().unwrap().set_brightness(30).unwrap();
    assert_eq!(deck.brightness(), 30);
}

#[test]
fn test_busy_and_missing_devices_fail_to_open() {
    let busy = MockDeck::with_id(DeviceModel::Mk2, "TAKEN").busy();
    let transport = MockTransport::new().with_deck(busy.clone());
    assert!(matches!(
        DeviceSession::open(&transport, busy.descriptor(), SessionOptions::default()),
        Err(DeviceError::Busy { .. })
    ));

    let ghost = DeviceModel::Mk2.descriptor("GHOST");
    assert!(matches!(
        DeviceSession::open(&transport, &ghost, SessionOptions::default()),
        Err(DeviceError::NotFound { .. })
    ));

    let devices = transport.enumerate().unwrap();
    assert_eq!(select_device(devices, Some("TAKEN")).unwrap().id, "TAKEN");
}
