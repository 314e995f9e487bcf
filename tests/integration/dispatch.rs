//! Integration tests for full synchronization passes.
//!
//! Each test loads a real document from a temp directory, then applies it to
//! a mock deck and checks what reached the device.

use std::time::Duration;

use ambiance::config::{ConfigFormat, Configuration, load_config, parse_config};
use ambiance::device::mock::{MockDeck, MockTransport, Operation};
use ambiance::device::{BackgroundWorkers, DeviceDescriptor, DeviceModel};
use ambiance::dispatch::{
    CapacityPolicy, DispatchEvent, DispatchOptions, Dispatcher, KeyFailurePolicy,
};
use ambiance::error::AmbianceError;
use ambiance::render::KeyRenderer;
use ambiance::resolve::ImageResolver;

use crate::common::fixtures::{Workspace, home_toml, home_workspace};
use crate::common::init_test_logging;

fn dispatcher(workspace: &Workspace, options: DispatchOptions) -> Dispatcher {
    Dispatcher::new(
        ImageResolver::new(workspace.path()),
        KeyRenderer::default(),
        options,
    )
}

#[test]
fn test_home_document_fills_first_keys() {
    init_test_logging();
    let (workspace, path) = home_workspace();
    let loaded = load_config(&path).unwrap();
    let deck = MockDeck::new(DeviceModel::Mini);
    let transport = MockTransport::new().with_deck(deck.clone());

    let report = Dispatcher::new(
        ImageResolver::new(&loaded.config_dir),
        KeyRenderer::default(),
        DispatchOptions {
            brightness: 60,
            ..DispatchOptions::default()
        },
    )
    .run(&loaded.config, &transport, deck.descriptor(), &BackgroundWorkers::new())
    .unwrap();
    drop(workspace);

    assert!(report.is_complete());
    assert_eq!(report.device_id, "MOCK-Mini-001");
    let environments: Vec<_> = report.assigned.iter().map(|a| a.environment.as_str()).collect();
    assert_eq!(environments, ["dawn", "noon", "dusk"]);

    assert_eq!(deck.keys_with_images(), vec![0, 1, 2]);
    assert_eq!(deck.brightness(), 60);
    assert_eq!(deck.max_in_flight(), 1);

    let ops = deck.operations();
    assert_eq!(ops.first(), Some(&Operation::Reset));
    assert_eq!(ops.get(1), Some(&Operation::SetBrightness { percent: 60 }));
    assert_eq!(ops.last(), Some(&Operation::Close));
    assert_eq!(ops.len(), 6);
}

#[test]
fn test_reordering_environments_moves_images() {
    let (workspace, _) = home_workspace();
    let original = parse_config(&home_toml(), ConfigFormat::Toml).unwrap();

    // Move `dawn` to the end of the document.
    let text = home_toml();
    let dawn_start = text.find("[environments.dawn]").unwrap();
    let noon_start = text.find("[environments.noon]").unwrap();
    let reordered = format!(
        "{}{}\n{}",
        &text[..dawn_start],
        &text[noon_start..],
        &text[dawn_start..noon_start]
    );
    let swapped = parse_config(&reordered, ConfigFormat::Toml).unwrap();

    let run = |config: &Configuration| {
        let deck = MockDeck::new(DeviceModel::Mk2);
        let transport = MockTransport::new().with_deck(deck.clone());
        dispatcher(&workspace, DispatchOptions::default())
            .run(config, &transport, deck.descriptor(), &BackgroundWorkers::new())
            .unwrap();
        deck
    };
    let before = run(&original);
    let after = run(&swapped);

    // dawn (key 0 before) now sits on key 2; noon moved up to key 0.
    assert_eq!(before.key_image(0), after.key_image(2));
    assert_eq!(before.key_image(1), after.key_image(0));
    assert_ne!(before.key_image(0), after.key_image(0));
}

#[test]
fn test_too_many_environments_rejected_before_io() {
    let (workspace, _) = home_workspace();
    let config = parse_config(&home_toml(), ConfigFormat::Toml).unwrap();
    let small = MockDeck::with_descriptor(DeviceDescriptor {
        key_count: 2,
        ..DeviceModel::Mini.descriptor("TINY")
    });
    let transport = MockTransport::new().with_deck(small.clone());

    let err = dispatcher(&workspace, DispatchOptions::default())
        .run(&config, &transport, small.descriptor(), &BackgroundWorkers::new())
        .unwrap_err();
    assert!(matches!(err, AmbianceError::Capacity { environments: 3, keys: 2 }));
    assert_eq!(small.open_count(), 0);
    small.assert_no_operations();

    let report = dispatcher(
        &workspace,
        DispatchOptions {
            capacity: CapacityPolicy::Truncate,
            ..DispatchOptions::default()
        },
    )
    .run(&config, &transport, small.descriptor(), &BackgroundWorkers::new())
    .unwrap();
    assert_eq!(report.skipped, vec!["dusk".to_string()]);
    assert!(!report.is_complete());
    assert_eq!(small.keys_with_images(), vec![0, 1]);
}

#[test]
fn test_missing_icon_file_under_each_policy() {
    // No icons/sun.png: dawn and noon cannot be rendered, dusk can.
    let workspace = Workspace::new();
    let config = parse_config(&home_toml(), ConfigFormat::Toml).unwrap();

    let deck = MockDeck::new(DeviceModel::Xl);
    let transport = MockTransport::new().with_deck(deck.clone());
    let err = dispatcher(&workspace, DispatchOptions::default())
        .run(&config, &transport, deck.descriptor(), &BackgroundWorkers::new())
        .unwrap_err();
    assert!(matches!(err, AmbianceError::Resolve { ref environment, .. } if environment == "dawn"));
    assert!(deck.keys_with_images().is_empty());
    assert_eq!(deck.operations().last(), Some(&Operation::Close));

    let deck = MockDeck::new(DeviceModel::Xl);
    let transport = MockTransport::new().with_deck(deck.clone());
    let mut events = Vec::new();
    let report = dispatcher(
        &workspace,
        DispatchOptions {
            on_failure: KeyFailurePolicy::Skip,
            ..DispatchOptions::default()
        },
    )
    .run_observed(
        &config,
        &transport,
        deck.descriptor(),
        &BackgroundWorkers::new(),
        &mut |event| {
            events.push(match event {
                DispatchEvent::Started { .. } => "started",
                DispatchEvent::KeyUpdated { .. } => "updated",
                DispatchEvent::KeyFailed { .. } => "failed",
                DispatchEvent::Finished => "finished",
            });
        },
    )
    .unwrap();

    assert_eq!(events, ["started", "failed", "failed", "updated", "finished"]);
    let failed: Vec<_> = report.failed.iter().map(|f| f.environment.as_str()).collect();
    assert_eq!(failed, ["dawn", "noon"]);
    assert_eq!(deck.keys_with_images(), vec![2]);
}

#[test]
fn test_device_failure_aborts_even_when_skipping() {
    let (workspace, _) = home_workspace();
    let config = parse_config(&home_toml(), ConfigFormat::Toml).unwrap();
    let deck = MockDeck::new(DeviceModel::Xl).with_failing_keys(&[1]);
    let transport = MockTransport::new().with_deck(deck.clone());

    let err = dispatcher(
        &workspace,
        DispatchOptions {
            on_failure: KeyFailurePolicy::Skip,
            ..DispatchOptions::default()
        },
    )
    .run(&config, &transport, deck.descriptor(), &BackgroundWorkers::new())
    .unwrap_err();

    assert!(matches!(err, AmbianceError::Device(_)));
    assert_eq!(deck.keys_with_images(), vec![0]);
    assert_eq!(deck.operations().last(), Some(&Operation::Close));
}

#[test]
fn test_hold_polls_buttons_then_drains() {
    let (workspace, _) = home_workspace();
    let config = parse_config(&home_toml(), ConfigFormat::Toml).unwrap();
    let deck = MockDeck::new(DeviceModel::Mk2);
    deck.queue_tap(1);
    let transport = MockTransport::new().with_deck(deck.clone());
    let workers = BackgroundWorkers::new();

    dispatcher(
        &workspace,
        DispatchOptions {
            hold: Some(Duration::from_millis(100)),
            ..DispatchOptions::default()
        },
    )
    .run(&config, &transport, deck.descriptor(), &workers)
    .unwrap();

    assert!(workers.is_empty());
    assert!(deck.button_reads() >= 2);
    assert_eq!(deck.max_in_flight(), 1);
    assert_eq!(deck.operations().last(), Some(&Operation::Close));
}
