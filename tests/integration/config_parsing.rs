//! Integration tests for configuration loading.
//!
//! Tests verify format detection, order preservation, and that every
//! violated constraint is reported at its field path.

use ambiance::config::{ConfigFormat, Image, Light, load_config, parse_config};
use ambiance::error::{AmbianceError, IssueKind, ValidationError};

use crate::common::fixtures::{TWO_ERRORS_TOML, Workspace, home_toml, home_workspace};
use crate::common::init_test_logging;

fn validation_error(result: ambiance::error::Result<impl std::fmt::Debug>) -> ValidationError {
    match result {
        Err(AmbianceError::Validation(err)) => err,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_load_home_document() {
    init_test_logging();
    let (workspace, path) = home_workspace();
    let loaded = load_config(&path).unwrap();

    assert_eq!(loaded.config_dir, workspace.path());
    let config = &loaded.config;
    assert_eq!(config.title, "Home");
    assert!(matches!(config.components.images["sun"], Image::File(_)));
    assert!(matches!(config.components.images["moon"], Image::Base64(_)));
    assert!(matches!(config.components.lights["desk"], Light::Hue(_)));
    assert_eq!(config.components.sounds.len(), 1);
    assert_eq!(config.components.playlists.len(), 1);

    let dusk = &config.environments["dusk"];
    assert_eq!(dusk.actions, vec!["lights_off".to_string()]);
    assert_eq!(dusk.on_exit.as_deref(), Some(&["lights_on".to_string()][..]));
    assert!(dusk.on_entry.is_none());
}

#[test]
fn test_environment_order_survives_every_format() {
    let toml_config = parse_config(&home_toml(), ConfigFormat::Toml).unwrap();
    let order: Vec<_> = toml_config.environments.keys().cloned().collect();
    assert_eq!(order, ["dawn", "noon", "dusk"]);

    let json = serde_json::to_string(&toml_config).unwrap();
    let json_config = parse_config(&json, ConfigFormat::Json).unwrap();
    assert_eq!(json_config, toml_config);

    let yaml = serde_yaml::to_string(&toml_config).unwrap();
    let yaml_config = parse_config(&yaml, ConfigFormat::Yaml).unwrap();
    assert_eq!(yaml_config, toml_config);
}

#[test]
fn test_reordering_document_changes_order() {
    let reordered = home_toml().replace("[environments.dawn]", "[environments.zzz_dawn]");
    let config = parse_config(&reordered, ConfigFormat::Toml).unwrap();
    let order: Vec<_> = config.environments.keys().cloned().collect();
    assert_eq!(order, ["zzz_dawn", "noon", "dusk"]);
}

#[test]
fn test_two_separate_errors_are_both_reported() {
    let err = validation_error(parse_config(TWO_ERRORS_TOML, ConfigFormat::Toml));
    assert_eq!(err.len(), 2, "{err}");

    let mut paths: Vec<_> = err.issues.iter().map(|i| i.path.to_string()).collect();
    paths.sort();
    assert_eq!(
        paths,
        ["components.images.sun.mime", "components.lights.desk.brightness"]
    );
    assert_eq!(err.of_kind(IssueKind::UnknownField).count(), 1);
    assert_eq!(err.of_kind(IssueKind::InvalidValue).count(), 1);
}

#[test]
fn test_unknown_field_at_every_depth() {
    let cases = [
        ("title = \"Home\"", "title = \"Home\"\ntheme = \"dark\"", "theme"),
        ("[components.images.sun]", "[components.images.sun]\nalt = \"x\"", "components.images.sun.alt"),
        ("[actions.lights_on]", "[actions.lights_on]\nhotkey = 1", "actions.lights_on.hotkey"),
        ("[environments.noon]", "[environments.noon]\ncolor = \"red\"", "environments.noon.color"),
        ("[components.sounds.rain]", "[components.sounds.rain]\nvolume = 3", "components.sounds.rain.volume"),
    ];
    for (anchor, replacement, expected) in cases {
        let document = home_toml().replacen(anchor, replacement, 1);
        let err = validation_error(parse_config(&document, ConfigFormat::Toml));
        assert_eq!(err.len(), 1, "{expected}: {err}");
        assert_eq!(err.issues[0].path.to_string(), expected);
        assert_eq!(err.issues[0].kind, IssueKind::UnknownField);
    }
}

#[test]
fn test_dangling_references_reported_together() {
    let document = home_toml()
        .replacen("icon = \"moon\"\nactions", "icon = \"stars\"\nactions", 1)
        .replacen("on_entry = [\"lights_on\"]", "on_entry = [\"fanfare\"]", 1);
    let err = validation_error(parse_config(&document, ConfigFormat::Toml));

    let paths: Vec<_> = err.issues.iter().map(|i| i.path.to_string()).collect();
    assert_eq!(paths, ["environments.noon.on_entry.0", "environments.dusk.icon"]);
    assert!(err.issues.iter().all(|i| i.kind == IssueKind::UnknownReference));
}

#[test]
fn test_broken_schema_does_not_hide_dangling_icon() {
    let document = home_toml()
        .replacen("title = \"Home\"", "title = \"Home\"\ntheme = \"dark\"", 1)
        .replacen("icon = \"moon\"\nactions", "icon = \"stars\"\nactions", 1);
    let err = validation_error(parse_config(&document, ConfigFormat::Toml));

    let paths: Vec<_> = err.issues.iter().map(|i| i.path.to_string()).collect();
    assert_eq!(paths, ["theme", "environments.dusk.icon"]);
    assert_eq!(err.of_kind(IssueKind::UnknownField).count(), 1);
    assert_eq!(err.of_kind(IssueKind::UnknownReference).count(), 1);
}

#[test]
fn test_yaml_image_without_payload_matches_no_variant() {
    let document = r"
title: Home
components:
  images:
    sun:
      mime: image/png
actions: {}
environments: {}
";
    let err = validation_error(parse_config(document, ConfigFormat::Yaml));
    assert_eq!(err.len(), 1);
    assert_eq!(err.issues[0].kind, IssueKind::NoVariantMatched);
    assert!(err.issues[0].message.contains("Base64Image"));
    assert!(err.issues[0].message.contains("FileImage"));
}

#[test]
fn test_load_errors_are_distinguished() {
    let workspace = Workspace::new();

    let missing = load_config(workspace.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, AmbianceError::ConfigNotFound { .. }));

    let ini = workspace.write("home.ini", "title = x");
    assert!(matches!(
        load_config(&ini).unwrap_err(),
        AmbianceError::UnknownFormat { .. }
    ));

    let broken = workspace.write("broken.json", "{ \"title\": ");
    assert!(matches!(
        load_config(&broken).unwrap_err(),
        AmbianceError::ConfigParse { format: "JSON", .. }
    ));
}
