//! Closed-world validation of configuration documents.
//!
//! Walks the generic value tree of a document and records every violated
//! constraint instead of stopping at the first one. Each node checks its own
//! fields and hands its children a prefixed [`FieldPath`], so the final
//! report is one flat, document-ordered list.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{FieldPath, Issue, IssueKind};

use super::schema::{ImageMime, Light};

const CONFIGURATION_FIELDS: &[&str] = &["title", "components", "actions", "environments"];
const COMPONENTS_FIELDS: &[&str] = &["images", "lights", "sounds", "playlists"];
const ACTION_FIELDS: &[&str] = &["name", "icon"];
const ENVIRONMENT_FIELDS: &[&str] = &["name", "icon", "actions", "on_entry", "on_exit"];
const BASE64_IMAGE_FIELDS: &[&str] = &["mime", "base64"];
const FILE_IMAGE_FIELDS: &[&str] = &["mime", "path"];
const HUE_LIGHT_FIELDS: &[&str] = &["interface"];

type Check = fn(&mut Validator, &Value, &FieldPath);

/// Collects issues while walking a document.
#[derive(Debug, Default)]
pub struct Validator {
    issues: Vec<Issue>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a whole document against the configuration schema.
    pub fn document(mut self, value: &Value) -> Vec<Issue> {
        self.configuration(value, &FieldPath::root());
        debug!(issues = self.issues.len(), "Schema validation finished");
        self.issues
    }

    fn push(&mut self, path: &FieldPath, kind: IssueKind, message: impl Into<String>) {
        let issue = Issue {
            path: path.clone(),
            kind,
            message: message.into(),
        };
        trace!(%issue, "Validation issue");
        self.issues.push(issue);
    }

    // === Primitive checks ===

    fn object<'v>(&mut self, value: &'v Value, path: &FieldPath) -> Option<&'v Map<String, Value>> {
        if let Value::Object(map) = value {
            Some(map)
        } else {
            self.wrong_type(path, "a table", value);
            None
        }
    }

    fn string(&mut self, value: &Value, path: &FieldPath) {
        if !value.is_string() {
            self.wrong_type(path, "a string", value);
        }
    }

    fn string_list(&mut self, value: &Value, path: &FieldPath) {
        let Value::Array(items) = value else {
            self.wrong_type(path, "a list of strings", value);
            return;
        };
        for (i, item) in items.iter().enumerate() {
            self.string(item, &path.index(i));
        }
    }

    fn optional_string_list(&mut self, value: &Value, path: &FieldPath) {
        if !value.is_null() {
            self.string_list(value, path);
        }
    }

    fn wrong_type(&mut self, path: &FieldPath, expected: &str, found: &Value) {
        self.push(
            path,
            IssueKind::WrongType,
            format!("expected {expected}, found {}", describe(found)),
        );
    }

    /// Report every key of `map` not listed in `allowed`.
    fn closed(&mut self, map: &Map<String, Value>, path: &FieldPath, allowed: &[&str]) {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                self.push(
                    &path.child(key.as_str()),
                    IssueKind::UnknownField,
                    "unknown field is not permitted",
                );
            }
        }
    }

    fn required(&mut self, map: &Map<String, Value>, path: &FieldPath, name: &str, check: Check) {
        let child = path.child(name);
        match map.get(name) {
            Some(value) => check(self, value, &child),
            None => self.push(&child, IssueKind::MissingField, "field required"),
        }
    }

    fn optional(&mut self, map: &Map<String, Value>, path: &FieldPath, name: &str, check: Check) {
        if let Some(value) = map.get(name) {
            check(self, value, &path.child(name));
        }
    }

    /// Validate a table whose values all follow `check`.
    fn registry(&mut self, value: &Value, path: &FieldPath, check: Check) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        for (key, entry) in map {
            check(self, entry, &path.child(key.as_str()));
        }
    }

    // === Schema nodes ===

    fn configuration(&mut self, value: &Value, path: &FieldPath) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        self.closed(map, path, CONFIGURATION_FIELDS);
        self.required(map, path, "title", Self::string);
        self.required(map, path, "components", Self::components);
        self.required(map, path, "actions", |v, value, path| {
            v.registry(value, path, Self::action);
        });
        self.required(map, path, "environments", |v, value, path| {
            v.registry(value, path, Self::environment);
        });
    }

    fn components(&mut self, value: &Value, path: &FieldPath) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        self.closed(map, path, COMPONENTS_FIELDS);
        self.optional(map, path, "images", |v, value, path| {
            v.registry(value, path, Self::image);
        });
        self.optional(map, path, "lights", |v, value, path| {
            v.registry(value, path, Self::light);
        });
        self.optional(map, path, "sounds", |v, value, path| {
            v.registry(value, path, Self::empty_component);
        });
        self.optional(map, path, "playlists", |v, value, path| {
            v.registry(value, path, Self::empty_component);
        });
    }

    fn action(&mut self, value: &Value, path: &FieldPath) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        self.closed(map, path, ACTION_FIELDS);
        self.required(map, path, "name", Self::string);
        self.required(map, path, "icon", Self::string);
    }

    fn environment(&mut self, value: &Value, path: &FieldPath) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        self.closed(map, path, ENVIRONMENT_FIELDS);
        self.required(map, path, "name", Self::string);
        self.required(map, path, "icon", Self::string);
        self.optional(map, path, "actions", Self::string_list);
        self.optional(map, path, "on_entry", Self::optional_string_list);
        self.optional(map, path, "on_exit", Self::optional_string_list);
    }

    fn mime(&mut self, value: &Value, path: &FieldPath) {
        let Some(literal) = value.as_str() else {
            self.wrong_type(path, "a MIME type string", value);
            return;
        };
        if ImageMime::from_literal(literal).is_none() {
            let permitted: Vec<_> = ImageMime::ALL.iter().map(|m| m.as_str()).collect();
            self.push(
                path,
                IssueKind::InvalidValue,
                format!(
                    "'{literal}' is not a permitted MIME type (expected one of: {})",
                    permitted.join(", ")
                ),
            );
        }
    }

    /// Images carry no discriminant; the variant is picked by which payload
    /// key is present and then validated strictly.
    fn image(&mut self, value: &Value, path: &FieldPath) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        match (map.contains_key("base64"), map.contains_key("path")) {
            (true, false) => {
                self.closed(map, path, BASE64_IMAGE_FIELDS);
                self.required(map, path, "mime", Self::mime);
                self.required(map, path, "base64", Self::string);
            }
            (false, true) => {
                self.closed(map, path, FILE_IMAGE_FIELDS);
                self.required(map, path, "mime", Self::mime);
                self.required(map, path, "path", Self::string);
            }
            _ => self.push(
                path,
                IssueKind::NoVariantMatched,
                "no image variant matched (tried Base64Image {mime, base64}, FileImage {mime, path})",
            ),
        }
    }

    /// Lights are discriminated by their `interface` literal.
    fn light(&mut self, value: &Value, path: &FieldPath) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        let interface_path = path.child("interface");
        match map.get("interface") {
            None => {
                self.push(
                    &interface_path,
                    IssueKind::MissingField,
                    "discriminant field required",
                );
            }
            Some(Value::String(interface)) if Light::INTERFACES.contains(&interface.as_str()) => {
                self.closed(map, path, HUE_LIGHT_FIELDS);
            }
            Some(other) => {
                self.push(
                    &interface_path,
                    IssueKind::NoVariantMatched,
                    format!(
                        "no light variant matches interface {other} (expected one of: {})",
                        Light::INTERFACES.join(", ")
                    ),
                );
            }
        }
    }

    fn empty_component(&mut self, value: &Value, path: &FieldPath) {
        if let Some(map) = self.object(value, path) {
            self.closed(map, path, &[]);
        }
    }
}

/// Check that every name used by actions and environments exists.
///
/// Works on the untyped document so dangling names are reported in the same
/// pass as schema issues. Values of the wrong type are skipped here; the
/// schema walk already reports them. A registry that is not a table disables
/// the checks against it.
pub fn check_references(document: &Value) -> Vec<Issue> {
    let mut refs = References {
        images: registry_names(document.get("components").and_then(|c| c.get("images"))),
        actions: registry_names(document.get("actions")),
        issues: Vec::new(),
    };
    let root = FieldPath::root();

    if let Some(Value::Object(entries)) = document.get("actions") {
        for (key, action) in entries {
            if let Some(icon) = action.get("icon") {
                refs.image(icon, root.child("actions").child(key.as_str()).child("icon"));
            }
        }
    }

    if let Some(Value::Object(entries)) = document.get("environments") {
        for (key, environment) in entries {
            let env_path = root.child("environments").child(key.as_str());
            if let Some(icon) = environment.get("icon") {
                refs.image(icon, env_path.child("icon"));
            }
            for field in ["actions", "on_entry", "on_exit"] {
                let Some(Value::Array(names)) = environment.get(field) else {
                    continue;
                };
                for (index, name) in names.iter().enumerate() {
                    refs.action(name, env_path.child(field).index(index));
                }
            }
        }
    }

    debug!(issues = refs.issues.len(), "Reference check finished");
    refs.issues
}

/// Declared names, or `None` when the registry is not a table.
fn registry_names(registry: Option<&Value>) -> Option<HashSet<&str>> {
    match registry {
        None => Some(HashSet::new()),
        Some(Value::Object(map)) => Some(map.keys().map(String::as_str).collect()),
        Some(_) => None,
    }
}

struct References<'a> {
    images: Option<HashSet<&'a str>>,
    actions: Option<HashSet<&'a str>>,
    issues: Vec<Issue>,
}

impl References<'_> {
    fn image(&mut self, value: &Value, path: FieldPath) {
        if let Some(name) = Self::dangling(self.images.as_ref(), value) {
            self.push(path, format!("image '{name}' is not defined in components.images"));
        }
    }

    fn action(&mut self, value: &Value, path: FieldPath) {
        if let Some(name) = Self::dangling(self.actions.as_ref(), value) {
            self.push(path, format!("action '{name}' is not defined in actions"));
        }
    }

    fn dangling<'v>(names: Option<&HashSet<&str>>, value: &'v Value) -> Option<&'v str> {
        let name = value.as_str()?;
        (!names?.contains(name)).then_some(name)
    }

    fn push(&mut self, path: FieldPath, message: String) {
        trace!(%path, %message, "Dangling reference");
        self.issues.push(Issue {
            path,
            kind: IssueKind::UnknownReference,
            message,
        });
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a table",
    }
}
