//! Error types for ambiance panel operations.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Dotted location of a value inside a configuration document,
/// e.g. `environments.kitchen.icon`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The document root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a named child of this node.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Path of the `index`-th element of a sequence at this node.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

/// Category of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownField,
    MissingField,
    WrongType,
    InvalidValue,
    NoVariantMatched,
    UnknownReference,
}

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: FieldPath,
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every constraint a configuration document violates, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of a single kind.
    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failure to turn an image reference into bytes.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("embedded base64 image is malformed: {0}")]
    Malformed(#[from] base64::DecodeError),

    #[error("cannot read image file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to produce a native key image.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("icon is not a decodable image: {0}")]
    DecodeFailed(#[source] image::ImageError),

    #[error("label font '{name}' is not available (known fonts: {known})")]
    FontUnavailable { name: String, known: String },

    #[error("failed to encode key image: {0}")]
    EncodeFailed(#[source] image::ImageError),
}

/// Failure reported by the hardware transport itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Device enumeration and session errors.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No Stream Deck devices found")]
    NoDevices,

    #[error("No device '{id}' found")]
    NotFound { id: String },

    #[error("Device '{id}' is busy: {reason}")]
    Busy { id: String, reason: String },

    #[error("Session for device '{id}' is closed")]
    Closed { id: String },

    #[error("Invalid key index {index}: device has {key_count} keys")]
    KeyIndex { index: usize, key_count: u8 },

    #[error("Invalid brightness value {value}: must be 0-100")]
    InvalidBrightness { value: u8 },

    #[error("Device '{id}' has no visual output")]
    NonVisual { id: String },

    #[error("Device '{id}' failed during {operation}: {source}")]
    Transport {
        id: String,
        operation: &'static str,
        #[source]
        source: TransportError,
    },
}

/// Primary error type for ambiance operations.
#[derive(Error, Debug)]
pub enum AmbianceError {
    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Unknown config format for '{path}': expected .toml, .yaml, .yml or .json")]
    UnknownFormat { path: String },

    #[error("Configuration parse error ({format}): {message}")]
    ConfigParse {
        format: &'static str,
        message: String,
    },

    #[error("Configuration is invalid: {0}")]
    Validation(#[from] ValidationError),

    // Dispatch errors
    #[error("Environment '{environment}' references unknown image '{key}'")]
    UnknownReference { environment: String, key: String },

    #[error("Environment '{environment}': {source}")]
    Resolve {
        environment: String,
        #[source]
        source: ResolveError,
    },

    #[error("Environment '{environment}': {source}")]
    Render {
        environment: String,
        #[source]
        source: RenderError,
    },

    #[error("{environments} environments configured but the device only has {keys} keys")]
    Capacity { environments: usize, keys: u8 },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Label font unavailable: {0}")]
    Font(RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AmbianceError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::UnknownFormat { .. }
                | Self::ConfigParse { .. }
                | Self::Validation(_)
                | Self::UnknownReference { .. }
                | Self::Capacity { .. }
                | Self::Font(_)
                | Self::Device(
                    DeviceError::NoDevices
                        | DeviceError::NotFound { .. }
                        | DeviceError::InvalidBrightness { .. }
                )
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Device(DeviceError::NoDevices) => Some("Ensure the Stream Deck is connected via USB"),
            Self::Device(DeviceError::NotFound { .. }) => {
                Some("Run: ambiance devices to list connected decks")
            }
            Self::Device(DeviceError::InvalidBrightness { .. }) => {
                Some("Use a value between 0 and 100")
            }
            Self::Device(DeviceError::Busy { .. }) => {
                Some("Close other applications using the device and retry")
            }
            Self::Validation(_) => Some("Run: ambiance validate <config> to list every issue"),
            Self::Capacity { .. } => Some("Remove environments or pass --truncate"),
            Self::UnknownFormat { .. } => Some("Rename the file with a .toml, .yaml or .json extension"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using AmbianceError.
pub type Result<T> = std::result::Result<T, AmbianceError>;
