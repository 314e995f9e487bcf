//! Loading of ambiance documents from TOML, YAML or JSON files.
//!
//! Documents are first read into a generic ordered value tree so that
//! [`Validator`] and [`check_references`] can report every schema and
//! reference problem in one pass; only a clean tree is turned into a typed
//! [`Configuration`].

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, instrument, trace};

use crate::error::{AmbianceError, FieldPath, Issue, IssueKind, Result, ValidationError};

use super::schema::Configuration;
use super::validate::{Validator, check_references};

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (.toml).
    Toml,
    /// YAML format (.yaml, .yml).
    Yaml,
    /// JSON format (.json).
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        trace!(extension = %ext, "Detecting config format from extension");
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }
}

/// A validated configuration together with the directory it was read from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config_dir: PathBuf,
    pub config: Configuration,
}

/// Load and validate a configuration file.
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable, its extension is
/// unknown, its syntax is broken, or it violates the schema. Schema
/// violations are reported together as [`AmbianceError::Validation`].
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LoadedConfig> {
    let path = path.as_ref();
    info!("Loading configuration file");

    let format = ConfigFormat::from_extension(path).ok_or_else(|| AmbianceError::UnknownFormat {
        path: path.display().to_string(),
    })?;
    debug!(format = format.name(), "Detected config format");

    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AmbianceError::ConfigNotFound {
                path: path.display().to_string(),
            }
        } else {
            AmbianceError::Io(e)
        }
    })?;
    debug!(bytes = content.len(), "Read config file");

    let config = parse_config(&content, format)?;
    let config_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    Ok(LoadedConfig {
        path: path.to_path_buf(),
        config_dir,
        config,
    })
}

/// Parse and validate an in-memory document.
///
/// # Errors
///
/// Returns [`AmbianceError::ConfigParse`] for syntax errors and
/// [`AmbianceError::Validation`] listing every schema and reference issue.
#[instrument(skip(content), fields(format = format.name(), content_len = content.len()))]
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Configuration> {
    let document = parse_document(content, format)?;
    let config = validate_document(document)?;

    info!(
        title = %config.title,
        environments = config.environments.len(),
        images = config.components.images.len(),
        "Configuration loaded and validated"
    );
    Ok(config)
}

/// Parse a document into a generic value tree without schema checks.
///
/// # Errors
///
/// Returns [`AmbianceError::ConfigParse`] if the text is not well-formed.
pub fn parse_document(content: &str, format: ConfigFormat) -> Result<Value> {
    trace!("Parsing config content");
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str::<Value>(content).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| AmbianceError::ConfigParse {
        format: format.name(),
        message,
    })
}

/// Turn a generic document into a [`Configuration`], collecting all issues.
///
/// # Errors
///
/// Returns a [`ValidationError`] holding every schema issue followed by
/// every unresolved reference.
pub fn validate_document(document: Value) -> std::result::Result<Configuration, ValidationError> {
    let mut issues = Validator::new().document(&document);
    issues.extend(check_references(&document));
    if !issues.is_empty() {
        return Err(ValidationError { issues });
    }

    serde_json::from_value(document).map_err(|e| ValidationError {
        issues: vec![Issue {
            path: FieldPath::root(),
            kind: IssueKind::InvalidValue,
            message: e.to_string(),
        }],
    })
}
