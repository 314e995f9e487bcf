//! Configuration module for ambiance documents.
//!
//! Handles the typed model, strict multi-error validation, and loading of
//! TOML/YAML/JSON documents.

mod loader;
mod path;
mod schema;
mod validate;

pub use loader::{
    ConfigFormat, LoadedConfig, load_config, parse_config, parse_document, validate_document,
};
pub use path::resolve_path;
pub use schema::{
    Action, Base64Image, Components, Configuration, Environment, FileImage, HueLight, Image,
    ImageMime, Light, Playlist, Registry, Sound,
};
pub use validate::{Validator, check_references};
