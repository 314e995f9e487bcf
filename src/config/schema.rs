//! Typed configuration model for ambiance documents.
//!
//! Every struct rejects unknown keys and every map keeps its declaration
//! order; environment order decides which physical key an environment gets.
//! Instances are normally produced by [`super::parse_config`], which reports
//! all schema problems at once before these types are deserialized.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named registry of components, in declaration order.
pub type Registry<T> = IndexMap<String, T>;

/// Root of an ambiance configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Human-readable title of the panel.
    pub title: String,

    /// Reusable resources referenced by actions and environments.
    pub components: Components,

    /// Named actions.
    pub actions: Registry<Action>,

    /// Named environments; environment *i* is shown on key *i*.
    pub environments: Registry<Environment>,
}

/// The four independent component namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Components {
    #[serde(default)]
    pub images: Registry<Image>,
    #[serde(default)]
    pub lights: Registry<Light>,
    #[serde(default)]
    pub sounds: Registry<Sound>,
    #[serde(default)]
    pub playlists: Registry<Playlist>,
}

/// Declared content type of an image component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ImageMime {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageMime {
    /// Every accepted literal, in declaration order.
    pub const ALL: [Self; 2] = [Self::Png, Self::Jpeg];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn from_literal(literal: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mime| mime.as_str() == literal)
    }

    /// Matching sniffed format from the `image` crate.
    pub const fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Image component, distinguished by shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Image {
    /// Pixel data embedded in the document.
    Base64(Base64Image),
    /// Pixel data read from disk when resolved.
    File(FileImage),
}

impl Image {
    pub const fn mime(&self) -> ImageMime {
        match self {
            Self::Base64(image) => image.mime,
            Self::File(image) => image.mime,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Base64Image {
    pub mime: ImageMime,
    pub base64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileImage {
    pub mime: ImageMime,
    pub path: PathBuf,
}

/// Light component, discriminated by its `interface` literal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "interface", rename_all = "lowercase")]
pub enum Light {
    Hue(HueLight),
}

impl Light {
    /// Every accepted `interface` literal.
    pub const INTERFACES: [&'static str; 1] = ["hue"];
}

/// Philips Hue light. No control backend exists yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HueLight {}

/// Sound component (schema placeholder).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Sound {}

/// Playlist component (schema placeholder).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Playlist {}

/// A named trigger with its own icon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    pub name: String,
    pub icon: String,
}

/// An ambiance state bound to one physical key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    /// Label rendered on the key.
    pub name: String,

    /// Key into `components.images`.
    pub icon: String,

    /// Actions available in this environment.
    #[serde(default)]
    pub actions: Vec<String>,

    /// Actions triggered when the environment is entered.
    #[serde(default)]
    pub on_entry: Option<Vec<String>>,

    /// Actions triggered when the environment is left.
    #[serde(default)]
    pub on_exit: Option<Vec<String>>,
}
