//! Test fixture helpers for creating temporary test data.
//!
//! Provides utilities for generating temporary directories with icons and
//! configuration files that are automatically cleaned up.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

/// Encode a solid-color square as PNG.
#[must_use]
pub fn png_bytes(size: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(size, size, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

/// Encode a solid-color square as JPEG.
#[must_use]
pub fn jpeg_bytes(size: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(size, size, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg)
        .expect("Failed to encode JPEG");
    out.into_inner()
}

/// Base64 payload of a solid-color PNG.
#[must_use]
pub fn png_base64(size: u32, color: [u8; 3]) -> String {
    STANDARD.encode(png_bytes(size, color))
}

/// A temporary directory holding a configuration file and its icons.
///
/// # Example
///
/// ```ignore
/// let workspace = Workspace::new();
/// workspace.write_icon("icons/sun.png", [255, 200, 0]);
/// let path = workspace.write("home.toml", &home_toml());
/// // Directory is automatically cleaned up when `workspace` is dropped
/// ```
pub struct Workspace {
    pub dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// # Panics
    ///
    /// Panics if the temp directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a text file relative to the workspace root.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        self.write_bytes(relative, content.as_bytes())
    }

    /// Write a binary file relative to the workspace root.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_bytes(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        std::fs::write(&path, content)
            .unwrap_or_else(|e| panic!("Failed to write {}: {e}", path.display()));
        path
    }

    /// Write a 32x32 PNG icon.
    pub fn write_icon(&self, relative: &str, color: [u8; 3]) -> PathBuf {
        self.write_bytes(relative, &png_bytes(32, color))
    }
}

/// A complete TOML document: one file-backed and one embedded image, a light,
/// two actions and three environments in the order `dawn`, `noon`, `dusk`.
///
/// The file image points at `icons/sun.png` relative to the document.
#[must_use]
pub fn home_toml() -> String {
    format!(
        r#"title = "Home"

[components.images.sun]
mime = "image/png"
path = "icons/sun.png"

[components.images.moon]
mime = "image/png"
base64 = "{moon}"

[components.lights.desk]
interface = "hue"

[components.sounds.rain]

[components.playlists.evening]

[actions.lights_on]
name = "Lights on"
icon = "sun"

[actions.lights_off]
name = "Lights off"
icon = "moon"

[environments.dawn]
name = "Dawn"
icon = "sun"
actions = ["lights_on"]

[environments.noon]
name = "Noon"
icon = "sun"
on_entry = ["lights_on"]

[environments.dusk]
name = "Dusk"
icon = "moon"
actions = ["lights_off"]
on_exit = ["lights_on"]
"#,
        moon = png_base64(32, [20, 20, 80])
    )
}

/// A workspace containing `home.toml` and the icon it references.
#[must_use]
pub fn home_workspace() -> (Workspace, PathBuf) {
    let workspace = Workspace::new();
    workspace.write_icon("icons/sun.png", [250, 200, 40]);
    let path = workspace.write("home.toml", &home_toml());
    (workspace, path)
}

/// A document with exactly two problems: an unknown field on a light and a
/// MIME type outside the permitted set.
pub const TWO_ERRORS_TOML: &str = r#"
title = "Broken"
actions = {}
environments = {}

[components.images.sun]
mime = "image/gif"
path = "sun.gif"

[components.lights.desk]
interface = "hue"
brightness = 10
"#;
