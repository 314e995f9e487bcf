//! Resolution of image components into raw bytes.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, instrument, warn};

use crate::config::{Image, ImageMime, resolve_path};
use crate::error::ResolveError;

/// Undecoded image bytes plus the MIME type the document declared for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub mime: ImageMime,
    pub bytes: Vec<u8>,
}

impl ResolvedImage {
    /// Whether the bytes look like the declared type.
    ///
    /// The declaration is advisory: a mismatch is logged, never rejected,
    /// because the renderer sniffs the real format anyway.
    pub fn declared_mime_matches(&self) -> bool {
        match image::guess_format(&self.bytes) {
            Ok(actual) if actual == self.mime.image_format() => true,
            Ok(actual) => {
                warn!(
                    declared = self.mime.as_str(),
                    actual = ?actual,
                    "Image content does not match its declared MIME type"
                );
                false
            }
            Err(_) => {
                warn!(declared = self.mime.as_str(), "Image content type could not be detected");
                false
            }
        }
    }
}

/// Turns [`Image`] components into bytes.
///
/// File paths are resolved against the directory of the configuration file
/// they came from.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    base_dir: PathBuf,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ImageResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Produce the raw bytes of an image component.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Malformed`] if an embedded payload is not valid
    /// base64, [`ResolveError::Io`] if a file cannot be read.
    #[instrument(skip_all, fields(mime = image.mime().as_str()))]
    pub fn resolve(&self, image: &Image) -> Result<ResolvedImage, ResolveError> {
        let bytes = match image {
            Image::Base64(inline) => {
                // Multi-line strings in documents often wrap the payload.
                let payload: String = inline
                    .base64
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = STANDARD.decode(payload)?;
                debug!(bytes = bytes.len(), "Decoded embedded image");
                bytes
            }
            Image::File(file) => {
                let path = resolve_path(&file.path, &self.base_dir);
                let bytes = std::fs::read(&path).map_err(|source| ResolveError::Io {
                    path: path.clone(),
                    source,
                })?;
                debug!(path = %path.display(), bytes = bytes.len(), "Read image file");
                bytes
            }
        };

        let resolved = ResolvedImage {
            mime: image.mime(),
            bytes,
        };
        resolved.declared_mime_matches();
        Ok(resolved)
    }
}
