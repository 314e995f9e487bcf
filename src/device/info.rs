//! Device descriptor and key image format types.

use std::fmt;

use serde::Serialize;

/// Encoding a device expects for key images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Jpeg,
    Bmp,
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Bmp => "BMP",
        })
    }
}

/// Counter-clockwise rotation applied before encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl Rotation {
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// Independent horizontal and vertical mirroring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Mirror {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Mirror {
    pub const NONE: Self = Self::new(false, false);
    pub const BOTH: Self = Self::new(true, true);

    pub const fn new(horizontal: bool, vertical: bool) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub const fn describe(self) -> &'static str {
        match (self.horizontal, self.vertical) {
            (false, false) => "not mirrored",
            (true, false) => "mirrored horizontally",
            (false, true) => "mirrored vertically",
            (true, true) => "mirrored horizontally/vertically",
        }
    }
}

/// Pixel and geometry contract for key images on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct KeyImageFormat {
    /// Width and height in pixels.
    pub size: (u32, u32),
    pub encoding: ImageEncoding,
    pub rotation: Rotation,
    pub mirror: Mirror,
}

/// Key grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyLayout {
    pub rows: u8,
    pub cols: u8,
}

/// Rows first, as in `2x3` for a Mini.
impl fmt::Display for KeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// A device found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    /// Transport-specific identifier (the serial number for Stream Decks).
    pub id: String,
    /// Human-readable product name.
    pub type_name: String,
    pub key_count: u8,
    pub layout: KeyLayout,
    /// `None` for devices without displays, such as pedals.
    pub image_format: Option<KeyImageFormat>,
}

impl DeviceDescriptor {
    pub const fn is_visual(&self) -> bool {
        self.image_format.is_some()
    }
}

/// Supported Stream Deck device models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceModel {
    /// Stream Deck Mini (6 keys, 3x2)
    Mini,
    /// Stream Deck Original (15 keys, 5x3)
    Original,
    /// Stream Deck MK.2 (15 keys, 5x3)
    Mk2,
    /// Stream Deck XL (32 keys, 8x4)
    Xl,
    /// Stream Deck Pedal (3 pedals, no display)
    Pedal,
    /// Stream Deck + (8 keys + LCD + dials)
    Plus,
}

impl DeviceModel {
    pub const fn key_count(self) -> u8 {
        match self {
            Self::Mini => 6,
            Self::Original | Self::Mk2 => 15,
            Self::Xl => 32,
            Self::Pedal => 3,
            Self::Plus => 8,
        }
    }

    pub const fn layout(self) -> KeyLayout {
        let (rows, cols) = match self {
            Self::Mini => (2, 3),
            Self::Original | Self::Mk2 => (3, 5),
            Self::Xl => (4, 8),
            Self::Pedal => (1, 3),
            Self::Plus => (2, 4),
        };
        KeyLayout { rows, cols }
    }

    pub const fn image_format(self) -> Option<KeyImageFormat> {
        let (side, encoding, rotation, mirror) = match self {
            Self::Mini => (80, ImageEncoding::Bmp, Rotation::Deg90, Mirror::new(false, true)),
            Self::Original => (72, ImageEncoding::Bmp, Rotation::Deg0, Mirror::BOTH),
            Self::Mk2 => (72, ImageEncoding::Jpeg, Rotation::Deg0, Mirror::BOTH),
            Self::Xl => (96, ImageEncoding::Jpeg, Rotation::Deg0, Mirror::BOTH),
            Self::Plus => (120, ImageEncoding::Jpeg, Rotation::Deg0, Mirror::NONE),
            Self::Pedal => return None,
        };
        Some(KeyImageFormat {
            size: (side, side),
            encoding,
            rotation,
            mirror,
        })
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Mini => "Stream Deck Mini",
            Self::Original => "Stream Deck (Original)",
            Self::Mk2 => "Stream Deck MK.2",
            Self::Xl => "Stream Deck XL",
            Self::Pedal => "Stream Deck Pedal",
            Self::Plus => "Stream Deck +",
        }
    }

    /// Descriptor for a device of this model with the given id.
    pub fn descriptor(self, id: impl Into<String>) -> DeviceDescriptor {
        DeviceDescriptor {
            id: id.into(),
            type_name: self.display_name().to_string(),
            key_count: self.key_count(),
            layout: self.layout(),
            image_format: self.image_format(),
        }
    }
}

/// Button press/release event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonEvent {
    /// Key index (0-based)
    pub key: u8,
    /// True if pressed, false if released
    pub pressed: bool,
}
