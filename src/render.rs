//! Key image composition: icon plus label, in the device's native format.
//!
//! Rendering is a pure function of its inputs. The same format, icon and
//! label always produce the same bytes, and no device I/O happens here.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::iso_8859_1::{
    FONT_6X10, FONT_6X13, FONT_7X13_BOLD, FONT_8X13, FONT_9X15, FONT_10X20,
};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use image::{Rgb, RgbImage};
use tracing::{instrument, trace};

use crate::device::{ImageEncoding, KeyImageFormat};
use crate::error::RenderError;
use crate::image_ops;

/// Image bytes ready to be written to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeKeyImage {
    pub encoding: ImageEncoding,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Built-in bitmap fonts available for labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelFont {
    Font6x10,
    Font6x13,
    #[default]
    Font7x13Bold,
    Font8x13,
    Font9x15,
    Font10x20,
}

impl LabelFont {
    pub const ALL: [Self; 6] = [
        Self::Font6x10,
        Self::Font6x13,
        Self::Font7x13Bold,
        Self::Font8x13,
        Self::Font9x15,
        Self::Font10x20,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Font6x10 => "6x10",
            Self::Font6x13 => "6x13",
            Self::Font7x13Bold => "7x13-bold",
            Self::Font8x13 => "8x13",
            Self::Font9x15 => "9x15",
            Self::Font10x20 => "10x20",
        }
    }

    const fn to_font(self) -> &'static MonoFont<'static> {
        match self {
            Self::Font6x10 => &FONT_6X10,
            Self::Font6x13 => &FONT_6X13,
            Self::Font7x13Bold => &FONT_7X13_BOLD,
            Self::Font8x13 => &FONT_8X13,
            Self::Font9x15 => &FONT_9X15,
            Self::Font10x20 => &FONT_10X20,
        }
    }
}

impl fmt::Display for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LabelFont {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|font| font.name() == wanted)
            .ok_or_else(|| RenderError::FontUnavailable {
                name: s.to_string(),
                known: Self::ALL.map(Self::name).join(", "),
            })
    }
}

/// Label colors and placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelStyle {
    pub fill: Rgb888,
    pub outline: Rgb888,
    /// Outline radius in pixels.
    pub outline_width: i32,
    /// Distance from the bottom edge to the text baseline.
    pub baseline_offset: i32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            fill: Rgb888::WHITE,
            outline: Rgb888::BLACK,
            outline_width: 2,
            baseline_offset: 10,
        }
    }
}

/// Composes key images for one font and label style.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyRenderer {
    pub font: LabelFont,
    pub style: LabelStyle,
}

impl KeyRenderer {
    pub fn new(font: LabelFont) -> Self {
        Self {
            font,
            style: LabelStyle::default(),
        }
    }

    /// Decode `icon`, fit it to the key, draw `label`, then orient and
    /// encode for the device.
    ///
    /// # Errors
    ///
    /// [`RenderError::DecodeFailed`] if `icon` is not a supported image,
    /// [`RenderError::EncodeFailed`] if the native encoding fails.
    #[instrument(skip_all, fields(label = label, bytes = icon.len()))]
    pub fn render(
        &self,
        format: &KeyImageFormat,
        icon: &[u8],
        label: &str,
    ) -> Result<NativeKeyImage, RenderError> {
        let (width, height) = format.size;
        let decoded = image::load_from_memory(icon).map_err(RenderError::DecodeFailed)?;
        let mut canvas = image_ops::scale_to_key(&decoded, width, height);

        if !label.is_empty() {
            self.draw_label(&mut canvas, label);
        }

        let oriented = image_ops::orient(canvas, format.rotation, format.mirror);
        let bytes =
            image_ops::encode(&oriented, format.encoding).map_err(RenderError::EncodeFailed)?;
        trace!(
            encoding = %format.encoding,
            rotation = format.rotation.degrees(),
            mirror = format.mirror.describe(),
            bytes = bytes.len(),
            "Rendered key image"
        );

        Ok(NativeKeyImage {
            encoding: format.encoding,
            width,
            height,
            bytes,
        })
    }

    fn draw_label(&self, canvas: &mut RgbImage, label: &str) {
        let font = self.font.to_font();
        let (width, height) = canvas.dimensions();
        let anchor = Point::new(
            i32::try_from(width / 2).unwrap_or(i32::MAX),
            i32::try_from(height)
                .unwrap_or(i32::MAX)
                .saturating_sub(self.style.baseline_offset),
        );
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Alphabetic)
            .build();
        let mut target = Canvas(canvas);

        // Outline: the label stamped at every offset within the radius.
        let outline = MonoTextStyle::new(font, self.style.outline);
        let r = self.style.outline_width;
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx, dy) == (0, 0) || dx * dx + dy * dy > r * r {
                    continue;
                }
                let shadow = Text::with_text_style(label, anchor + Point::new(dx, dy), outline, text_style);
                let Ok(_) = shadow.draw(&mut target);
            }
        }

        let fill = MonoTextStyle::new(font, self.style.fill);
        let Ok(_) = Text::with_text_style(label, anchor, fill, text_style).draw(&mut target);
    }
}

/// Draw target over an `image` buffer; pixels outside are clipped.
struct Canvas<'a>(&'a mut RgbImage);

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        let (w, h) = self.0.dimensions();
        Size::new(w, h)
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.0.dimensions();
        for Pixel(coord, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(coord.x), u32::try_from(coord.y)) else {
                continue;
            };
            if x < w && y < h {
                self.0.put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
            }
        }
        Ok(())
    }
}
