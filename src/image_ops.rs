//! Pixel operations used when preparing key images.

use std::io::Cursor;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageResult, RgbImage};

use crate::device::{ImageEncoding, Mirror, Rotation};

/// JPEG quality used for key images.
pub const JPEG_QUALITY: u8 = 90;

/// Fit `img` inside `width` x `height`, centered on black.
pub fn scale_to_key(img: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let resized = img.resize(width, height, FilterType::Lanczos3).to_rgb8();
    let mut canvas = RgbImage::new(width, height);

    let (rw, rh) = resized.dimensions();
    let x = (width - rw) / 2;
    let y = (height - rh) / 2;

    imageops::overlay(&mut canvas, &resized, x.into(), y.into());
    canvas
}

/// Rotate counter-clockwise, then mirror, as the device requires.
pub fn orient(img: RgbImage, rotation: Rotation, mirror: Mirror) -> RgbImage {
    let mut img = match rotation {
        Rotation::Deg0 => img,
        Rotation::Deg90 => imageops::rotate270(&img),
        Rotation::Deg180 => imageops::rotate180(&img),
        Rotation::Deg270 => imageops::rotate90(&img),
    };
    if mirror.horizontal {
        imageops::flip_horizontal_in_place(&mut img);
    }
    if mirror.vertical {
        imageops::flip_vertical_in_place(&mut img);
    }
    img
}

/// Encode pixels into the byte layout the device consumes.
pub fn encode(img: &RgbImage, encoding: ImageEncoding) -> ImageResult<Vec<u8>> {
    let (width, height) = img.dimensions();
    let mut out = Cursor::new(Vec::new());
    match encoding {
        ImageEncoding::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode(
                img.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        ImageEncoding::Bmp => {
            BmpEncoder::new(&mut out).encode(
                img.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    Ok(out.into_inner())
}
