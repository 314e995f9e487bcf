//! Real Stream Deck transport.
//!
//! This module wraps the `elgato-streamdeck` crate to provide
//! the concrete [`DeckTransport`] implementation over HID.

use std::time::Duration;

use elgato_streamdeck::info::{ImageMirroring, ImageMode, ImageRotation, Kind};
use elgato_streamdeck::{StreamDeck, StreamDeckInput};
use hidapi::HidApi;
use tracing::{debug, info, instrument, warn};

use super::info::{DeviceDescriptor, ImageEncoding, KeyImageFormat, KeyLayout, Mirror, Rotation};
use super::{DeckHandle, DeckTransport};
use crate::error::{DeviceError, TransportError};

/// Transport over every Stream Deck visible through hidapi.
pub struct ElgatoTransport {
    hid: HidApi,
}

impl ElgatoTransport {
    /// Initialize hidapi and scan for devices.
    pub fn new() -> Result<Self, DeviceError> {
        let hid = elgato_streamdeck::new_hidapi().map_err(|e| DeviceError::Transport {
            id: "hidapi".to_string(),
            operation: "initialize",
            source: TransportError::new(e.to_string()),
        })?;
        Ok(Self { hid })
    }

    fn connected(&self) -> Vec<(Kind, String)> {
        elgato_streamdeck::list_devices(&self.hid)
    }
}

impl DeckTransport for ElgatoTransport {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let devices: Vec<_> = self
            .connected()
            .into_iter()
            .map(|(kind, serial)| descriptor_for(kind, serial))
            .collect();
        debug!(count = devices.len(), "Enumerated Stream Deck devices");
        Ok(devices)
    }

    #[instrument(skip_all, fields(id = %descriptor.id))]
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeckHandle>, DeviceError> {
        let (kind, serial) = self
            .connected()
            .into_iter()
            .find(|(_, serial)| *serial == descriptor.id)
            .ok_or_else(|| DeviceError::NotFound {
                id: descriptor.id.clone(),
            })?;

        let deck = StreamDeck::connect(&self.hid, kind, &serial).map_err(|e| DeviceError::Busy {
            id: serial.clone(),
            reason: e.to_string(),
        })?;

        match deck.firmware_version() {
            Ok(firmware) => info!(%firmware, "Connected to Stream Deck"),
            Err(e) => warn!(error = %e, "Connected, but firmware version is unreadable"),
        }

        Ok(Box::new(ElgatoHandle { deck }))
    }
}

struct ElgatoHandle {
    deck: StreamDeck,
}

fn transport_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::new(e.to_string())
}

impl DeckHandle for ElgatoHandle {
    fn reset(&mut self) -> Result<(), TransportError> {
        self.deck.reset().map_err(transport_error)
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), TransportError> {
        self.deck.set_brightness(percent).map_err(transport_error)
    }

    fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), TransportError> {
        self.deck.write_image(key, image).map_err(transport_error)
    }

    fn read_buttons(&mut self, timeout: Duration) -> Result<Option<Vec<bool>>, TransportError> {
        match self.deck.read_input(Some(timeout)).map_err(transport_error)? {
            StreamDeckInput::ButtonStateChange(states) => Ok(Some(states)),
            _ => Ok(None),
        }
    }
}

fn descriptor_for(kind: Kind, serial: String) -> DeviceDescriptor {
    DeviceDescriptor {
        id: serial,
        type_name: kind_to_name(kind).to_string(),
        key_count: kind.key_count(),
        layout: KeyLayout {
            rows: kind.row_count(),
            cols: kind.column_count(),
        },
        image_format: key_image_format(kind),
    }
}

/// Translate the crate's image contract; `None` for devices without displays.
fn key_image_format(kind: Kind) -> Option<KeyImageFormat> {
    let format = kind.key_image_format();
    let encoding = match format.mode {
        ImageMode::None => return None,
        ImageMode::BMP => ImageEncoding::Bmp,
        ImageMode::JPEG => ImageEncoding::Jpeg,
    };
    // The crate turns clockwise; `Rotation` counts counter-clockwise.
    let rotation = match format.rotation {
        ImageRotation::Rot0 => Rotation::Deg0,
        ImageRotation::Rot90 => Rotation::Deg270,
        ImageRotation::Rot180 => Rotation::Deg180,
        ImageRotation::Rot270 => Rotation::Deg90,
    };
    let mirror = match format.mirror {
        ImageMirroring::None => Mirror::NONE,
        ImageMirroring::X => Mirror::new(true, false),
        ImageMirroring::Y => Mirror::new(false, true),
        ImageMirroring::Both => Mirror::BOTH,
    };
    #[allow(clippy::cast_possible_truncation)] // Key dimensions are always small
    let size = (format.size.0 as u32, format.size.1 as u32);
    Some(KeyImageFormat {
        size,
        encoding,
        rotation,
        mirror,
    })
}

/// Convert device kind to human-readable name.
const fn kind_to_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Original => "Stream Deck (Original)",
        Kind::OriginalV2 => "Stream Deck (Original V2)",
        Kind::Mini => "Stream Deck Mini",
        Kind::MiniMk2 => "Stream Deck Mini MK.2",
        Kind::Xl => "Stream Deck XL",
        Kind::XlV2 => "Stream Deck XL V2",
        Kind::Mk2 => "Stream Deck MK.2",
        Kind::Pedal => "Stream Deck Pedal",
        Kind::Plus => "Stream Deck +",
        Kind::Neo => "Stream Deck Neo",
        _ => "Unknown Stream Deck",
    }
}
