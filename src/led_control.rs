//! Indicator strip control
//!
//! The strip only ever shows one of two fixed patterns. Each render rewrites
//! all eight pixels so nothing from an earlier pattern survives.

use crate::BoardError;
use crate::config::LED_COUNT;
use core::fmt;
use log::{debug, warn};
use rgb::RGB8;

/// Lit pixel colour (0xFF2000, amber)
pub const ON: RGB8 = RGB8 { r: 0xff, g: 0x20, b: 0x00 };

/// Dark pixel
pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// One colour per pixel
pub type IndicatorPattern = [RGB8; LED_COUNT];

/// Nothing to report
pub const ALL_OFF: IndicatorPattern = [OFF; LED_COUNT];

/// Presence detected: both ends lit, middle pair dark
pub const ALERT_PATTERN: IndicatorPattern = [ON, ON, ON, OFF, OFF, ON, ON, ON];

/// Pattern shown for a reading
pub fn pattern_for(on: bool) -> &'static IndicatorPattern {
    if on { &ALERT_PATTERN } else { &ALL_OFF }
}

/// Addressable pixel strip
pub trait LedStrip {
    type Error: fmt::Debug;

    /// Latch `pixels` onto the strip, first element nearest the data pin
    fn write(&mut self, pixels: &[RGB8]) -> Result<(), Self::Error>;
}

/// WS2812 wire order: green, red, blue per pixel
pub fn grb_bytes(pixels: &[RGB8]) -> impl Iterator<Item = u8> + '_ {
    pixels.iter().flat_map(|p| [p.g, p.r, p.b])
}

/// Renders presence readings onto the strip
pub struct Indicator<S> {
    strip: S,
}

impl<S: LedStrip> Indicator<S> {
    pub fn new(strip: S) -> Self {
        Self { strip }
    }

    /// Show `on` on all pixels
    pub fn render(&mut self, on: bool) -> Result<(), BoardError> {
        debug!("[LED] Rendering {}", if on { "alert" } else { "off" });
        self.strip.write(pattern_for(on)).map_err(|e| {
            warn!("[LED] Strip write failed: {:?}", e);
            BoardError::LedError
        })
    }

    pub fn strip(&self) -> &S {
        &self.strip
    }

    pub fn strip_mut(&mut self) -> &mut S {
        &mut self.strip
    }
}
