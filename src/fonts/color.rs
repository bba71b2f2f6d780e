// Pixel class -> RGB565 for glyph rendering
//
// Normal mode: white background, black ink, light gray antialiasing.
// Dark mode: background and ink swap, gray gets darker.
// Transparent: background pixels become the MAGENTA sentinel so the
// blitter can skip them.

use embedded_graphics_core::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics_core::pixelcolor::IntoStorage;

use super::format::FontFormat;

pub const WHITE: u16 = 0xFFFF;
pub const BLACK: u16 = 0x0000;
/// Rgb565 magenta; never produced by a glyph, so safe as a skip marker.
pub const TRANSPARENT: u16 = 0xF81F;
/// Gray 170 (normal mode antialiasing)
pub const GRAY_LIGHT: u16 = 0xAD55;
/// Gray 136 (dark mode antialiasing)
pub const GRAY_DARK: u16 = 0x8C51;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    White,
    Black,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub dark_mode: bool,
    pub transparent: bool,
}

impl RenderOptions {
    pub const fn new(dark_mode: bool, transparent: bool) -> Self {
        Self {
            dark_mode,
            transparent,
        }
    }
}

#[inline]
pub const fn background(dark_mode: bool) -> u16 {
    if dark_mode { BLACK } else { WHITE }
}

#[inline]
pub const fn foreground(dark_mode: bool) -> u16 {
    if dark_mode { WHITE } else { BLACK }
}

// class + format + mode -> raw RGB565
pub fn map_pixel(class: PixelClass, format: FontFormat, opts: RenderOptions) -> u16 {
    match class {
        PixelClass::White if opts.transparent => TRANSPARENT,
        PixelClass::White => background(opts.dark_mode),
        PixelClass::Black => foreground(opts.dark_mode),
        // only the 2-bit format carries a gray class; older formats treat
        // anything that isn't background as ink
        PixelClass::Gray => match format {
            FontFormat::TwoBit if opts.dark_mode => GRAY_DARK,
            FontFormat::TwoBit => GRAY_LIGHT,
            _ => foreground(opts.dark_mode),
        },
    }
}

// legacy Huffman 4-bit gray level: 0 = lightest, 15 = darkest
pub fn legacy_gray(level: u8, dark_mode: bool) -> u16 {
    let g = (15 - level.min(15)) * 17;
    let g = if dark_mode { 255 - g } else { g };
    gray_to_rgb565(g).into_storage()
}

#[inline]
fn scale_channel(c: u8, max: u32) -> u8 {
    ((c as u32 * max + 127) / 255) as u8
}

pub fn gray_to_rgb565(g: u8) -> Rgb565 {
    Rgb565::new(scale_channel(g, 31), scale_channel(g, 63), scale_channel(g, 31))
}

#[inline]
pub fn to_rgb565(raw: u16) -> Rgb565 {
    Rgb565::from(embedded_graphics_core::pixelcolor::raw::RawU16::new(raw))
}

// sanity hook for the sentinel: a glyph colour must never equal it
pub fn is_transparent(c: Rgb565) -> bool {
    c == Rgb565::MAGENTA
}
