// In-memory font files for scenario tests. Encoders mirror the font
// generator's three bitmap encodings.

#![allow(dead_code)]

use pulp_text::fonts::GlyphEntry;
use pulp_text::fonts::format::{ENTRY_SIZE, HEADER_V1_SIZE, NAME_CAP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Px {
    White,
    Black,
    /// 4-bit level for the legacy code; any gray for the 2-bit code.
    Gray(u8),
}

#[derive(Default)]
struct Bits {
    out: Vec<u8>,
    n: usize,
}

impl Bits {
    fn push(&mut self, bit: bool) {
        if self.n % 8 == 0 {
            self.out.push(0);
        }
        if bit {
            let last = self.out.len() - 1;
            self.out[last] |= 0x80 >> (self.n % 8);
        }
        self.n += 1;
    }

    fn push_n(&mut self, value: u8, bits: u32) {
        for i in (0..bits).rev() {
            self.push(value >> i & 1 != 0);
        }
    }
}

// `0` white, `10` black, `11` + 4-bit level
pub fn encode_huffman(px: &[Px]) -> Vec<u8> {
    let mut b = Bits::default();
    for &p in px {
        match p {
            Px::White => b.push(false),
            Px::Black => b.push_n(0b10, 2),
            Px::Gray(v) => {
                b.push_n(0b11, 2);
                b.push_n(v & 0x0F, 4);
            }
        }
    }
    b.out
}

// `0` white, `10` gray, `11` black
pub fn encode_2bit(px: &[Px]) -> Vec<u8> {
    let mut b = Bits::default();
    for &p in px {
        match p {
            Px::White => b.push(false),
            Px::Gray(_) => b.push_n(0b10, 2),
            Px::Black => b.push_n(0b11, 2),
        }
    }
    b.out
}

// rows padded to a byte, 1 = white
pub fn encode_1bit(width: u8, height: u8, px: &[Px]) -> Vec<u8> {
    let mut b = Bits::default();
    for y in 0..height as usize {
        for x in 0..width as usize {
            b.push(px[y * width as usize + x] == Px::White);
        }
        while b.n % 8 != 0 {
            b.push(false);
        }
    }
    b.out
}

pub struct GlyphSpec {
    pub unicode: u16,
    pub advance: u16,
    pub width: u8,
    pub height: u8,
    pub bitmap: Vec<u8>,
}

impl GlyphSpec {
    pub fn new(unicode: u16, advance: u16, width: u8, height: u8, bitmap: Vec<u8>) -> Self {
        Self {
            unicode,
            advance,
            width,
            height,
            bitmap,
        }
    }

    // space-like: advance only, no bitmap
    pub fn blank(unicode: u16, advance: u16) -> Self {
        Self::new(unicode, advance, 0, 0, Vec::new())
    }
}

pub struct FontBuilder {
    pub version: u8,
    pub height: u8,
    pub family: &'static str,
    pub style: &'static str,
    pub glyphs: Vec<GlyphSpec>,
}

impl FontBuilder {
    pub fn new(version: u8, height: u8) -> Self {
        Self {
            version,
            height,
            family: "Test Sans",
            style: "Regular",
            glyphs: Vec::new(),
        }
    }

    pub fn glyph(mut self, g: GlyphSpec) -> Self {
        self.glyphs.push(g);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.glyphs.sort_by_key(|g| g.unicode);

        let header_len = if self.version >= 2 {
            HEADER_V1_SIZE + 2 * NAME_CAP
        } else {
            HEADER_V1_SIZE
        };
        let mut out = Vec::new();
        out.extend_from_slice(&(self.glyphs.len() as u32).to_le_bytes());
        out.push(self.height);
        out.push(self.version);
        if self.version >= 2 {
            for name in [self.family, self.style] {
                let mut field = [0u8; NAME_CAP];
                field[..name.len()].copy_from_slice(name.as_bytes());
                out.extend_from_slice(&field);
            }
        }
        assert_eq!(out.len(), header_len);

        let mut offset = (header_len + self.glyphs.len() * ENTRY_SIZE) as u32;
        for g in &self.glyphs {
            let entry = GlyphEntry {
                unicode: g.unicode,
                advance: g.advance,
                width: g.width,
                height: g.height,
                x_offset: 0,
                y_offset: -(g.height as i8),
                bitmap_offset: offset,
                bitmap_size: g.bitmap.len() as u32,
            };
            let mut raw = [0u8; ENTRY_SIZE];
            entry.write(&mut raw);
            out.extend_from_slice(&raw);
            offset += g.bitmap.len() as u32;
        }
        for g in &self.glyphs {
            out.extend_from_slice(&g.bitmap);
        }
        out
    }
}

pub const ZHONG: u16 = 0x4E2D;

// A (advance 10), U+4E2D (16x16 all black), space (advance 8, blank);
// legacy huffman encoding, version 1
pub fn three_glyph_font() -> Vec<u8> {
    let black = vec![Px::Black; 16 * 16];
    let a = vec![Px::Black; 8 * 12];
    FontBuilder::new(1, 16)
        .glyph(GlyphSpec::new('A' as u16, 10, 8, 12, encode_huffman(&a)))
        .glyph(GlyphSpec::new(ZHONG, 16, 16, 16, encode_huffman(&black)))
        .glyph(GlyphSpec::blank(' ' as u16, 8))
        .build()
}

// every glyph in `chars`: advance 8, 8x16, one black pixel, 2-bit encoded
pub fn mono_font(chars: &str) -> Vec<u8> {
    let mut px = vec![Px::White; 8 * 16];
    px[0] = Px::Black;
    chars
        .chars()
        .fold(FontBuilder::new(3, 16), |f, c| {
            f.glyph(GlyphSpec::new(c as u16, 8, 8, 16, encode_2bit(&px)))
        })
        .build()
}
