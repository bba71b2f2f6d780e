// Line breaking over UTF-8 bytes
//
// Width of a line is the sum of (char extent + spacing) in the layout
// direction. Horizontal extent is the glyph advance; vertical extent is
// the bitmap height, except for punctuation / Latin that is drawn rotated
// in vertical text, where the bitmap width is what runs down the column.
// Soft breaks land after a space, tab or hyphen at least 8 bytes into the
// line; with none available the line is cut at the overflowing char.

use super::utf8;
use crate::fonts::GlyphMetrics;

// soft break candidates closer than this to line start are ignored
const MIN_SOFT_BREAK: usize = 8;
// a leading whitespace run up to this long is never a line of its own
const MAX_BLANK_PIECE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharSpacing {
    /// Pixels between chars in horizontal text, scaled with the font.
    pub horizontal: i32,
    /// Pixels between chars in vertical text, unscaled.
    pub vertical: i32,
}

impl CharSpacing {
    pub const DEFAULT: Self = Self {
        horizontal: 1,
        vertical: 2,
    };
}

impl Default for CharSpacing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// glyphs rotated 90 degrees when set vertically
pub const fn is_rotated_in_vertical(cp: u32) -> bool {
    matches!(
        cp,
        0xFF1A | 0xFF1B // fullwidth colon, semicolon
            | 0x300C..=0x300F // corner brackets
            | 0xFF08 | 0xFF09
            | 0x3010 | 0x3011
            | 0x2018 | 0x2019 | 0x201C | 0x201D
            | 0x3008..=0x300B // angle / double angle brackets
            | 0x3C | 0x3E | 0xFF1C | 0xFF1E
            | 0x2026 | 0x22EF | 0x2025 | 0xFE19 // ellipses
            | 0x5B | 0x5D | 0x28 | 0x29
            | 0x24 | 0x40 | 0x2D | 0x5F
            | 0x2014 | 0x3D | 0x7E
            | 0x30..=0x39
            | 0x41..=0x5A
            | 0x61..=0x7A
            | 0xC0..=0x24F // Latin-1 supplement, Latin extended A/B
    )
}

pub struct LineBreaker<'m, M: ?Sized> {
    metrics: &'m mut M,
    spacing: CharSpacing,
}

impl<'m, M> LineBreaker<'m, M>
where
    M: GlyphMetrics + ?Sized,
{
    pub fn new(metrics: &'m mut M, spacing: CharSpacing) -> Self {
        Self { metrics, spacing }
    }

    // requested render size over the font file's native size
    pub fn scale_for(&self, font_size: f32) -> f32 {
        let base = self.metrics.font_size();
        if font_size > 0.0 && base > 0 {
            font_size / base as f32
        } else {
            1.0
        }
    }

    #[inline]
    pub fn char_spacing(&self, vertical: bool, scale: f32) -> i32 {
        if vertical {
            self.spacing.vertical
        } else {
            (self.spacing.horizontal as f32 * scale) as i32
        }
    }

    // extent of one char along the line, without spacing
    pub fn char_extent(&mut self, cp: u32, vertical: bool, scale: f32) -> i32 {
        let base = self.metrics.font_size() as f32;
        match self.metrics.glyph(cp) {
            // blank glyphs (space) render as half an em
            Some(g) if g.bitmap_size == 0 => (base * scale / 2.0) as i32,
            Some(g) if vertical && is_rotated_in_vertical(cp) => (g.width as f32 * scale) as i32,
            Some(g) if vertical => (g.height as f32 * scale) as i32,
            Some(g) => (g.advance as f32 * scale) as i32,
            None if vertical => (base * scale) as i32,
            None => (base * scale / 2.0) as i32,
        }
    }

    // controls included: a '\r' with no glyph costs half an em like any other
    fn step(&mut self, cp: u32, vertical: bool, scale: f32, spacing: i32) -> i32 {
        self.char_extent(cp, vertical, scale) + spacing
    }

    // byte offset where the line starting at `start` must end. A '\n'
    // ends the line and is consumed. May return `start` when not even one
    // char fits; callers that need progress force one char.
    pub fn find_break_position(
        &mut self,
        text: &[u8],
        start: usize,
        max_width: i32,
        vertical: bool,
        scale: f32,
    ) -> usize {
        let spacing = self.char_spacing(vertical, scale);
        let mut best_break = start;
        let mut pos = start.min(text.len());
        let mut width = 0i32;

        while let Some((cp, len)) = utf8::decode_at(text, pos) {
            if cp == '\n' as u32 {
                return pos + len;
            }

            let w = self.step(cp, vertical, scale, spacing);
            if width + w > max_width {
                if best_break > start {
                    let piece = &text[start..best_break];
                    let blank = piece.iter().all(|&b| b == b' ' || b == b'\t');
                    if piece.len() <= MAX_BLANK_PIECE && blank {
                        return pos;
                    }
                    return best_break;
                }
                return pos;
            }

            width += w;
            pos += len;

            if matches!(cp, 0x20 | 0x09 | 0x2D) && pos > start + MIN_SOFT_BREAK {
                best_break = pos;
            }
        }

        pos
    }

    pub fn find_break_position_scaled(
        &mut self,
        text: &[u8],
        start: usize,
        max_width: i32,
        vertical: bool,
        font_size: f32,
    ) -> usize {
        let scale = self.scale_for(font_size);
        self.find_break_position(text, start, max_width, vertical, scale)
    }

    // same per-char metric as find_break_position over text[start..end]
    pub fn calculate_text_width(
        &mut self,
        text: &[u8],
        start: usize,
        end: usize,
        vertical: bool,
        scale: f32,
    ) -> i32 {
        let end = end.min(text.len());
        let spacing = self.char_spacing(vertical, scale);
        let mut width = 0;
        let mut pos = start;
        while pos < end {
            let Some((cp, len)) = utf8::decode_at(&text[..end], pos) else {
                break;
            };
            if cp != '\n' as u32 {
                width += self.step(cp, vertical, scale, spacing);
            }
            pos += len;
        }
        width
    }
}
