// Glyph lookup for layout and rendering
//
// Layout only needs metrics, so the line breaker works against the
// GlyphMetrics trait: the font file answers it directly, the resolver
// answers it from the page cache first. Rendering goes cache -> font file
// -> U+25A1 -> drawn outline box.

use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use super::color::RenderOptions;
use super::decoder;
use super::format::{FontFile, GlyphEntry};
use crate::cache::GlyphCacheManager;

/// WHITE SQUARE, drawn in place of codepoints the font lacks.
pub const MISSING_GLYPH: u32 = 0x25A1;

pub trait GlyphMetrics {
    fn glyph(&mut self, unicode: u32) -> Option<GlyphEntry>;
    /// Native pixel height of the font (the header's font_height).
    fn font_size(&self) -> u8;
}

impl<F> GlyphMetrics for FontFile<F>
where
    F: Read + Seek,
{
    fn glyph(&mut self, unicode: u32) -> Option<GlyphEntry> {
        self.find(unicode)
    }

    fn font_size(&self) -> u8 {
        FontFile::font_size(self)
    }
}

impl<M> GlyphMetrics for &mut M
where
    M: GlyphMetrics + ?Sized,
{
    fn glyph(&mut self, unicode: u32) -> Option<GlyphEntry> {
        (**self).glyph(unicode)
    }

    fn font_size(&self) -> u8 {
        (**self).font_size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGlyph {
    pub entry: GlyphEntry,
    /// Row-major RGB565, entry.width * entry.height pixels.
    pub pixels: Vec<u16>,
    pub substituted: bool,
}

pub struct GlyphResolver<'a, F> {
    cache: &'a GlyphCacheManager,
    font: &'a mut FontFile<F>,
}

impl<'a, F> GlyphResolver<'a, F>
where
    F: Read + Seek,
{
    pub fn new(cache: &'a GlyphCacheManager, font: &'a mut FontFile<F>) -> Self {
        Self { cache, font }
    }

    pub fn render(&mut self, unicode: u32, opts: RenderOptions) -> Result<RenderedGlyph, &'static str> {
        if let Some(glyph) = self.render_exact(unicode, opts)? {
            return Ok(glyph);
        }

        if unicode != MISSING_GLYPH {
            if let Some(mut glyph) = self.render_exact(MISSING_GLYPH, opts)? {
                glyph.substituted = true;
                return Ok(glyph);
            }
        }

        let size = self.font.font_size();
        let width = (size / 2).max(1);
        let entry = GlyphEntry {
            unicode: u16::try_from(unicode).unwrap_or(0xFFFD),
            advance: width as u16,
            width,
            height: size,
            x_offset: 0,
            y_offset: -(size.min(127) as i8),
            bitmap_offset: 0,
            bitmap_size: 0,
        };
        Ok(RenderedGlyph {
            entry,
            pixels: decoder::placeholder_box(width, size, opts)?,
            substituted: true,
        })
    }

    fn render_exact(
        &mut self,
        unicode: u32,
        opts: RenderOptions,
    ) -> Result<Option<RenderedGlyph>, &'static str> {
        let format = self.font.format();

        if let Some((entry, raw)) = self.cache.glyph_any(unicode) {
            let pixels = decoder::decode(format, raw, entry.width, entry.height, opts)?;
            return Ok(Some(RenderedGlyph {
                entry,
                pixels,
                substituted: false,
            }));
        }

        let Some(entry) = self.font.find(unicode) else {
            return Ok(None);
        };
        let raw = self.font.load_bitmap(&entry)?;
        let pixels = decoder::decode(format, &raw, entry.width, entry.height, opts)?;
        Ok(Some(RenderedGlyph {
            entry,
            pixels,
            substituted: false,
        }))
    }
}

impl<F> GlyphMetrics for GlyphResolver<'_, F>
where
    F: Read + Seek,
{
    fn glyph(&mut self, unicode: u32) -> Option<GlyphEntry> {
        match self.cache.glyph_any(unicode) {
            Some((entry, _)) => Some(entry),
            None => self.font.find(unicode),
        }
    }

    fn font_size(&self) -> u8 {
        self.font.font_size()
    }
}
