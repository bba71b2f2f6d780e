// Per-page glyph cache
//
// Built in one shot from a page's text: collect unique codepoints, take
// each glyph from an already-resident cache when one has it, otherwise
// read it from the font file, then pack everything into one arena.
// A page is immutable once built; swap or replace it whole.

use alloc::borrow::Cow;
use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use super::arena::GlyphArena;
use crate::fonts::format::{FontFile, GlyphEntry};
use crate::text::utf8::CharIndices;

/// Anything that can hand out a resident glyph (entry + encoded bitmap).
pub trait GlyphDonor {
    fn donate(&self, unicode: u16) -> Option<(GlyphEntry, &[u8])>;
}

/// Donor with nothing resident; forces every glyph to come from the font.
pub struct NoDonor;

impl GlyphDonor for NoDonor {
    fn donate(&self, _unicode: u16) -> Option<(GlyphEntry, &[u8])> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageBuildStats {
    pub total_chars: u32,
    pub unique_chars: u32,
    pub reused_from_cache: u32,
    pub loaded_from_file: u32,
    pub missing: u32,
}

pub struct GlyphCachePage {
    arena: Option<GlyphArena>,
    stats: PageBuildStats,
}

impl Default for GlyphCachePage {
    fn default() -> Self {
        Self::empty()
    }
}

impl GlyphCachePage {
    pub const fn empty() -> Self {
        Self {
            arena: None,
            stats: PageBuildStats {
                total_chars: 0,
                unique_chars: 0,
                reused_from_cache: 0,
                loaded_from_file: 0,
                missing: 0,
            },
        }
    }

    pub fn build<F, D>(text: &[u8], donor: &D, font: &mut FontFile<F>) -> Result<Self, &'static str>
    where
        F: Read + Seek,
        D: GlyphDonor + ?Sized,
    {
        let (chars, total) = unique_codepoints(text)?;
        let mut page = Self::build_chars(&chars, donor, font)?;
        page.stats.total_chars = total;
        Ok(page)
    }

    // chars: sorted, deduplicated
    pub fn build_chars<F, D>(
        chars: &[u16],
        donor: &D,
        font: &mut FontFile<F>,
    ) -> Result<Self, &'static str>
    where
        F: Read + Seek,
        D: GlyphDonor + ?Sized,
    {
        let mut stats = PageBuildStats {
            total_chars: chars.len() as u32,
            unique_chars: chars.len() as u32,
            ..PageBuildStats::default()
        };

        let mut glyphs: Vec<(GlyphEntry, Cow<'_, [u8]>)> = Vec::new();
        glyphs
            .try_reserve_exact(chars.len())
            .map_err(|_| "page cache: OOM for glyph list")?;

        for &cp in chars {
            if let Some((entry, bitmap)) = donor.donate(cp) {
                glyphs.push((entry, Cow::Borrowed(bitmap)));
                stats.reused_from_cache += 1;
                continue;
            }
            let Some(entry) = font.find(cp as u32) else {
                stats.missing += 1;
                continue;
            };
            match font.load_bitmap(&entry) {
                Ok(bitmap) => {
                    glyphs.push((entry, Cow::Owned(bitmap)));
                    stats.loaded_from_file += 1;
                }
                Err(e) => {
                    log::warn!("page cache: skip U+{:04X}: {}", cp, e);
                    stats.missing += 1;
                }
            }
        }

        let arena = GlyphArena::build(&glyphs)?;
        Ok(Self {
            arena: Some(arena),
            stats,
        })
    }

    // glyphs: sorted by unicode, unique
    pub fn from_glyphs(glyphs: &[(GlyphEntry, Cow<'_, [u8]>)]) -> Result<Self, &'static str> {
        let arena = GlyphArena::build(glyphs)?;
        let n = glyphs.len() as u32;
        Ok(Self {
            arena: Some(arena),
            stats: PageBuildStats {
                total_chars: n,
                unique_chars: n,
                reused_from_cache: n,
                ..PageBuildStats::default()
            },
        })
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.arena.is_some()
    }

    pub fn char_count(&self) -> usize {
        self.arena.as_ref().map_or(0, |a| a.char_count())
    }

    pub fn total_size(&self) -> usize {
        self.arena.as_ref().map_or(0, |a| a.total_size())
    }

    #[inline]
    pub fn stats(&self) -> PageBuildStats {
        self.stats
    }

    pub fn glyph(&self, unicode: u32) -> Option<(GlyphEntry, &[u8])> {
        let code = u16::try_from(unicode).ok()?;
        self.arena.as_ref()?.find(code)
    }

    pub fn has_char(&self, unicode: u32) -> bool {
        let Ok(code) = u16::try_from(unicode) else {
            return false;
        };
        self.arena
            .as_ref()
            .is_some_and(|a| a.index().position(code).is_some())
    }

    pub fn glyph_info(&self, unicode: u32) -> Option<GlyphEntry> {
        self.glyph(unicode).map(|(e, _)| e)
    }

    pub fn bitmap(&self, unicode: u32) -> Option<&[u8]> {
        self.glyph(unicode).map(|(_, b)| b)
    }

    pub fn entry_at(&self, i: usize) -> Option<GlyphEntry> {
        self.arena.as_ref()?.index().get(i)
    }

    pub fn entries(&self) -> impl Iterator<Item = GlyphEntry> + '_ {
        self.arena.iter().flat_map(|a| a.index().iter())
    }

    pub fn swap_with(&mut self, other: &mut GlyphCachePage) {
        core::mem::swap(self, other);
    }

    pub fn clear(&mut self) {
        *self = Self::empty();
    }
}

impl GlyphDonor for GlyphCachePage {
    fn donate(&self, unicode: u16) -> Option<(GlyphEntry, &[u8])> {
        self.arena.as_ref()?.find(unicode)
    }
}

// sorted unique BMP codepoints that need a glyph, plus the total count of
// drawable characters; controls and astral codepoints have no glyph
pub fn unique_codepoints(text: &[u8]) -> Result<(Vec<u16>, u32), &'static str> {
    let mut chars: Vec<u16> = Vec::new();
    let mut total = 0u32;
    for (_, cp, _) in CharIndices::new(text, 0) {
        if cp < 0x20 || cp == 0x7F {
            continue;
        }
        let Ok(code) = u16::try_from(cp) else {
            continue;
        };
        total += 1;
        chars.try_reserve(1).map_err(|_| "page cache: OOM for char list")?;
        chars.push(code);
    }
    chars.sort_unstable();
    chars.dedup();
    Ok((chars, total))
}
