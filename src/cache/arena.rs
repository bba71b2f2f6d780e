// Single-allocation glyph arena
//
// [ header 16B | index: n x 20B sorted by unicode | raw bitmap bytes ]
//
// header: total_size u32, char_count u32, index_offset u32, bitmap_offset u32
// Index entries use the font's 20-byte layout; bitmap_offset is relative
// to the bitmap region. Bitmaps are stored still encoded and decoded at
// draw time, so dark mode / transparency changes never invalidate a page.
// Access goes through typed views that bounds-check every slice.

use alloc::borrow::Cow;
use alloc::vec::Vec;

use crate::fonts::format::{ENTRY_SIZE, GlyphEntry};
use crate::storage::le_u32;

pub const ARENA_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaHeader {
    pub total_size: u32,
    pub char_count: u32,
    pub index_offset: u32,
    pub bitmap_offset: u32,
}

impl ArenaHeader {
    fn parse(d: &[u8]) -> Self {
        Self {
            total_size: le_u32(d, 0),
            char_count: le_u32(d, 4),
            index_offset: le_u32(d, 8),
            bitmap_offset: le_u32(d, 12),
        }
    }

    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.total_size.to_le_bytes());
        out[4..8].copy_from_slice(&self.char_count.to_le_bytes());
        out[8..12].copy_from_slice(&self.index_offset.to_le_bytes());
        out[12..16].copy_from_slice(&self.bitmap_offset.to_le_bytes());
    }
}

/// Borrowed view of an arena's sorted index.
#[derive(Clone, Copy)]
pub struct IndexView<'a> {
    bytes: &'a [u8],
}

impl<'a> IndexView<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / ENTRY_SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<GlyphEntry> {
        let raw = self.bytes.get(i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE)?;
        Some(GlyphEntry::parse(raw))
    }

    // unicode is the first field of each entry
    #[inline]
    fn unicode_at(&self, i: usize) -> u16 {
        let o = i * ENTRY_SIZE;
        u16::from_le_bytes([self.bytes[o], self.bytes[o + 1]])
    }

    pub fn position(&self, unicode: u16) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.unicode_at(mid).cmp(&unicode) {
                core::cmp::Ordering::Equal => return Some(mid),
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    pub fn iter(self) -> impl Iterator<Item = GlyphEntry> + 'a {
        self.bytes.chunks_exact(ENTRY_SIZE).map(GlyphEntry::parse)
    }
}

pub struct GlyphArena {
    buf: Vec<u8>,
}

impl GlyphArena {
    // glyphs must be sorted by unicode with no duplicates; entry offsets are
    // rewritten, the sizes come from the byte slices
    pub fn build(glyphs: &[(GlyphEntry, Cow<'_, [u8]>)]) -> Result<Self, &'static str> {
        let count = glyphs.len();
        let index_len = count * ENTRY_SIZE;
        let bitmap_len: usize = glyphs.iter().map(|(_, b)| b.len()).sum();
        let total = ARENA_HEADER_SIZE + index_len + bitmap_len;
        let total_u32 = u32::try_from(total).map_err(|_| "arena: too large")?;

        if glyphs.windows(2).any(|w| w[0].0.unicode >= w[1].0.unicode) {
            return Err("arena: glyphs not sorted");
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(total)
            .map_err(|_| "arena: OOM")?;
        buf.resize(ARENA_HEADER_SIZE + index_len, 0);

        let header = ArenaHeader {
            total_size: total_u32,
            char_count: count as u32,
            index_offset: ARENA_HEADER_SIZE as u32,
            bitmap_offset: (ARENA_HEADER_SIZE + index_len) as u32,
        };
        header.write(&mut buf[..ARENA_HEADER_SIZE]);

        let mut offset = 0u32;
        for (i, (entry, bitmap)) in glyphs.iter().enumerate() {
            let mut e = *entry;
            e.bitmap_offset = offset;
            e.bitmap_size = bitmap.len() as u32;
            let at = ARENA_HEADER_SIZE + i * ENTRY_SIZE;
            e.write(&mut buf[at..at + ENTRY_SIZE]);
            offset += bitmap.len() as u32;
        }
        for (_, bitmap) in glyphs {
            buf.extend_from_slice(bitmap);
        }

        Ok(Self { buf })
    }

    pub fn header(&self) -> ArenaHeader {
        ArenaHeader::parse(&self.buf)
    }

    #[inline]
    pub fn total_size(&self) -> usize {
        self.buf.len()
    }

    pub fn index(&self) -> IndexView<'_> {
        let h = self.header();
        let start = h.index_offset as usize;
        let end = h.bitmap_offset as usize;
        IndexView {
            bytes: self.buf.get(start..end).unwrap_or(&[]),
        }
    }

    pub fn bitmaps(&self) -> &[u8] {
        let start = self.header().bitmap_offset as usize;
        self.buf.get(start..).unwrap_or(&[])
    }

    #[inline]
    pub fn char_count(&self) -> usize {
        self.index().len()
    }

    pub fn bitmap_for(&self, entry: &GlyphEntry) -> Option<&[u8]> {
        let start = entry.bitmap_offset as usize;
        let end = start.checked_add(entry.bitmap_size as usize)?;
        self.bitmaps().get(start..end)
    }

    pub fn find(&self, unicode: u16) -> Option<(GlyphEntry, &[u8])> {
        let index = self.index();
        let entry = index.get(index.position(unicode)?)?;
        Some((entry, self.bitmap_for(&entry)?))
    }
}
