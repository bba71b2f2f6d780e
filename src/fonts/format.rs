// Reader .bin glyph-bitmap font format
//
// Header (little-endian):
//   char_count: u32, font_height: u8, version: u8
//   version >= 2: family[64], style[64] (UTF-8, NUL padded)
// Index: char_count x 20-byte entries sorted by unicode
//   unicode u16, advance u16, w u8, h u8, x_off i8, y_off i8,
//   bitmap_offset u32 (absolute in file), bitmap_size u32, reserved u32
// Bitmap data: encoded glyph bitmaps referenced by the index
//
// The index stays on SD; lookups binary-search it with 20-byte reads.

use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use crate::storage::{self, le_u16, le_u32};

pub const ENTRY_SIZE: usize = 20;
pub const NAME_CAP: usize = 64;
pub const HEADER_V1_SIZE: usize = 6;
pub const HEADER_V2_SIZE: usize = HEADER_V1_SIZE + 2 * NAME_CAP;

/// Largest encoded glyph we agree to load; anything bigger is corrupt.
pub const MAX_BITMAP_SIZE: u32 = 64 * 1024;

/// How a glyph's bitmap bytes are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    /// Legacy per-pixel prefix code: `0` white, `10` black, `11`+4 bits gray.
    Huffman,
    /// Packed 1 bit per pixel, rows padded to a byte, 1 = white.
    OneBit,
    /// Version 3 prefix code: `0` white, `10` gray, `11` black.
    TwoBit,
}

impl FontFormat {
    // versions 1 and 2 share a version byte; the generator that produced the
    // file is a device setting (legacy_1bit)
    pub const fn from_version(version: u8, legacy_1bit: bool) -> Self {
        if version >= 3 {
            FontFormat::TwoBit
        } else if legacy_1bit {
            FontFormat::OneBit
        } else {
            FontFormat::Huffman
        }
    }
}

/// One index entry. Inside a cache arena `bitmap_offset` is relative to the
/// arena's bitmap region; inside a font file it is an absolute file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlyphEntry {
    pub unicode: u16,
    pub advance: u16,
    pub width: u8,
    pub height: u8,
    pub x_offset: i8,
    pub y_offset: i8,
    pub bitmap_offset: u32,
    pub bitmap_size: u32,
}

impl GlyphEntry {
    pub const SIZE: usize = ENTRY_SIZE;

    // d must hold at least ENTRY_SIZE bytes
    pub fn parse(d: &[u8]) -> Self {
        Self {
            unicode: le_u16(d, 0),
            advance: le_u16(d, 2),
            width: d[4],
            height: d[5],
            x_offset: d[6] as i8,
            y_offset: d[7] as i8,
            bitmap_offset: le_u32(d, 8),
            bitmap_size: le_u32(d, 12),
        }
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.unicode.to_le_bytes());
        out[2..4].copy_from_slice(&self.advance.to_le_bytes());
        out[4] = self.width;
        out[5] = self.height;
        out[6] = self.x_offset as u8;
        out[7] = self.y_offset as u8;
        out[8..12].copy_from_slice(&self.bitmap_offset.to_le_bytes());
        out[12..16].copy_from_slice(&self.bitmap_size.to_le_bytes());
        out[16..20].fill(0);
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Same glyph shape regardless of where the bitmap bytes live.
    pub fn same_metrics(&self, other: &GlyphEntry) -> bool {
        self.unicode == other.unicode
            && self.advance == other.advance
            && self.width == other.width
            && self.height == other.height
            && self.x_offset == other.x_offset
            && self.y_offset == other.y_offset
            && self.bitmap_size == other.bitmap_size
    }
}

#[derive(Clone)]
pub struct FontHeader {
    pub char_count: u32,
    pub font_height: u8,
    pub version: u8,
    family: [u8; NAME_CAP],
    family_len: u8,
    style: [u8; NAME_CAP],
    style_len: u8,
}

impl FontHeader {
    pub fn parse(d: &[u8]) -> Result<Self, &'static str> {
        if d.len() < HEADER_V1_SIZE {
            return Err("font: short header");
        }

        let mut header = Self {
            char_count: le_u32(d, 0),
            font_height: d[4],
            version: d[5],
            family: [0u8; NAME_CAP],
            family_len: 0,
            style: [0u8; NAME_CAP],
            style_len: 0,
        };

        if header.version == 0 {
            return Err("font: bad version");
        }
        if header.font_height == 0 {
            return Err("font: zero height");
        }

        if header.version >= 2 {
            if d.len() < HEADER_V2_SIZE {
                return Err("font: short v2 header");
            }
            let family = &d[HEADER_V1_SIZE..HEADER_V1_SIZE + NAME_CAP];
            let style = &d[HEADER_V1_SIZE + NAME_CAP..HEADER_V2_SIZE];
            header.family_len = copy_name(family, &mut header.family);
            header.style_len = copy_name(style, &mut header.style);
        }

        Ok(header)
    }

    pub const fn header_size(&self) -> usize {
        if self.version >= 2 {
            HEADER_V2_SIZE
        } else {
            HEADER_V1_SIZE
        }
    }

    pub fn family_str(&self) -> &str {
        core::str::from_utf8(&self.family[..self.family_len as usize]).unwrap_or("")
    }

    pub fn style_str(&self) -> &str {
        core::str::from_utf8(&self.style[..self.style_len as usize]).unwrap_or("")
    }
}

impl core::fmt::Debug for FontHeader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FontHeader")
            .field("char_count", &self.char_count)
            .field("font_height", &self.font_height)
            .field("version", &self.version)
            .field("family", &self.family_str())
            .field("style", &self.style_str())
            .finish()
    }
}

// NUL-terminated name into fixed buffer; returns stored length
fn copy_name(src: &[u8], dst: &mut [u8; NAME_CAP]) -> u8 {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    // generator truncates on a char boundary; stay defensive anyway
    let valid = match core::str::from_utf8(&src[..end]) {
        Ok(s) => s.len(),
        Err(e) => e.valid_up_to(),
    };
    dst[..valid].copy_from_slice(&src[..valid]);
    valid as u8
}

/// An opened font file. Owns the file handle; every lookup goes to storage.
pub struct FontFile<F> {
    file: F,
    header: FontHeader,
    format: FontFormat,
    index_offset: u32,
    file_len: u32,
}

impl<F> FontFile<F>
where
    F: Read + Seek,
{
    pub fn open(mut file: F, legacy_1bit: bool) -> Result<Self, &'static str> {
        let file_len = storage::file_len(&mut file)?;

        let mut head = [0u8; HEADER_V2_SIZE];
        let n = storage::read_at(&mut file, 0, &mut head)?;
        let header = FontHeader::parse(&head[..n])?;

        let index_offset = header.header_size() as u32;
        let index_len = (header.char_count as u64) * ENTRY_SIZE as u64;
        if index_offset as u64 + index_len > file_len as u64 {
            return Err("font: index past end of file");
        }

        let format = FontFormat::from_version(header.version, legacy_1bit);

        log::info!(
            "font: {} chars, height {}, v{} ({:?}) '{}' '{}'",
            header.char_count,
            header.font_height,
            header.version,
            format,
            header.family_str(),
            header.style_str()
        );

        Ok(Self {
            file,
            header,
            format,
            index_offset,
            file_len,
        })
    }

    pub fn header(&self) -> &FontHeader {
        &self.header
    }

    #[inline]
    pub fn font_size(&self) -> u8 {
        self.header.font_height
    }

    #[inline]
    pub fn format(&self) -> FontFormat {
        self.format
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.header.version
    }

    #[inline]
    pub fn char_count(&self) -> u32 {
        self.header.char_count
    }

    pub fn entry_at(&mut self, idx: u32) -> Result<GlyphEntry, &'static str> {
        if idx >= self.header.char_count {
            return Err("font: entry index out of range");
        }
        let mut buf = [0u8; ENTRY_SIZE];
        let offset = self.index_offset + idx * ENTRY_SIZE as u32;
        storage::read_exact_at(&mut self.file, offset, &mut buf)?;
        Ok(GlyphEntry::parse(&buf))
    }

    // binary search over the on-disk index; I/O failure reads as "absent"
    pub fn find(&mut self, unicode: u32) -> Option<GlyphEntry> {
        let code = u16::try_from(unicode).ok()?;

        let mut lo = 0u32;
        let mut hi = self.header.char_count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = match self.entry_at(mid) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("font: lookup U+{:04X} failed: {}", code, e);
                    return None;
                }
            };
            match entry.unicode.cmp(&code) {
                core::cmp::Ordering::Equal => return Some(entry),
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    // read an entry's encoded bitmap into buf; returns bytes read (may be short
    // for a truncated file, the decoder tolerates that)
    pub fn read_bitmap(
        &mut self,
        entry: &GlyphEntry,
        buf: &mut [u8],
    ) -> Result<usize, &'static str> {
        let size = entry.bitmap_size as usize;
        if buf.len() < size {
            return Err("font: bitmap buffer too small");
        }
        if entry.bitmap_offset >= self.file_len && size > 0 {
            return Err("font: bitmap offset past end of file");
        }
        storage::read_at(&mut self.file, entry.bitmap_offset, &mut buf[..size])
    }

    pub fn load_bitmap(&mut self, entry: &GlyphEntry) -> Result<Vec<u8>, &'static str> {
        if entry.bitmap_size > MAX_BITMAP_SIZE {
            return Err("font: bitmap too large");
        }
        let size = entry.bitmap_size as usize;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| "font: OOM for bitmap")?;
        buf.resize(size, 0);
        let n = self.read_bitmap(entry, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}
