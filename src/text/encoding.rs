// Book text encodings
//
// Books are UTF-8 or GBK. GBK is converted to UTF-8 per chunk through an
// injected table; the chunk keeps a map from each converted byte back to
// its raw file offset so page starts stored in the index are always raw
// offsets, whatever the encoding.

use alloc::vec::Vec;

use super::utf8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Gbk,
    AutoDetect,
}

impl TextEncoding {
    pub const fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Gbk => "gbk",
            TextEncoding::AutoDetect => "auto",
        }
    }
}

/// GBK double-byte code -> BMP codepoint. The table data lives outside
/// the core (flash partition or SD file).
pub trait GbkTable {
    fn to_unicode(&self, code: u16) -> Option<u16>;
}

/// No table installed: every double-byte character becomes U+FFFD.
pub struct NoGbkTable;

impl GbkTable for NoGbkTable {
    fn to_unicode(&self, _code: u16) -> Option<u16> {
        None
    }
}

pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

// sniff the first bytes of a book; ASCII and valid UTF-8 both read as UTF-8
pub fn detect_text_encoding(prefix: &[u8]) -> TextEncoding {
    if prefix.starts_with(&UTF8_BOM) {
        return TextEncoding::Utf8;
    }
    // the prefix may end mid-sequence; that's not evidence either way
    let body = &prefix[..utf8::complete_prefix_len(prefix)];
    match core::str::from_utf8(body) {
        Ok(_) => TextEncoding::Utf8,
        Err(_) => TextEncoding::Gbk,
    }
}

/// A decoded run of book text. `text` is always UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: Vec<u8>,
    base: u32,
    // map[i] = raw offset (relative to base) of text byte i; one extra
    // trailing entry holds the raw length consumed. None = identity.
    map: Option<Vec<u32>>,
    raw_len: u32,
}

impl TextChunk {
    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Raw file offset just past the bytes this chunk consumed.
    #[inline]
    pub fn raw_end(&self) -> u32 {
        self.base + self.raw_len
    }

    // raw file offset of text byte idx (idx == text.len() maps to raw_end)
    pub fn raw_offset(&self, idx: usize) -> u32 {
        match &self.map {
            None => self.base + idx.min(self.text.len()) as u32,
            Some(map) => {
                let i = idx.min(map.len().saturating_sub(1));
                self.base + map.get(i).copied().unwrap_or(self.raw_len)
            }
        }
    }
}

// convert raw bytes read at file offset `base`. Unless at_eof, a trailing
// incomplete character is left for the next read.
pub fn decode_chunk(
    raw: Vec<u8>,
    base: u32,
    encoding: TextEncoding,
    at_eof: bool,
    table: &dyn GbkTable,
) -> Result<TextChunk, &'static str> {
    match encoding {
        TextEncoding::Gbk => decode_gbk(&raw, base, at_eof, table),
        _ => {
            let mut text = raw;
            if !at_eof {
                let keep = utf8::complete_prefix_len(&text);
                text.truncate(keep);
            }
            let raw_len = text.len() as u32;
            Ok(TextChunk {
                text,
                base,
                map: None,
                raw_len,
            })
        }
    }
}

fn decode_gbk(
    raw: &[u8],
    base: u32,
    at_eof: bool,
    table: &dyn GbkTable,
) -> Result<TextChunk, &'static str> {
    let mut text = Vec::new();
    let mut map = Vec::new();
    // CJK text is mostly 2 raw -> 3 UTF-8 bytes
    let cap = raw.len() + raw.len() / 2 + 1;
    text.try_reserve_exact(cap)
        .map_err(|_| "text: OOM converting gbk")?;
    map.try_reserve_exact(cap + 1)
        .map_err(|_| "text: OOM converting gbk")?;

    let mut i = 0;
    let mut buf = [0u8; 4];
    while i < raw.len() {
        let b = raw[i];
        let (cp, len) = if b < 0x80 {
            (b as u32, 1)
        } else if (0x81..=0xFE).contains(&b) {
            match raw.get(i + 1) {
                Some(&b2) => {
                    let code = ((b as u16) << 8) | b2 as u16;
                    let cp = table.to_unicode(code).map_or(utf8::REPLACEMENT, |c| c as u32);
                    (cp, 2)
                }
                None if at_eof => (utf8::REPLACEMENT, 1),
                None => break,
            }
        } else {
            (utf8::REPLACEMENT, 1)
        };

        let ch = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
        for &byte in ch.encode_utf8(&mut buf).as_bytes() {
            text.push(byte);
            map.push(i as u32);
        }
        i += len;
    }
    map.push(i as u32);

    Ok(TextChunk {
        text,
        base,
        map: Some(map),
        raw_len: i as u32,
    })
}
