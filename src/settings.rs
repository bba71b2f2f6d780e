// Reader settings with persistent storage.
// Text-based key=value format, SETTINGS.TXT style: '#' comments,
// whitespace trimmed, unknown keys ignored, out-of-range values clamped.

use crate::cache::{BOOKNAME_CAP, RECYCLE_POOL_CAP};
use crate::fonts::RenderOptions;
use crate::text::line::CharSpacing;
use crate::text::page::PageLayout;

pub const SETTINGS_FILE: &str = "READER.TXT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    pub font_size: u8,          // render size in px
    pub dark_mode: bool,        // white text on black
    pub vertical: bool,         // top-to-bottom columns, right to left
    pub char_spacing_h: u8,     // px between chars, horizontal text
    pub char_spacing_v: u8,     // px between chars, vertical text
    pub line_spacing: u8,       // px between lines
    pub margin_x: u16,
    pub margin_y: u16,
    pub legacy_1bit: bool,      // pre-v3 fonts are plain 1-bit, not huffman
    pub recycle_cap: u16,       // glyphs kept from pages leaving the window
    pub bookname_cap: u16,      // unique chars cached for the file list
    pub index_yield_every: u8,  // pages indexed between yields; 0 = never
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ReaderSettings {
    pub const fn defaults() -> Self {
        Self {
            font_size: 24,
            dark_mode: false,
            vertical: false,
            char_spacing_h: CharSpacing::DEFAULT.horizontal as u8,
            char_spacing_v: CharSpacing::DEFAULT.vertical as u8,
            line_spacing: 8,
            margin_x: 16,
            margin_y: 24,
            legacy_1bit: false,
            recycle_cap: RECYCLE_POOL_CAP as u16,
            bookname_cap: BOOKNAME_CAP as u16,
            index_yield_every: 8,
        }
    }

    pub fn sanitize(&mut self) {
        self.font_size = self.font_size.clamp(8, 64);
        self.char_spacing_h = self.char_spacing_h.min(16);
        self.char_spacing_v = self.char_spacing_v.min(16);
        self.line_spacing = self.line_spacing.min(64);
        self.margin_x = self.margin_x.min(200);
        self.margin_y = self.margin_y.min(200);
        self.recycle_cap = self.recycle_cap.min(4000);
        self.bookname_cap = self.bookname_cap.clamp(32, 1000);
        self.index_yield_every = self.index_yield_every.min(100);
    }

    #[inline]
    pub fn char_spacing(&self) -> CharSpacing {
        CharSpacing {
            horizontal: self.char_spacing_h as i32,
            vertical: self.char_spacing_v as i32,
        }
    }

    #[inline]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::new(self.dark_mode, false)
    }

    // text area of a screen after margins
    pub fn page_layout(&self, screen_w: u16, screen_h: u16) -> PageLayout {
        let w = screen_w.saturating_sub(self.margin_x.saturating_mul(2));
        let h = screen_h.saturating_sub(self.margin_y.saturating_mul(2));
        PageLayout {
            area_width: w as i32,
            area_height: h as i32,
            font_size: self.font_size as f32,
            line_spacing: self.line_spacing as i32,
            max_lines: 0,
            vertical: self.vertical,
            spacing: self.char_spacing(),
        }
    }

    pub fn parse(data: &[u8]) -> Self {
        let mut s = Self::defaults();
        for line in data.split(|&b| b == b'\n') {
            let line = trim(line);
            if line.is_empty() || line[0] == b'#' {
                continue;
            }
            if let Some(eq) = line.iter().position(|&b| b == b'=') {
                s.apply(trim(&line[..eq]), trim(&line[eq + 1..]));
            }
        }
        s.sanitize();
        s
    }

    fn apply(&mut self, key: &[u8], val: &[u8]) {
        let Some(v) = parse_u16(val) else {
            return;
        };
        let byte = v.min(u8::MAX as u16) as u8;
        match key {
            b"font_size" => self.font_size = byte,
            b"dark_mode" => self.dark_mode = v != 0,
            b"vertical" => self.vertical = v != 0,
            b"char_spacing_h" => self.char_spacing_h = byte,
            b"char_spacing_v" => self.char_spacing_v = byte,
            b"line_spacing" => self.line_spacing = byte,
            b"margin_x" => self.margin_x = v,
            b"margin_y" => self.margin_y = v,
            b"legacy_1bit" => self.legacy_1bit = v != 0,
            b"recycle_cap" => self.recycle_cap = v,
            b"bookname_cap" => self.bookname_cap = v,
            b"index_yield_every" => self.index_yield_every = byte,
            _ => {} // unknown keys ignored for forward compat
        }
    }

    // returns bytes written; output is cut short if buf is too small
    pub fn write(&self, buf: &mut [u8]) -> usize {
        let mut wr = TxtWriter::new(buf);
        wr.put(b"# reader settings\n");
        wr.put(b"# lines starting with # are ignored\n\n");
        wr.kv_num(b"font_size", self.font_size as u16);
        wr.kv_num(b"dark_mode", self.dark_mode as u16);
        wr.kv_num(b"vertical", self.vertical as u16);
        wr.kv_num(b"char_spacing_h", self.char_spacing_h as u16);
        wr.kv_num(b"char_spacing_v", self.char_spacing_v as u16);
        wr.kv_num(b"line_spacing", self.line_spacing as u16);
        wr.kv_num(b"margin_x", self.margin_x);
        wr.kv_num(b"margin_y", self.margin_y);
        wr.put(b"\n# fonts before v3 without huffman data\n");
        wr.kv_num(b"legacy_1bit", self.legacy_1bit as u16);
        wr.put(b"\n# cache sizes\n");
        wr.kv_num(b"recycle_cap", self.recycle_cap);
        wr.kv_num(b"bookname_cap", self.bookname_cap);
        wr.kv_num(b"index_yield_every", self.index_yield_every as u16);
        wr.len()
    }
}

fn trim(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\r'))
        .unwrap_or(s.len());
    let end = s
        .iter()
        .rposition(|b| !matches!(b, b' ' | b'\t' | b'\r'))
        .map_or(start, |i| i + 1);
    &s[start..end]
}

fn parse_u16(s: &[u8]) -> Option<u16> {
    if s.is_empty() {
        return None;
    }
    s.iter().try_fold(0u16, |val, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        val.checked_mul(10)?.checked_add((b - b'0') as u16)
    })
}

struct TxtWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> TxtWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, data: &[u8]) {
        let n = data.len().min(self.buf.len() - self.pos);
        self.buf[self.pos..self.pos + n].copy_from_slice(&data[..n]);
        self.pos += n;
    }

    fn kv_num(&mut self, key: &[u8], val: u16) {
        let mut digits = [0u8; 5];
        let mut i = digits.len();
        let mut v = val;
        loop {
            i -= 1;
            digits[i] = b'0' + (v % 10) as u8;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        self.put(key);
        self.put(b"=");
        self.put(&digits[i..]);
        self.put(b"\n");
    }

    fn len(&self) -> usize {
        self.pos
    }
}
