// Pagination over book files
//
// A page is laid out from a byte offset by reading a chunk sized from
// the layout, breaking lines until the page is full, and mapping the end
// back to a raw file offset. If the chunk ran out before the page was
// decided the read is retried with a bigger chunk. Offsets handed out
// are always raw file offsets on character boundaries.
//
// Backward paging: find a paragraph start before the target, lay lines
// out from there up to the target, keep the last page's worth. Lines
// are context free from a paragraph start, so a page read forward and
// then backward from its end comes back identical.

use alloc::string::String;
use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use super::encoding::{self, GbkTable, NoGbkTable, TextChunk, TextEncoding};
use super::line::{CharSpacing, LineBreaker};
use super::utf8;
use crate::fonts::GlyphMetrics;
use crate::storage;

const MIN_CHUNK: usize = 512;
const MAX_CHUNK: usize = 64 * 1024;
const DETECT_PREFIX: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub area_width: i32,
    pub area_height: i32,
    /// Render size in pixels; the font file may be scaled to it.
    pub font_size: f32,
    pub line_spacing: i32,
    /// Cap on lines per page, 0 = as many as the area holds.
    pub max_lines: usize,
    pub vertical: bool,
    pub spacing: CharSpacing,
}

impl PageLayout {
    // extent along a line: width for horizontal text, height for columns
    #[inline]
    pub fn max_width(&self) -> i32 {
        if self.vertical {
            self.area_height
        } else {
            self.area_width
        }
    }

    #[inline]
    pub fn line_advance(&self) -> i32 {
        (self.font_size as i32 + self.line_spacing).max(1)
    }

    pub fn lines_per_page(&self) -> usize {
        let across = if self.vertical {
            self.area_width
        } else {
            self.area_height
        };
        let fit = (across.max(0) / self.line_advance()) as usize;
        let lines = if self.max_lines > 0 {
            fit.min(self.max_lines)
        } else {
            fit
        };
        lines.max(1)
    }

    // generous guess of raw bytes on one page (3-byte CJK, half-em Latin)
    pub fn estimated_page_bytes(&self) -> usize {
        let min_char = (self.font_size as i32 / 2).max(1);
        let per_line = (self.max_width().max(0) / min_char) as usize + 1;
        (self.lines_per_page() * per_line * 3 + 64).clamp(MIN_CHUNK, MAX_CHUNK)
    }

    // identifies everything that moves page breaks; stored with the index
    pub fn fingerprint(&self, font_height: u8) -> u32 {
        let mut buf = [0u8; 34];
        buf[0..4].copy_from_slice(&self.area_width.to_le_bytes());
        buf[4..8].copy_from_slice(&self.area_height.to_le_bytes());
        buf[8..12].copy_from_slice(&self.font_size.to_bits().to_le_bytes());
        buf[12..16].copy_from_slice(&self.line_spacing.to_le_bytes());
        buf[16..20].copy_from_slice(&(self.max_lines as u32).to_le_bytes());
        buf[20..24].copy_from_slice(&self.spacing.horizontal.to_le_bytes());
        buf[24..28].copy_from_slice(&self.spacing.vertical.to_le_bytes());
        buf[28] = self.vertical as u8;
        buf[29] = font_height;
        buf[30..34].copy_from_slice(b"PLPG");
        super::index::fnv1a(&buf)
    }
}

/// Open book text: the file plus how to decode it.
pub struct TextFile<'a, F> {
    file: &'a mut F,
    len: u32,
    encoding: TextEncoding,
    gbk: &'a dyn GbkTable,
}

impl<'a, F> TextFile<'a, F>
where
    F: Read + Seek,
{
    // AutoDetect is resolved here from the first KB of the file
    pub fn new(file: &'a mut F, encoding: TextEncoding) -> Result<Self, &'static str> {
        let len = storage::file_len(file)?;
        let encoding = match encoding {
            TextEncoding::AutoDetect => {
                let mut prefix = [0u8; DETECT_PREFIX];
                let n = storage::read_at(file, 0, &mut prefix)?;
                encoding::detect_text_encoding(&prefix[..n])
            }
            e => e,
        };
        Ok(Self {
            file,
            len,
            encoding,
            gbk: &NoGbkTable,
        })
    }

    pub fn with_gbk_table(mut self, table: &'a dyn GbkTable) -> Self {
        self.gbk = table;
        self
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn read_raw(&mut self, offset: u32, max: usize, limit: u32) -> Result<Vec<u8>, &'static str> {
        let end = limit.min(self.len);
        let n = (end.saturating_sub(offset) as usize).min(max);
        let mut buf = Vec::new();
        buf.try_reserve_exact(n)
            .map_err(|_| "page: OOM for text chunk")?;
        buf.resize(n, 0);
        let got = storage::read_at(self.file, offset, &mut buf)?;
        buf.truncate(got);
        Ok(buf)
    }

    // decoded text from offset, at most max raw bytes, never past limit
    pub fn read_chunk(&mut self, offset: u32, max: usize, limit: u32) -> Result<TextChunk, &'static str> {
        let end = limit.min(self.len);
        let raw = self.read_raw(offset, max, end)?;
        let at_eof = offset as u64 + raw.len() as u64 >= end as u64;
        encoding::decode_chunk(raw, offset, self.encoding, at_eof, self.gbk)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBreakResult {
    /// Text index just past each line (newline included).
    pub line_breaks: Vec<usize>,
    pub page_end: usize,
    pub line_count: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPageResult {
    pub success: bool,
    pub file_pos: u32,
    pub page_end_pos: u32,
    pub page_text: String,
    /// Raw file offset just past each line.
    pub line_ends: Vec<u32>,
}

impl TextPageResult {
    pub(crate) fn failed(at: u32) -> Self {
        Self {
            success: false,
            file_pos: at,
            page_end_pos: at,
            ..Self::default()
        }
    }
}

// one line from pos, forcing a char of progress when nothing fits
fn next_line_end<M>(
    breaker: &mut LineBreaker<'_, M>,
    text: &[u8],
    pos: usize,
    layout: &PageLayout,
    scale: f32,
) -> Option<usize>
where
    M: GlyphMetrics + ?Sized,
{
    if pos >= text.len() {
        return None;
    }
    let brk = breaker.find_break_position(text, pos, layout.max_width(), layout.vertical, scale);
    if brk > pos {
        return Some(brk);
    }
    utf8::decode_at(text, pos).map(|(_, len)| pos + len)
}

// fill one page of lines from text[start..]
pub fn calculate_page_breaks<M>(
    breaker: &mut LineBreaker<'_, M>,
    text: &[u8],
    start: usize,
    layout: &PageLayout,
) -> PageBreakResult
where
    M: GlyphMetrics + ?Sized,
{
    let scale = breaker.scale_for(layout.font_size);
    let max_lines = layout.lines_per_page();

    let mut line_breaks = Vec::new();
    let mut pos = start;
    while line_breaks.len() < max_lines {
        let Some(brk) = next_line_end(breaker, text, pos, layout, scale) else {
            break;
        };
        line_breaks.push(brk);
        pos = brk;
    }

    let line_count = line_breaks.len();
    PageBreakResult {
        line_breaks,
        page_end: pos,
        line_count,
        success: line_count > 0,
    }
}

struct PageSpan {
    start: u32,
    end: u32,
    text: Vec<u8>,
    line_ends: Vec<u32>,
}

// lay out the page starting at raw offset `start`, text ending at `limit`
fn layout_page_at<F, M>(
    tf: &mut TextFile<'_, F>,
    breaker: &mut LineBreaker<'_, M>,
    layout: &PageLayout,
    start: u32,
    limit: u32,
) -> Result<PageSpan, &'static str>
where
    F: Read + Seek,
    M: GlyphMetrics + ?Sized,
{
    let limit = limit.min(tf.len());
    let lines_wanted = layout.lines_per_page();
    let mut size = layout.estimated_page_bytes();

    loop {
        let chunk = tf.read_chunk(start, size, limit)?;
        let at_eof = chunk.raw_end() >= limit;
        let text = &chunk.text;

        if text.is_empty() && !at_eof {
            if size >= MAX_CHUNK {
                return Err("page: no decodable text");
            }
            size = (size * 2).min(MAX_CHUNK);
            continue;
        }

        let r = calculate_page_breaks(breaker, text, 0, layout);

        // the chunk ended before the page was decided: the last line may
        // continue, or more lines may fit
        let ran_out = r.page_end == text.len()
            && (r.line_count < lines_wanted || text.last() != Some(&b'\n'));
        if ran_out && !at_eof && size < MAX_CHUNK {
            size = (size * 2).min(MAX_CHUNK);
            continue;
        }

        let line_ends = r.line_breaks.iter().map(|&i| chunk.raw_offset(i)).collect();
        let mut page_text = Vec::new();
        page_text
            .try_reserve_exact(r.page_end)
            .map_err(|_| "page: OOM for page text")?;
        page_text.extend_from_slice(&text[..r.page_end]);

        return Ok(PageSpan {
            start,
            end: chunk.raw_offset(r.page_end),
            text: page_text,
            line_ends,
        });
    }
}

// raw offsets where each line between start and end begins
fn line_starts_between<F, M>(
    tf: &mut TextFile<'_, F>,
    breaker: &mut LineBreaker<'_, M>,
    layout: &PageLayout,
    start: u32,
    end: u32,
) -> Result<Vec<u32>, &'static str>
where
    F: Read + Seek,
    M: GlyphMetrics + ?Sized,
{
    let scale = breaker.scale_for(layout.font_size);
    let chunk = tf.read_chunk(start, (end - start) as usize, end)?;
    let text = &chunk.text;

    let mut starts = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        starts.push(chunk.raw_offset(pos));
        match next_line_end(breaker, text, pos, layout, scale) {
            Some(brk) => pos = brk,
            None => break,
        }
    }
    Ok(starts)
}

// start of the page that ends at `end`
fn find_page_start_before<F, M>(
    tf: &mut TextFile<'_, F>,
    breaker: &mut LineBreaker<'_, M>,
    layout: &PageLayout,
    end: u32,
) -> Result<u32, &'static str>
where
    F: Read + Seek,
    M: GlyphMetrics + ?Sized,
{
    let lines_wanted = layout.lines_per_page();
    let mut window = layout.estimated_page_bytes() * 2;

    loop {
        let from = end.saturating_sub(window as u32);

        // earliest paragraph start in the window keeps the most lines
        let para = if from == 0 {
            Some(0)
        } else {
            let raw = tf.read_raw(from, end as usize - from as usize, end)?;
            raw.iter()
                .position(|&b| b == b'\n')
                .map(|i| from + i as u32 + 1)
                .filter(|&p| p < end)
        };

        let Some(para) = para else {
            if window >= MAX_CHUNK {
                // one paragraph longer than any window: accept a line grid
                // anchored at the window start
                let raw = tf.read_raw(from, 4, end)?;
                let skip = raw.iter().take_while(|&&b| b & 0xC0 == 0x80).count();
                let anchor = from + skip as u32;
                let starts = line_starts_between(tf, breaker, layout, anchor, end)?;
                let i = starts.len().saturating_sub(lines_wanted);
                return Ok(starts.get(i).copied().unwrap_or(anchor));
            }
            window = (window * 2).min(MAX_CHUNK);
            continue;
        };

        let starts = line_starts_between(tf, breaker, layout, para, end)?;
        if starts.len() >= lines_wanted {
            return Ok(starts[starts.len() - lines_wanted]);
        }
        if from == 0 {
            // not a full page of text before `end`
            return Ok(0);
        }
        if window >= MAX_CHUNK {
            return Ok(starts.first().copied().unwrap_or(para));
        }
        window = (window * 2).min(MAX_CHUNK);
    }
}

// one page starting at `start`, or ending at `start` when backward.
// max_byte_pos caps how far a page may run (None = end of file).
pub fn read_text_page<F, M>(
    tf: &mut TextFile<'_, F>,
    metrics: &mut M,
    layout: &PageLayout,
    start: u32,
    backward: bool,
    max_byte_pos: Option<u32>,
) -> TextPageResult
where
    F: Read + Seek,
    M: GlyphMetrics + ?Sized,
{
    let limit = max_byte_pos.map_or(tf.len(), |m| m.min(tf.len()));
    let mut breaker = LineBreaker::new(metrics, layout.spacing);

    let (page_start, page_limit) = if backward {
        let end = start.min(limit);
        if end == 0 {
            // nothing before the first page; hand back the first page
            (0, limit)
        } else {
            match find_page_start_before(tf, &mut breaker, layout, end) {
                Ok(p) => (p, end),
                Err(e) => {
                    log::warn!("page: backward from {} failed: {}", start, e);
                    return TextPageResult::failed(start);
                }
            }
        }
    } else {
        (start, limit)
    };

    if page_start >= page_limit {
        return TextPageResult::failed(start);
    }

    match layout_page_at(tf, &mut breaker, layout, page_start, page_limit) {
        Ok(span) if span.end > span.start => TextPageResult {
            success: true,
            file_pos: span.start,
            page_end_pos: span.end,
            page_text: String::from_utf8_lossy(&span.text).into_owned(),
            line_ends: span.line_ends,
        },
        Ok(_) => TextPageResult::failed(page_start),
        Err(e) => {
            log::warn!("page: read at {} failed: {}", page_start, e);
            TextPageResult::failed(page_start)
        }
    }
}

// decoded bytes of [start, end); used to feed the glyph cache
pub fn read_page_bytes<F>(tf: &mut TextFile<'_, F>, start: u32, end: u32) -> Result<Vec<u8>, &'static str>
where
    F: Read + Seek,
{
    if end <= start {
        return Ok(Vec::new());
    }
    let chunk = tf.read_chunk(start, (end - start) as usize, end)?;
    Ok(chunk.text)
}

// walk the page starting at `start` and return its end; index builds use
// this without keeping the text
pub(crate) fn page_end_from<F, M>(
    tf: &mut TextFile<'_, F>,
    breaker: &mut LineBreaker<'_, M>,
    layout: &PageLayout,
    start: u32,
) -> Result<u32, &'static str>
where
    F: Read + Seek,
    M: GlyphMetrics + ?Sized,
{
    let limit = tf.len();
    Ok(layout_page_at(tf, breaker, layout, start, limit)?.end)
}
