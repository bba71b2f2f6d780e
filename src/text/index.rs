// Book page index: page number -> raw byte offset of the page start
//
// Built page by page with the same layout code as reading, so a page
// opened through the index matches the page reached by paging. The build
// polls a stop signal between pages (the SD bus may be handed to USB
// mass storage at any time) and yields every few pages so the housekeeping
// task and the watchdog get a turn.
//
// Persisted as a small binary file:
//   magic u32 "PLPI", version u8, complete u8, reserved u16,
//   book_size u32, layout fingerprint u32, count u32, count x u32 offsets

use alloc::vec::Vec;

use embedded_io::{Read, Seek};

use super::line::LineBreaker;
use super::page::{self, PageLayout, TextFile};
use crate::fonts::GlyphMetrics;
use crate::storage::le_u32;

const INDEX_MAGIC: u32 = 0x504C_5049; // "PLPI"
const INDEX_VERSION: u8 = 1;
pub const INDEX_HEADER: usize = 20;

pub const INDEX_FILE: &str = "PAGES.IDX";

#[inline]
pub fn fnv1a(data: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in data {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Cooperative checkpoint for long index builds.
pub trait IndexControl {
    fn should_stop(&self) -> bool;
    fn yield_now(&self) {}
}

/// Never stops, never yields.
pub struct RunToEnd;

impl IndexControl for RunToEnd {
    fn should_stop(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildIndexResult {
    /// Page starts, beginning with the start offset the build was given.
    pub pages: Vec<u32>,
    pub reached_eof: bool,
    pub cancelled: bool,
}

// page starts from start_offset until EOF, max_pages (0 = no limit) or a
// stop request. I/O errors end the build early with what was computed.
#[allow(clippy::too_many_arguments)]
pub fn build_book_page_index<F, M, C>(
    tf: &mut TextFile<'_, F>,
    metrics: &mut M,
    layout: &PageLayout,
    max_pages: usize,
    start_offset: u32,
    control: &C,
    yield_every: usize,
) -> BuildIndexResult
where
    F: Read + Seek,
    M: GlyphMetrics + ?Sized,
    C: IndexControl + ?Sized,
{
    let mut result = BuildIndexResult::default();
    let len = tf.len();
    let mut breaker = LineBreaker::new(metrics, layout.spacing);

    if result.pages.try_reserve(64).is_err() {
        log::warn!("index: OOM before start");
        return result;
    }
    result.pages.push(start_offset.min(len));
    let mut pos = start_offset.min(len);

    loop {
        if max_pages != 0 && result.pages.len() >= max_pages {
            break;
        }
        if control.should_stop() {
            log::info!("index: stop requested after {} pages", result.pages.len());
            result.cancelled = true;
            break;
        }
        if pos >= len {
            result.reached_eof = true;
            break;
        }

        let end = match page::page_end_from(tf, &mut breaker, layout, pos) {
            Ok(end) => end,
            Err(e) => {
                log::warn!("index: page at {} failed: {}", pos, e);
                break;
            }
        };
        if end <= pos || end >= len {
            result.reached_eof = true;
            break;
        }

        if result.pages.try_reserve(1).is_err() {
            log::warn!("index: OOM at {} pages", result.pages.len());
            break;
        }
        result.pages.push(end);
        pos = end;

        if yield_every > 0 && result.pages.len() % yield_every == 0 {
            control.yield_now();
        }
    }

    log::debug!(
        "index: {} pages from {}, eof={} cancelled={}",
        result.pages.len(),
        start_offset,
        result.reached_eof,
        result.cancelled
    );
    result
}

pub fn encode_page_index(
    pages: &[u32],
    book_size: u32,
    fingerprint: u32,
    complete: bool,
) -> Result<Vec<u8>, &'static str> {
    let total = INDEX_HEADER + pages.len() * 4;
    let mut buf = Vec::new();
    buf.try_reserve_exact(total)
        .map_err(|_| "index: OOM encoding")?;

    buf.extend_from_slice(&INDEX_MAGIC.to_le_bytes());
    buf.push(INDEX_VERSION);
    buf.push(complete as u8);
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&book_size.to_le_bytes());
    buf.extend_from_slice(&fingerprint.to_le_bytes());
    buf.extend_from_slice(&(pages.len() as u32).to_le_bytes());
    for &p in pages {
        buf.extend_from_slice(&p.to_le_bytes());
    }
    Ok(buf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndex {
    pub pages: Vec<u32>,
    pub complete: bool,
}

// parse and validate; stale (book or layout changed) is an error
pub fn parse_page_index(
    data: &[u8],
    book_size: u32,
    fingerprint: u32,
) -> Result<PageIndex, &'static str> {
    if data.len() < INDEX_HEADER {
        return Err("index: too short");
    }
    if le_u32(data, 0) != INDEX_MAGIC {
        return Err("index: bad magic");
    }
    if data[4] != INDEX_VERSION {
        return Err("index: version mismatch");
    }
    if le_u32(data, 8) != book_size {
        return Err("index: book size changed");
    }
    if le_u32(data, 12) != fingerprint {
        return Err("index: layout changed");
    }

    let count = le_u32(data, 16) as usize;
    let needed = count
        .checked_mul(4)
        .and_then(|n| n.checked_add(INDEX_HEADER))
        .ok_or("index: bad count")?;
    if data.len() < needed {
        return Err("index: truncated");
    }

    let mut pages = Vec::new();
    pages
        .try_reserve_exact(count)
        .map_err(|_| "index: OOM parsing")?;
    for i in 0..count {
        let p = le_u32(data, INDEX_HEADER + i * 4);
        let ordered = pages.last().is_none_or(|&prev| p > prev);
        if !ordered || (p >= book_size && !(p == 0 && book_size == 0)) {
            return Err("index: bad page offset");
        }
        pages.push(p);
    }
    if pages.first().is_some_and(|&p| p != 0) {
        return Err("index: first page not at 0");
    }

    Ok(PageIndex {
        pages,
        complete: data[5] != 0,
    })
}
