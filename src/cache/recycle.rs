// Recycle pool: glyphs evicted from the page window
//
// When a page leaves the window its glyphs are offered here so the next
// page build can take them without touching SD. Capacity-bounded FIFO:
// the oldest codepoints go first. The pool is one arena, rebuilt on each
// merge, so lookups cost the same as any page cache.

use alloc::borrow::Cow;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::page::{GlyphCachePage, GlyphDonor};
use crate::fonts::format::GlyphEntry;

pub const RECYCLE_POOL_CAP: usize = 1000;

pub struct RecyclePool {
    page: GlyphCachePage,
    order: VecDeque<u16>,
    cap: usize,
}

impl Default for RecyclePool {
    fn default() -> Self {
        Self::new(RECYCLE_POOL_CAP)
    }
}

impl RecyclePool {
    pub const fn new(cap: usize) -> Self {
        Self {
            page: GlyphCachePage::empty(),
            order: VecDeque::new(),
            cap,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.page.total_size()
    }

    pub fn has_char(&self, unicode: u32) -> bool {
        self.page.has_char(unicode)
    }

    pub fn glyph(&self, unicode: u32) -> Option<(GlyphEntry, &[u8])> {
        self.page.glyph(unicode)
    }

    // drop everything and adopt a new capacity
    pub fn reset(&mut self, cap: usize) {
        self.clear();
        self.cap = cap;
    }

    pub fn clear(&mut self) {
        self.page.clear();
        self.order.clear();
    }

    // merge source's glyphs (minus ones `skip` reports as resident elsewhere);
    // returns how many were added
    pub fn absorb<S>(&mut self, source: &GlyphCachePage, skip: S) -> Result<usize, &'static str>
    where
        S: Fn(u16) -> bool,
    {
        if self.cap == 0 || !source.is_valid() {
            return Ok(0);
        }

        let mut fresh: Vec<u16> = Vec::new();
        for entry in source.entries() {
            if fresh.len() == self.cap {
                break;
            }
            let cp = entry.unicode;
            if self.page.has_char(cp as u32) || skip(cp) {
                continue;
            }
            fresh.try_reserve(1).map_err(|_| "recycle: OOM")?;
            fresh.push(cp);
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        let overflow = (self.order.len() + fresh.len()).saturating_sub(self.cap);
        let mut evicted: Vec<u16> = self.order.iter().take(overflow).copied().collect();
        evicted.sort_unstable();

        // both sides are sorted by unicode; merge into one sorted list
        let merged = {
            let mut glyphs: Vec<(GlyphEntry, Cow<'_, [u8]>)> = Vec::new();
            glyphs
                .try_reserve_exact(self.order.len() - overflow + fresh.len())
                .map_err(|_| "recycle: OOM")?;

            let kept = self
                .page
                .entries()
                .filter(|e| evicted.binary_search(&e.unicode).is_err());
            let mut kept = kept.peekable();
            let mut added = fresh.iter().peekable();
            loop {
                let take_kept = match (kept.peek(), added.peek()) {
                    (None, None) => break,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (Some(k), Some(&&a)) => k.unicode < a,
                };
                let next = if take_kept {
                    kept.next().and_then(|e| self.page.glyph(e.unicode as u32))
                } else {
                    added.next().and_then(|&cp| source.donate(cp))
                };
                if let Some((entry, bytes)) = next {
                    glyphs.push((entry, Cow::Borrowed(bytes)));
                }
            }

            GlyphCachePage::from_glyphs(&glyphs)?
        };
        self.page = merged;

        for _ in 0..overflow {
            self.order.pop_front();
        }
        self.order.extend(fresh.iter().copied());

        log::debug!(
            "recycle: +{} -{} -> {} glyphs, {} B",
            fresh.len(),
            overflow,
            self.order.len(),
            self.page.total_size()
        );
        Ok(fresh.len())
    }
}

impl GlyphDonor for RecyclePool {
    fn donate(&self, unicode: u16) -> Option<(GlyphEntry, &[u8])> {
        self.page.donate(unicode)
    }
}
