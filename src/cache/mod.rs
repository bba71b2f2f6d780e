// Glyph caches
//
// arena:   single-allocation [header | sorted index | raw bitmaps] store
// page:    one page's unique glyphs, built from page text
// recycle: FIFO pool of glyphs from pages that left the window
// common:  always-resident character lists
//
// GlyphCacheManager keeps a 5-slot window centred on the current page
// (offsets -2..=+2) plus four auxiliary caches that outlive page turns:
// common/UI, book names, TOC and the recycle pool. A +-1 page turn
// rotates the window and builds only the newly exposed edge page; any
// other move rebuilds the whole window.

pub mod arena;
pub mod common;
pub mod page;
pub mod recycle;

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_io::{Read, Seek};

use crate::fonts::GlyphMetrics;
use crate::fonts::format::{FontFile, GlyphEntry};
pub use common::{BOOKNAME_CAP, COMMON_CHARS};
pub use page::{GlyphCachePage, GlyphDonor, NoDonor, PageBuildStats};
pub use recycle::{RECYCLE_POOL_CAP, RecyclePool};

pub const WINDOW_SLOTS: usize = 5;
pub const CENTER_SLOT: usize = 2;

/// Paged text the window is built from.
pub trait PageSource {
    /// Pages known so far; may grow while the index is still being built.
    fn page_count(&self) -> usize;
    /// UTF-8 text of one page, None past the end or on read failure.
    /// `metrics` lays out the page when its end is not indexed yet.
    fn page_text(&mut self, page: usize, metrics: &mut dyn GlyphMetrics) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit_rate_pct(&self) -> u32 {
        let total = self.hits as u64 + self.misses as u64;
        if total == 0 {
            return 0;
        }
        (self.hits as u64 * 100 / total) as u32
    }
}

// slot search order: centre first, then nearest neighbours
const SEARCH_ORDER: [usize; WINDOW_SLOTS] = [CENTER_SLOT, 3, 1, 4, 0];

pub struct GlyphCacheManager {
    slots: [GlyphCachePage; WINDOW_SLOTS],
    slot_pages: [Option<usize>; WINDOW_SLOTS],
    current_page: usize,
    initialized: bool,
    init_locked: AtomicBool,
    hits: AtomicU32,
    misses: AtomicU32,
    log_enabled: bool,

    common: GlyphCachePage,
    bookname: GlyphCachePage,
    bookname_cap: usize,
    toc: GlyphCachePage,
    pool: RecyclePool,
}

impl Default for GlyphCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphCacheManager {
    pub const fn new() -> Self {
        Self {
            slots: [const { GlyphCachePage::empty() }; WINDOW_SLOTS],
            slot_pages: [None; WINDOW_SLOTS],
            current_page: 0,
            initialized: false,
            init_locked: AtomicBool::new(false),
            hits: AtomicU32::new(0),
            misses: AtomicU32::new(0),
            log_enabled: true,
            common: GlyphCachePage::empty(),
            bookname: GlyphCachePage::empty(),
            bookname_cap: BOOKNAME_CAP,
            toc: GlyphCachePage::empty(),
            pool: RecyclePool::new(RECYCLE_POOL_CAP),
        }
    }

    // ---- window lifecycle ----

    // build all five slots fresh around `page`; false if locked or the
    // centre page could not be cached
    pub fn initialize<S, F>(&mut self, book: &mut S, font: &mut FontFile<F>, page: usize) -> bool
    where
        S: PageSource + ?Sized,
        F: Read + Seek,
    {
        if !self.try_lock() {
            log::warn!("cache: initialize({}) skipped, build in progress", page);
            return false;
        }
        let ok = self.rebuild_window(book, font, page);
        self.init_locked.store(false, Ordering::Release);
        ok
    }

    fn rebuild_window<S, F>(&mut self, book: &mut S, font: &mut FontFile<F>, page: usize) -> bool
    where
        S: PageSource + ?Sized,
        F: Read + Seek,
    {
        self.clear_all();
        self.current_page = page;
        self.initialized = true;

        let mut built = 0;
        for slot in SEARCH_ORDER {
            if self.build_slot(slot, book, font) {
                built += 1;
            }
        }
        if self.log_enabled {
            log::info!(
                "cache: window at page {}, {}/{} slots, {} B",
                page,
                built,
                WINDOW_SLOTS,
                self.window_bytes()
            );
        }
        self.slots[CENTER_SLOT].is_valid()
    }

    // shift the window by exactly one page; anything else (or an
    // uninitialised window) falls back to a full initialize
    pub fn scroll_update<S, F>(
        &mut self,
        book: &mut S,
        font: &mut FontFile<F>,
        new_page: usize,
        forward: bool,
    ) -> bool
    where
        S: PageSource + ?Sized,
        F: Read + Seek,
    {
        if !self.try_lock() {
            log::warn!("cache: scroll to {} skipped, build in progress", new_page);
            return false;
        }

        let adjacent = if forward {
            self.current_page.checked_add(1) == Some(new_page)
        } else {
            new_page.checked_add(1) == Some(self.current_page)
        };
        if !self.initialized || !adjacent {
            if self.log_enabled {
                log::info!(
                    "cache: {} -> {} not a single step, rebuilding window",
                    self.current_page,
                    new_page
                );
            }
            let ok = self.rebuild_window(book, font, new_page);
            self.init_locked.store(false, Ordering::Release);
            return ok;
        }

        let (leaving, entering) = if forward {
            (0, WINDOW_SLOTS - 1)
        } else {
            (WINDOW_SLOTS - 1, 0)
        };

        // glyphs go to the pool before the arena is released
        self.recycle_slot(leaving);
        self.slots[leaving].clear();
        self.slot_pages[leaving] = None;

        if forward {
            for i in 0..WINDOW_SLOTS - 1 {
                let (a, b) = self.slots.split_at_mut(i + 1);
                a[i].swap_with(&mut b[0]);
                self.slot_pages.swap(i, i + 1);
            }
        } else {
            for i in (1..WINDOW_SLOTS).rev() {
                let (a, b) = self.slots.split_at_mut(i);
                a[i - 1].swap_with(&mut b[0]);
                self.slot_pages.swap(i - 1, i);
            }
        }
        self.current_page = new_page;
        self.build_slot(entering, book, font);

        // centre may be missing if an earlier build failed
        if !self.slots[CENTER_SLOT].is_valid() {
            self.build_slot(CENTER_SLOT, book, font);
        }

        if self.log_enabled {
            log::debug!(
                "cache: scrolled to {} ({}), pool {} glyphs",
                new_page,
                if forward { "fwd" } else { "back" },
                self.pool.len()
            );
        }
        let ok = self.slots[CENTER_SLOT].is_valid();
        self.init_locked.store(false, Ordering::Release);
        ok
    }

    // fill any missing neighbour slots; returns how many were built
    pub fn prefetch_around<S, F>(&mut self, book: &mut S, font: &mut FontFile<F>) -> usize
    where
        S: PageSource + ?Sized,
        F: Read + Seek,
    {
        if !self.initialized || !self.try_lock() {
            return 0;
        }
        let mut built = 0;
        for slot in [3, 1, 4, 0] {
            if !self.is_slot_current(slot) && self.build_slot(slot, book, font) {
                built += 1;
            }
        }
        self.init_locked.store(false, Ordering::Release);
        built
    }

    pub fn clear_all(&mut self) {
        for (slot, page) in self.slots.iter_mut().zip(self.slot_pages.iter_mut()) {
            slot.clear();
            *page = None;
        }
        self.initialized = false;
    }

    // load + store: riscv32imc has no atomic RMW, and every builder holds
    // &mut self anyway; the flag is for code holding a shared reference
    fn try_lock(&self) -> bool {
        if self.init_locked.load(Ordering::Acquire) {
            return false;
        }
        self.init_locked.store(true, Ordering::Release);
        true
    }

    pub fn set_initialization_locked(&self, locked: bool) {
        self.init_locked.store(locked, Ordering::Release);
    }

    pub fn is_initialization_locked(&self) -> bool {
        self.init_locked.load(Ordering::Acquire)
    }

    fn page_for_slot(&self, slot: usize) -> Option<usize> {
        let page = self.current_page as isize + slot as isize - CENTER_SLOT as isize;
        usize::try_from(page).ok()
    }

    fn is_slot_current(&self, slot: usize) -> bool {
        self.slots[slot].is_valid() && self.slot_pages[slot] == self.page_for_slot(slot)
    }

    fn build_slot<S, F>(&mut self, slot: usize, book: &mut S, font: &mut FontFile<F>) -> bool
    where
        S: PageSource + ?Sized,
        F: Read + Seek,
    {
        let Some(page) = self.page_for_slot(slot) else {
            return false;
        };
        if page >= book.page_count() {
            return false;
        }
        let Some(text) = book.page_text(page, &mut *font) else {
            log::warn!("cache: no text for page {}", page);
            return false;
        };

        // the slot being rebuilt must not donate to itself
        self.slots[slot].clear();
        self.slot_pages[slot] = None;

        match GlyphCachePage::build(&text, &*self, font) {
            Ok(built) => {
                if self.log_enabled {
                    let s = built.stats();
                    log::debug!(
                        "cache: page {} -> slot {}: {} unique, {} reused, {} loaded, {} B",
                        page,
                        slot,
                        s.unique_chars,
                        s.reused_from_cache,
                        s.loaded_from_file,
                        built.total_size()
                    );
                }
                self.slots[slot] = built;
                self.slot_pages[slot] = Some(page);
                true
            }
            Err(e) => {
                // render path falls back to file reads for this page
                log::warn!("cache: page {} build failed: {}", page, e);
                false
            }
        }
    }

    fn recycle_slot(&mut self, slot: usize) {
        let source = &self.slots[slot];
        let common = &self.common;
        match self.pool.absorb(source, |cp| common.has_char(cp as u32)) {
            Ok(n) if n > 0 && self.log_enabled => {
                log::debug!("cache: recycled {} glyphs from slot {}", n, slot);
            }
            Ok(_) => {}
            Err(e) => log::warn!("cache: recycle failed: {}", e),
        }
    }

    fn window_bytes(&self) -> usize {
        self.slots.iter().map(|s| s.total_size()).sum()
    }

    // ---- lookups ----

    fn slot_for_offset(offset: i32) -> Option<usize> {
        if !(-2..=2).contains(&offset) {
            return None;
        }
        Some((CENTER_SLOT as i32 + offset) as usize)
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.store(counter.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
    }

    fn window_glyph(&self, unicode: u32, page_offset: i32) -> Option<(GlyphEntry, &[u8])> {
        let slot = Self::slot_for_offset(page_offset)?;
        let found = self.slots[slot].glyph(unicode);
        self.record(found.is_some());
        found
    }

    pub fn has_char(&self, unicode: u32, page_offset: i32) -> bool {
        self.window_glyph(unicode, page_offset).is_some()
    }

    pub fn glyph_info(&self, unicode: u32, page_offset: i32) -> Option<GlyphEntry> {
        self.window_glyph(unicode, page_offset).map(|(e, _)| e)
    }

    pub fn bitmap(&self, unicode: u32, page_offset: i32) -> Option<&[u8]> {
        self.window_glyph(unicode, page_offset).map(|(_, b)| b)
    }

    // every window slot, then the auxiliary caches
    pub fn glyph_any(&self, unicode: u32) -> Option<(GlyphEntry, &[u8])> {
        let found = self.find_resident(unicode);
        self.record(found.is_some());
        found
    }

    pub fn bitmap_any(&self, unicode: u32) -> Option<&[u8]> {
        self.glyph_any(unicode).map(|(_, b)| b)
    }

    fn find_resident(&self, unicode: u32) -> Option<(GlyphEntry, &[u8])> {
        SEARCH_ORDER
            .iter()
            .find_map(|&slot| self.slots[slot].glyph(unicode))
            .or_else(|| self.common.glyph(unicode))
            .or_else(|| self.bookname.glyph(unicode))
            .or_else(|| self.toc.glyph(unicode))
            .or_else(|| self.pool.glyph(unicode))
    }

    // ---- observability ----

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    // slot at offset holds a built cache for the page it should hold
    pub fn is_cache_valid(&self, page_offset: i32) -> bool {
        Self::slot_for_offset(page_offset).is_some_and(|s| self.is_slot_current(s))
    }

    pub fn slot_page(&self, page_offset: i32) -> Option<usize> {
        self.slot_pages[Self::slot_for_offset(page_offset)?]
    }

    pub fn slot(&self, page_offset: i32) -> Option<&GlyphCachePage> {
        Some(&self.slots[Self::slot_for_offset(page_offset)?])
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn log_stats(&self) {
        let s = self.stats();
        log::info!(
            "cache: page {} hits {} misses {} ({}%), window {} B, common {} B, names {} B, toc {} B, pool {} glyphs / {} B",
            self.current_page,
            s.hits,
            s.misses,
            s.hit_rate_pct(),
            self.window_bytes(),
            self.common.total_size(),
            self.bookname.total_size(),
            self.toc.total_size(),
            self.pool.len(),
            self.pool.total_size()
        );
    }

    pub fn set_log_enabled(&mut self, enabled: bool) {
        self.log_enabled = enabled;
    }

    // ---- auxiliary caches ----

    pub fn build_common_cache<F>(&mut self, font: &mut FontFile<F>, chars: &str) -> bool
    where
        F: Read + Seek,
    {
        match GlyphCachePage::build(chars.as_bytes(), &NoDonor, font) {
            Ok(page) => {
                log::info!(
                    "cache: common {} glyphs, {} B",
                    page.char_count(),
                    page.total_size()
                );
                self.common = page;
                true
            }
            Err(e) => {
                log::warn!("cache: common build failed: {}", e);
                false
            }
        }
    }

    pub fn common_cache(&self) -> &GlyphCachePage {
        &self.common
    }

    pub fn clear_common_cache(&mut self) {
        self.common.clear();
    }

    pub fn set_bookname_cap(&mut self, cap: usize) {
        self.bookname_cap = cap;
    }

    // merge the characters of `names` into the book-name cache until it
    // holds bookname_cap codepoints; returns codepoints added
    pub fn add_book_names<F>(&mut self, font: &mut FontFile<F>, names: &[&str]) -> usize
    where
        F: Read + Seek,
    {
        let mut chars: Vec<u16> = self.bookname.entries().map(|e| e.unicode).collect();
        let before = chars.len();

        for name in names {
            let Ok((cps, _)) = page::unique_codepoints(name.as_bytes()) else {
                break;
            };
            for cp in cps {
                if chars.len() >= self.bookname_cap {
                    break;
                }
                if let Err(at) = chars.binary_search(&cp) {
                    if chars.try_reserve(1).is_err() {
                        log::warn!("cache: OOM adding book names");
                        break;
                    }
                    chars.insert(at, cp);
                }
            }
        }
        if chars.len() == before {
            return 0;
        }

        // existing glyphs come from the old arena, new ones from the font
        match GlyphCachePage::build_chars(&chars, &self.bookname, font) {
            Ok(page) => {
                let added = page.char_count().saturating_sub(before);
                self.bookname = page;
                added
            }
            Err(e) => {
                log::warn!("cache: book names build failed: {}", e);
                0
            }
        }
    }

    pub fn bookname_cache(&self) -> &GlyphCachePage {
        &self.bookname
    }

    pub fn clear_book_names(&mut self) {
        self.bookname.clear();
    }

    pub fn build_toc_cache<F>(&mut self, font: &mut FontFile<F>, toc_text: &str) -> bool
    where
        F: Read + Seek,
    {
        let mut chars = match page::unique_codepoints(toc_text.as_bytes()) {
            Ok((chars, _)) => chars,
            Err(e) => {
                log::warn!("cache: toc build failed: {}", e);
                return false;
            }
        };
        // lookups reach the common cache first
        chars.retain(|&cp| !self.common.has_char(cp as u32));
        match GlyphCachePage::build_chars(&chars, &NoDonor, font) {
            Ok(page) => {
                self.toc = page;
                true
            }
            Err(e) => {
                log::warn!("cache: toc build failed: {}", e);
                false
            }
        }
    }

    pub fn toc_cache(&self) -> &GlyphCachePage {
        &self.toc
    }

    pub fn clear_toc_cache(&mut self) {
        self.toc.clear();
    }

    pub fn init_recycle_pool(&mut self, cap: usize) {
        self.pool.reset(cap);
    }

    pub fn clear_recycle_pool(&mut self) {
        self.pool.clear();
    }

    pub fn recycle_pool(&self) -> &RecyclePool {
        &self.pool
    }

    // offer an externally owned page's glyphs to the pool
    pub fn recycle_into_pool(&mut self, page: &GlyphCachePage) -> usize {
        let common = &self.common;
        self.pool
            .absorb(page, |cp| common.has_char(cp as u32))
            .unwrap_or_else(|e| {
                log::warn!("cache: recycle failed: {}", e);
                0
            })
    }
}

impl GlyphDonor for GlyphCacheManager {
    fn donate(&self, unicode: u16) -> Option<(GlyphEntry, &[u8])> {
        self.find_resident(unicode as u32)
    }
}
