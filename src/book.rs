// Open book: the text file, its page index and the reading position
//
// The handle owns the book file and borrows a glyph metrics source per
// call. Paging goes through text::page, so a page reached by turning and
// a page opened from the index are laid out by the same code. The index
// is grown in steps by a background task; the stop flag lets another
// context end a step between pages (the SD bus may be handed to USB mass
// storage, or the user opened another book).

use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_io::{Read, Seek};

use crate::cache::PageSource;
use crate::fonts::GlyphMetrics;
use crate::storage;
use crate::text::encoding::{GbkTable, NoGbkTable, TextEncoding};
use crate::text::index::{self, BuildIndexResult, IndexControl};
use crate::text::line::LineBreaker;
use crate::text::page::{self, PageLayout, TextFile, TextPageResult};

/// Cancellation signal for index builds; set from any context.
pub struct StopFlag(AtomicBool);

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl StopFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    #[inline]
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl IndexControl for StopFlag {
    fn should_stop(&self) -> bool {
        self.is_requested()
    }
}

// the handle's own flag or'ed with a caller's control (which also yields)
struct Checkpoint<'c, C: ?Sized> {
    stop: &'c StopFlag,
    outer: &'c C,
}

impl<C: IndexControl + ?Sized> IndexControl for Checkpoint<'_, C> {
    fn should_stop(&self) -> bool {
        self.stop.is_requested() || self.outer.should_stop()
    }

    fn yield_now(&self) {
        self.outer.yield_now();
    }
}

/// Reading position, kept across page turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextState {
    pub file_path: String,
    pub file_pos: u32,
    pub page_end_pos: u32,
    pub last_page: String,
    pub encoding: TextEncoding,
    /// Start of the page before `file_pos`, when known.
    pub prev_page_start: Option<u32>,
}

pub struct BookHandle<F> {
    file: F,
    file_len: u32,
    encoding: TextEncoding,
    gbk: &'static dyn GbkTable,
    layout: PageLayout,
    pages: Vec<u32>,
    index_complete: bool,
    state: TextState,
    stop: StopFlag,
    yield_every: usize,
}

fn text_file<'a, F: Read + Seek>(
    file: &'a mut F,
    encoding: TextEncoding,
    gbk: &'a dyn GbkTable,
) -> Result<TextFile<'a, F>, &'static str> {
    Ok(TextFile::new(file, encoding)?.with_gbk_table(gbk))
}

impl<F> BookHandle<F>
where
    F: Read + Seek,
{
    // AutoDetect is resolved once here and kept for the life of the handle
    pub fn open(
        mut file: F,
        path: &str,
        layout: PageLayout,
        encoding: TextEncoding,
    ) -> Result<Self, &'static str> {
        let file_len = storage::file_len(&mut file)?;
        let encoding = TextFile::new(&mut file, encoding)?.encoding();

        let mut file_path = String::new();
        file_path
            .try_reserve_exact(path.len())
            .map_err(|_| "book: OOM for path")?;
        file_path.push_str(path);

        log::info!(
            "book: open {} ({} bytes, {})",
            path,
            file_len,
            encoding.as_str()
        );

        Ok(Self {
            file,
            file_len,
            encoding,
            gbk: &NoGbkTable,
            layout,
            pages: Vec::new(),
            index_complete: false,
            state: TextState {
                file_path,
                encoding,
                ..TextState::default()
            },
            stop: StopFlag::new(),
            yield_every: 8,
        })
    }

    pub fn with_gbk_table(mut self, table: &'static dyn GbkTable) -> Self {
        self.gbk = table;
        self
    }

    pub fn set_yield_every(&mut self, pages: usize) {
        self.yield_every = pages;
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.state.file_path
    }

    #[inline]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    #[inline]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[inline]
    pub fn vertical(&self) -> bool {
        self.layout.vertical
    }

    #[inline]
    pub fn font_size(&self) -> f32 {
        self.layout.font_size
    }

    #[inline]
    pub fn file_len(&self) -> u32 {
        self.file_len
    }

    #[inline]
    pub fn state(&self) -> &TextState {
        &self.state
    }

    // index of the page holding the reading position (0 before any index)
    pub fn current_page_index(&self) -> usize {
        let pos = self.state.file_pos;
        self.pages.partition_point(|&p| p <= pos).saturating_sub(1)
    }

    // pages known so far; final once the index is complete
    #[inline]
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn is_index_complete(&self) -> bool {
        self.index_complete
    }

    #[inline]
    pub fn page_start(&self, page: usize) -> Option<u32> {
        self.pages.get(page).copied()
    }

    #[inline]
    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    #[inline]
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    #[inline]
    pub fn request_stop(&self) {
        self.stop.request();
    }

    // ---- page index ----

    // grow the index by up to max_pages pages (0 = to the end)
    pub fn index_step<M>(&mut self, metrics: &mut M, max_pages: usize) -> BuildIndexResult
    where
        M: GlyphMetrics + ?Sized,
    {
        self.index_step_with(metrics, max_pages, &index::RunToEnd)
    }

    pub fn index_step_with<M, C>(
        &mut self,
        metrics: &mut M,
        max_pages: usize,
        control: &C,
    ) -> BuildIndexResult
    where
        M: GlyphMetrics + ?Sized,
        C: IndexControl + ?Sized,
    {
        if self.index_complete {
            return BuildIndexResult {
                reached_eof: true,
                ..BuildIndexResult::default()
            };
        }

        let resume = self.pages.last().copied().unwrap_or(0);
        // the resume offset comes back as the first entry
        let limit = if max_pages == 0 { 0 } else { max_pages + 1 };
        let check = Checkpoint {
            stop: &self.stop,
            outer: control,
        };

        let result = match text_file(&mut self.file, self.encoding, self.gbk) {
            Ok(mut tf) => index::build_book_page_index(
                &mut tf,
                metrics,
                &self.layout,
                limit,
                resume,
                &check,
                self.yield_every,
            ),
            Err(e) => {
                log::warn!("book: index step failed: {}", e);
                return BuildIndexResult::default();
            }
        };

        let fresh = if self.pages.is_empty() {
            &result.pages[..]
        } else {
            result.pages.get(1..).unwrap_or(&[])
        };
        if self.pages.try_reserve(fresh.len()).is_err() {
            log::warn!("book: OOM growing index");
            return result;
        }
        self.pages.extend_from_slice(fresh);
        if result.reached_eof {
            self.index_complete = true;
            log::info!("book: index complete, {} pages", self.pages.len());
        }
        result
    }

    pub fn encode_index(&self, font_height: u8) -> Result<Vec<u8>, &'static str> {
        index::encode_page_index(
            &self.pages,
            self.file_len,
            self.layout.fingerprint(font_height),
            self.index_complete,
        )
    }

    // adopt a persisted index; a stale one leaves the handle unindexed
    pub fn load_index(&mut self, data: &[u8], font_height: u8) -> Result<(), &'static str> {
        let fp = self.layout.fingerprint(font_height);
        match index::parse_page_index(data, self.file_len, fp) {
            Ok(idx) => {
                log::info!(
                    "book: loaded index, {} pages (complete={})",
                    idx.pages.len(),
                    idx.complete
                );
                self.pages = idx.pages;
                self.index_complete = idx.complete;
                Ok(())
            }
            Err(e) => {
                self.pages.clear();
                self.index_complete = false;
                Err(e)
            }
        }
    }

    // ---- paging ----

    pub fn read_page_at<M>(&mut self, metrics: &mut M, offset: u32) -> TextPageResult
    where
        M: GlyphMetrics + ?Sized,
    {
        let prev = if offset == self.state.page_end_pos && offset > self.state.file_pos {
            Some(self.state.file_pos)
        } else {
            self.index_prev(offset)
        };
        let r = self.read(metrics, offset, false);
        if r.success {
            self.state.prev_page_start = prev;
        }
        r
    }

    pub fn next_page<M>(&mut self, metrics: &mut M) -> TextPageResult
    where
        M: GlyphMetrics + ?Sized,
    {
        let end = self.state.page_end_pos;
        if end >= self.file_len || end <= self.state.file_pos {
            return TextPageResult::failed(self.state.file_pos);
        }
        self.read_page_at(metrics, end)
    }

    pub fn prev_page<M>(&mut self, metrics: &mut M) -> TextPageResult
    where
        M: GlyphMetrics + ?Sized,
    {
        let here = self.state.file_pos;
        if here == 0 {
            return TextPageResult::failed(0);
        }

        // a known previous start is only trusted if its page ends here
        if let Some(p) = self.state.prev_page_start.filter(|&p| p < here) {
            let saved = self.state.clone();
            let r = self.read(metrics, p, false);
            if r.success && r.page_end_pos == here {
                self.state.prev_page_start = self.index_prev(p);
                return r;
            }
            log::debug!("book: cached prev start {} stale", p);
            self.state = saved;
        }

        let r = self.read(metrics, here, true);
        if r.success {
            self.state.prev_page_start = self.index_prev(r.file_pos);
        }
        r
    }

    pub fn jump_to_page<M>(&mut self, metrics: &mut M, page: usize) -> TextPageResult
    where
        M: GlyphMetrics + ?Sized,
    {
        match self.page_start(page) {
            Some(offset) => self.read_page_at(metrics, offset),
            None => {
                log::warn!("book: page {} not indexed ({} known)", page, self.pages.len());
                TextPageResult::failed(self.state.file_pos)
            }
        }
    }

    // hand the file back; an index step can't be running on a handle we own
    pub fn close(self) -> F {
        log::info!("book: close {}", self.state.file_path);
        self.file
    }

    fn index_prev(&self, offset: u32) -> Option<u32> {
        match self.pages.binary_search(&offset) {
            Ok(i) if i > 0 => Some(self.pages[i - 1]),
            _ => None,
        }
    }

    fn read<M>(&mut self, metrics: &mut M, offset: u32, backward: bool) -> TextPageResult
    where
        M: GlyphMetrics + ?Sized,
    {
        let r = match text_file(&mut self.file, self.encoding, self.gbk) {
            Ok(mut tf) => page::read_text_page(&mut tf, metrics, &self.layout, offset, backward, None),
            Err(e) => {
                log::warn!("book: {}", e);
                return TextPageResult::failed(offset);
            }
        };
        if r.success {
            self.state.file_pos = r.file_pos;
            self.state.page_end_pos = r.page_end_pos;
            self.state.last_page.clear();
            if self.state.last_page.try_reserve(r.page_text.len()).is_ok() {
                self.state.last_page.push_str(&r.page_text);
            }
        }
        r
    }
}

impl<F> PageSource for BookHandle<F>
where
    F: Read + Seek,
{
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&mut self, page: usize, metrics: &mut dyn GlyphMetrics) -> Option<Vec<u8>> {
        let start = self.page_start(page)?;
        let next = self.page_start(page + 1);
        let mut tf = text_file(&mut self.file, self.encoding, self.gbk).ok()?;
        let end = match next {
            Some(end) => end,
            None if self.index_complete => self.file_len,
            // last known page while the index grows: lay it out like the index would
            None => {
                let mut breaker = LineBreaker::new(metrics, self.layout.spacing);
                match page::page_end_from(&mut tf, &mut breaker, &self.layout, start) {
                    Ok(end) => end,
                    Err(e) => {
                        log::warn!("book: page {} end: {}", page, e);
                        return None;
                    }
                }
            }
        };
        match page::read_page_bytes(&mut tf, start, end) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("book: page {} text: {}", page, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::GlyphEntry;
    use crate::storage::MemFile;
    use crate::text::line::CharSpacing;

    struct Fixed;

    impl GlyphMetrics for Fixed {
        fn glyph(&mut self, unicode: u32) -> Option<GlyphEntry> {
            Some(GlyphEntry {
                unicode: unicode as u16,
                advance: 8,
                width: 8,
                height: 16,
                bitmap_size: 1,
                ..GlyphEntry::default()
            })
        }

        fn font_size(&self) -> u8 {
            16
        }
    }

    // 10 chars x 4 lines = 40 bytes of ASCII per page
    fn layout() -> PageLayout {
        PageLayout {
            area_width: 80,
            area_height: 80,
            font_size: 16.0,
            line_spacing: 4,
            max_lines: 0,
            vertical: false,
            spacing: CharSpacing {
                horizontal: 0,
                vertical: 0,
            },
        }
    }

    fn book(body: &str) -> BookHandle<MemFile<'_>> {
        BookHandle::open(MemFile::new(body.as_bytes()), "/BOOKS/T.TXT", layout(), TextEncoding::AutoDetect)
            .unwrap()
    }

    #[test]
    fn stop_flag_round_trip() {
        let f = StopFlag::new();
        assert!(!f.should_stop());
        f.request();
        assert!(f.is_requested() && f.should_stop());
        f.clear();
        assert!(!f.is_requested());
    }

    #[test]
    fn index_steps_resume_without_duplicates() {
        let body = "0123456789".repeat(40);
        let mut b = book(&body);

        let r = b.index_step(&mut Fixed, 3);
        assert!(!r.reached_eof);
        assert_eq!(b.pages(), &[0, 40, 80, 120]);

        b.index_step(&mut Fixed, 0);
        assert!(b.is_index_complete());
        assert_eq!(b.total_pages(), 10);
        assert_eq!(b.page_start(9), Some(360));
        let mut sorted = b.pages().to_vec();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
    }

    #[test]
    fn stop_request_cancels_step() {
        let body = "0123456789".repeat(40);
        let mut b = book(&body);
        b.request_stop();
        let r = b.index_step(&mut Fixed, 0);
        assert!(r.cancelled);
        assert_eq!(b.total_pages(), 1);
        assert!(!b.is_index_complete());
    }

    #[test]
    fn next_prev_and_jump() {
        let body = "0123456789".repeat(40);
        let mut b = book(&body);
        b.index_step(&mut Fixed, 0);

        let p0 = b.read_page_at(&mut Fixed, 0);
        assert!(p0.success);
        let p1 = b.next_page(&mut Fixed);
        assert_eq!(p1.file_pos, 40);
        assert_eq!(b.state().prev_page_start, Some(0));
        assert_eq!(b.current_page_index(), 1);

        let back = b.prev_page(&mut Fixed);
        assert_eq!((back.file_pos, back.page_end_pos), (0, 40));
        assert_eq!(back.page_text, p0.page_text);

        let j = b.jump_to_page(&mut Fixed, 7);
        assert_eq!(j.file_pos, 280);
        assert_eq!(b.state().prev_page_start, Some(240));
        assert_eq!(b.state().last_page, j.page_text);
        assert!(!b.jump_to_page(&mut Fixed, 10).success);
    }

    #[test]
    fn index_persists_with_layout() {
        let body = "0123456789".repeat(40);
        let mut b = book(&body);
        b.index_step(&mut Fixed, 0);
        let data = b.encode_index(16).unwrap();

        let mut fresh = book(&body);
        fresh.load_index(&data, 16).unwrap();
        assert_eq!(fresh.pages(), b.pages());
        assert!(fresh.is_index_complete());

        let mut other = book(&body);
        assert_eq!(other.load_index(&data, 24), Err("index: layout changed"));
        assert_eq!(other.total_pages(), 0);
    }

    #[test]
    fn page_source_serves_index_ranges() {
        let body = "0123456789".repeat(9);
        let mut b = book(&body);
        b.index_step(&mut Fixed, 0);
        assert_eq!(b.page_count(), 3);
        assert_eq!(b.page_text(2, &mut Fixed).unwrap(), b"0123456789");
        assert!(b.page_text(3, &mut Fixed).is_none());
    }

    #[test]
    fn close_hands_back_the_file() {
        let body = "0123456789".repeat(4);
        let b = book(&body);
        let mut file = b.close();
        assert_eq!(storage::file_len(&mut file).unwrap(), 40);
    }

    #[test]
    fn last_known_page_is_one_page_while_indexing() {
        let body = "0123456789".repeat(40);
        let mut b = book(&body);
        b.index_step(&mut Fixed, 2);
        assert_eq!(b.pages(), &[0, 40, 80]);
        assert!(!b.is_index_complete());

        let text = b.page_text(2, &mut Fixed).unwrap();
        assert_eq!(text.len(), 40);
        assert_eq!(&text[..], &body.as_bytes()[80..120]);
    }
}
