mod common;

use common::mono_font;
use pulp_text::book::BookHandle;
use pulp_text::cache::{COMMON_CHARS, GlyphCacheManager, PageSource, WINDOW_SLOTS};
use pulp_text::fonts::FontFile;
use pulp_text::storage::MemFile;
use pulp_text::text::{CharSpacing, PageLayout, TextEncoding};

// one 40-byte page per letter: 10 chars x 4 lines
const PAGE_CHARS: &str = "abcdefghij";

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

fn ten_page_book() -> String {
    PAGE_CHARS
        .chars()
        .map(|c| c.to_string().repeat(40))
        .collect()
}

fn letter(page: usize) -> u32 {
    PAGE_CHARS.as_bytes()[page] as u32
}

fn assert_window(cache: &GlyphCacheManager, center: usize) {
    assert_eq!(cache.current_page(), center);
    for offset in -2i32..=2 {
        let page = center as i32 + offset;
        if (0..10).contains(&page) {
            assert_eq!(cache.slot_page(offset), Some(page as usize));
            assert!(cache.is_cache_valid(offset));
            assert!(cache.has_char(letter(page as usize), offset));
        } else {
            assert_eq!(cache.slot_page(offset), None);
        }
    }
}

#[test]
fn scroll_forward_recycles_leaving_page() {
    let font_data = mono_font(PAGE_CHARS);
    let mut font = FontFile::open(MemFile::new(&font_data), false).unwrap();
    let text = ten_page_book();
    let mut book = BookHandle::open(MemFile::new(text.as_bytes()), "/TEN.TXT", layout(), TextEncoding::Utf8)
        .unwrap();
    book.index_step(&mut font, 0);
    assert_eq!(book.page_count(), 10);

    let mut cache = GlyphCacheManager::new();
    assert!(cache.initialize(&mut book, &mut font, 5));
    assert!(cache.is_initialized());
    assert_window(&cache, 5);
    assert!(cache.recycle_pool().is_empty());

    assert!(cache.scroll_update(&mut book, &mut font, 6, true));
    assert_window(&cache, 6);
    // page 3 left the window; its glyph survives in the pool
    assert!(cache.recycle_pool().has_char(letter(3)));
    assert!(cache.glyph_any(letter(3)).is_some());
    assert!(!cache.is_initialization_locked());
}

#[test]
fn window_tracks_single_steps_both_ways() {
    let font_data = mono_font(PAGE_CHARS);
    let mut font = FontFile::open(MemFile::new(&font_data), false).unwrap();
    let text = ten_page_book();
    let mut book = BookHandle::open(MemFile::new(text.as_bytes()), "/TEN.TXT", layout(), TextEncoding::Utf8)
        .unwrap();
    book.index_step(&mut font, 0);

    let mut cache = GlyphCacheManager::new();
    cache.initialize(&mut book, &mut font, 0);
    assert_window(&cache, 0);

    let mut page = 0;
    for forward in [true, true, true, true, false, true, false, false, false, false] {
        page = if forward { page + 1 } else { page - 1 };
        assert!(cache.scroll_update(&mut book, &mut font, page, forward));
        assert_window(&cache, page);
    }

    // a jump rebuilds the whole window
    assert!(cache.scroll_update(&mut book, &mut font, 8, true));
    assert_window(&cache, 8);
}

#[test]
fn prefetch_fills_missing_neighbours() {
    let font_data = mono_font(PAGE_CHARS);
    let mut font = FontFile::open(MemFile::new(&font_data), false).unwrap();
    let text = ten_page_book();
    let mut book = BookHandle::open(MemFile::new(text.as_bytes()), "/TEN.TXT", layout(), TextEncoding::Utf8)
        .unwrap();

    // only the first three pages indexed when the window is built
    book.index_step(&mut font, 2);
    assert_eq!(book.page_count(), 3);
    let mut cache = GlyphCacheManager::new();
    cache.initialize(&mut book, &mut font, 2);
    assert_eq!(cache.slot_page(1), None);

    book.index_step(&mut font, 0);
    assert_eq!(cache.prefetch_around(&mut book, &mut font), 2);
    assert_window(&cache, 2);
    assert_eq!(cache.prefetch_around(&mut book, &mut font), 0);
}

#[test]
fn partial_index_builds_single_page_slots() {
    let font_data = mono_font(PAGE_CHARS);
    let mut font = FontFile::open(MemFile::new(&font_data), false).unwrap();
    let text = ten_page_book();
    let mut book = BookHandle::open(MemFile::new(text.as_bytes()), "/TEN.TXT", layout(), TextEncoding::Utf8)
        .unwrap();

    book.index_step(&mut font, 2);
    assert_eq!(book.pages(), &[0, 40, 80]);
    assert_eq!(book.page_text(2, &mut font).unwrap().len(), 40);

    let mut cache = GlyphCacheManager::new();
    assert!(cache.initialize(&mut book, &mut font, 2));
    // the last known page holds only its own letter, not the rest of the book
    assert!(cache.has_char(letter(2), 0));
    for later in 3..10 {
        assert!(!cache.has_char(letter(later), 0), "page {} leaked into slot", later);
    }
}

#[test]
fn locked_manager_refuses_builds() {
    let font_data = mono_font(PAGE_CHARS);
    let mut font = FontFile::open(MemFile::new(&font_data), false).unwrap();
    let text = ten_page_book();
    let mut book = BookHandle::open(MemFile::new(text.as_bytes()), "/TEN.TXT", layout(), TextEncoding::Utf8)
        .unwrap();
    book.index_step(&mut font, 0);

    let mut cache = GlyphCacheManager::new();
    cache.set_initialization_locked(true);
    assert!(!cache.initialize(&mut book, &mut font, 4));
    assert!(!cache.is_initialized());
    cache.set_initialization_locked(false);
    assert!(cache.initialize(&mut book, &mut font, 4));
}

#[test]
fn auxiliary_caches_outlive_the_window() {
    let font_data = mono_font(PAGE_CHARS);
    let mut font = FontFile::open(MemFile::new(&font_data), false).unwrap();
    let mut cache = GlyphCacheManager::new();

    assert!(cache.build_toc_cache(&mut font, "chapter j"));
    assert!(cache.toc_cache().has_char('j' as u32));

    assert!(cache.build_common_cache(&mut font, COMMON_CHARS));
    // COMMON_CHARS covers ASCII; only the font's letters resolve
    assert_eq!(cache.common_cache().char_count(), PAGE_CHARS.len());

    assert!(cache.add_book_names(&mut font, &["bad", "cafe"]) > 0);
    assert!(cache.bookname_cache().has_char('f' as u32));

    // every toc char is already common now
    assert!(cache.build_toc_cache(&mut font, "chapter j"));
    assert_eq!(cache.toc_cache().char_count(), 0);
    assert!(cache.common_cache().has_char('j' as u32));

    cache.clear_all();
    assert!(cache.glyph_any('a' as u32).is_some());
    cache.clear_common_cache();
    cache.clear_book_names();
    cache.clear_toc_cache();
    assert!(cache.glyph_any('a' as u32).is_none());

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.hit_rate_pct(), 50);
    assert_eq!(WINDOW_SLOTS, 5);
}
