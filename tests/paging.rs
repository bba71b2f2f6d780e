mod common;

use common::{mono_font, three_glyph_font};
use pulp_text::book::BookHandle;
use pulp_text::fonts::FontFile;
use pulp_text::text::{
    CharSpacing, GbkTable, LineBreaker, PageLayout, RunToEnd, TextEncoding, TextFile,
    build_book_page_index, calculate_page_breaks, read_text_page,
};
use pulp_text::storage::MemFile;

const NO_SPACING: CharSpacing = CharSpacing {
    horizontal: 0,
    vertical: 0,
};

// 10 glyphs of advance 8 per line, 4 lines per page
fn layout() -> PageLayout {
    PageLayout {
        area_width: 80,
        area_height: 80,
        font_size: 16.0,
        line_spacing: 4,
        max_lines: 0,
        vertical: false,
        spacing: NO_SPACING,
    }
}

const LETTERS: &str = "abcdefghijklmnopqrstuvwxyz .,-";

fn prose(paragraphs: usize) -> String {
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "a", "lazy", "dog,", "again"];
    let mut out = String::new();
    for p in 0..paragraphs {
        for w in 0..(7 + p % 5) {
            out.push_str(words[(p * 3 + w) % words.len()]);
            out.push(' ');
        }
        out.push_str("end.\n");
    }
    out
}

#[test]
fn break_lands_after_space_not_inside_cjk() {
    let data = three_glyph_font();
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let mut lb = LineBreaker::new(&mut font, NO_SPACING);
    // A = 10, B missing = 8, space blank = 8
    let text = "AB \u{4e2d}".as_bytes();
    assert_eq!(lb.calculate_text_width(text, 0, 3, false, 1.0), 26);
    assert_eq!(lb.find_break_position(text, 0, 26, false, 1.0), 3);
    // one pixel more is still not enough for the 16px CJK glyph
    assert_eq!(lb.find_break_position(text, 0, 41, false, 1.0), 3);
    assert_eq!(lb.find_break_position(text, 0, 42, false, 1.0), 6);
}

#[test]
fn carriage_return_takes_half_a_font_size() {
    let data = mono_font(LETTERS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let mut lb = LineBreaker::new(&mut font, NO_SPACING);
    let text = b"abcdefghi\r\njk";
    assert_eq!(lb.calculate_text_width(text, 0, 11, false, 1.0), 9 * 8 + 8);
    // nine letters and the '\r' fill 80 exactly; the newline ends the line
    assert_eq!(lb.find_break_position(text, 0, 80, false, 1.0), 11);
    // one pixel short pushes the '\r' to the next line
    assert_eq!(lb.find_break_position(text, 0, 79, false, 1.0), 9);
}

#[test]
fn lines_never_exceed_width_by_more_than_a_glyph() {
    let data = mono_font(LETTERS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let mut lb = LineBreaker::new(&mut font, CharSpacing::DEFAULT);
    let text = prose(12);
    let bytes = text.as_bytes();
    for max in [9, 40, 77, 160] {
        let mut start = 0;
        while start < bytes.len() {
            let brk = lb.find_break_position(bytes, start, max, false, 1.0);
            let brk = if brk == start { start + 1 } else { brk };
            let w = lb.calculate_text_width(bytes, start, brk, false, 1.0);
            assert!(w <= max + 9, "line {}..{} is {} wide for {}", start, brk, w, max);
            start = brk;
        }
    }
}

#[test]
fn backward_from_page_end_returns_same_page() {
    let data = mono_font(LETTERS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let text = prose(30);
    let mut file = MemFile::new(text.as_bytes());
    let mut tf = TextFile::new(&mut file, TextEncoding::Utf8).unwrap();

    let mut pos = 0;
    let mut checked = 0;
    while pos < tf.len() {
        let fwd = read_text_page(&mut tf, &mut font, &layout(), pos, false, None);
        assert!(fwd.success);
        // every line start reached from 0 is on the paragraph line grid;
        // the short last page is the one exception
        if fwd.line_ends.len() == layout().lines_per_page() {
            let back = read_text_page(&mut tf, &mut font, &layout(), fwd.page_end_pos, true, None);
            assert!(back.success);
            assert_eq!(back.page_end_pos, fwd.page_end_pos);
            assert_eq!(back.file_pos, fwd.file_pos);
            assert_eq!(back.page_text, fwd.page_text);
            checked += 1;
        }
        pos = fwd.page_end_pos;
    }
    assert!(checked > 0);
}

#[test]
fn resumed_index_matches_unbroken_build() {
    let data = mono_font(LETTERS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let text = prose(60);
    let mut file = MemFile::new(text.as_bytes());
    let mut tf = TextFile::new(&mut file, TextEncoding::Utf8).unwrap();

    let n = 6;
    let full = build_book_page_index(&mut tf, &mut font, &layout(), 2 * n, 0, &RunToEnd, 0);
    assert_eq!(full.pages.len(), 2 * n);
    let first = build_book_page_index(&mut tf, &mut font, &layout(), n, 0, &RunToEnd, 0);
    assert_eq!(first.pages[..], full.pages[..n]);

    let resumed = build_book_page_index(&mut tf, &mut font, &layout(), n + 1, first.pages[n - 1], &RunToEnd, 0);
    assert_eq!(resumed.pages[0], first.pages[n - 1]);
    assert_eq!(resumed.pages[1..], full.pages[n..]);
}

#[test]
fn index_matches_sequential_paging() {
    let data = mono_font(LETTERS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let text = prose(25);
    let mut book = BookHandle::open(MemFile::new(text.as_bytes()), "/B.TXT", layout(), TextEncoding::AutoDetect)
        .unwrap();
    book.index_step(&mut font, 0);
    assert!(book.is_index_complete());

    let pages = book.pages().to_vec();
    let first = book.read_page_at(&mut font, 0);
    assert!(first.success);
    for (i, &start) in pages.iter().enumerate().skip(1) {
        let r = book.next_page(&mut font);
        assert_eq!(r.file_pos, start, "page {}", i);
        assert_eq!(book.current_page_index(), i);
    }
    assert!(!book.next_page(&mut font).success);
}

// columns 128 tall, 3 across: 8 upright CJK glyphs or 16 rotated ones each
fn vertical_layout() -> PageLayout {
    PageLayout {
        area_width: 60,
        area_height: 128,
        vertical: true,
        ..layout()
    }
}

const COLUMN_CHARS: &str = "\u{4e2d}\u{6587}\u{ff1a}";

fn column_prose(paragraphs: usize) -> String {
    let cycle: Vec<char> = COLUMN_CHARS.chars().collect();
    let mut out = String::new();
    for p in 0..paragraphs {
        for i in 0..(3 + (p * 7) % 17) {
            out.push(cycle[(p + i) % cycle.len()]);
        }
        out.push('\n');
    }
    out
}

#[test]
fn vertical_columns_follow_area_height() {
    let data = mono_font(COLUMN_CHARS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let text = "\u{4e2d}\u{6587}".repeat(20);

    {
        let mut lb = LineBreaker::new(&mut font, NO_SPACING);
        let r = calculate_page_breaks(&mut lb, text.as_bytes(), 0, &vertical_layout());
        assert!(r.success);
        assert_eq!(r.line_breaks, vec![24, 48, 72]);
        assert_eq!(r.page_end, 72);

        // rotated colons lie on their 8px width
        let colons = "\u{ff1a}".repeat(20);
        assert_eq!(lb.find_break_position(colons.as_bytes(), 0, 128, true, 1.0), 48);
        let mixed = "\u{4e2d}".repeat(4) + &colons;
        assert_eq!(lb.find_break_position(mixed.as_bytes(), 0, 128, true, 1.0), 36);
    }

    let mut file = MemFile::new(text.as_bytes());
    let mut tf = TextFile::new(&mut file, TextEncoding::Utf8).unwrap();
    let p = read_text_page(&mut tf, &mut font, &vertical_layout(), 0, false, None);
    assert!(p.success);
    assert_eq!((p.file_pos, p.page_end_pos), (0, 72));
    assert_eq!(p.line_ends, vec![24, 48, 72]);
    assert_eq!(p.page_text.chars().count(), 24);
}

#[test]
fn vertical_backward_paging_and_index_agree() {
    let data = mono_font(COLUMN_CHARS);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();
    let text = column_prose(40);
    let mut file = MemFile::new(text.as_bytes());
    let mut tf = TextFile::new(&mut file, TextEncoding::Utf8).unwrap();
    let layout = vertical_layout();

    let mut starts = Vec::new();
    let mut checked = 0;
    let mut pos = 0;
    while pos < tf.len() {
        starts.push(pos);
        let fwd = read_text_page(&mut tf, &mut font, &layout, pos, false, None);
        assert!(fwd.success);
        if fwd.line_ends.len() == layout.lines_per_page() {
            let back = read_text_page(&mut tf, &mut font, &layout, fwd.page_end_pos, true, None);
            assert_eq!((back.file_pos, back.page_end_pos), (fwd.file_pos, fwd.page_end_pos));
            assert_eq!(back.page_text, fwd.page_text);
            checked += 1;
        }
        pos = fwd.page_end_pos;
    }
    assert!(checked > 0);

    let index = build_book_page_index(&mut tf, &mut font, &layout, 0, 0, &RunToEnd, 0);
    assert!(index.reached_eof);
    assert_eq!(index.pages, starts);
}

struct TwoChars;

impl GbkTable for TwoChars {
    fn to_unicode(&self, code: u16) -> Option<u16> {
        match code {
            0xD6D0 => Some(0x4E2D), // zhong
            0xCEC4 => Some(0x6587), // wen
            _ => None,
        }
    }
}

static GBK: TwoChars = TwoChars;

#[test]
fn gbk_book_pages_in_raw_offsets() {
    let chars: String = ['\u{4e2d}', '\u{6587}'].iter().collect();
    let data = mono_font(&chars);
    let mut font = FontFile::open(MemFile::new(&data), false).unwrap();

    // 25 double-byte chars; 10 per line at advance 8
    let raw: Vec<u8> = [0xD6, 0xD0, 0xCE, 0xC4].repeat(12).into_iter().chain([0xD6, 0xD0]).collect();
    let layout = PageLayout {
        max_lines: 1,
        ..layout()
    };
    let mut book = BookHandle::open(MemFile::new(&raw), "/G.TXT", layout, TextEncoding::AutoDetect)
        .unwrap()
        .with_gbk_table(&GBK);
    assert_eq!(book.encoding(), TextEncoding::Gbk);

    let p = book.read_page_at(&mut font, 0);
    assert!(p.success);
    assert_eq!(p.page_end_pos, 20);
    assert_eq!(p.page_text.chars().count(), 10);
    assert!(p.page_text.starts_with("\u{4e2d}\u{6587}"));

    book.index_step(&mut font, 0);
    assert_eq!(book.pages(), &[0, 20, 40]);
}
