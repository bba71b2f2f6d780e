// Book text layout
//
// utf8:     byte-level UTF-8 walking, tolerant of cut and corrupt input
// encoding: UTF-8 / GBK books, GBK -> UTF-8 through an injected table
// line:     line breaking against glyph metrics
// page:     page layout, forward and backward page reads
// index:    page-start index build (cancellable) and its file format

pub mod encoding;
pub mod index;
pub mod line;
pub mod page;
pub mod utf8;

pub use encoding::{GbkTable, NoGbkTable, TextEncoding, detect_text_encoding};
pub use index::{
    BuildIndexResult, IndexControl, PageIndex, RunToEnd, build_book_page_index, encode_page_index,
    parse_page_index,
};
pub use line::{CharSpacing, LineBreaker};
pub use page::{PageBreakResult, PageLayout, TextFile, TextPageResult, calculate_page_breaks, read_text_page};
