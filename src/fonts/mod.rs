// Glyph-bitmap fonts (.bin on SD or flash)
//
// format:  header + sorted 20-byte index, on-disk binary search
// decoder: 1-bit / legacy Huffman / 2-bit bitstreams to RGB565
// color:   pixel class to colour under dark mode and transparency
// resolve: metrics trait for layout, cache-first glyph rendering

pub mod color;
pub mod decoder;
pub mod format;
pub mod resolve;

pub use color::{PixelClass, RenderOptions};
pub use format::{FontFile, FontFormat, FontHeader, GlyphEntry};
pub use resolve::{GlyphMetrics, GlyphResolver, MISSING_GLYPH, RenderedGlyph};
