// Text core for the pulp-os reader (ESP32 + e-paper, books and fonts on SD)
//
// fonts:    glyph-bitmap font file, bitmap decoder, colour mapping
// cache:    page-windowed glyph cache arenas + auxiliary caches
// text:     UTF-8 line breaking, pagination, page index
// book:     open book handle (file, page index, page state, stop flag)
// storage:  Read + Seek helpers, flash-resident in-memory files
// settings: persistent reader settings (key=value text)

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod book;
pub mod cache;
pub mod fonts;
pub mod settings;
pub mod storage;
pub mod text;
