// Always-resident glyph sets
//
// Common: printable ASCII, CJK punctuation and the reader's own UI
// words, loaded once per font.
// Book names: titles shown on the library screen, capped so a large
// library can't grow it without bound.

/// Max codepoints kept in the book-name cache.
pub const BOOKNAME_CAP: usize = 300;

pub const COMMON_CHARS: &str = concat!(
    " !\"#$%&'()*+,-./0123456789:;<=>?@",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`",
    "abcdefghijklmnopqrstuvwxyz{|}~",
    "\u{3000}\u{3001}\u{3002}\u{300A}\u{300B}\u{300C}\u{300D}\u{300E}\u{300F}",
    "\u{3010}\u{3011}\u{2018}\u{2019}\u{201C}\u{201D}\u{2026}\u{2014}\u{00B7}",
    "\u{FF01}\u{FF08}\u{FF09}\u{FF0C}\u{FF1A}\u{FF1B}\u{FF1F}",
    "\u{25A1}",
    // menu / status words
    "第章节页目录书签设置返回确定取消上下一字体大小夜间模式横竖排",
    "阅读进度电量时间加载中无文件打开关闭",
);
