// Byte-oriented UTF-8 walking
//
// Book text arrives in fixed-size chunks, so a multi-byte sequence may be
// cut at the end of a buffer. decode_at reports that as None (stop, read
// more); a malformed byte in the middle decodes as U+FFFD and advances
// by one so a corrupt file never stalls layout.

pub const REPLACEMENT: u32 = 0xFFFD;

#[inline]
pub const fn sequence_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

#[inline]
const fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

// (codepoint, byte length) at pos; None at end of text or on a sequence
// cut short by the end of the buffer
pub fn decode_at(text: &[u8], pos: usize) -> Option<(u32, usize)> {
    let lead = *text.get(pos)?;
    let len = sequence_len(lead);
    if len == 0 {
        return Some((REPLACEMENT, 1));
    }
    if len == 1 {
        return Some((lead as u32, 1));
    }

    let avail = text.len() - pos;
    let check = len.min(avail);
    for i in 1..check {
        if !is_continuation(text[pos + i]) {
            return Some((REPLACEMENT, 1));
        }
    }
    if avail < len {
        return None;
    }

    let cp = match len {
        2 => ((lead as u32 & 0x1F) << 6) | (text[pos + 1] as u32 & 0x3F),
        3 => {
            ((lead as u32 & 0x0F) << 12)
                | ((text[pos + 1] as u32 & 0x3F) << 6)
                | (text[pos + 2] as u32 & 0x3F)
        }
        _ => {
            ((lead as u32 & 0x07) << 18)
                | ((text[pos + 1] as u32 & 0x3F) << 12)
                | ((text[pos + 2] as u32 & 0x3F) << 6)
                | (text[pos + 3] as u32 & 0x3F)
        }
    };

    // overlong 3/4-byte forms, surrogates, > U+10FFFF
    let bad = match len {
        3 => cp < 0x800 || (0xD800..=0xDFFF).contains(&cp),
        4 => !(0x1_0000..=0x10_FFFF).contains(&cp),
        _ => false,
    };
    if bad {
        return Some((REPLACEMENT, 1));
    }
    Some((cp, len))
}

// length of buf without a trailing incomplete sequence
pub fn complete_prefix_len(buf: &[u8]) -> usize {
    // a sequence is at most 4 bytes, so only the last 3 can start a cut one
    let start = buf.len().saturating_sub(3);
    for i in (start..buf.len()).rev() {
        let b = buf[i];
        if is_continuation(b) {
            continue;
        }
        let len = sequence_len(b);
        if len > 1 && i + len > buf.len() {
            return i;
        }
        break;
    }
    buf.len()
}

// move pos back to the start of the character containing it
pub fn align_to_char_start(text: &[u8], mut pos: usize) -> usize {
    pos = pos.min(text.len());
    let floor = pos.saturating_sub(3);
    while pos > floor && pos < text.len() && is_continuation(text[pos]) {
        pos -= 1;
    }
    pos
}

/// Iterator over (byte offset, codepoint, byte length).
pub struct CharIndices<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> CharIndices<'a> {
    pub const fn new(text: &'a [u8], start: usize) -> Self {
        Self { text, pos: start }
    }
}

impl Iterator for CharIndices<'_> {
    type Item = (usize, u32, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (cp, len) = decode_at(self.text, self.pos)?;
        let at = self.pos;
        self.pos += len;
        Some((at, cp, len))
    }
}
