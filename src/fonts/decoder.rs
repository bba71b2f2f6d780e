// Glyph bitmap decoding: encoded bytes -> RGB565 pixel buffer
//
// All three formats read MSB-first. Output is row-major, exactly
// width * height pixels. A short or corrupt bitstream never reads past
// the bytes handed in: decoding stops and the remaining pixels keep the
// background colour.

use alloc::vec::Vec;

use super::color::{self, PixelClass, RenderOptions};
use super::format::FontFormat;

// MSB-first bit cursor; codes may straddle byte boundaries
struct BitReader<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
        }
    }

    #[inline]
    fn next_bit(&mut self) -> Option<bool> {
        let b = *self.data.get(self.byte)?;
        let v = (b >> (7 - self.bit)) & 1 != 0;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.byte += 1;
        }
        Some(v)
    }

    fn next_bits(&mut self, n: u8) -> Option<u8> {
        let mut v = 0u8;
        for _ in 0..n {
            v = (v << 1) | self.next_bit()? as u8;
        }
        Some(v)
    }
}

#[inline]
pub const fn packed_row_bytes(width: u8) -> usize {
    (width as usize).div_ceil(8)
}

// fills out[..w*h]; returns pixels decoded before the data ran out
pub fn decode_into(
    format: FontFormat,
    raw: &[u8],
    width: u8,
    height: u8,
    opts: RenderOptions,
    out: &mut [u16],
) -> usize {
    let count = width as usize * height as usize;
    let Some(out) = out.get_mut(..count) else {
        return 0;
    };
    out.fill(color::map_pixel(PixelClass::White, format, opts));

    let done = match format {
        FontFormat::OneBit => decode_1bit(raw, width, height, opts, out),
        FontFormat::Huffman => decode_huffman(raw, opts, out),
        FontFormat::TwoBit => decode_2bit(raw, opts, out),
    };

    if done < count {
        log::warn!(
            "glyph: bitstream short ({:?} {}x{}), {} of {} px",
            format,
            width,
            height,
            done,
            count
        );
    }
    done
}

pub fn decode(
    format: FontFormat,
    raw: &[u8],
    width: u8,
    height: u8,
    opts: RenderOptions,
) -> Result<Vec<u16>, &'static str> {
    let count = width as usize * height as usize;
    let mut out = Vec::new();
    out.try_reserve_exact(count)
        .map_err(|_| "glyph: OOM for pixel buffer")?;
    out.resize(count, 0);
    decode_into(format, raw, width, height, opts, &mut out);
    Ok(out)
}

fn decode_1bit(raw: &[u8], width: u8, height: u8, opts: RenderOptions, out: &mut [u16]) -> usize {
    let stride = packed_row_bytes(width);
    let w = width as usize;
    let white = color::map_pixel(PixelClass::White, FontFormat::OneBit, opts);
    let black = color::map_pixel(PixelClass::Black, FontFormat::OneBit, opts);

    let mut done = 0;
    for y in 0..height as usize {
        let Some(row) = raw.get(y * stride..(y + 1) * stride) else {
            break;
        };
        for x in 0..w {
            let set = (row[x / 8] >> (7 - (x % 8))) & 1 != 0;
            out[y * w + x] = if set { white } else { black };
        }
        done += w;
    }
    done
}

fn decode_huffman(raw: &[u8], opts: RenderOptions, out: &mut [u16]) -> usize {
    let mut bits = BitReader::new(raw);
    let white = color::map_pixel(PixelClass::White, FontFormat::Huffman, opts);
    let black = color::map_pixel(PixelClass::Black, FontFormat::Huffman, opts);

    for (i, px) in out.iter_mut().enumerate() {
        let pixel = match bits.next_bit() {
            None => return i,
            Some(false) => white,
            Some(true) => match bits.next_bit() {
                None => return i,
                Some(false) => black,
                Some(true) => match bits.next_bits(4) {
                    None => return i,
                    Some(level) => color::legacy_gray(level, opts.dark_mode),
                },
            },
        };
        *px = pixel;
    }
    out.len()
}

fn decode_2bit(raw: &[u8], opts: RenderOptions, out: &mut [u16]) -> usize {
    let mut bits = BitReader::new(raw);
    let white = color::map_pixel(PixelClass::White, FontFormat::TwoBit, opts);
    let gray = color::map_pixel(PixelClass::Gray, FontFormat::TwoBit, opts);
    let black = color::map_pixel(PixelClass::Black, FontFormat::TwoBit, opts);

    for (i, px) in out.iter_mut().enumerate() {
        let pixel = match bits.next_bit() {
            None => return i,
            Some(false) => white,
            Some(true) => match bits.next_bit() {
                None => return i,
                Some(false) => gray,
                Some(true) => black,
            },
        };
        *px = pixel;
    }
    out.len()
}

/// Outline box drawn when neither the glyph nor U+25A1 exist in the font.
pub fn placeholder_box(width: u8, height: u8, opts: RenderOptions) -> Result<Vec<u16>, &'static str> {
    let (w, h) = (width as usize, height as usize);
    let mut out = Vec::new();
    out.try_reserve_exact(w * h)
        .map_err(|_| "glyph: OOM for placeholder")?;

    let paper = if opts.transparent {
        color::TRANSPARENT
    } else {
        color::background(opts.dark_mode)
    };
    let ink = color::foreground(opts.dark_mode);

    for y in 0..h {
        for x in 0..w {
            let edge = x == 0 || y == 0 || x + 1 == w || y + 1 == h;
            out.push(if edge { ink } else { paper });
        }
    }
    Ok(out)
}
