// Byte-range reads over SD / flash files.
// Everything above this module sees a file as embedded-io Read + Seek;
// embedded-sdmmc files plug in directly, built-in font data goes
// through MemFile.

use embedded_io::{ErrorType, Read, Seek, SeekFrom};

// read up to buf.len() bytes at offset; short only at EOF
pub fn read_at<F>(file: &mut F, offset: u32, buf: &mut [u8]) -> Result<usize, &'static str>
where
    F: Read + Seek,
{
    file.seek(SeekFrom::Start(offset as u64))
        .map_err(|_| "seek failed")?;

    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..]).map_err(|_| "read failed")?;
        if n == 0 {
            break;
        }
        total += n;
    }

    Ok(total)
}

// read exactly buf.len() bytes at offset; Err on short read
pub fn read_exact_at<F>(file: &mut F, offset: u32, buf: &mut [u8]) -> Result<(), &'static str>
where
    F: Read + Seek,
{
    let n = read_at(file, offset, buf)?;
    if n != buf.len() {
        return Err("short read");
    }
    Ok(())
}

// file length via seek-to-end; restores nothing, callers always seek before reading
pub fn file_len<F>(file: &mut F) -> Result<u32, &'static str>
where
    F: Seek,
{
    let end = file.seek(SeekFrom::End(0)).map_err(|_| "seek end failed")?;
    u32::try_from(end).map_err(|_| "file larger than 4GB")
}

#[inline]
pub fn le_u16(d: &[u8], o: usize) -> u16 {
    u16::from_le_bytes([d[o], d[o + 1]])
}

#[inline]
pub fn le_u32(d: &[u8], o: usize) -> u32 {
    u32::from_le_bytes([d[o], d[o + 1], d[o + 2], d[o + 3]])
}

/// Read-only file over a byte slice. Used for flash-resident font data
/// and anywhere a whole file already sits in RAM.
#[derive(Debug, Clone)]
pub struct MemFile<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MemFile<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl ErrorType for MemFile<'_> {
    type Error = core::convert::Infallible;
}

impl Read for MemFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let start = self.pos.min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos = start + n;
        Ok(n)
    }
}

impl Seek for MemFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(o) => o as i64,
            SeekFrom::End(o) => len + o,
            SeekFrom::Current(o) => self.pos as i64 + o,
        };
        // clamp instead of erroring; reads past the end return 0
        self.pos = target.max(0) as usize;
        Ok(self.pos as u64)
    }
}
