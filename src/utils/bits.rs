//! Bit-granular serialization primitives.
//!
//! The index body is a dense bit stream with no inter-field padding:
//! [`BitWriter`] packs values of arbitrary width into a buffered byte
//! stream, and [`BitReader`] pulls them back out at any bit offset.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{IndexError, Result};

/// Widest value a [`BitReader`] can decode in one call.
pub const MAX_READ_WIDTH: u32 = 64;

/// Widest value a [`BitWriter`] accepts.
pub const MAX_WRITE_WIDTH: u32 = 56;

const BUF_SIZE: usize = 64 * 1024;

/// Margin (in bits) the writer keeps free so one value plus its zeroed
/// look-ahead byte always fits: an 8-byte window and one trailing byte.
const SPARE_BITS: u64 = 72;

/// Random-access reader over a bit-packed stream.
///
/// Bit positions are relative to the stream position at construction
/// time, so a reader can sit after a byte-aligned file header.
pub struct BitReader<R: Read + Seek> {
    inner: R,
    base: u64,
}

impl<R: Read + Seek> BitReader<R> {
    /// Captures the current stream position as bit offset zero.
    pub fn new(mut inner: R) -> Result<Self> {
        let base = inner.stream_position()?;
        Ok(BitReader { inner, base })
    }

    /// Reads a `width`-bit big-endian value starting at bit `pos`.
    ///
    /// Supports widths 1..=64 at any bit offset; the covering byte
    /// window is at most nine bytes, accumulated through a `u128` so a
    /// 64-bit value straddling nine bytes decodes intact.
    pub fn read_at(&mut self, pos: u64, width: u32) -> Result<u64> {
        if width == 0 || width > MAX_READ_WIDTH {
            return Err(IndexError::CodecWidth {
                width,
                max: MAX_READ_WIDTH,
            });
        }
        let byte_pos = pos / 8;
        let bit_off = (pos % 8) as u32;
        let span = ((bit_off + width).div_ceil(8)) as usize;

        let mut window = [0u8; 9];
        self.inner.seek(SeekFrom::Start(self.base + byte_pos))?;
        self.inner.read_exact(&mut window[..span])?;

        let mut acc: u128 = 0;
        for (i, byte) in window[..span].iter().enumerate() {
            acc |= (*byte as u128) << (120 - 8 * i);
        }
        acc <<= bit_off;
        Ok((acc >> (128 - width)) as u64)
    }
}

/// Buffered sequential writer of bit-packed values.
///
/// Values are packed back to back; [`close`](BitWriter::close) pads the
/// final byte with zero bits. Dropping the writer without closing loses
/// buffered bits.
pub struct BitWriter<W: Write> {
    inner: W,
    buf: Box<[u8]>,
    cursor: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        BitWriter {
            inner,
            buf: vec![0; BUF_SIZE].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Appends the low `width` bits of `value`, big-endian.
    ///
    /// Widths above 56 are rejected rather than truncated; 56 bits keeps
    /// the value plus a 7-bit cursor offset inside one 8-byte store.
    pub fn write(&mut self, value: u64, width: u32) -> Result<()> {
        if width == 0 || width > MAX_WRITE_WIDTH {
            return Err(IndexError::CodecWidth {
                width,
                max: MAX_WRITE_WIDTH,
            });
        }
        debug_assert!(value >> width == 0, "value wider than {width} bits");
        if self.cursor + width as u64 + SPARE_BITS > (BUF_SIZE as u64) * 8 {
            self.flush()?;
        }
        let byte = (self.cursor / 8) as usize;
        let off = (self.cursor % 8) as u32;
        let aligned = (value & ((1u64 << width) - 1)) << (64 - off - width);
        let window = aligned.to_be_bytes();
        // The first byte may share bits with the previous value; the
        // rest of the window is virgin territory past the cursor.
        self.buf[byte] |= window[0];
        self.buf[byte + 1..byte + 8].copy_from_slice(&window[1..8]);
        self.buf[byte + 8] = 0;
        self.cursor += width as u64;
        Ok(())
    }

    /// Writes out all complete bytes, carrying a partial trailing byte
    /// over to the front of the buffer.
    pub fn flush(&mut self) -> Result<()> {
        let complete = (self.cursor / 8) as usize;
        self.inner.write_all(&self.buf[..complete])?;
        self.buf[0] = self.buf[complete];
        self.cursor %= 8;
        Ok(())
    }

    /// Flushes everything, zero-padding the final partial byte.
    pub fn close(&mut self) -> Result<()> {
        let bytes = self.cursor.div_ceil(8) as usize;
        self.inner.write_all(&self.buf[..bytes])?;
        self.cursor = 0;
        self.inner.flush()?;
        Ok(())
    }
}
