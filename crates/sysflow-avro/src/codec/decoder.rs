//! Avro primitive decoder over any [`Read`] source.

use std::io::{self, Read};

use crate::config::CodecConfig;
use crate::error::{MalformedEncoding, Result};

/// Avro primitive decoder.
///
/// Reads strictly sequentially: no seeking, no look-ahead. The only framing
/// is the stream position, so every value must be consumed in full, even when
/// the caller discards it.
pub struct AvroDecoder<R> {
    source: R,
    pos: u64,
    max_length: u64,
}

impl<R: Read> AvroDecoder<R> {
    pub fn new(source: R) -> Self {
        Self::with_config(source, &CodecConfig::default())
    }

    pub fn with_config(source: R, config: &CodecConfig) -> Self {
        Self {
            source,
            pos: 0,
            max_length: config.max_length,
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    // ---------------------------------------------------------------- helpers

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.source.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(MalformedEncoding::EndOfInput.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    /// Reads exactly `n` bytes without pre-allocating `n` up front, so a
    /// corrupt length cannot force a huge allocation.
    fn read_raw(&mut self, n: u64) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n.min(8 * 1024) as usize);
        let got = (&mut self.source).take(n).read_to_end(&mut out)?;
        self.pos += got as u64;
        if (got as u64) < n {
            return Err(MalformedEncoding::EndOfInput.into());
        }
        Ok(out)
    }

    fn discard(&mut self, n: u64) -> Result<()> {
        let got = io::copy(&mut (&mut self.source).take(n), &mut io::sink())?;
        self.pos += got;
        if got < n {
            return Err(MalformedEncoding::EndOfInput.into());
        }
        Ok(())
    }

    /// Reads a string/bytes length prefix and validates it.
    fn read_length(&mut self) -> Result<u64> {
        let len = self.read_long()?;
        if len < 0 {
            return Err(MalformedEncoding::NegativeLength(len).into());
        }
        if len as u64 > self.max_length {
            return Err(MalformedEncoding::LengthOverflow(len).into());
        }
        Ok(len as u64)
    }

    // ---------------------------------------------------------------- varint

    /// Reads a variable-length unsigned integer (max 10 bytes for 64-bit long).
    pub fn read_varint_u64(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        for i in 0..10 {
            let b = self.read_byte()? as u64;
            if i == 9 && b > 0x01 {
                return Err(MalformedEncoding::VarLongTooLong.into());
            }
            result |= (b & 0x7f) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(MalformedEncoding::VarLongTooLong.into())
    }

    /// Reads a variable-length unsigned integer (max 5 bytes for 32-bit int).
    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let mut result: u32 = 0;
        for i in 0..5 {
            let b = self.read_byte()? as u32;
            if i == 4 && b > 0x0f {
                return Err(MalformedEncoding::VarIntTooLong.into());
            }
            result |= (b & 0x7f) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(MalformedEncoding::VarIntTooLong.into())
    }

    /// Reads a zigzag-decoded signed integer (Avro int).
    pub fn read_int(&mut self) -> Result<i32> {
        let encoded = self.read_varint_u32()?;
        Ok(((encoded >> 1) as i32) ^ -((encoded & 1) as i32))
    }

    /// Reads a zigzag-decoded signed long (Avro long).
    pub fn read_long(&mut self) -> Result<i64> {
        let encoded = self.read_varint_u64()?;
        Ok(((encoded >> 1) as i64) ^ -((encoded & 1) as i64))
    }

    // ---------------------------------------------------------------- primitives

    pub fn read_null(&mut self) -> Result<()> {
        Ok(())
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(MalformedEncoding::InvalidBoolean(b).into()),
        }
    }

    pub fn read_float(&mut self) -> Result<f32> {
        let mut bytes = [0u8; 4];
        self.fill(&mut bytes)?;
        Ok(f32::from_le_bytes(bytes))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        let mut bytes = [0u8; 8];
        self.fill(&mut bytes)?;
        Ok(f64::from_le_bytes(bytes))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_length()?;
        self.read_raw(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| MalformedEncoding::InvalidUtf8.into())
    }

    pub fn read_fixed(&mut self, size: usize) -> Result<Vec<u8>> {
        self.read_raw(size as u64)
    }

    /// Reads a `fixed` value straight into `buf`.
    pub fn read_fixed_into(&mut self, buf: &mut [u8]) -> Result<()> {
        self.fill(buf)
    }

    /// Reads an enum index and checks it against the symbol count.
    pub fn read_enum(&mut self, symbols: usize) -> Result<usize> {
        let index = self.read_int()?;
        if index < 0 || index as usize >= symbols {
            return Err(MalformedEncoding::InvalidEnumIndex { index, symbols }.into());
        }
        Ok(index as usize)
    }

    /// Reads a union branch index and checks it against the branch count.
    pub fn read_union_index(&mut self, branches: usize) -> Result<usize> {
        let raw = self.read_long()?;
        let index = i32::try_from(raw).unwrap_or(i32::MAX);
        if index < 0 || index as usize >= branches {
            return Err(MalformedEncoding::UnionIndexOutOfRange { index, branches }.into());
        }
        Ok(index as usize)
    }

    /// Reads one array/map block header.
    ///
    /// Returns the item count of the next block (`0` ends the collection) and,
    /// for negative-count blocks, the byte size the writer recorded.
    pub fn read_block_header(&mut self) -> Result<(usize, Option<u64>)> {
        let count = self.read_long()?;
        if count == 0 {
            return Ok((0, None));
        }
        let (count, size) = if count < 0 {
            let size = self.read_length()?;
            (count.unsigned_abs(), Some(size))
        } else {
            (count as u64, None)
        };
        if count > self.max_length {
            return Err(MalformedEncoding::LengthOverflow(count as i64).into());
        }
        Ok((count as usize, size))
    }

    // ---------------------------------------------------------------- skipping

    /// Consumes a length-prefixed string or bytes value without decoding it.
    pub fn skip_bytes(&mut self) -> Result<()> {
        let len = self.read_length()?;
        self.discard(len)
    }

    /// Consumes `n` raw bytes (fixed values, sized blocks).
    pub fn skip_raw(&mut self, n: u64) -> Result<()> {
        self.discard(n)
    }
}
