//! Avro primitive encoder over any [`Write`] sink.
//!
//! Encoding rules:
//! - null: 0 bytes
//! - boolean: 1 byte (0 or 1)
//! - int/long: zigzag + varint
//! - float: 4 bytes IEEE 754 little-endian
//! - double: 8 bytes IEEE 754 little-endian
//! - bytes/string: long(length) + raw bytes
//! - array/map: long(count) + items, repeated, then long(0)
//!
//! A failed write leaves whatever was already written in the sink; callers
//! discard or roll back the underlying stream.

use std::io::{self, Write};

/// Avro primitive encoder.
pub struct AvroEncoder<W> {
    sink: W,
}

impl<W: Write> AvroEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    // ---------------------------------------------------------------- varint

    /// Writes a zigzag-encoded signed integer as a varint.
    pub fn write_int(&mut self, n: i32) -> io::Result<()> {
        let encoded = ((n << 1) ^ (n >> 31)) as u32;
        self.write_varint_u64(encoded as u64)
    }

    /// Writes a zigzag-encoded signed long as a varint.
    pub fn write_long(&mut self, n: i64) -> io::Result<()> {
        let encoded = ((n << 1) ^ (n >> 63)) as u64;
        self.write_varint_u64(encoded)
    }

    /// Writes a variable-length unsigned integer (no zigzag).
    pub fn write_varint_u64(&mut self, mut n: u64) -> io::Result<()> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        loop {
            let low7 = (n & 0x7f) as u8;
            n >>= 7;
            if n == 0 {
                buf[len] = low7;
                len += 1;
                break;
            }
            buf[len] = low7 | 0x80;
            len += 1;
        }
        self.sink.write_all(&buf[..len])
    }

    // ---------------------------------------------------------------- primitives

    pub fn write_null(&mut self) -> io::Result<()> {
        Ok(())
    }

    pub fn write_boolean(&mut self, b: bool) -> io::Result<()> {
        self.sink.write_all(&[b as u8])
    }

    pub fn write_float(&mut self, f: f32) -> io::Result<()> {
        self.sink.write_all(&f.to_le_bytes())
    }

    pub fn write_double(&mut self, f: f64) -> io::Result<()> {
        self.sink.write_all(&f.to_le_bytes())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_long(data.len() as i64)?;
        self.sink.write_all(data)
    }

    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    /// Writes the raw bytes of a `fixed` value; the size lives in the schema.
    pub fn write_fixed(&mut self, data: &[u8]) -> io::Result<()> {
        self.sink.write_all(data)
    }

    pub fn write_enum(&mut self, index: usize) -> io::Result<()> {
        self.write_int(index as i32)
    }

    pub fn write_union_index(&mut self, index: usize) -> io::Result<()> {
        self.write_long(index as i64)
    }

    /// Writes a block header: the number of items that follow.
    pub fn write_block_start(&mut self, count: usize) -> io::Result<()> {
        self.write_long(count as i64)
    }

    /// Writes the zero-count block that terminates an array or map.
    pub fn write_block_end(&mut self) -> io::Result<()> {
        self.write_long(0)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
