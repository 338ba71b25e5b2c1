//! Bounds-checked little-endian access to archive buffers
//!
//! Every record in the archive is addressed by an offset into one shared,
//! read-only byte buffer. [`ByteReader`] claims a record's byte range up
//! front and then hands out fields sequentially, so a truncated archive
//! surfaces as [`MrgError::UnexpectedEof`] instead of an out-of-range read.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{MrgError, Result};

/// Sequential reader over one fixed-size record in a byte buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    record: &'a [u8],
    offset: usize,
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Claim `len` bytes of `data` starting at `offset`
    pub fn at(data: &'a [u8], offset: usize, len: usize) -> Result<Self> {
        let record = offset
            .checked_add(len)
            .and_then(|end| data.get(offset..end))
            .ok_or(MrgError::UnexpectedEof {
                offset,
                needed: len,
                available: data.len(),
            })?;

        Ok(Self {
            record,
            offset,
            pos: 0,
        })
    }

    /// Absolute buffer offset of the next unread byte
    pub fn position(&self) -> usize {
        self.offset + self.pos
    }

    /// Bytes left in the claimed record
    pub fn remaining(&self) -> usize {
        self.record.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self
            .record
            .get(self.pos..self.pos + n)
            .ok_or(MrgError::UnexpectedEof {
                offset: self.position(),
                needed: n,
                available: self.remaining(),
            })?;
        self.pos += n;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Read three consecutive floats, widened to f64
    pub fn read_f32x3(&mut self) -> Result<[f64; 3]> {
        Ok([
            f64::from(self.read_f32()?),
            f64::from(self.read_f32()?),
            f64::from(self.read_f32()?),
        ])
    }

    /// Read three consecutive signed 32-bit integers
    pub fn read_i32x3(&mut self) -> Result<[i32; 3]> {
        Ok([self.read_i32()?, self.read_i32()?, self.read_i32()?])
    }
}

/// Resolve a signed offset stored in the archive against a base offset
pub fn resolve_offset(base: usize, relative: i32) -> Result<usize> {
    base.checked_add_signed(relative as isize).ok_or_else(|| {
        MrgError::ParseError(format!(
            "relative offset {relative} from {base:#x} points before the buffer"
        ))
    })
}
