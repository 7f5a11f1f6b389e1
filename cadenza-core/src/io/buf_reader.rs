// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::errors::{bad_bitstream_error, Result};

/// A `BufReader` reads big-endian encoded values from a byte buffer.
pub struct BufReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufReader<'a> {
    /// Instantiate a new `BufReader` with a given byte buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BufReader { buf, pos: 0 }
    }

    /// Read a single byte from the stream.
    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8> {
        if self.buf.len() - self.pos < 1 {
            return underrun_error();
        }

        self.pos += 1;
        Ok(self.buf[self.pos - 1])
    }

    /// Read a big-endian 16-bit unsigned integer from the stream.
    pub fn read_be_u16(&mut self) -> Result<u16> {
        let bytes = self.read_buf_bytes_ref(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian 24-bit unsigned integer from the stream.
    pub fn read_be_u24(&mut self) -> Result<u32> {
        let bytes = self.read_buf_bytes_ref(3)?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Read a big-endian 32-bit unsigned integer from the stream.
    pub fn read_be_u32(&mut self) -> Result<u32> {
        let bytes = self.read_buf_bytes_ref(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Returns a reference to the next `len` bytes in the buffer and advances the stream.
    pub fn read_buf_bytes_ref(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < len {
            return underrun_error();
        }

        self.pos += len;
        Ok(&self.buf[self.pos - len..self.pos])
    }

    /// Ignores the specified number of bytes from the stream.
    pub fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        if ((self.buf.len() - self.pos) as u64) < count {
            return underrun_error();
        }

        self.pos += count as usize;
        Ok(())
    }

    /// Gets the position of the stream in bytes.
    #[inline(always)]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Gets the number of bytes available for reading.
    #[inline(always)]
    pub fn bytes_available(&self) -> usize {
        self.buf.len() - self.pos
    }
}

#[inline(always)]
fn underrun_error<T>() -> Result<T> {
    bad_bitstream_error("unexpected end of stream")
}
