//! Buffered big-endian byte reader.

use std::io::{self, BufRead, Read};

use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;

use crate::Amf3Error;

/// Largest number of bytes reserved ahead of time for a length read from the input.
const MAX_READ_RESERVE: usize = 64 * 1024;

/// A buffered reader of big-endian primitives.
///
/// This is the reader every AMF3 value is decoded from. It is also handed to
/// [`Externalizable`](crate::Externalizable) handlers so they can read their
/// custom payload directly from the stream.
pub struct ByteReader<'a> {
    inner: Option<io::BufReader<Box<dyn Read + 'a>>>,
    position: u64,
}

impl std::fmt::Debug for ByteReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteReader")
            .field("position", &self.position)
            .field("closed", &self.inner.is_none())
            .finish()
    }
}

impl<'a> ByteReader<'a> {
    /// Create a new reader over the given byte source.
    pub fn new(reader: impl Read + 'a) -> Self {
        Self {
            inner: Some(io::BufReader::new(Box::new(reader))),
            position: 0,
        }
    }

    /// The number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Release the underlying byte source.
    ///
    /// Every read after this fails with [`Amf3Error::Closed`].
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn inner(&mut self) -> Result<&mut io::BufReader<Box<dyn Read + 'a>>, Amf3Error> {
        self.inner.as_mut().ok_or(Amf3Error::Closed)
    }

    /// Read an unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, Amf3Error> {
        let value = self.inner()?.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    /// Read a byte as a boolean, any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool, Amf3Error> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a big-endian unsigned 16-bit integer.
    pub fn read_u16_be(&mut self) -> Result<u16, Amf3Error> {
        let value = self.inner()?.read_u16::<BigEndian>()?;
        self.position += 2;
        Ok(value)
    }

    /// Read a big-endian signed 32-bit integer.
    pub fn read_i32_be(&mut self) -> Result<i32, Amf3Error> {
        let value = self.inner()?.read_i32::<BigEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read a big-endian unsigned 32-bit integer.
    pub fn read_u32_be(&mut self) -> Result<u32, Amf3Error> {
        let value = self.inner()?.read_u32::<BigEndian>()?;
        self.position += 4;
        Ok(value)
    }

    /// Read a big-endian IEEE-754 double.
    pub fn read_f64_be(&mut self) -> Result<f64, Amf3Error> {
        let value = self.inner()?.read_f64::<BigEndian>()?;
        self.position += 8;
        Ok(value)
    }

    /// Read exactly `len` bytes.
    ///
    /// The buffer grows with the data actually read, so a bogus length fails
    /// with [`Amf3Error::UnexpectedEof`] instead of allocating up front.
    pub fn read_exact(&mut self, len: usize) -> Result<Bytes, Amf3Error> {
        let mut buf = Vec::with_capacity(len.min(MAX_READ_RESERVE));
        let read = self.inner()?.by_ref().take(len as u64).read_to_end(&mut buf)?;
        self.position += read as u64;

        if read != len {
            return Err(Amf3Error::UnexpectedEof);
        }

        Ok(Bytes::from(buf))
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), Amf3Error> {
        let skipped = io::copy(&mut self.inner()?.by_ref().take(len as u64), &mut io::sink())?;
        self.position += skipped;

        if skipped != len as u64 {
            return Err(Amf3Error::UnexpectedEof);
        }

        Ok(())
    }

    /// Check whether the input is exhausted without consuming anything.
    pub fn peek_eof(&mut self) -> Result<bool, Amf3Error> {
        Ok(self.inner()?.fill_buf()?.is_empty())
    }
}
