//! Push-style byte streams.
//!
//! A [`Pipe`] accepts bytes and passes them, possibly transformed, to the
//! next pipe in the chain. Chains are built by ownership: a
//! [`DeflatePipe`] owns the pipe it feeds, and `&mut P` is itself a pipe
//! so a chain can borrow its sink and keep writing to it afterwards.
//!
//! The inverse pull-style streams live in [`crate::straw`].

use std::io::{Read, Write};

use crc::{Crc, Digest, CRC_32_ISO_HDLC};
use flate2::read::DeflateEncoder;
use flate2::Compression;

use crate::error::{GameError, Result};

/// CRC-32 used for frame checksums and save files.
pub static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Uncompressed bytes per deflate block.
pub const BLOCK_SIZE: usize = 8192;

/// Size of a block header: compressed length then raw length, both u16.
pub const BLOCK_HEADER_LEN: usize = 4;

/// Sink for a stream of bytes.
pub trait Pipe {
    /// Accept bytes. Returns the number of bytes written downstream.
    fn put(&mut self, data: &[u8]) -> Result<usize>;

    /// Push out anything buffered. Returns the number of bytes written
    /// downstream.
    fn flush(&mut self) -> Result<usize> {
        Ok(0)
    }
}

impl<P: Pipe + ?Sized> Pipe for &mut P {
    fn put(&mut self, data: &[u8]) -> Result<usize> {
        (**self).put(data)
    }

    fn flush(&mut self) -> Result<usize> {
        (**self).flush()
    }
}

impl<P: Pipe + ?Sized> Pipe for Box<P> {
    fn put(&mut self, data: &[u8]) -> Result<usize> {
        (**self).put(data)
    }

    fn flush(&mut self) -> Result<usize> {
        (**self).flush()
    }
}

/// Collects everything into memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPipe {
    data: Vec<u8>,
}

impl BufferPipe {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes collected so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the collected bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Pipe for BufferPipe {
    fn put(&mut self, data: &[u8]) -> Result<usize> {
        self.data.extend_from_slice(data);
        Ok(data.len())
    }
}

/// Writes through to an [`std::io::Write`].
#[derive(Debug)]
pub struct WriterPipe<W: Write> {
    writer: W,
}

impl<W: Write> WriterPipe<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Pipe for WriterPipe<W> {
    fn put(&mut self, data: &[u8]) -> Result<usize> {
        self.writer.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(0)
    }
}

/// Computes the CRC-32 of everything passing through.
pub struct CrcPipe<P: Pipe> {
    next: P,
    digest: Digest<'static, u32>,
}

impl<P: Pipe> CrcPipe<P> {
    /// Checksum bytes on their way to `next`.
    pub fn new(next: P) -> Self {
        Self {
            next,
            digest: CRC32.digest(),
        }
    }

    /// CRC of the bytes seen so far.
    #[must_use]
    pub fn result(&self) -> u32 {
        self.digest.clone().finalize()
    }

    /// Recover the downstream pipe.
    pub fn into_inner(self) -> P {
        self.next
    }
}

impl<P: Pipe> Pipe for CrcPipe<P> {
    fn put(&mut self, data: &[u8]) -> Result<usize> {
        self.digest.update(data);
        self.next.put(data)
    }

    fn flush(&mut self) -> Result<usize> {
        self.next.flush()
    }
}

/// Compresses in fixed-size blocks.
///
/// Each block is written as a header of `{comp_len: u16, raw_len: u16}`
/// (little-endian) followed by `comp_len` bytes of raw deflate data. Only
/// the final block, written by [`Pipe::flush`], may be shorter than
/// [`BLOCK_SIZE`].
pub struct DeflatePipe<P: Pipe> {
    next: P,
    buffer: Vec<u8>,
    level: Compression,
}

impl<P: Pipe> DeflatePipe<P> {
    /// Compress into `next` at the default level.
    pub fn new(next: P) -> Self {
        Self::with_level(next, Compression::default())
    }

    /// Compress into `next` at a specific level.
    pub fn with_level(next: P, level: Compression) -> Self {
        Self {
            next,
            buffer: Vec::with_capacity(BLOCK_SIZE),
            level,
        }
    }

    /// Recover the downstream pipe. Unflushed bytes are lost.
    pub fn into_inner(self) -> P {
        self.next
    }

    fn write_block(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let mut encoder = DeflateEncoder::new(self.buffer.as_slice(), self.level);
        let mut compressed = Vec::with_capacity(self.buffer.len());
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| GameError::InvalidState(format!("Failed to compress block: {}", e)))?;

        let comp_len = u16::try_from(compressed.len())
            .map_err(|_| GameError::InvalidState(format!("Compressed block too large: {}", compressed.len())))?;
        let raw_len = self.buffer.len() as u16;
        let mut header = [0u8; BLOCK_HEADER_LEN];
        header[..2].copy_from_slice(&comp_len.to_le_bytes());
        header[2..].copy_from_slice(&raw_len.to_le_bytes());

        let mut total = self.next.put(&header)?;
        total += self.next.put(&compressed)?;
        self.buffer.clear();
        Ok(total)
    }
}

impl<P: Pipe> Pipe for DeflatePipe<P> {
    fn put(&mut self, mut data: &[u8]) -> Result<usize> {
        let mut total = 0;
        while !data.is_empty() {
            let room = BLOCK_SIZE - self.buffer.len();
            let take = room.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == BLOCK_SIZE {
                total += self.write_block()?;
            }
        }
        Ok(total)
    }

    fn flush(&mut self) -> Result<usize> {
        let total = self.write_block()?;
        Ok(total + self.next.flush()?)
    }
}
