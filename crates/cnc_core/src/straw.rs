//! Pull-style byte streams.
//!
//! A [`Straw`] hands out bytes on request, drawing them from the straw it
//! wraps. Straws mirror the pipes in [`crate::pipe`]: [`InflateStraw`]
//! reads what [`crate::pipe::DeflatePipe`] wrote.

use std::io::Read;

use crc::Digest;
use flate2::read::DeflateDecoder;
use sha1::{Digest as _, Sha1};

use crate::error::{GameError, Result};
use crate::pipe::{BLOCK_HEADER_LEN, BLOCK_SIZE, CRC32};

/// Source of a stream of bytes.
pub trait Straw {
    /// Fill as much of `buf` as possible. Returns 0 at end of stream.
    fn get(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Fill `buf` completely.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MalformedPacket`] if the stream ends first.
    fn get_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.get(&mut buf[filled..])?;
            if count == 0 {
                return Err(GameError::MalformedPacket(format!(
                    "Stream ended after {} of {} bytes",
                    filled,
                    buf.len()
                )));
            }
            filled += count;
        }
        Ok(())
    }

    /// Drain the stream.
    fn get_all(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let count = self.get(&mut chunk)?;
            if count == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..count]);
        }
    }
}

impl<S: Straw + ?Sized> Straw for &mut S {
    fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).get(buf)
    }
}

/// Reads from a byte slice.
#[derive(Debug, Clone)]
pub struct BufferStraw<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BufferStraw<'a> {
    /// Read `data` from the start.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Straw for BufferStraw<'_> {
    fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        let count = buf.len().min(self.remaining());
        buf[..count].copy_from_slice(&self.data[self.pos..self.pos + count]);
        self.pos += count;
        Ok(count)
    }
}

/// Reads from an [`std::io::Read`].
#[derive(Debug)]
pub struct ReaderStraw<R: Read> {
    reader: R,
}

impl<R: Read> ReaderStraw<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Recover the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Straw for ReaderStraw<R> {
    fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buf)?)
    }
}

/// Computes the CRC-32 of everything drawn through it.
pub struct CrcStraw<S: Straw> {
    source: S,
    digest: Digest<'static, u32>,
}

impl<S: Straw> CrcStraw<S> {
    /// Checksum bytes drawn from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            digest: CRC32.digest(),
        }
    }

    /// CRC of the bytes drawn so far.
    #[must_use]
    pub fn result(&self) -> u32 {
        self.digest.clone().finalize()
    }

    /// Recover the source straw.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: Straw> Straw for CrcStraw<S> {
    fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        let count = self.source.get(buf)?;
        self.digest.update(&buf[..count]);
        Ok(count)
    }
}

/// Decompresses the block stream written by [`crate::pipe::DeflatePipe`].
///
/// Blocks are read only when more output is requested, so a reader that
/// knows the uncompressed length leaves the source positioned just after
/// the last block.
pub struct InflateStraw<S: Straw> {
    source: S,
    block: Vec<u8>,
    pos: usize,
}

impl<S: Straw> InflateStraw<S> {
    /// Inflate blocks drawn from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            block: Vec::new(),
            pos: 0,
        }
    }

    /// Recover the source straw.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Load the next block. Returns false at a clean end of stream.
    fn next_block(&mut self) -> Result<bool> {
        let mut header = [0u8; BLOCK_HEADER_LEN];
        let first = self.source.get(&mut header)?;
        if first == 0 {
            return Ok(false);
        }
        self.source.get_exact(&mut header[first..])?;
        let comp_len = usize::from(u16::from_le_bytes([header[0], header[1]]));
        let raw_len = usize::from(u16::from_le_bytes([header[2], header[3]]));
        if raw_len == 0 || raw_len > BLOCK_SIZE {
            return Err(GameError::MalformedPacket(format!("Bad block length {}", raw_len)));
        }

        let mut compressed = vec![0u8; comp_len];
        self.source.get_exact(&mut compressed)?;
        let mut block = Vec::with_capacity(raw_len);
        DeflateDecoder::new(compressed.as_slice())
            .take(raw_len as u64 + 1)
            .read_to_end(&mut block)
            .map_err(|e| GameError::MalformedPacket(format!("Failed to inflate block: {}", e)))?;
        if block.len() != raw_len {
            return Err(GameError::MalformedPacket(format!(
                "Block inflated to {} bytes, expected {}",
                block.len(),
                raw_len
            )));
        }
        self.block = block;
        self.pos = 0;
        Ok(true)
    }
}

impl<S: Straw> Straw for InflateStraw<S> {
    fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            if self.pos == self.block.len() && !self.next_block()? {
                break;
            }
            let count = (buf.len() - total).min(self.block.len() - self.pos);
            buf[total..total + count].copy_from_slice(&self.block[self.pos..self.pos + count]);
            self.pos += count;
            total += count;
        }
        Ok(total)
    }
}

/// Size of the random pool: sixteen SHA-1 digests.
pub const RANDOM_POOL_LEN: usize = 20 * 16;

/// Endless stream of bytes from a seeded pool.
///
/// The pool is filled one seed bit at a time. Once every bit has been
/// seeded the pool is scrambled with SHA-1; reads then cycle through it.
#[derive(Debug, Clone)]
pub struct RandomStraw {
    pool: Vec<u8>,
    seed_bits: usize,
    current: usize,
}

impl Default for RandomStraw {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomStraw {
    /// Create an unseeded straw.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: vec![0; RANDOM_POOL_LEN],
            seed_bits: 0,
            current: 0,
        }
    }

    /// Clear the pool and all seeding.
    pub fn reset(&mut self) {
        self.pool.fill(0);
        self.seed_bits = 0;
        self.current = 0;
    }

    /// Seed bits still required before the pool is scrambled.
    #[must_use]
    pub fn seed_bits_needed(&self) -> usize {
        (RANDOM_POOL_LEN * 8).saturating_sub(self.seed_bits)
    }

    /// Mix in the low bit of `seed`.
    pub fn seed_bit(&mut self, seed: u32) {
        let index = (self.seed_bits / 8) % RANDOM_POOL_LEN;
        if seed & 1 != 0 {
            self.pool[index] ^= 1 << (self.seed_bits % 8);
        }
        self.seed_bits += 1;
        if self.seed_bits == RANDOM_POOL_LEN * 8 {
            self.scramble();
        }
    }

    /// Mix in eight bits, low bit first.
    pub fn seed_byte(&mut self, seed: u8) {
        self.seed_bits_of(u32::from(seed), 8);
    }

    /// Mix in sixteen bits, low bit first.
    pub fn seed_short(&mut self, seed: u16) {
        self.seed_bits_of(u32::from(seed), 16);
    }

    /// Mix in thirty-two bits, low bit first.
    pub fn seed_long(&mut self, seed: u32) {
        self.seed_bits_of(seed, 32);
    }

    fn seed_bits_of(&mut self, mut seed: u32, bits: u32) {
        for _ in 0..bits {
            self.seed_bit(seed);
            seed >>= 1;
        }
    }

    /// Replace each stretch of the pool with the digest of the whole pool.
    fn scramble(&mut self) {
        for index in 0..RANDOM_POOL_LEN {
            let digest = Sha1::digest(&self.pool);
            let count = digest.len().min(RANDOM_POOL_LEN - index);
            self.pool[index..index + count].copy_from_slice(&digest[..count]);
        }
    }
}

impl Straw for RandomStraw {
    fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        for byte in buf.iter_mut() {
            *byte = self.pool[self.current];
            self.current = (self.current + 1) % RANDOM_POOL_LEN;
        }
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{BufferPipe, DeflatePipe, Pipe};

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut pipe = DeflatePipe::new(BufferPipe::new());
        pipe.put(data).unwrap();
        pipe.flush().unwrap();
        pipe.into_inner().into_bytes()
    }

    #[test]
    fn test_buffer_straw() {
        let mut straw = BufferStraw::new(b"hello");
        let mut buf = [0u8; 3];
        assert_eq!(straw.get(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(straw.get(&mut buf).unwrap(), 2);
        assert_eq!(straw.get(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_get_exact_short_stream() {
        let mut straw = BufferStraw::new(b"ab");
        let mut buf = [0u8; 3];
        assert!(matches!(straw.get_exact(&mut buf), Err(GameError::MalformedPacket(_))));
    }

    #[test]
    fn test_inflate_across_blocks() {
        let data: Vec<u8> = (0..BLOCK_SIZE * 2 + 513).map(|i| (i * 31 % 251) as u8).collect();
        let packed = deflate(&data);
        let mut straw = InflateStraw::new(BufferStraw::new(&packed));
        assert_eq!(straw.get_all().unwrap(), data);
    }

    #[test]
    fn test_inflate_stops_at_requested_length() {
        let mut packed = deflate(&[5u8; 300]);
        packed.extend_from_slice(b"TAIL");
        let mut source = BufferStraw::new(&packed);
        let mut body = vec![0u8; 300];
        InflateStraw::new(&mut source).get_exact(&mut body).unwrap();
        assert_eq!(body, vec![5u8; 300]);
        assert_eq!(source.get_all().unwrap(), b"TAIL");
    }

    #[test]
    fn test_inflate_rejects_corrupt_block() {
        let mut packed = deflate(&[1u8; 64]);
        packed[2] = 0xFF;
        packed[3] = 0xFF;
        let mut straw = InflateStraw::new(BufferStraw::new(&packed));
        assert!(straw.get_all().is_err());
    }

    #[test]
    fn test_crc_straw() {
        let mut straw = CrcStraw::new(BufferStraw::new(b"123456789"));
        straw.get_all().unwrap();
        assert_eq!(straw.result(), 0xCBF4_3926);
    }

    #[test]
    fn test_random_straw_seeding() {
        let mut a = RandomStraw::new();
        let mut b = RandomStraw::new();
        assert_eq!(a.seed_bits_needed(), RANDOM_POOL_LEN * 8);
        while a.seed_bits_needed() > 0 {
            a.seed_long(0xDEAD_BEEF);
            b.seed_long(0xDEAD_BEEF);
        }
        let mut x = [0u8; 64];
        let mut y = [0u8; 64];
        a.get(&mut x).unwrap();
        b.get(&mut y).unwrap();
        assert_eq!(x, y);
        assert!(x.iter().any(|&v| v != 0));

        let mut c = RandomStraw::new();
        while c.seed_bits_needed() > 0 {
            c.seed_long(0x1234_5678);
        }
        let mut z = [0u8; 64];
        c.get(&mut z).unwrap();
        assert_ne!(x, z);
    }
}
