//! Little-endian primitive encoding shared by the event wire format, the
//! connection header and the save header.
//!
//! Readers treat a short input as a malformed record rather than an I/O
//! failure, because every caller reads from a buffer already in memory.

use std::io::{ErrorKind, Read, Write};

use crate::error::{GameError, Result};

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u16.
pub fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i16.
pub fn write_i16_le(w: &mut dyn Write, v: i16) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i32.
pub fn write_i32_le(w: &mut dyn Write, v: i32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write raw bytes with no length prefix.
pub fn write_bytes(w: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    w.write_all(bytes)?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

fn fill(r: &mut dyn Read, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            GameError::MalformedPacket(format!("truncated while reading {what}"))
        } else {
            GameError::Io(e)
        }
    })
}

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    fill(r, &mut buf, "u8")?;
    Ok(buf[0])
}

/// Read a little-endian u16.
pub fn read_u16_le(r: &mut dyn Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    fill(r, &mut buf, "u16")?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian i16.
pub fn read_i16_le(r: &mut dyn Read) -> Result<i16> {
    let mut buf = [0u8; 2];
    fill(r, &mut buf, "i16")?;
    Ok(i16::from_le_bytes(buf))
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    fill(r, &mut buf, "u32")?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian i32.
pub fn read_i32_le(r: &mut dyn Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    fill(r, &mut buf, "i32")?;
    Ok(i32::from_le_bytes(buf))
}

/// Read exactly `len` bytes.
pub fn read_bytes(r: &mut dyn Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    fill(r, &mut buf, "byte block")?;
    Ok(buf)
}
