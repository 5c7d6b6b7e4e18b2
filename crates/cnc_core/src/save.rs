//! Save games.
//!
//! File layout:
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 4 | magic `CNCS` |
//! | 4 | [`SAVE_VERSION`] (u32 LE) |
//! | 32 | reserved, zero |
//! | 4 | uncompressed body length (u32 LE) |
//! | n | body: bincode world, through [`DeflatePipe`] blocks |
//! | 4 | CRC-32 of the uncompressed body (u32 LE) |

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{GameError, Result};
use crate::pipe::{DeflatePipe, Pipe, WriterPipe, CRC32};
use crate::straw::{InflateStraw, ReaderStraw, Straw};
use crate::world::World;

/// File magic.
pub const SAVE_MAGIC: [u8; 4] = *b"CNCS";

/// Format version written and accepted.
pub const SAVE_VERSION: u32 = 1;

/// Reserved bytes after the version.
pub const SAVE_PADDING: usize = 32;

/// Write `world` to `pipe`. Returns the number of bytes written.
///
/// # Errors
///
/// Returns an error if the world cannot be encoded or the pipe fails.
pub fn save_world<P: Pipe>(world: &World, mut pipe: P) -> Result<usize> {
    let body = world.serialize()?;
    let body_len = u32::try_from(body.len())
        .map_err(|_| GameError::InvalidState(format!("Save body too large: {} bytes", body.len())))?;

    let mut total = pipe.put(&SAVE_MAGIC)?;
    total += pipe.put(&SAVE_VERSION.to_le_bytes())?;
    total += pipe.put(&[0u8; SAVE_PADDING])?;
    total += pipe.put(&body_len.to_le_bytes())?;
    {
        let mut deflate = DeflatePipe::new(&mut pipe);
        total += deflate.put(&body)?;
        total += deflate.flush()?;
    }
    total += pipe.put(&CRC32.checksum(&body).to_le_bytes())?;
    total += pipe.flush()?;

    tracing::info!(frame = world.frame(), bytes = total, "Game saved");
    Ok(total)
}

/// Read a world written by [`save_world`].
///
/// # Errors
///
/// - [`GameError::MalformedPacket`] for a bad magic or a truncated file
/// - [`GameError::SaveVersion`] for another format version
/// - [`GameError::ChecksumMismatch`] if the body is corrupt
pub fn load_world<S: Straw>(mut straw: S) -> Result<World> {
    let mut magic = [0u8; 4];
    straw.get_exact(&mut magic)?;
    if magic != SAVE_MAGIC {
        return Err(GameError::MalformedPacket(format!("Not a save file: magic {:02x?}", magic)));
    }

    let found = read_u32(&mut straw)?;
    if found != SAVE_VERSION {
        return Err(GameError::SaveVersion {
            expected: SAVE_VERSION,
            found,
        });
    }

    let mut padding = [0u8; SAVE_PADDING];
    straw.get_exact(&mut padding)?;

    let body_len = read_u32(&mut straw)? as usize;
    let mut body = vec![0u8; body_len];
    InflateStraw::new(&mut straw).get_exact(&mut body)?;

    let expected = read_u32(&mut straw)?;
    let actual = CRC32.checksum(&body);
    if expected != actual {
        return Err(GameError::ChecksumMismatch { expected, actual });
    }

    let world = World::deserialize(&body)?;
    tracing::info!(frame = world.frame(), "Game loaded");
    Ok(world)
}

fn read_u32<S: Straw>(straw: &mut S) -> Result<u32> {
    let mut bytes = [0u8; 4];
    straw.get_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Save `world` to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_to_file<P: AsRef<Path>>(world: &World, path: P) -> Result<usize> {
    let file = File::create(path)?;
    save_world(world, WriterPipe::new(BufWriter::new(file)))
}

/// Load a world from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid save.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<World> {
    let file = File::open(path)?;
    load_world(ReaderStraw::new(BufReader::new(file)))
}
