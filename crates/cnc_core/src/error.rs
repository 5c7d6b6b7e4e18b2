//! Error types for the lockstep simulation.
//!
//! Queue congestion and duplicate packets are routine flow control and are
//! reported through `Option`/`bool` returns, never through [`GameError`].

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },

    /// An event arrived after the frame it was scheduled for.
    #[error("Packet received too late: event for frame {frame} from player {player} at frame {current_frame}")]
    PacketTooLate {
        /// Frame the event was scheduled to execute on.
        frame: u32,
        /// Frame the simulation had already reached.
        current_frame: u32,
        /// Originating player.
        player: u8,
    },

    /// A packet or record could not be decoded.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// An event record carried a type tag outside the known range.
    #[error("Unknown event type: {0}")]
    UnknownEventType(u8),

    /// Save file written by an incompatible version.
    #[error("Save version mismatch: expected {expected}, found {found}")]
    SaveVersion {
        /// Version this build reads.
        expected: u32,
        /// Version stored in the file.
        found: u32,
    },

    /// Stored checksum does not match the data.
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum recorded in the stream.
        expected: u32,
        /// Checksum computed over the data read.
        actual: u32,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
