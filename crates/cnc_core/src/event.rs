//! Player commands and protocol messages exchanged between peers.
//!
//! Every action that changes replicated state travels as an [`Event`]
//! scheduled for a future frame. Peers exchange the encoded form and execute
//! identical events on identical frames, which is what keeps the lockstep
//! simulation in agreement.
//!
//! ## Wire format
//!
//! All integers are little-endian.
//!
//! ```text
//! [type: u8][frame: 27 bits | executed: 1 bit | 4 zero bits : u32][player: u8][payload]
//! ```
//!
//! The payload length is a function of the type alone, except for
//! `ADDPLAYER`, which carries a `u16` length prefix.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{GameError, Result};
use crate::house::{HouseId, SpecialWeapon};
use crate::math::{CellPos, Coord};
use crate::mission::Mission;
use crate::options::SpecialFlags;
use crate::production::ProductionKind;
use crate::target::{pack_cell, unpack_cell, Target};

/// Frame numbers carry 27 significant bits on the wire.
pub const FRAME_MASK: u32 = 0x07FF_FFFF;

/// Bit holding the executed flag in the packed frame word.
const EXECUTED_BIT: u32 = 1 << 27;

/// Bytes preceding every payload.
pub const HEADER_LEN: usize = 6;

/// Fixed size of a chat message payload.
pub const MESSAGE_LEN: usize = 40;

/// Fieldless discriminant of [`EventKind`], matching the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum EventType {
    Empty = 0,
    Ally,
    MegaMission,
    MegaMissionF,
    Idle,
    Scatter,
    Destruct,
    Deploy,
    Place,
    Options,
    GameSpeed,
    Produce,
    Suspend,
    Abandon,
    Primary,
    SpecialPlace,
    Exit,
    Animation,
    Repair,
    Sell,
    SellCell,
    Special,
    FrameSync,
    Message,
    ResponseTime,
    FrameInfo,
    SaveGame,
    Archive,
    AddPlayer,
    Timing,
    ProcessTime,
    ProposeDraw,
    RetractDraw,
}

impl EventType {
    /// Every type in wire order.
    pub const ALL: [Self; 33] = [
        Self::Empty,
        Self::Ally,
        Self::MegaMission,
        Self::MegaMissionF,
        Self::Idle,
        Self::Scatter,
        Self::Destruct,
        Self::Deploy,
        Self::Place,
        Self::Options,
        Self::GameSpeed,
        Self::Produce,
        Self::Suspend,
        Self::Abandon,
        Self::Primary,
        Self::SpecialPlace,
        Self::Exit,
        Self::Animation,
        Self::Repair,
        Self::Sell,
        Self::SellCell,
        Self::Special,
        Self::FrameSync,
        Self::Message,
        Self::ResponseTime,
        Self::FrameInfo,
        Self::SaveGame,
        Self::Archive,
        Self::AddPlayer,
        Self::Timing,
        Self::ProcessTime,
        Self::ProposeDraw,
        Self::RetractDraw,
    ];

    /// Type for a wire tag.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownEventType`] for tags past the last type.
    pub fn from_u8(tag: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(tag))
            .copied()
            .ok_or(GameError::UnknownEventType(tag))
    }

    /// Upper-case protocol name, as shown in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Ally => "ALLY",
            Self::MegaMission => "MEGAMISSION",
            Self::MegaMissionF => "MEGAMISSION_F",
            Self::Idle => "IDLE",
            Self::Scatter => "SCATTER",
            Self::Destruct => "DESTRUCT",
            Self::Deploy => "DEPLOY",
            Self::Place => "PLACE",
            Self::Options => "OPTIONS",
            Self::GameSpeed => "GAMESPEED",
            Self::Produce => "PRODUCE",
            Self::Suspend => "SUSPEND",
            Self::Abandon => "ABANDON",
            Self::Primary => "PRIMARY",
            Self::SpecialPlace => "SPECIAL_PLACE",
            Self::Exit => "EXIT",
            Self::Animation => "ANIMATION",
            Self::Repair => "REPAIR",
            Self::Sell => "SELL",
            Self::SellCell => "SELLCELL",
            Self::Special => "SPECIAL",
            Self::FrameSync => "FRAMESYNC",
            Self::Message => "MESSAGE",
            Self::ResponseTime => "RESPONSE_TIME",
            Self::FrameInfo => "FRAMEINFO",
            Self::SaveGame => "SAVEGAME",
            Self::Archive => "ARCHIVE",
            Self::AddPlayer => "ADDPLAYER",
            Self::Timing => "TIMING",
            Self::ProcessTime => "PROCESS_TIME",
            Self::ProposeDraw => "PROPOSE_DRAW",
            Self::RetractDraw => "RETRACT_DRAW",
        }
    }

    /// Protocol-control types that carry no player command.
    #[must_use]
    pub const fn is_protocol(self) -> bool {
        matches!(
            self,
            Self::FrameSync | Self::FrameInfo | Self::ResponseTime | Self::Timing | Self::ProcessTime
        )
    }
}

/// Payload of an event, one variant per type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Placeholder with no effect.
    Empty,
    /// Toggle alliance toward a house.
    Ally {
        /// House to ally with or break from.
        house: HouseId,
    },
    /// Give a unit a mission with a target and destination.
    MegaMission {
        /// Unit receiving the order.
        whom: Target,
        /// Mission to adopt.
        mission: Mission,
        /// Attack target.
        target: Target,
        /// Movement destination.
        destination: Target,
    },
    /// Formation variant of [`EventKind::MegaMission`].
    MegaMissionF {
        /// Unit receiving the order.
        whom: Target,
        /// Mission to adopt.
        mission: Mission,
        /// Attack target.
        target: Target,
        /// Movement destination.
        destination: Target,
        /// Formation speed.
        speed: u8,
        /// Formation maximum speed.
        max_speed: u8,
    },
    /// Stop and stand guard.
    Idle {
        /// Unit to idle.
        whom: Target,
    },
    /// Move out of the way.
    Scatter {
        /// Unit to scatter.
        whom: Target,
    },
    /// The sending house gives up.
    Destruct,
    /// Deploy a unit.
    Deploy {
        /// Unit to deploy.
        whom: Target,
    },
    /// Place a completed building.
    Place {
        /// Factory kind holding the finished object.
        kind: ProductionKind,
        /// Upper-left cell of the footprint.
        cell: CellPos,
    },
    /// Options dialog opened; no simulation effect.
    Options,
    /// Change the game speed setting.
    GameSpeed {
        /// New speed value.
        speed: u32,
    },
    /// Start production.
    Produce {
        /// Factory kind.
        kind: ProductionKind,
        /// Type index within that kind.
        type_id: u8,
    },
    /// Pause production.
    Suspend {
        /// Factory kind.
        kind: ProductionKind,
    },
    /// Cancel production with a refund.
    Abandon {
        /// Factory kind.
        kind: ProductionKind,
    },
    /// Make a factory the primary one for its kind.
    Primary {
        /// Building to promote.
        whom: Target,
    },
    /// Fire a special weapon at a cell.
    SpecialPlace {
        /// Weapon to fire.
        special: SpecialWeapon,
        /// Aim point.
        cell: CellPos,
    },
    /// Leave the game.
    Exit,
    /// Request a cosmetic animation.
    Animation {
        /// Animation index.
        anim: u8,
        /// House the animation belongs to.
        owner: HouseId,
        /// Where it plays.
        coord: Coord,
    },
    /// Toggle building repair.
    Repair {
        /// Building to repair.
        whom: Target,
    },
    /// Sell a building.
    Sell {
        /// Building to sell.
        whom: Target,
    },
    /// Sell the wall in a cell.
    SellCell {
        /// Wall cell.
        cell: CellPos,
    },
    /// Game-wide special options.
    Special {
        /// Option flags.
        flags: SpecialFlags,
    },
    /// Sync checkpoint broadcast during connection setup.
    FrameSync {
        /// Sender's frame checksum.
        crc: u32,
        /// Commands the sender has issued.
        command_count: u16,
        /// Sender's delay estimate.
        delay: u8,
    },
    /// Chat message.
    Message {
        /// Text, at most forty bytes on the wire.
        text: String,
    },
    /// New max-ahead value measured from response times.
    ResponseTime {
        /// Frames of lead time.
        max_ahead: u32,
    },
    /// Per-frame checksum broadcast.
    FrameInfo {
        /// Sender's frame checksum.
        crc: u32,
        /// Commands the sender has issued.
        command_count: u16,
        /// Sender's delay estimate.
        delay: u8,
    },
    /// Save the game on this frame.
    SaveGame,
    /// Set a unit's archive target.
    Archive {
        /// Unit to update.
        whom: Target,
        /// Location to remember.
        target: Target,
    },
    /// A player joins mid-session.
    AddPlayer {
        /// Opaque join record.
        data: Vec<u8>,
    },
    /// New pacing parameters from the host.
    Timing {
        /// Desired frames per second.
        desired_frame_rate: u16,
        /// Frames of lead time.
        max_ahead: u16,
    },
    /// Report of the sender's average frame processing time.
    ProcessTime {
        /// Average ticks per frame.
        average_ticks: u16,
    },
    /// Offer a draw.
    ProposeDraw,
    /// Withdraw a draw offer.
    RetractDraw,
}

impl EventKind {
    /// Discriminant of this payload.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Empty => EventType::Empty,
            Self::Ally { .. } => EventType::Ally,
            Self::MegaMission { .. } => EventType::MegaMission,
            Self::MegaMissionF { .. } => EventType::MegaMissionF,
            Self::Idle { .. } => EventType::Idle,
            Self::Scatter { .. } => EventType::Scatter,
            Self::Destruct => EventType::Destruct,
            Self::Deploy { .. } => EventType::Deploy,
            Self::Place { .. } => EventType::Place,
            Self::Options => EventType::Options,
            Self::GameSpeed { .. } => EventType::GameSpeed,
            Self::Produce { .. } => EventType::Produce,
            Self::Suspend { .. } => EventType::Suspend,
            Self::Abandon { .. } => EventType::Abandon,
            Self::Primary { .. } => EventType::Primary,
            Self::SpecialPlace { .. } => EventType::SpecialPlace,
            Self::Exit => EventType::Exit,
            Self::Animation { .. } => EventType::Animation,
            Self::Repair { .. } => EventType::Repair,
            Self::Sell { .. } => EventType::Sell,
            Self::SellCell { .. } => EventType::SellCell,
            Self::Special { .. } => EventType::Special,
            Self::FrameSync { .. } => EventType::FrameSync,
            Self::Message { .. } => EventType::Message,
            Self::ResponseTime { .. } => EventType::ResponseTime,
            Self::FrameInfo { .. } => EventType::FrameInfo,
            Self::SaveGame => EventType::SaveGame,
            Self::Archive { .. } => EventType::Archive,
            Self::AddPlayer { .. } => EventType::AddPlayer,
            Self::Timing { .. } => EventType::Timing,
            Self::ProcessTime { .. } => EventType::ProcessTime,
            Self::ProposeDraw => EventType::ProposeDraw,
            Self::RetractDraw => EventType::RetractDraw,
        }
    }

    /// Encoded payload size in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        const T: usize = Target::WIRE_LEN;
        match self {
            Self::Empty
            | Self::Destruct
            | Self::Options
            | Self::Exit
            | Self::SaveGame
            | Self::ProposeDraw
            | Self::RetractDraw => 0,
            Self::Ally { .. } | Self::Suspend { .. } | Self::Abandon { .. } => 1,
            Self::Produce { .. } | Self::Special { .. } | Self::ProcessTime { .. } => 2,
            Self::GameSpeed { .. }
            | Self::ResponseTime { .. }
            | Self::SellCell { .. }
            | Self::Timing { .. } => 4,
            Self::Place { .. } | Self::SpecialPlace { .. } => 5,
            Self::Idle { .. }
            | Self::Scatter { .. }
            | Self::Deploy { .. }
            | Self::Primary { .. }
            | Self::Repair { .. }
            | Self::Sell { .. } => T,
            Self::FrameSync { .. } | Self::FrameInfo { .. } => 7,
            Self::Animation { .. } => 10,
            Self::Archive { .. } => 2 * T,
            Self::MegaMission { .. } => 3 * T + 1,
            Self::MegaMissionF { .. } => 3 * T + 3,
            Self::Message { .. } => MESSAGE_LEN,
            Self::AddPlayer { data } => 2 + data.len(),
        }
    }

    fn encode_payload(&self, w: &mut dyn Write) -> Result<()> {
        match self {
            Self::Empty
            | Self::Destruct
            | Self::Options
            | Self::Exit
            | Self::SaveGame
            | Self::ProposeDraw
            | Self::RetractDraw => Ok(()),
            Self::Ally { house } => codec::write_u8(w, *house),
            Self::MegaMission {
                whom,
                mission,
                target,
                destination,
            } => {
                whom.encode(w)?;
                codec::write_u8(w, mission.as_u8())?;
                target.encode(w)?;
                destination.encode(w)
            }
            Self::MegaMissionF {
                whom,
                mission,
                target,
                destination,
                speed,
                max_speed,
            } => {
                whom.encode(w)?;
                codec::write_u8(w, mission.as_u8())?;
                target.encode(w)?;
                destination.encode(w)?;
                codec::write_u8(w, *speed)?;
                codec::write_u8(w, *max_speed)
            }
            Self::Idle { whom }
            | Self::Scatter { whom }
            | Self::Deploy { whom }
            | Self::Primary { whom }
            | Self::Repair { whom }
            | Self::Sell { whom } => whom.encode(w),
            Self::Place { kind, cell } => {
                codec::write_u8(w, kind.as_u8())?;
                codec::write_u32_le(w, pack_cell(*cell))
            }
            Self::GameSpeed { speed } => codec::write_u32_le(w, *speed),
            Self::Produce { kind, type_id } => {
                codec::write_u8(w, kind.as_u8())?;
                codec::write_u8(w, *type_id)
            }
            Self::Suspend { kind } | Self::Abandon { kind } => codec::write_u8(w, kind.as_u8()),
            Self::SpecialPlace { special, cell } => {
                codec::write_u8(w, special.as_u8())?;
                codec::write_u32_le(w, pack_cell(*cell))
            }
            Self::Animation { anim, owner, coord } => {
                codec::write_u8(w, *anim)?;
                codec::write_u8(w, *owner)?;
                codec::write_i32_le(w, coord.x)?;
                codec::write_i32_le(w, coord.y)
            }
            Self::SellCell { cell } => codec::write_u32_le(w, pack_cell(*cell)),
            Self::Special { flags } => codec::write_u16_le(w, flags.bits()),
            Self::FrameSync {
                crc,
                command_count,
                delay,
            }
            | Self::FrameInfo {
                crc,
                command_count,
                delay,
            } => {
                codec::write_u32_le(w, *crc)?;
                codec::write_u16_le(w, *command_count)?;
                codec::write_u8(w, *delay)
            }
            Self::Message { text } => {
                let mut raw = [0u8; MESSAGE_LEN];
                let bytes = text.as_bytes();
                let len = bytes.len().min(MESSAGE_LEN);
                raw[..len].copy_from_slice(&bytes[..len]);
                codec::write_bytes(w, &raw)
            }
            Self::ResponseTime { max_ahead } => codec::write_u32_le(w, *max_ahead),
            Self::Archive { whom, target } => {
                whom.encode(w)?;
                target.encode(w)
            }
            Self::AddPlayer { data } => {
                let len = u16::try_from(data.len()).map_err(|_| {
                    GameError::MalformedPacket(format!(
                        "ADDPLAYER payload of {} bytes exceeds u16",
                        data.len()
                    ))
                })?;
                codec::write_u16_le(w, len)?;
                codec::write_bytes(w, data)
            }
            Self::Timing {
                desired_frame_rate,
                max_ahead,
            } => {
                codec::write_u16_le(w, *desired_frame_rate)?;
                codec::write_u16_le(w, *max_ahead)
            }
            Self::ProcessTime { average_ticks } => codec::write_u16_le(w, *average_ticks),
        }
    }

    fn decode_payload(event_type: EventType, r: &mut dyn Read) -> Result<Self> {
        Ok(match event_type {
            EventType::Empty => Self::Empty,
            EventType::Ally => Self::Ally {
                house: codec::read_u8(r)?,
            },
            EventType::MegaMission => Self::MegaMission {
                whom: Target::decode(r)?,
                mission: read_mission(r)?,
                target: Target::decode(r)?,
                destination: Target::decode(r)?,
            },
            EventType::MegaMissionF => Self::MegaMissionF {
                whom: Target::decode(r)?,
                mission: read_mission(r)?,
                target: Target::decode(r)?,
                destination: Target::decode(r)?,
                speed: codec::read_u8(r)?,
                max_speed: codec::read_u8(r)?,
            },
            EventType::Idle => Self::Idle {
                whom: Target::decode(r)?,
            },
            EventType::Scatter => Self::Scatter {
                whom: Target::decode(r)?,
            },
            EventType::Destruct => Self::Destruct,
            EventType::Deploy => Self::Deploy {
                whom: Target::decode(r)?,
            },
            EventType::Place => Self::Place {
                kind: read_kind(r)?,
                cell: read_cell(r)?,
            },
            EventType::Options => Self::Options,
            EventType::GameSpeed => Self::GameSpeed {
                speed: codec::read_u32_le(r)?,
            },
            EventType::Produce => Self::Produce {
                kind: read_kind(r)?,
                type_id: codec::read_u8(r)?,
            },
            EventType::Suspend => Self::Suspend { kind: read_kind(r)? },
            EventType::Abandon => Self::Abandon { kind: read_kind(r)? },
            EventType::Primary => Self::Primary {
                whom: Target::decode(r)?,
            },
            EventType::SpecialPlace => {
                let raw = codec::read_u8(r)?;
                let special = SpecialWeapon::from_u8(raw).ok_or_else(|| {
                    GameError::MalformedPacket(format!("unknown special weapon {raw}"))
                })?;
                Self::SpecialPlace {
                    special,
                    cell: read_cell(r)?,
                }
            }
            EventType::Exit => Self::Exit,
            EventType::Animation => Self::Animation {
                anim: codec::read_u8(r)?,
                owner: codec::read_u8(r)?,
                coord: Coord::new(codec::read_i32_le(r)?, codec::read_i32_le(r)?),
            },
            EventType::Repair => Self::Repair {
                whom: Target::decode(r)?,
            },
            EventType::Sell => Self::Sell {
                whom: Target::decode(r)?,
            },
            EventType::SellCell => Self::SellCell { cell: read_cell(r)? },
            EventType::Special => Self::Special {
                flags: SpecialFlags::from_bits_retain(codec::read_u16_le(r)?),
            },
            EventType::FrameSync => Self::FrameSync {
                crc: codec::read_u32_le(r)?,
                command_count: codec::read_u16_le(r)?,
                delay: codec::read_u8(r)?,
            },
            EventType::Message => {
                let raw = codec::read_bytes(r, MESSAGE_LEN)?;
                let end = raw.iter().position(|&b| b == 0).unwrap_or(MESSAGE_LEN);
                Self::Message {
                    text: String::from_utf8_lossy(&raw[..end]).into_owned(),
                }
            }
            EventType::ResponseTime => Self::ResponseTime {
                max_ahead: codec::read_u32_le(r)?,
            },
            EventType::FrameInfo => Self::FrameInfo {
                crc: codec::read_u32_le(r)?,
                command_count: codec::read_u16_le(r)?,
                delay: codec::read_u8(r)?,
            },
            EventType::SaveGame => Self::SaveGame,
            EventType::Archive => Self::Archive {
                whom: Target::decode(r)?,
                target: Target::decode(r)?,
            },
            EventType::AddPlayer => {
                let len = codec::read_u16_le(r)?;
                Self::AddPlayer {
                    data: codec::read_bytes(r, usize::from(len))?,
                }
            }
            EventType::Timing => Self::Timing {
                desired_frame_rate: codec::read_u16_le(r)?,
                max_ahead: codec::read_u16_le(r)?,
            },
            EventType::ProcessTime => Self::ProcessTime {
                average_ticks: codec::read_u16_le(r)?,
            },
            EventType::ProposeDraw => Self::ProposeDraw,
            EventType::RetractDraw => Self::RetractDraw,
        })
    }
}

fn read_mission(r: &mut dyn Read) -> Result<Mission> {
    let raw = codec::read_u8(r)?;
    Mission::from_u8(raw).ok_or_else(|| GameError::MalformedPacket(format!("unknown mission {raw}")))
}

fn read_kind(r: &mut dyn Read) -> Result<ProductionKind> {
    let raw = codec::read_u8(r)?;
    ProductionKind::from_u8(raw)
        .ok_or_else(|| GameError::MalformedPacket(format!("unknown production kind {raw}")))
}

fn read_cell(r: &mut dyn Read) -> Result<CellPos> {
    Ok(unpack_cell(codec::read_u32_le(r)?))
}

/// A command scheduled for a frame, tagged with its originating player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Frame on which the event executes.
    pub frame: u32,
    /// House of the player that issued the event.
    pub player: HouseId,
    /// Set once the event has run.
    pub is_executed: bool,
    /// Type and payload.
    pub kind: EventKind,
}

impl Event {
    /// Create an event for `frame`, masking the frame to its wire width.
    #[must_use]
    pub fn new(frame: u32, player: HouseId, kind: EventKind) -> Self {
        Self {
            frame: frame & FRAME_MASK,
            player,
            is_executed: false,
            kind,
        }
    }

    /// Chat message, truncated to the wire size on a character boundary.
    #[must_use]
    pub fn message(frame: u32, player: HouseId, text: &str) -> Self {
        let mut end = text.len().min(MESSAGE_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self::new(
            frame,
            player,
            EventKind::Message {
                text: text[..end].to_string(),
            },
        )
    }

    /// Discriminant of the payload.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Total encoded size including the header.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.kind.payload_len()
    }

    /// Write the wire encoding.
    ///
    /// # Errors
    ///
    /// Fails only if the writer fails or an `ADDPLAYER` payload exceeds
    /// 65535 bytes.
    pub fn encode(&self, w: &mut dyn Write) -> Result<()> {
        codec::write_u8(w, self.event_type() as u8)?;
        let mut packed = self.frame & FRAME_MASK;
        if self.is_executed {
            packed |= EXECUTED_BIT;
        }
        codec::write_u32_le(w, packed)?;
        codec::write_u8(w, self.player)?;
        self.kind.encode_payload(w)
    }

    /// Encode into a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Event::encode`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Read one event from the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownEventType`] for an unknown tag and
    /// [`GameError::MalformedPacket`] for truncated or invalid payloads.
    pub fn decode(r: &mut dyn Read) -> Result<Self> {
        let event_type = EventType::from_u8(codec::read_u8(r)?)?;
        let packed = codec::read_u32_le(r)?;
        let player = codec::read_u8(r)?;
        let kind = EventKind::decode_payload(event_type, r)?;
        Ok(Self {
            frame: packed & FRAME_MASK,
            player,
            is_executed: packed & EXECUTED_BIT != 0,
            kind,
        })
    }
}

/// Concatenate the encodings of several events into one packet.
///
/// # Errors
///
/// See [`Event::encode`].
pub fn encode_packet(events: &[Event]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(events.iter().map(Event::encoded_len).sum());
    for event in events {
        event.encode(&mut out)?;
    }
    Ok(out)
}

/// Split a packet back into its events.
///
/// # Errors
///
/// Fails on the first record that does not decode; no partial result is
/// returned.
pub fn decode_packet(bytes: &[u8]) -> Result<Vec<Event>> {
    let mut input = bytes;
    let mut events = Vec::new();
    while !input.is_empty() {
        events.push(Event::decode(&mut input)?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_kinds() -> Vec<EventKind> {
        let whom = Target::Unit(12);
        vec![
            EventKind::Empty,
            EventKind::Ally { house: 3 },
            EventKind::MegaMission {
                whom,
                mission: Mission::Attack,
                target: Target::Building(4),
                destination: Target::Cell(CellPos::new(10, 11)),
            },
            EventKind::MegaMissionF {
                whom,
                mission: Mission::Move,
                target: Target::None,
                destination: Target::Cell(CellPos::new(1, 2)),
                speed: 100,
                max_speed: 200,
            },
            EventKind::Idle { whom },
            EventKind::Scatter { whom },
            EventKind::Destruct,
            EventKind::Deploy { whom },
            EventKind::Place {
                kind: ProductionKind::Building,
                cell: CellPos::new(5, 6),
            },
            EventKind::Options,
            EventKind::GameSpeed { speed: 4 },
            EventKind::Produce {
                kind: ProductionKind::Unit,
                type_id: 2,
            },
            EventKind::Suspend {
                kind: ProductionKind::Unit,
            },
            EventKind::Abandon {
                kind: ProductionKind::Building,
            },
            EventKind::Primary {
                whom: Target::Building(8),
            },
            EventKind::SpecialPlace {
                special: SpecialWeapon::Nuke,
                cell: CellPos::new(20, 21),
            },
            EventKind::Exit,
            EventKind::Animation {
                anim: 9,
                owner: 1,
                coord: Coord::new(1000, -20),
            },
            EventKind::Repair {
                whom: Target::Building(1),
            },
            EventKind::Sell {
                whom: Target::Building(2),
            },
            EventKind::SellCell {
                cell: CellPos::new(3, 3),
            },
            EventKind::Special {
                flags: SpecialFlags::SPEED_BUILD | SpecialFlags::INERT,
            },
            EventKind::FrameSync {
                crc: 0xDEAD_BEEF,
                command_count: 17,
                delay: 3,
            },
            EventKind::Message {
                text: "gg".to_string(),
            },
            EventKind::ResponseTime { max_ahead: 12 },
            EventKind::FrameInfo {
                crc: 0x1234_5678,
                command_count: 1,
                delay: 0,
            },
            EventKind::SaveGame,
            EventKind::Archive {
                whom,
                target: Target::Cell(CellPos::new(7, 7)),
            },
            EventKind::AddPlayer {
                data: vec![1, 2, 3, 4, 5],
            },
            EventKind::Timing {
                desired_frame_rate: 30,
                max_ahead: 16,
            },
            EventKind::ProcessTime { average_ticks: 42 },
            EventKind::ProposeDraw,
            EventKind::RetractDraw,
        ]
    }

    #[test]
    fn test_every_type_round_trips() {
        let kinds = sample_kinds();
        assert_eq!(kinds.len(), EventType::ALL.len());
        for (index, kind) in kinds.into_iter().enumerate() {
            assert_eq!(kind.event_type() as usize, index);
            let event = Event::new(1000 + index as u32, 2, kind);
            let bytes = event.to_bytes().unwrap();
            assert_eq!(bytes.len(), event.encoded_len(), "{}", event.event_type().name());
            let decoded = Event::decode(&mut bytes.as_slice()).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn test_header_layout() {
        let mut event = Event::new(0x0123_4567, 5, EventKind::Exit);
        event.is_executed = true;
        let bytes = event.to_bytes().unwrap();
        assert_eq!(bytes[0], EventType::Exit as u8);
        let packed = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        assert_eq!(packed & FRAME_MASK, 0x0123_4567);
        assert_ne!(packed & EXECUTED_BIT, 0);
        assert_eq!(packed >> 28, 0);
        assert_eq!(bytes[5], 5);
    }

    #[test]
    fn test_frame_is_masked() {
        let event = Event::new(0xFFFF_FFFF, 0, EventKind::Empty);
        assert_eq!(event.frame, FRAME_MASK);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let bytes = [33u8, 0, 0, 0, 0, 0];
        assert!(matches!(
            Event::decode(&mut bytes.as_slice()),
            Err(GameError::UnknownEventType(33))
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let event = Event::new(
            1,
            0,
            EventKind::Ally { house: 1 },
        );
        let bytes = event.to_bytes().unwrap();
        assert!(matches!(
            Event::decode(&mut &bytes[..bytes.len() - 1]),
            Err(GameError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_message_truncates_on_char_boundary() {
        let long = "é".repeat(30);
        let event = Event::message(0, 0, &long);
        match &event.kind {
            EventKind::Message { text } => {
                assert!(text.len() <= MESSAGE_LEN);
                assert_eq!(text.len() % 2, 0);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        let decoded = Event::decode(&mut event.to_bytes().unwrap().as_slice()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_packet_round_trip() {
        let events: Vec<Event> = sample_kinds()
            .into_iter()
            .map(|kind| Event::new(7, 1, kind))
            .collect();
        let packet = encode_packet(&events).unwrap();
        assert_eq!(decode_packet(&packet).unwrap(), events);
        assert!(decode_packet(&[]).unwrap().is_empty());
    }
}
