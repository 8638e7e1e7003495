//! The serial wire protocol spoken between a host and the vexplot.
//!
//! The protocol is tiny and has no framing: the host sends one opcode byte,
//! followed by a four-byte payload for the two motion commands. Once the
//! plotter has finished with a command it writes back [`READY`]. The host
//! must not send the next command before that acknowledgment arrives.
//!
//! Coordinates are measured in motor-encoder units. They're signed, but on
//! the wire they are shifted by [`COORD_OFFSET`] and sent as little-endian
//! `u16`s.

#![cfg_attr(not(feature = "std"), no_std)]

use serde::{Deserialize, Serialize};

mod ack;

pub use ack::AckMatcher;

/// Written by the plotter after every command it has finished processing.
pub const READY: [u8; 6] = [b'\n', b'V', b'P', b'_', 0x01, b'\n'];

/// Added to every coordinate before it goes on the wire.
pub const COORD_OFFSET: i32 = 10000;

/// The smallest coordinate that fits in the wire encoding.
pub const COORD_MIN: i32 = -COORD_OFFSET;

/// The largest coordinate that fits in the wire encoding.
pub const COORD_MAX: i32 = u16::MAX as i32 - COORD_OFFSET;

/// Number of payload bytes following a `Draw` or `Move` opcode.
pub const PAYLOAD_LEN: usize = 4;

/// The longest possible encoded command.
pub const MAX_CMD_LEN: usize = 1 + PAYLOAD_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unrecognized opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("coordinate {0} doesn't fit in the range {min}..={max}", min = COORD_MIN, max = COORD_MAX)]
    CoordinateOutOfRange(i32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Setup = 1,
    Draw = 2,
    Move = 3,
    Finish = 4,
}

impl Opcode {
    /// How many payload bytes follow this opcode.
    pub fn payload_len(self) -> usize {
        match self {
            Opcode::Draw | Opcode::Move => PAYLOAD_LEN,
            Opcode::Setup | Opcode::Finish => 0,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Error> {
        match byte {
            1 => Ok(Opcode::Setup),
            2 => Ok(Opcode::Draw),
            3 => Ok(Opcode::Move),
            4 => Ok(Opcode::Finish),
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmd {
    /// Run the calibration sequence.
    Setup,
    /// Lower the pen and move to this position.
    Draw { x: i32, y: i32 },
    /// Raise the pen and move to this position.
    Move { x: i32, y: i32 },
    /// Raise the pen and park.
    Finish,
}

impl Cmd {
    pub fn opcode(&self) -> Opcode {
        match self {
            Cmd::Setup => Opcode::Setup,
            Cmd::Draw { .. } => Opcode::Draw,
            Cmd::Move { .. } => Opcode::Move,
            Cmd::Finish => Opcode::Finish,
        }
    }

    /// Builds a command from an opcode and its (already read) payload.
    ///
    /// `payload` is ignored for opcodes that don't take one.
    pub fn from_parts(opcode: Opcode, payload: [u8; PAYLOAD_LEN]) -> Cmd {
        match opcode {
            Opcode::Setup => Cmd::Setup,
            Opcode::Finish => Cmd::Finish,
            Opcode::Draw | Opcode::Move => {
                let (x, y) = decode_point(payload);
                if opcode == Opcode::Draw {
                    Cmd::Draw { x, y }
                } else {
                    Cmd::Move { x, y }
                }
            }
        }
    }

    /// Decodes a whole command from a byte slice, returning it along with
    /// the number of bytes used. Returns `Ok(None)` if `buf` doesn't yet
    /// hold a complete command.
    pub fn decode(buf: &[u8]) -> Result<Option<(Cmd, usize)>, Error> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        let opcode = Opcode::try_from(first)?;
        let len = 1 + opcode.payload_len();
        if buf.len() < len {
            return Ok(None);
        }
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[..len - 1].copy_from_slice(&buf[1..len]);
        Ok(Some((Cmd::from_parts(opcode, payload), len)))
    }

    pub fn encode(&self) -> Result<heapless::Vec<u8, MAX_CMD_LEN>, Error> {
        let mut buf = heapless::Vec::new();
        // The capacity covers the longest command, so these pushes can't fail.
        let _ = buf.push(self.opcode() as u8);
        if let Cmd::Draw { x, y } | Cmd::Move { x, y } = *self {
            let _ = buf.extend_from_slice(&encode_coord(x)?);
            let _ = buf.extend_from_slice(&encode_coord(y)?);
        }
        Ok(buf)
    }
}

pub fn encode_coord(v: i32) -> Result<[u8; 2], Error> {
    if !(COORD_MIN..=COORD_MAX).contains(&v) {
        return Err(Error::CoordinateOutOfRange(v));
    }
    Ok(((v + COORD_OFFSET) as u16).to_le_bytes())
}

pub fn decode_coord(bytes: [u8; 2]) -> i32 {
    bytes[0] as i32 + bytes[1] as i32 * 256 - COORD_OFFSET
}

/// Splits a four-byte payload into its `(x, y)` coordinates.
pub fn decode_point(payload: [u8; PAYLOAD_LEN]) -> (i32, i32) {
    (
        decode_coord([payload[0], payload[1]]),
        decode_coord([payload[2], payload[3]]),
    )
}
