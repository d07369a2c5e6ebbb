//! Packet codec for the Pong protocol.
//!
//! Every packet starts with an `i32` kind tag followed by a fixed,
//! kind-specific sequence of primitive fields. Fields are appended in order
//! by [`PacketWriter`] and consumed in the same order by [`PacketReader`];
//! primitives use bincode's fixed-width little-endian layout (`bool` is one
//! byte, strings carry a `u64` length prefix).
//!
//! The layout carries no self-description, so decoding additionally checks
//! that the tag is known, that the payload is complete and that nothing is
//! left over once the kind's fields have been read.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Upper bound for a whole encoded packet.
pub const MAX_PACKET_LEN: usize = 1024;
/// Upper bound for any string field.
pub const MAX_TEXT_LEN: usize = 256;

/// Wire tags. Values below 8 are reserved for transport-level messages; the
/// diagnostic text kind lives there so every peer understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PacketKind {
    Server = 1,
    PlayerMovingUp = 9,
    PlayerMovingDown = 10,
    PlayerReady = 11,
    PlayerConnected = 12,
    PlayerDisconnected = 13,
    PlayerRequestPeers = 14,
    PlayerScore = 15,
    PlayerHit = 16,
    BallBounce = 17,
    BallReset = 18,
    BallVelocity = 19,
    BallPosition = 20,
    GameStarted = 21,
    GameEnded = 22,
    PlayerCountdown = 23,
}

impl TryFrom<i32> for PacketKind {
    type Error = CodecError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let kind = match value {
            1 => PacketKind::Server,
            9 => PacketKind::PlayerMovingUp,
            10 => PacketKind::PlayerMovingDown,
            11 => PacketKind::PlayerReady,
            12 => PacketKind::PlayerConnected,
            13 => PacketKind::PlayerDisconnected,
            14 => PacketKind::PlayerRequestPeers,
            15 => PacketKind::PlayerScore,
            16 => PacketKind::PlayerHit,
            17 => PacketKind::BallBounce,
            18 => PacketKind::BallReset,
            19 => PacketKind::BallVelocity,
            20 => PacketKind::BallPosition,
            21 => PacketKind::GameStarted,
            22 => PacketKind::GameEnded,
            23 => PacketKind::PlayerCountdown,
            other => return Err(CodecError::UnknownKind(other)),
        };
        Ok(kind)
    }
}

/// Errors raised while encoding or decoding a packet.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unknown packet kind `{0}`")]
    UnknownKind(i32),
    #[error("packet ended before all fields were read")]
    Truncated,
    #[error("{count} unread bytes after a {kind:?} packet")]
    TrailingBytes { kind: PacketKind, count: usize },
    #[error("text field of {0} bytes is too long")]
    TextTooLong(usize),
    #[error("malformed field: {0}")]
    Malformed(String),
}

impl From<bincode::Error> for CodecError {
    fn from(err: bincode::Error) -> Self {
        match err.as_ref() {
            bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                CodecError::Truncated
            }
            // The size limit only trips when a length prefix points past the packet.
            bincode::ErrorKind::SizeLimit => CodecError::Truncated,
            other => CodecError::Malformed(other.to_string()),
        }
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PACKET_LEN as u64)
}

/// Full state of the already-connected player, returned to a newcomer that
/// sent [`Packet::RequestPeers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    pub right_side: bool,
    pub score: u32,
    pub ready: bool,
    pub y: f32,
    pub moving_down: bool,
    pub moving_up: bool,
}

/// Every message exchanged between client and server.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Human-readable diagnostic text.
    Server { message: String },
    PlayerMovingUp { active: bool },
    PlayerMovingDown { active: bool },
    PlayerReady { ready: bool },
    PlayerConnected { id: u32, right_side: bool },
    PlayerDisconnected { id: u32 },
    /// Client to server: ask for the state of the other player.
    RequestPeers,
    /// Server to client: answer to [`Packet::RequestPeers`]. Shares its tag.
    PeerState(PeerState),
    PlayerScore { right_side: bool, score: i32 },
    PlayerHit,
    BallBounce,
    BallReset,
    BallVelocity { x: f32, y: f32 },
    BallPosition { x: f32, y: f32 },
    GameStarted,
    GameEnded,
    PlayerCountdown { text: String },
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Server { .. } => PacketKind::Server,
            Packet::PlayerMovingUp { .. } => PacketKind::PlayerMovingUp,
            Packet::PlayerMovingDown { .. } => PacketKind::PlayerMovingDown,
            Packet::PlayerReady { .. } => PacketKind::PlayerReady,
            Packet::PlayerConnected { .. } => PacketKind::PlayerConnected,
            Packet::PlayerDisconnected { .. } => PacketKind::PlayerDisconnected,
            Packet::RequestPeers | Packet::PeerState(_) => PacketKind::PlayerRequestPeers,
            Packet::PlayerScore { .. } => PacketKind::PlayerScore,
            Packet::PlayerHit => PacketKind::PlayerHit,
            Packet::BallBounce => PacketKind::BallBounce,
            Packet::BallReset => PacketKind::BallReset,
            Packet::BallVelocity { .. } => PacketKind::BallVelocity,
            Packet::BallPosition { .. } => PacketKind::BallPosition,
            Packet::GameStarted => PacketKind::GameStarted,
            Packet::GameEnded => PacketKind::GameEnded,
            Packet::PlayerCountdown { .. } => PacketKind::PlayerCountdown,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = PacketWriter::new(self.kind())?;
        match self {
            Packet::Server { message } => {
                writer.write_text(message)?;
            }
            Packet::PlayerMovingUp { active } | Packet::PlayerMovingDown { active } => {
                writer.write(active)?;
            }
            Packet::PlayerReady { ready } => {
                writer.write(ready)?;
            }
            Packet::PlayerConnected { id, right_side } => {
                writer.write(id)?.write(right_side)?;
            }
            Packet::PlayerDisconnected { id } => {
                writer.write(id)?;
            }
            Packet::PeerState(state) => {
                writer
                    .write(&state.right_side)?
                    .write(&state.score)?
                    .write(&state.ready)?
                    .write(&state.y)?
                    .write(&state.moving_down)?
                    .write(&state.moving_up)?;
            }
            Packet::PlayerScore { right_side, score } => {
                writer.write(right_side)?.write(score)?;
            }
            Packet::BallVelocity { x, y } | Packet::BallPosition { x, y } => {
                writer.write(x)?.write(y)?;
            }
            Packet::PlayerCountdown { text } => {
                writer.write_text(text)?;
            }
            Packet::RequestPeers
            | Packet::PlayerHit
            | Packet::BallBounce
            | Packet::BallReset
            | Packet::GameStarted
            | Packet::GameEnded => {}
        }
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, CodecError> {
        let mut reader = PacketReader::new(bytes);
        let kind = reader.read_kind()?;
        let packet = match kind {
            PacketKind::Server => Packet::Server {
                message: reader.read_text()?,
            },
            PacketKind::PlayerMovingUp => Packet::PlayerMovingUp {
                active: reader.read()?,
            },
            PacketKind::PlayerMovingDown => Packet::PlayerMovingDown {
                active: reader.read()?,
            },
            PacketKind::PlayerReady => Packet::PlayerReady {
                ready: reader.read()?,
            },
            PacketKind::PlayerConnected => Packet::PlayerConnected {
                id: reader.read()?,
                right_side: reader.read()?,
            },
            PacketKind::PlayerDisconnected => Packet::PlayerDisconnected {
                id: reader.read()?,
            },
            // The request travels without payload; only the answer carries state.
            PacketKind::PlayerRequestPeers if reader.is_empty() => Packet::RequestPeers,
            PacketKind::PlayerRequestPeers => Packet::PeerState(PeerState {
                right_side: reader.read()?,
                score: reader.read()?,
                ready: reader.read()?,
                y: reader.read()?,
                moving_down: reader.read()?,
                moving_up: reader.read()?,
            }),
            PacketKind::PlayerScore => Packet::PlayerScore {
                right_side: reader.read()?,
                score: reader.read()?,
            },
            PacketKind::PlayerHit => Packet::PlayerHit,
            PacketKind::BallBounce => Packet::BallBounce,
            PacketKind::BallReset => Packet::BallReset,
            PacketKind::BallVelocity => Packet::BallVelocity {
                x: reader.read()?,
                y: reader.read()?,
            },
            PacketKind::BallPosition => Packet::BallPosition {
                x: reader.read()?,
                y: reader.read()?,
            },
            PacketKind::GameStarted => Packet::GameStarted,
            PacketKind::GameEnded => Packet::GameEnded,
            PacketKind::PlayerCountdown => Packet::PlayerCountdown {
                text: reader.read_text()?,
            },
        };
        reader.finish(kind)?;
        Ok(packet)
    }
}

/// Owned output buffer for one packet. Dropping it on an early return
/// releases the buffer.
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new(kind: PacketKind) -> Result<Self, CodecError> {
        let mut writer = Self {
            buffer: Vec::with_capacity(32),
        };
        writer.write(&(kind as i32))?;
        Ok(writer)
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, CodecError> {
        wire_options().serialize_into(&mut self.buffer, value)?;
        Ok(self)
    }

    pub fn write_text(&mut self, text: &str) -> Result<&mut Self, CodecError> {
        if text.len() > MAX_TEXT_LEN {
            return Err(CodecError::TextTooLong(text.len()));
        }
        self.write(&text)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Sequential reader over one received packet.
pub struct PacketReader<'a> {
    remaining: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }

    pub fn read_kind(&mut self) -> Result<PacketKind, CodecError> {
        let tag: i32 = self.read()?;
        PacketKind::try_from(tag)
    }

    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        Ok(wire_options().deserialize_from(&mut self.remaining)?)
    }

    pub fn read_text(&mut self) -> Result<String, CodecError> {
        let text: String = self.read()?;
        if text.len() > MAX_TEXT_LEN {
            return Err(CodecError::TextTooLong(text.len()));
        }
        Ok(text)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Fails if the packet still holds bytes its kind does not account for.
    pub fn finish(self, kind: PacketKind) -> Result<(), CodecError> {
        if self.remaining.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                kind,
                count: self.remaining.len(),
            })
        }
    }
}
