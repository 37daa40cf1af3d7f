//! Protocol Messages
//!
//! Binary wire format shared with game clients.
//!
//! ```text
//! [version:1][type:1][len:1]                 len < 255
//! [version:1][type:1][255][len_hi][len_lo]   len >= 255
//! followed by `len` payload bytes
//! ```
//!
//! Integers are big-endian `i32`; strings are an `i32` byte length followed
//! by UTF-8. Everything here is pure: no I/O.

use thiserror::Error;

use crate::core::geometry::{Bounds, TilePos};

/// Protocol version written in every frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Length byte announcing a two-byte extended length.
pub const EXTENDED_LENGTH_MARKER: u8 = 255;

/// Size of the fixed header prefix.
pub const HEADER_LEN: usize = 3;

/// Size of the extended-length continuation.
pub const EXTENDED_LEN: usize = 2;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Player identifier on the wire. `0` means "not yet assigned".
pub type ClientId = i32;

// =============================================================================
// PACKET TYPES
// =============================================================================

/// Message type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Client asks to move to a tile.
    MoveRequest = 0,
    /// Server reports the authoritative position.
    PositionUpdate = 1,
    /// Server tells the client to reconnect elsewhere.
    Handoff = 2,
    /// Client sends ghost-zone width and username.
    ClientConfig = 3,
    /// Client entered a neighbor's ghost zone.
    GhostZoneEnter = 4,
    /// Client left a neighbor's ghost zone.
    GhostZoneLeave = 5,
    /// Ghost-zone width and region bounds.
    GhostZoneInfo = 6,
    /// Blocked tiles of the region.
    DeadZones = 7,
    /// Roster of every player in the region.
    PlayersSnapshot = 8,
    /// The client's assigned id.
    PlayerInfo = 9,
    /// Client marks its connection as provisional.
    ProvisionalConnection = 10,
    /// Client reports whether it is walking.
    MoveState = 11,
}

impl PacketType {
    /// Decode a type byte; unknown values yield `None`.
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => PacketType::MoveRequest,
            1 => PacketType::PositionUpdate,
            2 => PacketType::Handoff,
            3 => PacketType::ClientConfig,
            4 => PacketType::GhostZoneEnter,
            5 => PacketType::GhostZoneLeave,
            6 => PacketType::GhostZoneInfo,
            7 => PacketType::DeadZones,
            8 => PacketType::PlayersSnapshot,
            9 => PacketType::PlayerInfo,
            10 => PacketType::ProvisionalConnection,
            11 => PacketType::MoveState,
            _ => return None,
        })
    }

    /// Type byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Payload larger than a frame can describe.
    #[error("payload of {0} bytes exceeds frame limit")]
    PayloadTooLarge(usize),

    /// Payload ended before a field was complete.
    #[error("truncated payload: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset of the field.
        offset: usize,
        /// Bytes the field needed.
        needed: usize,
    },

    /// A string length was negative.
    #[error("negative string length {0}")]
    NegativeLength(i32),

    /// A string was not UTF-8.
    #[error("invalid utf-8 string")]
    InvalidUtf8,

    /// Frame header is incomplete.
    #[error("incomplete frame header")]
    IncompleteHeader,

    /// Type byte is not a known message.
    #[error("unknown packet type {0}")]
    UnknownType(u8),

    /// Type is known but not valid in this direction.
    #[error("unexpected packet type {0:?}")]
    UnexpectedType(PacketType),
}

// =============================================================================
// FRAMING
// =============================================================================

/// Decoded frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version byte.
    pub version: u8,
    /// Raw type byte.
    pub packet_type: u8,
    /// Payload length.
    pub length: usize,
}

impl FrameHeader {
    /// Whether the 3-byte prefix announces an extended length.
    pub fn needs_extension(prefix: &[u8; HEADER_LEN]) -> bool {
        prefix[2] == EXTENDED_LENGTH_MARKER
    }

    /// Build a header from its prefix and, if announced, the continuation.
    pub fn from_parts(prefix: &[u8; HEADER_LEN], extension: Option<[u8; EXTENDED_LEN]>) -> Result<Self, CodecError> {
        let length = if Self::needs_extension(prefix) {
            let ext = extension.ok_or(CodecError::IncompleteHeader)?;
            usize::from(u16::from_be_bytes(ext))
        } else {
            usize::from(prefix[2])
        };
        Ok(Self {
            version: prefix[0],
            packet_type: prefix[1],
            length,
        })
    }

    /// Bytes the header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        if self.length >= usize::from(EXTENDED_LENGTH_MARKER) {
            HEADER_LEN + EXTENDED_LEN
        } else {
            HEADER_LEN
        }
    }
}

/// A complete frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Header.
    pub header: FrameHeader,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

/// Wrap a payload in a frame.
pub fn encode_frame(packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + EXTENDED_LEN + len);
    buf.push(PROTOCOL_VERSION);
    buf.push(packet_type.as_u8());
    if len < usize::from(EXTENDED_LENGTH_MARKER) {
        buf.push(len as u8);
    } else {
        buf.push(EXTENDED_LENGTH_MARKER);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    }
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode the first frame in `buf`, returning it and the bytes consumed.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize), CodecError> {
    let prefix: [u8; HEADER_LEN] = buf
        .get(..HEADER_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(CodecError::IncompleteHeader)?;
    let extension = if FrameHeader::needs_extension(&prefix) {
        let ext: [u8; EXTENDED_LEN] = buf
            .get(HEADER_LEN..HEADER_LEN + EXTENDED_LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or(CodecError::IncompleteHeader)?;
        Some(ext)
    } else {
        None
    };
    let header = FrameHeader::from_parts(&prefix, extension)?;
    let start = header.encoded_len();
    let payload = buf
        .get(start..start + header.length)
        .ok_or(CodecError::Truncated { offset: start, needed: header.length })?
        .to_vec();
    Ok((Frame { header, payload }, start + header.length))
}

// =============================================================================
// PAYLOAD PRIMITIVES
// =============================================================================

/// Big-endian payload builder.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an `i32`.
    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Append a byte.
    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, s: &str) -> &mut Self {
        self.put_i32(s.len() as i32);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Finished payload.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Big-endian payload cursor.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    /// Read from the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let slice = self
            .buf
            .get(self.pos..self.pos + n)
            .ok_or(CodecError::Truncated { offset: self.pos, needed: n })?;
        self.pos += n;
        Ok(slice)
    }

    /// Read an `i32`.
    pub fn i32(&mut self) -> Result<i32, CodecError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a byte.
    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn string(&mut self) -> Result<String, CodecError> {
        let len = self.i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::NegativeLength(len))?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// Move to a tile.
    MoveRequest {
        /// Requested column.
        x: i32,
        /// Requested row.
        y: i32,
    },

    /// Session configuration.
    ClientConfig {
        /// Requested ghost-zone width (clamped by the server).
        ghost_zone_width: i32,
        /// Display name, if sent.
        username: Option<String>,
    },

    /// Mark the connection provisional.
    ProvisionalConnection,

    /// Walking state toggle.
    MoveState {
        /// Whether the player is walking.
        moving: bool,
    },
}

impl ClientMessage {
    /// Decode an inbound payload of a known type.
    pub fn decode(packet_type: PacketType, payload: &[u8]) -> Result<Self, CodecError> {
        let mut r = PayloadReader::new(payload);
        match packet_type {
            PacketType::MoveRequest => Ok(ClientMessage::MoveRequest { x: r.i32()?, y: r.i32()? }),
            PacketType::ClientConfig => {
                let ghost_zone_width = r.i32()?;
                let username = if r.remaining() > 0 { Some(r.string()?) } else { None };
                Ok(ClientMessage::ClientConfig { ghost_zone_width, username })
            }
            PacketType::ProvisionalConnection => Ok(ClientMessage::ProvisionalConnection),
            PacketType::MoveState => Ok(ClientMessage::MoveState { moving: r.u8()? != 0 }),
            other => Err(CodecError::UnexpectedType(other)),
        }
    }

    /// Message type.
    pub fn packet_type(&self) -> PacketType {
        match self {
            ClientMessage::MoveRequest { .. } => PacketType::MoveRequest,
            ClientMessage::ClientConfig { .. } => PacketType::ClientConfig,
            ClientMessage::ProvisionalConnection => PacketType::ProvisionalConnection,
            ClientMessage::MoveState { .. } => PacketType::MoveState,
        }
    }

    /// Encode as a full frame (client side; used by tools and tests).
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut w = PayloadWriter::new();
        match self {
            ClientMessage::MoveRequest { x, y } => {
                w.put_i32(*x).put_i32(*y);
            }
            ClientMessage::ClientConfig { ghost_zone_width, username } => {
                w.put_i32(*ghost_zone_width);
                if let Some(name) = username {
                    w.put_str(name);
                }
            }
            ClientMessage::ProvisionalConnection => {}
            ClientMessage::MoveState { moving } => {
                w.put_u8(u8::from(*moving));
            }
        }
        encode_frame(self.packet_type(), &w.finish())
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// One roster entry of a players snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerEntry {
    /// Player id.
    pub client_id: ClientId,
    /// Position.
    pub pos: TilePos,
    /// Walking flag.
    pub moving: bool,
    /// Display name.
    pub username: String,
}

/// Messages sent from server to client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    /// Authoritative position.
    PositionUpdate(TilePos),

    /// Reconnect to another region.
    Handoff {
        /// Target region.
        region: String,
        /// Target host, empty if unresolved.
        host: String,
        /// Target port, 0 if unresolved.
        port: i32,
        /// Landing tile.
        target: TilePos,
    },

    /// Entered a neighbor's ghost zone.
    GhostZoneEnter {
        /// Neighbor region.
        region: String,
        /// Neighbor host.
        host: String,
        /// Neighbor port.
        port: i32,
    },

    /// Left a neighbor's ghost zone.
    GhostZoneLeave {
        /// Neighbor region.
        region: String,
        /// Neighbor host.
        host: String,
        /// Neighbor port.
        port: i32,
    },

    /// Clamped ghost-zone width and effective bounds.
    GhostZoneInfo {
        /// Width in tiles.
        width: i32,
        /// Effective region bounds.
        bounds: Bounds,
    },

    /// Blocked tiles.
    DeadZones(Vec<TilePos>),

    /// Full roster, addressed to one recipient.
    PlayersSnapshot {
        /// Recipient's own id.
        my_id: ClientId,
        /// Every player in the region.
        players: Vec<PlayerEntry>,
    },

    /// Recipient's assigned id.
    PlayerInfo {
        /// Assigned id.
        client_id: ClientId,
    },
}

impl ServerMessage {
    /// Message type.
    pub fn packet_type(&self) -> PacketType {
        match self {
            ServerMessage::PositionUpdate(_) => PacketType::PositionUpdate,
            ServerMessage::Handoff { .. } => PacketType::Handoff,
            ServerMessage::GhostZoneEnter { .. } => PacketType::GhostZoneEnter,
            ServerMessage::GhostZoneLeave { .. } => PacketType::GhostZoneLeave,
            ServerMessage::GhostZoneInfo { .. } => PacketType::GhostZoneInfo,
            ServerMessage::DeadZones(_) => PacketType::DeadZones,
            ServerMessage::PlayersSnapshot { .. } => PacketType::PlayersSnapshot,
            ServerMessage::PlayerInfo { .. } => PacketType::PlayerInfo,
        }
    }

    /// Encode as a full frame.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut w = PayloadWriter::new();
        match self {
            ServerMessage::PositionUpdate(pos) => {
                w.put_i32(pos.x).put_i32(pos.y);
            }
            ServerMessage::Handoff { region, host, port, target } => {
                w.put_str(region).put_str(host).put_i32(*port).put_i32(target.x).put_i32(target.y);
            }
            ServerMessage::GhostZoneEnter { region, host, port }
            | ServerMessage::GhostZoneLeave { region, host, port } => {
                w.put_str(region).put_str(host).put_i32(*port);
            }
            ServerMessage::GhostZoneInfo { width, bounds } => {
                w.put_i32(*width)
                    .put_i32(bounds.min_x)
                    .put_i32(bounds.max_x)
                    .put_i32(bounds.min_y)
                    .put_i32(bounds.max_y);
            }
            ServerMessage::DeadZones(tiles) => {
                w.put_i32(tiles.len() as i32);
                for t in tiles {
                    w.put_i32(t.x).put_i32(t.y);
                }
            }
            ServerMessage::PlayersSnapshot { my_id, players } => {
                w.put_i32(*my_id).put_i32(players.len() as i32);
                for p in players {
                    w.put_i32(p.client_id)
                        .put_i32(p.pos.x)
                        .put_i32(p.pos.y)
                        .put_u8(u8::from(p.moving))
                        .put_str(&p.username);
                }
            }
            ServerMessage::PlayerInfo { client_id } => {
                w.put_i32(*client_id);
            }
        }
        encode_frame(self.packet_type(), &w.finish())
    }

    /// Decode an outbound frame (client side; used by tools and tests).
    pub fn decode(frame: &Frame) -> Result<Self, CodecError> {
        let ty = PacketType::from_u8(frame.header.packet_type)
            .ok_or(CodecError::UnknownType(frame.header.packet_type))?;
        let mut r = PayloadReader::new(&frame.payload);
        let msg = match ty {
            PacketType::PositionUpdate => ServerMessage::PositionUpdate(TilePos::new(r.i32()?, r.i32()?)),
            PacketType::Handoff => ServerMessage::Handoff {
                region: r.string()?,
                host: r.string()?,
                port: r.i32()?,
                target: TilePos::new(r.i32()?, r.i32()?),
            },
            PacketType::GhostZoneEnter => ServerMessage::GhostZoneEnter {
                region: r.string()?,
                host: r.string()?,
                port: r.i32()?,
            },
            PacketType::GhostZoneLeave => ServerMessage::GhostZoneLeave {
                region: r.string()?,
                host: r.string()?,
                port: r.i32()?,
            },
            PacketType::GhostZoneInfo => ServerMessage::GhostZoneInfo {
                width: r.i32()?,
                bounds: Bounds::new(r.i32()?, r.i32()?, r.i32()?, r.i32()?),
            },
            PacketType::DeadZones => {
                let count = r.i32()?;
                let count = usize::try_from(count).map_err(|_| CodecError::NegativeLength(count))?;
                let mut tiles = Vec::with_capacity(count.min(r.remaining() / 8));
                for _ in 0..count {
                    tiles.push(TilePos::new(r.i32()?, r.i32()?));
                }
                ServerMessage::DeadZones(tiles)
            }
            PacketType::PlayersSnapshot => {
                let my_id = r.i32()?;
                let count = r.i32()?;
                let count = usize::try_from(count).map_err(|_| CodecError::NegativeLength(count))?;
                let mut players = Vec::with_capacity(count.min(r.remaining() / 17));
                for _ in 0..count {
                    players.push(PlayerEntry {
                        client_id: r.i32()?,
                        pos: TilePos::new(r.i32()?, r.i32()?),
                        moving: r.u8()? != 0,
                        username: r.string()?,
                    });
                }
                ServerMessage::PlayersSnapshot { my_id, players }
            }
            PacketType::PlayerInfo => ServerMessage::PlayerInfo { client_id: r.i32()? },
            other => return Err(CodecError::UnexpectedType(other)),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(msg: &ServerMessage) -> ServerMessage {
        let bytes = msg.encode().unwrap();
        let (frame, used) = decode_frame(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(frame.header.version, PROTOCOL_VERSION);
        assert_eq!(frame.header.length, frame.payload.len());
        ServerMessage::decode(&frame).unwrap()
    }

    #[test]
    fn test_packet_type_bytes() {
        for b in 0u8..=11 {
            assert_eq!(PacketType::from_u8(b).unwrap().as_u8(), b);
        }
        assert_eq!(PacketType::from_u8(12), None);
        assert_eq!(PacketType::from_u8(255), None);
    }

    #[test]
    fn test_short_frame_layout() {
        let bytes = ServerMessage::PositionUpdate(TilePos::new(6, 5)).encode().unwrap();
        assert_eq!(bytes, vec![1, 1, 8, 0, 0, 0, 6, 0, 0, 0, 5]);
    }

    #[test]
    fn test_length_254_stays_short() {
        let bytes = encode_frame(PacketType::DeadZones, &[0u8; 254]).unwrap();
        assert_eq!(bytes[2], 254);
        assert_eq!(bytes.len(), HEADER_LEN + 254);
    }

    #[test]
    fn test_length_255_is_extended() {
        let bytes = encode_frame(PacketType::DeadZones, &[7u8; 255]).unwrap();
        assert_eq!(&bytes[..5], &[1, 7, 255, 0, 255]);
        let (frame, used) = decode_frame(&bytes).unwrap();
        assert_eq!(used, 5 + 255);
        assert_eq!(frame.payload.len(), 255);
    }

    #[test]
    fn test_payload_too_large() {
        let big = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode_frame(PacketType::DeadZones, &big),
            Err(CodecError::PayloadTooLarge(MAX_PAYLOAD_LEN + 1))
        );
    }

    #[test]
    fn test_truncated_frame() {
        let mut bytes = ServerMessage::PlayerInfo { client_id: 3 }.encode().unwrap();
        bytes.pop();
        assert!(matches!(decode_frame(&bytes), Err(CodecError::Truncated { .. })));
        assert_eq!(decode_frame(&[1, 2]), Err(CodecError::IncompleteHeader));
        assert_eq!(decode_frame(&[1, 2, 255, 0]), Err(CodecError::IncompleteHeader));
    }

    #[test]
    fn test_server_messages_roundtrip() {
        let messages = vec![
            ServerMessage::PositionUpdate(TilePos::new(-4, 9)),
            ServerMessage::Handoff {
                region: "cave".into(),
                host: "world-cave".into(),
                port: 9090,
                target: TilePos::new(3, 4),
            },
            ServerMessage::GhostZoneEnter { region: "east".into(), host: "10.0.0.2".into(), port: 9102 },
            ServerMessage::GhostZoneLeave { region: "east".into(), host: String::new(), port: 0 },
            ServerMessage::GhostZoneInfo { width: 2, bounds: Bounds::new(0, 9, -5, 5) },
            ServerMessage::DeadZones(vec![TilePos::new(2, 2), TilePos::new(3, 3)]),
            ServerMessage::PlayersSnapshot {
                my_id: 2,
                players: vec![
                    PlayerEntry { client_id: 1, pos: TilePos::new(1, 1), moving: true, username: "ash".into() },
                    PlayerEntry { client_id: 2, pos: TilePos::new(5, 6), moving: false, username: "Ñandú".into() },
                ],
            },
            ServerMessage::PlayerInfo { client_id: 42 },
        ];
        for msg in messages {
            assert_eq!(roundtrip(&msg), msg);
        }
    }

    #[test]
    fn test_large_dead_zones_use_extended_length() {
        let tiles: Vec<TilePos> = (0..1024).map(|i| TilePos::new(i, -i)).collect();
        let msg = ServerMessage::DeadZones(tiles);
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes[2], EXTENDED_LENGTH_MARKER);
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_client_messages_roundtrip() {
        let messages = vec![
            ClientMessage::MoveRequest { x: 6, y: 5 },
            ClientMessage::ClientConfig { ghost_zone_width: 2, username: Some("misty".into()) },
            ClientMessage::ClientConfig { ghost_zone_width: 0, username: None },
            ClientMessage::ProvisionalConnection,
            ClientMessage::MoveState { moving: true },
        ];
        for msg in messages {
            let bytes = msg.encode().unwrap();
            let (frame, _) = decode_frame(&bytes).unwrap();
            let ty = PacketType::from_u8(frame.header.packet_type).unwrap();
            assert_eq!(ClientMessage::decode(ty, &frame.payload).unwrap(), msg);
        }
    }

    #[test]
    fn test_malformed_client_payloads() {
        assert!(ClientMessage::decode(PacketType::MoveRequest, &[0, 0, 0, 1]).is_err());
        assert!(ClientMessage::decode(PacketType::MoveState, &[]).is_err());
        // Negative username length.
        let mut payload = 1i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&(-3i32).to_be_bytes());
        assert_eq!(
            ClientMessage::decode(PacketType::ClientConfig, &payload),
            Err(CodecError::NegativeLength(-3))
        );
        assert_eq!(
            ClientMessage::decode(PacketType::Handoff, &[]),
            Err(CodecError::UnexpectedType(PacketType::Handoff))
        );
    }

    proptest! {
        #[test]
        fn prop_handoff_roundtrip(
            region in "[a-z0-9-]{0,40}",
            host in "[a-z0-9.:-]{0,300}",
            port in any::<i32>(),
            x in any::<i32>(),
            y in any::<i32>(),
        ) {
            let msg = ServerMessage::Handoff { region, host, port, target: TilePos::new(x, y) };
            prop_assert_eq!(roundtrip(&msg), msg);
        }

        #[test]
        fn prop_frame_length_matches_payload(payload in proptest::collection::vec(any::<u8>(), 0..2000)) {
            let bytes = encode_frame(PacketType::PlayersSnapshot, &payload).unwrap();
            let (frame, used) = decode_frame(&bytes).unwrap();
            prop_assert_eq!(used, bytes.len());
            prop_assert_eq!(frame.payload, payload);
        }
    }
}
