//! Two-layer packet codec.
//!
//! The payload is encoded with bincode, wrapped in an [`Envelope`] carrying
//! the packet tag, and the envelope is zlib-compressed as one block.
//! Decoding never panics: any malformed input comes back as a
//! [`PacketError`] (or `None` from [`PacketCodec::deserialize`]).

use std::io::Write;

use bincode::Options;
use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, DecompressError, FlushDecompress, Status};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::packet::{Packet, PacketDirection, PacketType};

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompression(#[from] DecompressError),
    #[error("compressed block is truncated")]
    Truncated,
    #[error("encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("unknown packet type {0:#06x}")]
    UnknownType(u16),
    #[error("packet type {0:?} is not accepted from clients")]
    WrongDirection(PacketType),
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    packet_type: u16,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    level: u32,
    max_size: usize,
}

impl PacketCodec {
    pub fn new(level: u32, max_size: usize) -> Self {
        Self { level: level.min(9), max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Decoding options; the limit caps allocations driven by length
    /// prefixes in untrusted input.
    fn options(&self) -> impl Options + Copy {
        bincode::DefaultOptions::new()
            .with_limit(self.max_size as u64)
            .reject_trailing_bytes()
    }

    pub fn serialize(&self, packet: &Packet) -> Result<Bytes, PacketError> {
        let options = bincode::DefaultOptions::new();
        let envelope = Envelope {
            packet_type: packet.packet_type().tag(),
            data: packet.encode_payload(options)?,
        };
        let raw = options.serialize(&envelope)?;
        if raw.len() > self.max_size {
            return Err(PacketError::TooLarge { limit: self.max_size });
        }

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(self.level));
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;
        if compressed.len() > self.max_size {
            return Err(PacketError::TooLarge { limit: self.max_size });
        }
        Ok(Bytes::from(compressed))
    }

    pub fn try_deserialize(&self, bytes: &[u8]) -> Result<Packet, PacketError> {
        if bytes.len() > self.max_size {
            return Err(PacketError::TooLarge { limit: self.max_size });
        }

        // one byte past the limit tells an oversized block from an exact fit
        let mut raw = Vec::with_capacity(self.max_size + 1);
        let status = Decompress::new(true).decompress_vec(bytes, &mut raw, FlushDecompress::Finish)?;
        if raw.len() > self.max_size {
            return Err(PacketError::TooLarge { limit: self.max_size });
        }
        if status != Status::StreamEnd {
            return Err(PacketError::Truncated);
        }

        let options = self.options();
        let envelope: Envelope = options.deserialize(&raw)?;
        let packet_type =
            PacketType::from_tag(envelope.packet_type).ok_or(PacketError::UnknownType(envelope.packet_type))?;
        let packet = Packet::decode_payload(packet_type, &envelope.data, options)?;
        Ok(packet)
    }

    /// Decodes `bytes`, logging and discarding anything malformed.
    pub fn deserialize(&self, bytes: &[u8]) -> Option<Packet> {
        match self.try_deserialize(bytes) {
            Ok(packet) => Some(packet),
            Err(e) => {
                tracing::warn!("[packet] [decode_failed] len={} error={}", bytes.len(), e);
                None
            }
        }
    }

    /// Like [`Self::try_deserialize`] but only accepts client packets.
    pub fn decode_client(&self, bytes: &[u8]) -> Result<Packet, PacketError> {
        let packet = self.try_deserialize(bytes)?;
        let packet_type = packet.packet_type();
        if packet_type.direction() != PacketDirection::ClientToServer {
            return Err(PacketError::WrongDirection(packet_type));
        }
        Ok(packet)
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(6, 65536)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{Direction, EntityId, MapInstanceKey, Position};
    use crate::network::packet::{
        ActionMessage, AnimationAnchor, AnimationUpdate, EventDialog, JoinGame, MapBatch, MapChanged,
        MessageColor, MovementUpdate, Ping, PlayerMove,
    };
    use uuid::Uuid;

    fn samples() -> Vec<Packet> {
        let entity = EntityId::new();
        vec![
            Ping { timestamp: -42 }.into(),
            JoinGame { player_id: entity, name: "Ayla".into() }.into(),
            PlayerMove { direction: Direction::Left }.into(),
            MapChanged {
                map: MapInstanceKey::new(Uuid::new_v4(), Uuid::new_v4()),
                position: Position { x: 3, y: 9, z: 1 },
                direction: Direction::Up,
            }
            .into(),
            MapBatch {
                movements: vec![MovementUpdate {
                    entity,
                    position: Position::new(1, 1),
                    direction: Direction::Down,
                    correction: true,
                }],
                animations: vec![AnimationUpdate {
                    animation_id: Uuid::new_v4(),
                    anchor: AnimationAnchor::Tile(Position::new(2, 2)),
                    direction: Direction::Right,
                }],
                action_messages: vec![ActionMessage {
                    position: Position::new(0, 0),
                    text: "-12".into(),
                    color: MessageColor::Damage,
                }],
            }
            .into(),
            EventDialog { event_id: Uuid::new_v4(), text: "Well met.".into(), options: vec!["Hi".into()] }.into(),
        ]
    }

    #[test]
    fn test_round_trip() {
        let codec = PacketCodec::default();
        for packet in samples() {
            let bytes = codec.serialize(&packet).unwrap();
            assert_eq!(codec.deserialize(&bytes), Some(packet));
        }
    }

    #[test]
    fn test_garbage_and_truncation_are_rejected() {
        let codec = PacketCodec::default();
        assert!(codec.deserialize(&[]).is_none());
        assert!(codec.deserialize(&[0x78, 0x9c, 0xff, 0x00, 0x13]).is_none());

        let bytes = codec.serialize(&samples()[1]).unwrap();
        for cut in [1, bytes.len() / 2, bytes.len() - 1] {
            assert!(codec.deserialize(&bytes[..cut]).is_none(), "cut at {}", cut);
        }
    }

    fn envelope_bytes(packet_type: u16, data: Vec<u8>) -> Vec<u8> {
        let codec = PacketCodec::default();
        let raw = codec.options().serialize(&Envelope { packet_type, data }).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_unknown_tag_and_mismatched_payload() {
        let codec = PacketCodec::default();
        assert!(matches!(
            codec.try_deserialize(&envelope_bytes(0x7777, vec![])),
            Err(PacketError::UnknownType(0x7777))
        ));
        // a Ping payload declared as JoinGame
        let ping = codec.options().serialize(&Ping { timestamp: 1 }).unwrap();
        let bytes = envelope_bytes(PacketType::JoinGame.tag(), ping);
        assert!(codec.deserialize(&bytes).is_none());
        // trailing bytes after a valid payload
        let mut ping = codec.options().serialize(&Ping { timestamp: 1 }).unwrap();
        ping.push(0);
        assert!(codec.deserialize(&envelope_bytes(PacketType::Ping.tag(), ping)).is_none());
    }

    #[test]
    fn test_size_limits() {
        let codec = PacketCodec::new(6, 1024);
        let big = EventDialog { event_id: Uuid::nil(), text: "x".repeat(4096), options: vec![] };
        assert!(matches!(codec.serialize(&big.clone().into()), Err(PacketError::TooLarge { .. })));

        // compresses well below the limit but inflates past it
        let roomy = PacketCodec::new(9, 65536);
        let bytes = roomy.serialize(&big.into()).unwrap();
        assert!(bytes.len() < 1024);
        assert!(matches!(codec.try_deserialize(&bytes), Err(PacketError::TooLarge { .. })));
    }

    #[test]
    fn test_decode_client_rejects_server_packets() {
        let codec = PacketCodec::default();
        let bytes = codec.serialize(&Ping { timestamp: 1 }.into()).unwrap();
        assert!(codec.decode_client(&bytes).is_ok());
        let bytes = codec
            .serialize(&EventDialog { event_id: Uuid::nil(), text: String::new(), options: vec![] }.into())
            .unwrap();
        assert!(matches!(codec.decode_client(&bytes), Err(PacketError::WrongDirection(PacketType::EventDialog))));
    }
}
