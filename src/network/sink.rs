//! Outbound packet delivery.
//!
//! The simulation only ever sees [`PacketSink`]; sending is fire-and-forget.
//! [`ChannelSink`] feeds per-connection channels drained by the TCP writer
//! tasks. [`RecordingSink`] keeps everything for inspection.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::codec::PacketCodec;
use super::packet::{Packet, PacketType};
use crate::game::types::EntityId;

pub trait PacketSink: Send + Sync {
    fn send_packet(&self, player: EntityId, packet: &Packet);

    fn broadcast(&self, players: &[EntityId], packet: &Packet) {
        for player in players {
            self.send_packet(*player, packet);
        }
    }
}

/// Routes encoded packets to connected clients.
pub struct ChannelSink {
    codec: PacketCodec,
    clients: DashMap<EntityId, mpsc::UnboundedSender<Bytes>>,
}

impl ChannelSink {
    pub fn new(codec: PacketCodec) -> Self {
        Self { codec, clients: DashMap::new() }
    }

    pub fn register(&self, player: EntityId, tx: mpsc::UnboundedSender<Bytes>) {
        self.clients.insert(player, tx);
    }

    pub fn unregister(&self, player: EntityId) {
        self.clients.remove(&player);
    }

    pub fn is_connected(&self, player: EntityId) -> bool {
        self.clients.contains_key(&player)
    }

    pub fn connected(&self) -> Vec<EntityId> {
        self.clients.iter().map(|c| *c.key()).collect()
    }

    fn encode(&self, packet: &Packet) -> Option<Bytes> {
        match self.codec.serialize(packet) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("[packet] [encode_failed] type={:?} error={}", packet.packet_type(), e);
                None
            }
        }
    }

    fn deliver(&self, player: EntityId, bytes: Bytes) {
        let closed = match self.clients.get(&player) {
            Some(tx) => tx.send(bytes).is_err(),
            None => false,
        };
        if closed {
            tracing::debug!("[packet] [client_gone] player={}", player);
            self.clients.remove(&player);
        }
    }
}

impl PacketSink for ChannelSink {
    fn send_packet(&self, player: EntityId, packet: &Packet) {
        if !self.clients.contains_key(&player) {
            return;
        }
        if let Some(bytes) = self.encode(packet) {
            self.deliver(player, bytes);
        }
    }

    /// Encodes once for every recipient.
    fn broadcast(&self, players: &[EntityId], packet: &Packet) {
        if !players.iter().any(|p| self.clients.contains_key(p)) {
            return;
        }
        let Some(bytes) = self.encode(packet) else {
            return;
        };
        for player in players {
            self.deliver(*player, bytes.clone());
        }
    }
}

/// Drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl PacketSink for NullSink {
    fn send_packet(&self, _player: EntityId, _packet: &Packet) {}
}

/// Keeps every packet sent, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(EntityId, Packet)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(EntityId, Packet)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn packets_for(&self, player: EntityId) -> Vec<Packet> {
        self.sent
            .lock()
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, packet)| packet.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn count_of(&self, packet_type: PacketType) -> usize {
        self.sent.lock().iter().filter(|(_, p)| p.packet_type() == packet_type).count()
    }
}

impl PacketSink for RecordingSink {
    fn send_packet(&self, player: EntityId, packet: &Packet) {
        self.sent.lock().push((player, packet.clone()));
    }
}
