//! Per-cycle outgoing update batch.
//!
//! Updates are collected while the instance updates and flushed once at the
//! end of the cycle, so each observer gets at most one [`MapBatch`] per
//! cycle. Updates tagged with a player only reach that player.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::game::types::EntityId;
use crate::network::packet::{ActionMessage, AnimationUpdate, MapBatch, MovementUpdate, Packet};
use crate::network::sink::PacketSink;

#[derive(Debug, Default)]
struct Buckets {
    global: MapBatch,
    private: HashMap<EntityId, MapBatch>,
}

impl Buckets {
    fn bucket(&mut self, player: Option<EntityId>) -> &mut MapBatch {
        match player {
            Some(player) => self.private.entry(player).or_default(),
            None => &mut self.global,
        }
    }
}

#[derive(Debug, Default)]
pub struct MovementBatch {
    inner: Mutex<Buckets>,
}

impl MovementBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_movement(&self, update: MovementUpdate, player: Option<EntityId>) {
        self.inner.lock().bucket(player).movements.push(update);
    }

    pub fn add_animation(&self, update: AnimationUpdate, player: Option<EntityId>) {
        self.inner.lock().bucket(player).animations.push(update);
    }

    pub fn add_action_message(&self, message: ActionMessage, player: Option<EntityId>) {
        self.inner.lock().bucket(player).action_messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.global.is_empty() && inner.private.values().all(MapBatch::is_empty)
    }

    /// Sends one packet per observer with anything to see and clears the
    /// batch. Private updates for players not in `observers` are dropped.
    pub fn send_packets(&self, observers: &[EntityId], sink: &dyn PacketSink) -> usize {
        let Buckets { global, mut private } = std::mem::take(&mut *self.inner.lock());

        let mut sent = 0;
        for observer in observers {
            let own = private.remove(observer);
            let packet = match own {
                None if global.is_empty() => continue,
                None => global.clone(),
                Some(own) => {
                    let mut merged = global.clone();
                    merged.movements.extend(own.movements);
                    merged.animations.extend(own.animations);
                    merged.action_messages.extend(own.action_messages);
                    if merged.is_empty() {
                        continue;
                    }
                    merged
                }
            };
            sink.send_packet(*observer, &Packet::MapBatch(packet));
            sent += 1;
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{Direction, Position};
    use crate::network::sink::RecordingSink;

    fn movement(entity: EntityId) -> MovementUpdate {
        MovementUpdate { entity, position: Position::new(1, 2), direction: Direction::Up, correction: false }
    }

    #[test]
    fn test_private_updates_only_reach_their_player() {
        let batch = MovementBatch::new();
        let sink = RecordingSink::new();
        let (a, b) = (EntityId::new(), EntityId::new());

        batch.add_movement(movement(a), None);
        batch.add_movement(movement(b), Some(b));

        assert_eq!(batch.send_packets(&[a, b], &sink), 2);
        let for_a = sink.packets_for(a);
        let for_b = sink.packets_for(b);
        match (&for_a[..], &for_b[..]) {
            ([Packet::MapBatch(pa)], [Packet::MapBatch(pb)]) => {
                assert_eq!(pa.movements.len(), 1);
                assert_eq!(pb.movements.len(), 2);
            }
            other => panic!("unexpected packets {:?}", other),
        }
    }

    #[test]
    fn test_send_clears_and_skips_empty() {
        let batch = MovementBatch::new();
        let sink = RecordingSink::new();
        let a = EntityId::new();
        assert_eq!(batch.send_packets(&[a], &sink), 0);

        batch.add_movement(movement(a), None);
        assert!(!batch.is_empty());
        assert_eq!(batch.send_packets(&[a], &sink), 1);
        assert!(batch.is_empty());
        assert_eq!(batch.send_packets(&[a], &sink), 0);
        assert_eq!(sink.count(), 1);
    }
}
