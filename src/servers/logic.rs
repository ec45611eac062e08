//! The logic cycle: every loaded instance updates on a worker pool, then
//! cross-instance effects are applied on the calling thread.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::world::World;
use crate::game::entity::Entity;
use crate::game::map::{MapUpdateOutcome, PlayerInput};
use crate::game::types::{EntityId, MapInstanceKey, Position};
use crate::network::packet::{Packet, Pong};

/// Counters for one cycle, mostly for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub instances: usize,
    pub transfers: usize,
    pub batches_sent: usize,
    pub saved: Option<usize>,
    pub unloaded: usize,
}

pub struct LogicService {
    pub world: Arc<World>,
    pool: rayon::ThreadPool,
    last_save: AtomicI64,
}

impl LogicService {
    pub fn new(world: Arc<World>) -> Result<Self> {
        let threads = world.config.logic.pool_size();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("logic-{}", i))
            .build()
            .context("Failed to build logic worker pool")?;
        tracing::info!("[logic] [pool_ready] threads={}", threads);
        let now = world.now();
        Ok(Self { world, pool, last_save: AtomicI64::new(now) })
    }

    /// Loads (or creates) the character and places it in the world.
    pub fn login(&self, id: EntityId, name: &str) -> Option<MapInstanceKey> {
        let world = &self.world;
        let start = &world.config.start_point;
        let entity = match world.store.load_player(id) {
            Ok(Some(record)) => Entity::from_record(&record, MapInstanceKey::overworld(record.map_id)),
            Ok(None) => {
                tracing::info!("[logic] [new_character] player={} name={}", id, name);
                Entity::new_player(id, name, MapInstanceKey::overworld(start.map), Position::new(start.x, start.y))
            }
            Err(e) => {
                tracing::error!("[store] [load_failed] player={} error={}", id, e);
                Entity::new_player(id, name, MapInstanceKey::overworld(start.map), Position::new(start.x, start.y))
            }
        };
        let placed = world.place(entity);
        match placed {
            Some(key) => tracing::info!("[logic] [login] player={} map={}", id, key),
            None => tracing::error!("[logic] [login_failed] player={} reason=no_start_map", id),
        }
        placed
    }

    /// Saves and removes the player. Save failures are logged only.
    pub fn logout(&self, id: EntityId) {
        match self.world.remove_player(id) {
            Some(entity) => {
                self.world.save_player(&entity);
                tracing::info!("[logic] [logout] player={}", id);
            }
            None => tracing::debug!("[logic] [logout_unknown] player={}", id),
        }
    }

    /// Queues input for the player's current instance.
    pub fn submit(&self, player: EntityId, input: PlayerInput) -> bool {
        match self.world.player_instance(player) {
            Some(instance) => {
                instance.push_input(player, input);
                true
            }
            None => false,
        }
    }

    pub fn handle_packet(&self, player: EntityId, packet: Packet) {
        let input = match packet {
            Packet::Ping(ping) => {
                self.world.sink.send_packet(player, &Packet::Pong(Pong { timestamp: ping.timestamp }));
                return;
            }
            Packet::PlayerMove(p) => PlayerInput::Move(p.direction),
            Packet::EventInteract(p) => PlayerInput::Interact { event_id: p.event_id },
            Packet::EventResponse(p) => PlayerInput::EventResponse { event_id: p.event_id, response: p.response },
            Packet::PickUpItems(_) => PlayerInput::PickUpItems,
            other => {
                tracing::warn!("[logic] [unexpected_packet] player={} type={:?}", player, other.packet_type());
                return;
            }
        };
        if !self.submit(player, input) {
            tracing::debug!("[logic] [input_dropped] player={} reason=not_placed", player);
        }
    }

    /// One logic cycle at `now`.
    pub fn run_cycle(&self, now: i64) -> CycleReport {
        let world = &self.world;
        let instances = world.instances();
        let mut report = CycleReport { instances: instances.len(), ..CycleReport::default() };

        let outcomes: Vec<MapUpdateOutcome> = self.pool.install(|| {
            instances
                .par_iter()
                .map(|instance| {
                    let observers = world.observers_for(instance);
                    instance.update(now, &world.context(&observers))
                })
                .collect()
        });

        for outcome in outcomes {
            for transfer in outcome.transfers {
                report.transfers += 1;
                let id = transfer.entity.id;
                let mut entity = transfer.entity;
                entity.map = transfer.to;
                if !entity.is_player() {
                    if world.place(entity).is_none() {
                        tracing::error!("[logic] [transfer_failed] entity={} to={}", id, transfer.to);
                    }
                    continue;
                }
                match world.transfer_player(entity) {
                    Ok(Some(_)) => {}
                    Ok(None) => tracing::error!("[logic] [transfer_failed] player={} to={}", id, transfer.to),
                    Err(entity) => {
                        // logged out while in flight
                        world.save_player(&entity);
                    }
                }
            }
            for text in outcome.global_chat {
                world.broadcast_global(&text);
            }
        }

        report.batches_sent = self.pool.install(|| {
            instances
                .par_iter()
                .map(|instance| instance.send_packets(&world.observers_for(instance), world.sink.as_ref()))
                .sum()
        });

        let interval_ms = world.config.save_interval_secs as i64 * 1000;
        if now - self.last_save.load(Ordering::Relaxed) >= interval_ms {
            self.last_save.store(now, Ordering::Relaxed);
            report.saved = Some(world.save_all());
        }

        report.unloaded = world.unload_idle(now);
        report
    }

    pub fn save_all(&self) -> usize {
        self.world.save_all()
    }
}
