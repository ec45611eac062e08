//! Map instances and their per-cycle update.
//!
//! A [`MapInstance`] owns every entity, event, trap, projectile and floor
//! item of one `(map, instance)` pair. [`MapInstance::update`] runs once per
//! logic cycle on a single worker; other threads only queue input or read the
//! concurrent tables. Visible changes are batched and flushed with
//! [`MapInstance::send_packets`].

pub mod batch;
pub mod items;
pub mod projectile;
pub mod trap;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use self::batch::MovementBatch;
use self::items::{MapItem, MapItems};
use self::projectile::{MapProjectile, ProjectileStep};
use self::trap::MapTrap;
use super::combat::{apply_spell, can_affect, SpellOutcome};
use super::entity::{CombatantProfile, Entity, EntityKind};
use super::events::{Event, EventKey, EventScope, MapEffect, VmState};
use super::movement::StepOutcome;
use super::types::{Direction, EntityId, MapInstanceKey, Position};
use super::variables::ServerVariables;
use crate::config::ServerConfig;
use crate::database::event_db::Trigger;
use crate::database::map_db::MapDescriptor;
use crate::database::spell_db::SpellDescriptor;
use crate::database::GameDatabase;
use crate::network::packet::{
    ActionMessage, ChatChannel, ChatMessage, EntityLeft, EntitySpawned, EntityStats, EntityVitals,
    MapItemUpdate, MessageColor, MovementUpdate, Packet, ProjectileRemoved,
};
use crate::network::sink::PacketSink;

/// Input queued by the network side for the next update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerInput {
    Move(Direction),
    Interact { event_id: Uuid },
    EventResponse { event_id: Uuid, response: u32 },
    PickUpItems,
}

/// Shared, read-only services an instance needs while updating.
#[derive(Clone, Copy)]
pub struct MapContext<'a> {
    pub db: &'a GameDatabase,
    pub config: &'a ServerConfig,
    pub server_vars: &'a ServerVariables,
    pub sink: &'a dyn PacketSink,
    /// Players that see this instance (its own players and those on
    /// neighbouring maps).
    pub observers: &'a [EntityId],
}

/// An entity that left this instance for another one. Its position and
/// direction are already set for the destination.
#[derive(Debug)]
pub struct Transfer {
    pub entity: Entity,
    pub to: MapInstanceKey,
}

#[derive(Debug, Default)]
pub struct MapUpdateOutcome {
    pub transfers: Vec<Transfer>,
    pub global_chat: Vec<String>,
}

/// Tiles held by non-passable entities and events, kept current while
/// entities move during one update.
#[derive(Debug, Default)]
struct Occupancy {
    entities: HashMap<Position, u32>,
    /// Non-passable events and, for per-player events, the player that
    /// sees them.
    events: Vec<(Position, Option<EntityId>)>,
}

impl Occupancy {
    fn blocks(&self, position: Position, mover: EntityId) -> bool {
        self.entities.get(&position).is_some_and(|n| *n > 0)
            || self
                .events
                .iter()
                .any(|(p, holder)| *p == position && holder.is_none_or(|h| h == mover))
    }

    fn occupy(&mut self, position: Position) {
        *self.entities.entry(position).or_default() += 1;
    }

    fn vacate(&mut self, position: Position) {
        if let Some(n) = self.entities.get_mut(&position) {
            *n = n.saturating_sub(1);
        }
    }
}

pub struct MapInstance {
    pub key: MapInstanceKey,
    pub descriptor: Arc<MapDescriptor>,
    entities: DashMap<EntityId, Entity>,
    events: Mutex<HashMap<EventKey, Event>>,
    pub items: MapItems,
    projectiles: DashMap<Uuid, MapProjectile>,
    traps: Mutex<Vec<MapTrap>>,
    batch: MovementBatch,
    inbox: Mutex<Vec<(EntityId, PlayerInput)>>,
    /// Last time a player was on the instance.
    last_active: AtomicI64,
}

impl MapInstance {
    pub fn new(key: MapInstanceKey, descriptor: Arc<MapDescriptor>, now: i64) -> Self {
        let events = descriptor
            .events
            .iter()
            .filter(|d| d.global)
            .map(|d| {
                let key = EventKey::global(d.id);
                (key, Event::new(key, Arc::clone(d)))
            })
            .collect();
        Self {
            key,
            descriptor,
            entities: DashMap::new(),
            events: Mutex::new(events),
            items: MapItems::new(),
            projectiles: DashMap::new(),
            traps: Mutex::new(Vec::new()),
            batch: MovementBatch::new(),
            inbox: Mutex::new(Vec::new()),
            last_active: AtomicI64::new(now),
        }
    }

    // ---- queries ----

    pub fn entities(&self) -> &DashMap<EntityId, Entity> {
        &self.entities
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.entities.iter().filter(|e| e.is_player()).map(|e| e.id).collect()
    }

    pub fn player_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_player()).count()
    }

    pub fn npc_count(&self) -> usize {
        self.entities.iter().filter(|e| !e.is_player()).count()
    }

    pub fn trap_count(&self) -> usize {
        self.traps.lock().len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn event_state(&self, key: &EventKey) -> Option<VmState> {
        self.events.lock().get(key).map(Event::state)
    }

    pub fn with_event<R>(&self, key: &EventKey, f: impl FnOnce(&mut Event) -> R) -> Option<R> {
        self.events.lock().get_mut(key).map(f)
    }

    /// No player has been here for `ttl_ms`.
    pub fn is_idle(&self, now: i64, ttl_ms: i64) -> bool {
        self.player_count() == 0 && now - self.last_active.load(Ordering::Relaxed) >= ttl_ms
    }

    pub fn push_input(&self, player: EntityId, input: PlayerInput) {
        self.inbox.lock().push((player, input));
    }

    // ---- membership ----

    /// Places `entity` on the instance and announces it. A joining player
    /// gets its own copies of per-player events and the current contents of
    /// the instance.
    pub fn add_entity(&self, mut entity: Entity, ctx: &MapContext<'_>) {
        entity.map = self.key;
        let id = entity.id;
        let is_player = entity.is_player();
        let spawned = spawned_packet(&entity);

        if is_player {
            let mut events = self.events.lock();
            for descriptor in self.descriptor.events.iter().filter(|d| !d.global) {
                let key = EventKey::for_player(descriptor.id, id);
                events.insert(key, Event::new(key, Arc::clone(descriptor)));
            }
        }
        self.entities.insert(id, entity);

        let others: Vec<EntityId> = ctx.observers.iter().copied().filter(|o| *o != id).collect();
        ctx.sink.broadcast(&others, &Packet::EntitySpawned(spawned));

        if is_player {
            let snapshot: Vec<EntitySpawned> = self.entities.iter().map(|e| spawned_packet(&e)).collect();
            for packet in snapshot {
                ctx.sink.send_packet(id, &Packet::EntitySpawned(packet));
            }
            let globals: Vec<_> = self
                .events
                .lock()
                .values()
                .filter(|e| e.key.player.is_none())
                .map(Event::spawned_packet)
                .collect();
            for packet in globals {
                ctx.sink.send_packet(id, &Packet::EventSpawned(packet));
            }
            let items = self.items.summaries();
            if !items.is_empty() {
                ctx.sink.send_packet(id, &Packet::MapItemUpdate(MapItemUpdate { added: items, removed: Vec::new() }));
            }
        }
        tracing::debug!("[map] [entity_added] map={} entity={} player={}", self.key, id, is_player);
    }

    /// Takes `id` off the instance and announces its departure. A leaving
    /// player's per-player events are dropped and global events it was
    /// driving are stopped.
    pub fn remove_entity(&self, id: EntityId, ctx: &MapContext<'_>) -> Option<Entity> {
        let (_, entity) = self.entities.remove(&id)?;
        if entity.is_player() {
            let mut events = self.events.lock();
            events.retain(|key, _| key.player != Some(id));
            for event in events.values_mut().filter(|e| e.active_player() == Some(id)) {
                event.stop();
            }
        }
        ctx.sink.broadcast(ctx.observers, &Packet::EntityLeft(EntityLeft { entity: id }));
        tracing::debug!("[map] [entity_removed] map={} entity={}", self.key, id);
        Some(entity)
    }

    // ---- spawning ----

    pub fn spawn_trap(
        &self,
        owner: CombatantProfile,
        spell: Arc<SpellDescriptor>,
        position: Position,
        now: i64,
        ctx: &MapContext<'_>,
    ) -> Uuid {
        let duration = spell.trap_duration_ms.unwrap_or(ctx.config.trap_duration_ms);
        let trap = MapTrap::new(owner, spell, position, now.saturating_add(duration));
        let id = trap.id;
        self.traps.lock().push(trap);
        id
    }

    pub fn spawn_projectile(
        &self,
        owner: CombatantProfile,
        spell: Arc<SpellDescriptor>,
        position: Position,
        direction: Direction,
        now: i64,
    ) -> Uuid {
        let projectile = MapProjectile::new(owner, spell, position, direction, now);
        let id = projectile.id;
        self.projectiles.insert(id, projectile);
        id
    }

    pub fn spawn_item(
        &self,
        item_id: Uuid,
        quantity: u32,
        position: Position,
        owner: Option<EntityId>,
        now: i64,
        ctx: &MapContext<'_>,
    ) -> Uuid {
        let item = MapItem {
            id: Uuid::new_v4(),
            item_id,
            quantity,
            position,
            owner,
            owner_until: now + ctx.config.item_owner_only_ms,
            despawn_at: now + ctx.config.item_despawn_ms,
        };
        let id = item.id;
        let summary = self.items.add(item);
        ctx.sink.broadcast(
            ctx.observers,
            &Packet::MapItemUpdate(MapItemUpdate { added: vec![summary], removed: Vec::new() }),
        );
        id
    }

    // ---- update ----

    /// One logic cycle for this instance.
    pub fn update(&self, now: i64, ctx: &MapContext<'_>) -> MapUpdateOutcome {
        let mut outcome = MapUpdateOutcome::default();

        self.traps.lock().retain(|t| !t.should_remove(now));

        let mut occupancy = self.occupancy();
        let mut moved: Vec<EntityId> = Vec::new();
        let mut crossings: Vec<(EntityId, MapInstanceKey, Position, Direction)> = Vec::new();

        let inputs = std::mem::take(&mut *self.inbox.lock());
        for (player, input) in inputs {
            match input {
                PlayerInput::Move(direction) => self.handle_move(
                    player,
                    direction,
                    now,
                    ctx,
                    &mut occupancy,
                    &mut moved,
                    &mut crossings,
                ),
                PlayerInput::Interact { event_id } => self.handle_interact(player, event_id),
                PlayerInput::EventResponse { event_id, response } => {
                    let accepted = self
                        .with_event(&self.event_key_for(player, event_id), |e| e.submit_response(player, response))
                        .unwrap_or(false);
                    if !accepted {
                        tracing::debug!(
                            "[map] [response_ignored] map={} player={} event={}",
                            self.key,
                            player,
                            event_id
                        );
                    }
                }
                PlayerInput::PickUpItems => self.handle_pick_up(player, now, ctx),
            }
        }

        // stats and routes
        for mut entity in self.entities.iter_mut() {
            if entity.update_stats(now) {
                ctx.sink.broadcast(
                    ctx.observers,
                    &Packet::EntityStats(EntityStats { entity: entity.id, stats: entity.stat_values() }),
                );
            }
            if !entity.mover.has_active_route() {
                continue;
            }
            let id = entity.id;
            let descriptor = &self.descriptor;
            let step = entity
                .mover
                .advance_route(now, |p| !descriptor.is_blocked(p) && !occupancy.blocks(p, id));
            if let StepOutcome::Moved { from, to } = step {
                if !entity.passable {
                    occupancy.vacate(from);
                    occupancy.occupy(to);
                }
                self.batch.add_movement(
                    MovementUpdate { entity: id, position: to, direction: entity.mover.direction, correction: false },
                    None,
                );
                moved.push(id);
            }
        }

        self.check_traps(&moved, now, ctx);
        self.update_projectiles(now, ctx);

        let effects = self.update_events(now, ctx, &occupancy, &moved);
        for effect in effects {
            self.apply_effect(effect, now, ctx, &mut crossings, &mut outcome);
        }

        for (player, to, position, direction) in crossings {
            if let Some(mut entity) = self.remove_entity(player, ctx) {
                entity.mover.position = position;
                entity.mover.direction = direction;
                outcome.transfers.push(Transfer { entity, to });
            }
        }

        let expired = self.items.expire(now);
        if !expired.is_empty() {
            ctx.sink.broadcast(
                ctx.observers,
                &Packet::MapItemUpdate(MapItemUpdate { added: Vec::new(), removed: expired }),
            );
        }

        self.handle_deaths(now, ctx);

        if self.entities.iter().any(|e| e.is_player()) {
            self.last_active.store(now, Ordering::Relaxed);
        }
        outcome
    }

    /// Flushes this cycle's batch.
    pub fn send_packets(&self, observers: &[EntityId], sink: &dyn PacketSink) -> usize {
        self.batch.send_packets(observers, sink)
    }

    fn occupancy(&self) -> Occupancy {
        let mut occupancy = Occupancy::default();
        for entity in self.entities.iter().filter(|e| !e.passable) {
            occupancy.occupy(entity.position());
        }
        occupancy.events = self
            .events
            .lock()
            .values()
            .filter(|e| !e.passable())
            .map(|e| (e.position(), e.key.player))
            .collect();
        occupancy
    }

    /// The player's own copy of the event if it has one, else the global.
    fn event_key_for(&self, player: EntityId, event_id: Uuid) -> EventKey {
        let own = EventKey::for_player(event_id, player);
        if self.events.lock().contains_key(&own) {
            own
        } else {
            EventKey::global(event_id)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_move(
        &self,
        player: EntityId,
        direction: Direction,
        now: i64,
        ctx: &MapContext<'_>,
        occupancy: &mut Occupancy,
        moved: &mut Vec<EntityId>,
        crossings: &mut Vec<(EntityId, MapInstanceKey, Position, Direction)>,
    ) {
        let Some(mut entity) = self.entities.get_mut(&player) else {
            return;
        };
        let from = entity.position();
        let target = from.offset(direction);

        if !self.descriptor.in_bounds(target) {
            let neighbour = self.descriptor.neighbours.get(direction).and_then(|id| ctx.db.map(id));
            if let Some(neighbour) = neighbour.filter(|_| entity.mover.can_act(now)) {
                let landing = self.descriptor.edge_crossing(from, direction, &neighbour);
                crossings.push((player, self.key.with_map(neighbour.id), landing, direction));
                return;
            }
        }

        let descriptor = &self.descriptor;
        let stepped = entity
            .mover
            .try_step(direction, now, |p| !descriptor.is_blocked(p) && !occupancy.blocks(p, player));
        match stepped {
            Some(to) => {
                if !entity.passable {
                    occupancy.vacate(from);
                    occupancy.occupy(to);
                }
                self.batch.add_movement(
                    MovementUpdate { entity: player, position: to, direction, correction: false },
                    None,
                );
                moved.push(player);
            }
            None => {
                self.batch.add_movement(
                    MovementUpdate {
                        entity: player,
                        position: from,
                        direction: entity.mover.direction,
                        correction: true,
                    },
                    Some(player),
                );
            }
        }
    }

    fn handle_interact(&self, player: EntityId, event_id: Uuid) {
        let Some(position) = self.entities.get(&player).map(|e| e.position()) else {
            return;
        };
        let key = self.event_key_for(player, event_id);
        let started = self
            .with_event(&key, |event| {
                event.position().distance(position) <= 1 && event.trigger(player, Trigger::ActionButton)
            })
            .unwrap_or(false);
        tracing::debug!(
            "[map] [interact] map={} player={} event={} started={}",
            self.key,
            player,
            event_id,
            started
        );
    }

    fn handle_pick_up(&self, player: EntityId, now: i64, ctx: &MapContext<'_>) {
        let Some(mut entity) = self.entities.get_mut(&player) else {
            return;
        };
        let taken = self.items.take_at(entity.position(), player, now);
        if taken.is_empty() {
            return;
        }
        if let Some(data) = entity.player_mut() {
            for item in &taken {
                data.add_item(item.item_id, item.quantity);
            }
        }
        drop(entity);
        ctx.sink.broadcast(
            ctx.observers,
            &Packet::MapItemUpdate(MapItemUpdate {
                added: Vec::new(),
                removed: taken.iter().map(|i| i.id).collect(),
            }),
        );
    }

    /// Traps fire on entities that stepped onto them this cycle.
    fn check_traps(&self, moved: &[EntityId], now: i64, ctx: &MapContext<'_>) {
        let mut traps = self.traps.lock();
        if traps.is_empty() {
            return;
        }
        for id in moved {
            let Some(mut entity) = self.entities.get_mut(id) else {
                continue;
            };
            for trap in traps.iter_mut() {
                if let Some(outcome) = trap.check_entity(&mut entity, now) {
                    self.spell_feedback(&entity, &outcome, ctx);
                }
            }
        }
    }

    fn update_projectiles(&self, now: i64, ctx: &MapContext<'_>) {
        let mut spent: Vec<Uuid> = Vec::new();
        let mut hits: Vec<(Uuid, EntityId)> = Vec::new();

        for mut projectile in self.projectiles.iter_mut() {
            match projectile.advance(now) {
                ProjectileStep::Holding => {}
                ProjectileStep::Spent => spent.push(projectile.id),
                ProjectileStep::Moved(position) => {
                    if self.descriptor.is_blocked(position) {
                        spent.push(projectile.id);
                        continue;
                    }
                    let target = self
                        .entities
                        .iter()
                        .find(|e| {
                            e.position() == position
                                && e.id != projectile.owner.id
                                && can_affect(&projectile.owner, &e, &projectile.spell)
                        })
                        .map(|e| e.id);
                    if let Some(target) = target {
                        hits.push((projectile.id, target));
                    }
                }
            }
        }

        for (projectile_id, target) in hits {
            let Some((_, projectile)) = self.projectiles.remove(&projectile_id) else {
                continue;
            };
            if let Some(mut entity) = self.entities.get_mut(&target) {
                let outcome = apply_spell(&projectile.owner, &mut entity, &projectile.spell, now);
                self.spell_feedback(&entity, &outcome, ctx);
            }
            ctx.sink.broadcast(ctx.observers, &Packet::ProjectileRemoved(ProjectileRemoved { projectile_id }));
        }
        for projectile_id in spent {
            if self.projectiles.remove(&projectile_id).is_some() {
                ctx.sink.broadcast(ctx.observers, &Packet::ProjectileRemoved(ProjectileRemoved { projectile_id }));
            }
        }
    }

    fn update_events(
        &self,
        now: i64,
        ctx: &MapContext<'_>,
        occupancy: &Occupancy,
        moved: &[EntityId],
    ) -> Vec<MapEffect> {
        let mut events = self.events.lock();

        // players that stepped onto an event tile
        for id in moved {
            let Some(position) = self.entities.get(id).filter(|e| e.is_player()).map(|e| e.position()) else {
                continue;
            };
            for event in events
                .values_mut()
                .filter(|e| e.position() == position && e.key.player.is_none_or(|p| p == *id))
            {
                event.trigger(*id, Trigger::PlayerCollide);
            }
        }

        let route_status: HashMap<EventKey, bool> =
            events.iter().map(|(k, e)| (*k, e.mover.has_active_route())).collect();
        let descriptor = &self.descriptor;
        let can_enter = |p: Position| !descriptor.is_blocked(p) && !occupancy.entities.get(&p).is_some_and(|n| *n > 0);
        let mut scope = EventScope {
            now,
            map: self.key,
            descriptor,
            db: ctx.db,
            server_vars: ctx.server_vars,
            entities: &self.entities,
            route_status: &route_status,
            npc_count: self.npc_count(),
            observers: ctx.observers,
            sink: ctx.sink,
            batch: &self.batch,
            can_enter: &can_enter,
            effects: Vec::new(),
        };
        for event in events.values_mut() {
            event.update(&mut scope);
        }
        scope.effects
    }

    fn apply_effect(
        &self,
        effect: MapEffect,
        now: i64,
        ctx: &MapContext<'_>,
        crossings: &mut Vec<(EntityId, MapInstanceKey, Position, Direction)>,
        outcome: &mut MapUpdateOutcome,
    ) {
        match effect {
            MapEffect::Warp { player, map_id, position, direction } => {
                if map_id != self.key.map_id {
                    crossings.push((player, self.key.with_map(map_id), position, direction));
                    return;
                }
                if let Some(mut entity) = self.entities.get_mut(&player) {
                    entity.mover.position = position;
                    entity.mover.direction = direction;
                    self.batch.add_movement(
                        MovementUpdate { entity: player, position, direction, correction: true },
                        None,
                    );
                }
            }
            MapEffect::SetEventRoute { key, route } => {
                if self.with_event(&key, |event| event.mover.set_route(route)).is_none() {
                    tracing::debug!("[map] [route_target_missing] map={} event={}", self.key, key.descriptor_id);
                }
            }
            MapEffect::SpawnNpc { npc, position, direction, spawner } => {
                let entity = Entity::new_npc(npc, self.key, position, direction, Some(spawner));
                self.add_entity(entity, ctx);
            }
            MapEffect::DespawnNpcs { spawner } => {
                let spawned: Vec<EntityId> = self
                    .entities
                    .iter()
                    .filter(|e| e.spawner() == Some(spawner))
                    .map(|e| e.id)
                    .collect();
                for id in spawned {
                    self.remove_entity(id, ctx);
                }
            }
            MapEffect::PlaceSpell { owner, spell, position, direction } => {
                if spell.projectile.is_some() {
                    self.spawn_projectile(owner, spell, position, direction, now);
                } else {
                    self.spawn_trap(owner, spell, position, now, ctx);
                }
            }
            MapEffect::GlobalChat { text } => outcome.global_chat.push(text),
        }
    }

    fn handle_deaths(&self, now: i64, ctx: &MapContext<'_>) {
        let dead: Vec<EntityId> = self.entities.iter().filter(|e| e.is_dead()).map(|e| e.id).collect();
        for id in dead {
            let is_player = self.entities.get(&id).is_some_and(|e| e.is_player());
            if is_player {
                let Some(mut entity) = self.entities.get_mut(&id) else {
                    continue;
                };
                entity.reset_buffs();
                entity.restore_all_vitals();
                let stats = EntityStats { entity: id, stats: entity.stat_values() };
                let vitals = EntityVitals { entity: id, vitals: entity.vitals(), max_vitals: entity.max_vitals() };
                drop(entity);
                ctx.sink.broadcast(ctx.observers, &Packet::EntityStats(stats));
                ctx.sink.broadcast(ctx.observers, &Packet::EntityVitals(vitals));
                ctx.sink.send_packet(
                    id,
                    &Packet::ChatMessage(ChatMessage { channel: ChatChannel::Player, text: "You have died.".into() }),
                );
                tracing::info!("[map] [player_died] map={} player={}", self.key, id);
                continue;
            }

            let Some(npc) = self.remove_entity(id, ctx) else {
                continue;
            };
            let EntityKind::Npc { descriptor, .. } = &npc.kind else {
                continue;
            };
            let mut looter = None;
            if let Some(killer) = npc.last_attacker {
                if let Some(mut killer) = self.entities.get_mut(&killer).filter(|k| k.is_player()) {
                    if descriptor.experience > 0 {
                        killer.give_experience(descriptor.experience);
                    }
                    looter = Some(killer.id);
                }
            }
            for loot in descriptor.drops.iter().filter(|d| d.roll()) {
                self.spawn_item(loot.item_id, loot.quantity, npc.position(), looter, now, ctx);
            }
            tracing::debug!("[map] [npc_died] map={} npc={} killer={:?}", self.key, id, npc.last_attacker);
        }
    }

    fn spell_feedback(&self, entity: &Entity, outcome: &SpellOutcome, ctx: &MapContext<'_>) {
        if outcome.amount != 0 {
            let (text, color) = if outcome.amount > 0 {
                (format!("-{}", outcome.amount), MessageColor::Damage)
            } else {
                (format!("+{}", -outcome.amount), MessageColor::Heal)
            };
            self.batch.add_action_message(ActionMessage { position: entity.position(), text, color }, None);
        }
        ctx.sink.broadcast(
            ctx.observers,
            &Packet::EntityVitals(EntityVitals {
                entity: entity.id,
                vitals: entity.vitals(),
                max_vitals: entity.max_vitals(),
            }),
        );
    }
}

fn spawned_packet(entity: &Entity) -> EntitySpawned {
    EntitySpawned {
        entity: entity.id,
        name: entity.name.clone(),
        is_player: entity.is_player(),
        position: entity.position(),
        direction: entity.mover.direction,
        level: entity.level,
        vitals: entity.vitals(),
        max_vitals: entity.max_vitals(),
        passable: entity.passable,
    }
}
