//! The world registry: every service the simulation needs, constructed once
//! at startup and passed down.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::core::Clock;
use crate::database::store::Persistence;
use crate::database::GameDatabase;
use crate::game::entity::Entity;
use crate::game::map::{MapContext, MapInstance};
use crate::game::types::{EntityId, MapInstanceKey, Position};
use crate::game::variables::ServerVariables;
use crate::network::packet::{ChatChannel, ChatMessage, MapChanged, Packet};
use crate::network::sink::PacketSink;

pub struct World {
    pub config: ServerConfig,
    pub db: GameDatabase,
    pub server_vars: ServerVariables,
    pub sink: Arc<dyn PacketSink>,
    pub store: Arc<dyn Persistence>,
    pub clock: Clock,
    instances: DashMap<MapInstanceKey, Arc<MapInstance>>,
    /// player → instance currently holding it
    players: DashMap<EntityId, MapInstanceKey>,
}

impl World {
    /// Server variables that fail to load start empty.
    pub fn new(
        config: ServerConfig,
        db: GameDatabase,
        sink: Arc<dyn PacketSink>,
        store: Arc<dyn Persistence>,
    ) -> Self {
        let server_vars = match store.load_server_variables() {
            Ok(values) => ServerVariables::from_map(values),
            Err(e) => {
                tracing::error!("[store] [load_failed] target=server_variables error={}", e);
                ServerVariables::new()
            }
        };
        Self {
            config,
            db,
            server_vars,
            sink,
            store,
            clock: Clock::new(),
            instances: DashMap::new(),
            players: DashMap::new(),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.milliseconds()
    }

    pub fn instance(&self, key: &MapInstanceKey) -> Option<Arc<MapInstance>> {
        self.instances.get(key).map(|i| Arc::clone(&i))
    }

    pub fn instances(&self) -> Vec<Arc<MapInstance>> {
        self.instances.iter().map(|i| Arc::clone(&i)).collect()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Loads the instance on first use. `None` when the map is unknown.
    pub fn get_or_load(&self, key: MapInstanceKey) -> Option<Arc<MapInstance>> {
        if let Some(instance) = self.instance(&key) {
            return Some(instance);
        }
        let Some(descriptor) = self.db.map(key.map_id) else {
            tracing::warn!("[map] [unknown_map] map={}", key);
            return None;
        };
        let now = self.now();
        let instance = self
            .instances
            .entry(key)
            .or_insert_with(|| {
                tracing::info!("[map] [loaded] map={} name={}", key, descriptor.name);
                Arc::new(MapInstance::new(key, descriptor, now))
            })
            .clone();
        Some(instance)
    }

    pub fn player_instance(&self, player: EntityId) -> Option<Arc<MapInstance>> {
        let key = *self.players.get(&player)?;
        self.instance(&key)
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.players.iter().map(|p| *p.key()).collect()
    }

    pub fn is_online(&self, player: EntityId) -> bool {
        self.players.contains_key(&player)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players on the instance and on its neighbouring maps.
    pub fn observers_for(&self, instance: &MapInstance) -> Vec<EntityId> {
        let mut observers = instance.player_ids();
        for neighbour in instance.descriptor.neighbours.iter() {
            if let Some(other) = self.instance(&instance.key.with_map(neighbour)) {
                observers.extend(other.player_ids());
            }
        }
        observers
    }

    pub fn context<'a>(&'a self, observers: &'a [EntityId]) -> MapContext<'a> {
        MapContext {
            db: &self.db,
            config: &self.config,
            server_vars: &self.server_vars,
            sink: self.sink.as_ref(),
            observers,
        }
    }

    /// Puts `entity` on the instance named by `entity.map`, falling back to
    /// the start point when that map does not exist.
    pub fn place(&self, entity: Entity) -> Option<MapInstanceKey> {
        let id = entity.id;
        let is_player = entity.is_player();
        let key = self.put(entity)?;
        if is_player {
            self.players.insert(id, key);
        }
        Some(key)
    }

    /// Places a player that left its instance this cycle. The index entry
    /// stays locked until the entity is on its new instance, so a logout
    /// either happens before (the entity comes back as `Err`) or finds it
    /// placed.
    pub fn transfer_player(&self, entity: Entity) -> Result<Option<MapInstanceKey>, Entity> {
        let id = entity.id;
        let Some(mut slot) = self.players.get_mut(&id) else {
            return Err(entity);
        };
        match self.put(entity) {
            Some(key) => {
                *slot = key;
                Ok(Some(key))
            }
            None => {
                drop(slot);
                self.players.remove(&id);
                Ok(None)
            }
        }
    }

    fn put(&self, mut entity: Entity) -> Option<MapInstanceKey> {
        let instance = match self.get_or_load(entity.map) {
            Some(instance) => instance,
            None => {
                let start = &self.config.start_point;
                entity.map = MapInstanceKey::overworld(start.map);
                entity.mover.position = Position::new(start.x, start.y);
                self.get_or_load(entity.map)?
            }
        };

        let id = entity.id;
        let is_player = entity.is_player();
        if is_player {
            self.sink.send_packet(
                id,
                &Packet::MapChanged(MapChanged {
                    map: instance.key,
                    position: entity.position(),
                    direction: entity.mover.direction,
                }),
            );
        }
        let observers = self.observers_for(&instance);
        instance.add_entity(entity, &self.context(&observers));
        Some(instance.key)
    }

    pub fn remove_player(&self, player: EntityId) -> Option<Entity> {
        let (_, key) = self.players.remove(&player)?;
        let instance = self.instance(&key)?;
        let observers: Vec<EntityId> =
            self.observers_for(&instance).into_iter().filter(|o| *o != player).collect();
        instance.remove_entity(player, &self.context(&observers))
    }

    pub fn broadcast_global(&self, text: &str) {
        let players = self.player_ids();
        self.sink.broadcast(
            &players,
            &Packet::ChatMessage(ChatMessage { channel: ChatChannel::Global, text: text.to_string() }),
        );
    }

    /// Unloads instances nobody has visited for the configured TTL.
    pub fn unload_idle(&self, now: i64) -> usize {
        let ttl = self.config.map_unload_ttl_ms;
        let idle: Vec<MapInstanceKey> = self
            .instances
            .iter()
            .filter(|i| i.is_idle(now, ttl))
            .map(|i| *i.key())
            .collect();
        let mut unloaded = 0;
        for key in &idle {
            if self.instances.remove_if(key, |_, i| i.is_idle(now, ttl)).is_some() {
                tracing::info!("[map] [unloaded] map={}", key);
                unloaded += 1;
            }
        }
        unloaded
    }

    pub fn save_player(&self, entity: &Entity) -> bool {
        let Some(record) = entity.to_record() else {
            return false;
        };
        match self.store.save_player(&record) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("[store] [save_failed] player={} error={}", entity.id, e);
                false
            }
        }
    }

    /// Saves every online player and dirty server variables. Failures are
    /// logged and leave in-memory state as is.
    pub fn save_all(&self) -> usize {
        let mut saved = 0;
        for instance in self.instances() {
            for entity in instance.entities().iter().filter(|e| e.is_player()) {
                if self.save_player(&entity) {
                    saved += 1;
                }
            }
        }
        if self.server_vars.take_dirty() {
            if let Err(e) = self.store.save_server_variables(&self.server_vars.snapshot()) {
                tracing::error!("[store] [save_failed] target=server_variables error={}", e);
                self.server_vars.mark_dirty();
            }
        }
        tracing::info!("[store] [saved] players={}", saved);
        saved
    }
}
