//! Simulated actors: players and NPCs.
//!
//! An entity lives in exactly one map instance's entity table and is moved
//! between tables on map change. Everything that refers to an entity from
//! outside that table (events, traps, projectiles) holds its [`EntityId`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::EventKey;
use super::movement::Mover;
use super::stats::{Buff, Stat, StatInputs};
use super::types::{
    Direction, EntityId, MapInstanceKey, Position, StatBlock, StatType, Vital, VitalBlock,
};
use super::variables::VariableValue;
use crate::database::npc_db::NpcDescriptor;
use crate::database::store::PlayerRecord;

/// Experience needed to advance from `level` to `level + 1`.
pub const MAX_LEVEL: i32 = 100;

pub fn experience_to_next(level: i32) -> i64 {
    i64::from(level.max(1)) * 100
}

const PLAYER_MOVE_INTERVAL_MS: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub item_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerData {
    pub experience: i64,
    pub party: Option<Uuid>,
    pub variables: HashMap<Uuid, VariableValue>,
    pub inventory: Vec<InventorySlot>,
}

impl PlayerData {
    pub fn variable(&self, id: Uuid) -> VariableValue {
        self.variables.get(&id).cloned().unwrap_or_default()
    }

    /// Stacks onto an existing slot for the same item.
    pub fn add_item(&mut self, item_id: Uuid, quantity: u32) {
        match self.inventory.iter_mut().find(|s| s.item_id == item_id) {
            Some(slot) => slot.quantity = slot.quantity.saturating_add(quantity),
            None => self.inventory.push(InventorySlot { item_id, quantity }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Player(PlayerData),
    Npc {
        descriptor: Arc<NpcDescriptor>,
        /// Event that spawned this NPC, if any.
        spawner: Option<EventKey>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EquipmentBonus {
    pub flat: i32,
    pub percentage: i32,
}

/// By-value view of an attacker, safe to hold after its entity has moved
/// or despawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatantProfile {
    pub id: EntityId,
    pub party: Option<Uuid>,
    pub is_player: bool,
    pub stats: [i32; StatType::COUNT],
}

impl CombatantProfile {
    /// A source with no stats of its own (scripted casts).
    pub fn environment() -> Self {
        Self { id: EntityId(Uuid::nil()), party: None, is_player: false, stats: [0; StatType::COUNT] }
    }

    pub fn stat(&self, stat: StatType) -> i32 {
        self.stats[stat.index()]
    }
}

#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub map: MapInstanceKey,
    pub mover: Mover,
    pub level: i32,
    pub base_stats: [i32; StatType::COUNT],
    pub stat_points: [i32; StatType::COUNT],
    pub passable: bool,
    equipment: [EquipmentBonus; StatType::COUNT],
    stats: Vec<Stat>,
    vitals: [i32; Vital::COUNT],
    max_vitals: [i32; Vital::COUNT],
    /// Entity that last damaged this one.
    pub last_attacker: Option<EntityId>,
}

impl Entity {
    fn build(
        id: EntityId,
        name: String,
        kind: EntityKind,
        map: MapInstanceKey,
        mover: Mover,
        level: i32,
        base_stats: [i32; StatType::COUNT],
        max_vitals: [i32; Vital::COUNT],
    ) -> Self {
        Self {
            id,
            name,
            kind,
            map,
            mover,
            level: level.max(1),
            base_stats,
            stat_points: [0; StatType::COUNT],
            passable: false,
            equipment: [EquipmentBonus::default(); StatType::COUNT],
            stats: StatType::ALL.iter().map(|s| Stat::new(*s, id)).collect(),
            vitals: max_vitals,
            max_vitals,
            last_attacker: None,
        }
    }

    pub fn from_record(record: &PlayerRecord, map: MapInstanceKey) -> Self {
        let mover = Mover::new(record.position, record.direction, PLAYER_MOVE_INTERVAL_MS);
        let data = PlayerData {
            experience: record.experience,
            party: record.party,
            variables: record.variables.clone(),
            inventory: record.inventory.clone(),
        };
        let mut entity = Self::build(
            record.id,
            record.name.clone(),
            EntityKind::Player(data),
            map,
            mover,
            record.level,
            record.base_stats.to_array(),
            record.max_vitals.to_array(),
        );
        entity.stat_points = record.stat_points.to_array();
        entity.vitals = record.vitals.to_array();
        entity.clamp_vitals();
        entity
    }

    /// Fresh level 1 character.
    pub fn new_player(id: EntityId, name: &str, map: MapInstanceKey, position: Position) -> Self {
        let mover = Mover::new(position, Direction::Down, PLAYER_MOVE_INTERVAL_MS);
        Self::build(
            id,
            name.to_string(),
            EntityKind::Player(PlayerData::default()),
            map,
            mover,
            1,
            [1; StatType::COUNT],
            VitalBlock::default().to_array(),
        )
    }

    pub fn new_npc(
        descriptor: Arc<NpcDescriptor>,
        map: MapInstanceKey,
        position: Position,
        direction: Direction,
        spawner: Option<EventKey>,
    ) -> Self {
        let mover = Mover::new(position, direction, descriptor.move_interval_ms);
        let mut entity = Self::build(
            EntityId::new(),
            descriptor.name.clone(),
            EntityKind::Npc { descriptor: Arc::clone(&descriptor), spawner },
            map,
            mover,
            descriptor.level,
            descriptor.stats.to_array(),
            descriptor.max_vitals.to_array(),
        );
        entity.passable = descriptor.passable;
        entity
    }

    pub fn to_record(&self) -> Option<PlayerRecord> {
        let data = self.player()?;
        let block = |values: [i32; StatType::COUNT]| StatBlock {
            attack: values[StatType::Attack.index()],
            ability_power: values[StatType::AbilityPower.index()],
            defense: values[StatType::Defense.index()],
            magic_resist: values[StatType::MagicResist.index()],
            speed: values[StatType::Speed.index()],
        };
        Some(PlayerRecord {
            id: self.id,
            name: self.name.clone(),
            map_id: self.map.map_id,
            position: self.mover.position,
            direction: self.mover.direction,
            level: self.level,
            experience: data.experience,
            base_stats: block(self.base_stats),
            stat_points: block(self.stat_points),
            vitals: VitalBlock { health: self.vitals[0], mana: self.vitals[1] },
            max_vitals: VitalBlock { health: self.max_vitals[0], mana: self.max_vitals[1] },
            party: data.party,
            variables: data.variables.clone(),
            inventory: data.inventory.clone(),
        })
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    pub fn player(&self) -> Option<&PlayerData> {
        match &self.kind {
            EntityKind::Player(data) => Some(data),
            EntityKind::Npc { .. } => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            EntityKind::Player(data) => Some(data),
            EntityKind::Npc { .. } => None,
        }
    }

    pub fn party(&self) -> Option<Uuid> {
        self.player().and_then(|p| p.party)
    }

    pub fn spawner(&self) -> Option<EventKey> {
        match &self.kind {
            EntityKind::Npc { spawner, .. } => *spawner,
            EntityKind::Player(_) => None,
        }
    }

    pub fn position(&self) -> Position {
        self.mover.position
    }

    // ---- stats ----

    pub fn stat(&self, stat: StatType) -> &Stat {
        &self.stats[stat.index()]
    }

    pub fn stat_inputs(&self, stat: StatType) -> StatInputs {
        let i = stat.index();
        StatInputs {
            base: self.base_stats[i],
            allocated: self.stat_points[i],
            equipment_flat: self.equipment[i].flat,
            equipment_percentage: self.equipment[i].percentage,
        }
    }

    pub fn stat_value(&self, stat: StatType) -> i32 {
        self.stat(stat).value(self.stat_inputs(stat))
    }

    pub fn stat_values(&self) -> [i32; StatType::COUNT] {
        StatType::ALL.map(|s| self.stat_value(s))
    }

    pub fn set_equipment_bonus(&mut self, stat: StatType, bonus: EquipmentBonus) {
        if self.equipment[stat.index()] != bonus {
            self.equipment[stat.index()] = bonus;
            self.stat(stat).mark_dirty();
        }
    }

    pub fn allocate_point(&mut self, stat: StatType) {
        self.stat_points[stat.index()] += 1;
        self.stat(stat).mark_dirty();
    }

    pub fn apply_buff(&self, stat: StatType, buff: Buff) {
        self.stat(stat).add_buff(buff, self.stat_inputs(stat));
    }

    /// Ticks every stat. True when any of them should be resent.
    pub fn update_stats(&self, now: i64) -> bool {
        StatType::ALL
            .iter()
            .fold(false, |changed, s| self.stat(*s).update(now, self.stat_inputs(*s)) | changed)
    }

    pub fn reset_buffs(&self) {
        for stat in &self.stats {
            stat.reset();
        }
    }

    pub fn profile(&self) -> CombatantProfile {
        CombatantProfile {
            id: self.id,
            party: self.party(),
            is_player: self.is_player(),
            stats: self.stat_values(),
        }
    }

    // ---- vitals ----

    pub fn vital(&self, vital: Vital) -> i32 {
        self.vitals[vital.index()]
    }

    pub fn max_vital(&self, vital: Vital) -> i32 {
        self.max_vitals[vital.index()]
    }

    pub fn vitals(&self) -> [i32; Vital::COUNT] {
        self.vitals
    }

    pub fn max_vitals(&self) -> [i32; Vital::COUNT] {
        self.max_vitals
    }

    pub fn set_vital(&mut self, vital: Vital, value: i32) {
        let max = self.max_vital(vital);
        self.vitals[vital.index()] = value.clamp(0, max.max(0));
    }

    /// Adds `amount` (negative drains); `None` restores to full.
    pub fn restore_vital(&mut self, vital: Vital, amount: Option<i32>) {
        let value = match amount {
            Some(amount) => self.vital(vital).saturating_add(amount),
            None => self.max_vital(vital),
        };
        self.set_vital(vital, value);
    }

    pub fn restore_all_vitals(&mut self) {
        self.vitals = self.max_vitals;
    }

    pub fn is_dead(&self) -> bool {
        self.vital(Vital::Health) <= 0
    }

    fn clamp_vitals(&mut self) {
        for vital in [Vital::Health, Vital::Mana] {
            let v = self.vital(vital);
            self.set_vital(vital, v);
        }
    }

    // ---- progression ----

    /// Adds experience and applies level ups. Returns the levels gained.
    pub fn give_experience(&mut self, amount: i64) -> i32 {
        let mut level = self.level;
        let Some(data) = self.player_mut() else {
            return 0;
        };
        data.experience = data.experience.saturating_add(amount).max(0);
        let mut gained = 0;
        while level < MAX_LEVEL && data.experience >= experience_to_next(level) {
            data.experience -= experience_to_next(level);
            level += 1;
            gained += 1;
        }
        self.level = level;
        gained
    }

    pub fn set_level(&mut self, level: i32) {
        self.level = level.clamp(1, MAX_LEVEL);
        if let Some(data) = self.player_mut() {
            data.experience = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc_descriptor() -> Arc<NpcDescriptor> {
        let mut npc = NpcDescriptor::new(Uuid::new_v4(), "Wolf");
        npc.stats = StatBlock { attack: 7, defense: 3, ..Default::default() };
        npc.max_vitals = VitalBlock { health: 30, mana: 0 };
        Arc::new(npc)
    }

    fn player() -> Entity {
        let key = MapInstanceKey::overworld(Uuid::new_v4());
        Entity::new_player(EntityId::new(), "hero", key, Position::new(1, 1))
    }

    #[test]
    fn test_npc_from_descriptor() {
        let key = MapInstanceKey::overworld(Uuid::new_v4());
        let npc = Entity::new_npc(npc_descriptor(), key, Position::new(2, 2), Direction::Left, None);
        assert!(!npc.is_player());
        assert_eq!(npc.stat_value(StatType::Attack), 7);
        // zero base still resolves to the floor
        assert_eq!(npc.stat_value(StatType::Speed), 1);
        assert_eq!(npc.vital(Vital::Health), 30);
        assert!(npc.to_record().is_none());
    }

    #[test]
    fn test_equipment_bonus_marks_stat_dirty() {
        let mut p = player();
        assert!(!p.update_stats(0));
        p.set_equipment_bonus(StatType::Attack, EquipmentBonus { flat: 4, percentage: 0 });
        assert_eq!(p.stat_value(StatType::Attack), 5);
        assert!(p.update_stats(0));
        assert!(!p.update_stats(0));
        // same bonus again is not a change
        p.set_equipment_bonus(StatType::Attack, EquipmentBonus { flat: 4, percentage: 0 });
        assert!(!p.update_stats(0));
    }

    #[test]
    fn test_buff_expiry_reported_through_update_stats() {
        let p = player();
        p.apply_buff(StatType::Defense, Buff { spell_id: Uuid::new_v4(), expire_time: 50, flat: 10, percentage: 0 });
        assert_eq!(p.stat_value(StatType::Defense), 11);
        assert!(p.update_stats(10));
        assert!(p.update_stats(50));
        assert_eq!(p.stat_value(StatType::Defense), 1);
    }

    #[test]
    fn test_vitals_clamped() {
        let mut p = player();
        p.restore_vital(Vital::Health, Some(-500));
        assert_eq!(p.vital(Vital::Health), 0);
        assert!(p.is_dead());
        p.restore_vital(Vital::Health, Some(30));
        assert_eq!(p.vital(Vital::Health), 30);
        p.restore_vital(Vital::Health, None);
        assert_eq!(p.vital(Vital::Health), p.max_vital(Vital::Health));
        p.restore_vital(Vital::Mana, Some(1000));
        assert_eq!(p.vital(Vital::Mana), p.max_vital(Vital::Mana));
    }

    #[test]
    fn test_experience_levels_up() {
        let mut p = player();
        assert_eq!(p.give_experience(250), 1);
        assert_eq!(p.level, 2);
        assert_eq!(p.player().map(|d| d.experience), Some(150));
        assert_eq!(p.give_experience(50), 1);
        assert_eq!(p.level, 3);
        assert_eq!(p.player().map(|d| d.experience), Some(0));
    }

    #[test]
    fn test_experience_saturates_at_max_level() {
        let mut p = player();
        p.give_experience(i64::MAX);
        assert_eq!(p.level, MAX_LEVEL);
        p.give_experience(i64::MAX);
        assert_eq!(p.level, MAX_LEVEL);
        assert_eq!(p.player().map(|d| d.experience), Some(i64::MAX));

        p.set_level(MAX_LEVEL + 50);
        assert_eq!(p.level, MAX_LEVEL);
    }

    #[test]
    fn test_record_round_trip() {
        let mut p = player();
        p.allocate_point(StatType::Speed);
        p.player_mut().unwrap().add_item(Uuid::nil(), 2);
        p.player_mut().unwrap().add_item(Uuid::nil(), 3);
        p.restore_vital(Vital::Mana, Some(-20));

        let record = p.to_record().unwrap();
        assert_eq!(record.stat_points.speed, 1);
        assert_eq!(record.inventory, vec![InventorySlot { item_id: Uuid::nil(), quantity: 5 }]);

        let restored = Entity::from_record(&record, p.map);
        assert_eq!(restored.id, p.id);
        assert_eq!(restored.vitals(), p.vitals());
        assert_eq!(restored.stat_values(), p.stat_values());
        assert_eq!(restored.position(), p.position());
    }
}
