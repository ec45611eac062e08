//! Shared identifiers and small value types used across the simulation.
//!
//! Entities, events and map instances refer to each other by these ids rather
//! than by pointers; the owning map instance is the arena that resolves them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a simulated actor (player or NPC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live copy of an authored map.
///
/// `instance_id == Uuid::nil()` is the shared overworld copy; any other value
/// names a private or party instance of the same map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapInstanceKey {
    pub map_id: Uuid,
    pub instance_id: Uuid,
}

impl MapInstanceKey {
    pub fn new(map_id: Uuid, instance_id: Uuid) -> Self {
        Self { map_id, instance_id }
    }

    pub fn overworld(map_id: Uuid) -> Self {
        Self { map_id, instance_id: Uuid::nil() }
    }

    pub fn is_overworld(&self) -> bool {
        self.instance_id.is_nil()
    }

    /// Same instance layer, different map (used for neighbouring maps).
    pub fn with_map(&self, map_id: Uuid) -> Self {
        Self { map_id, instance_id: self.instance_id }
    }
}

impl fmt::Display for MapInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_overworld() {
            write!(f, "{}", self.map_id)
        } else {
            write!(f, "{}#{}", self.map_id, self.instance_id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Tile coordinates; `z` is the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y, z: 0 }
    }

    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self { x: self.x + dx, y: self.y + dy, z: self.z }
    }

    /// Chebyshev distance on the same layer; `i32::MAX` across layers.
    pub fn distance(self, other: Position) -> i32 {
        if self.z != other.z {
            return i32::MAX;
        }
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    Attack,
    AbilityPower,
    Defense,
    MagicResist,
    Speed,
}

impl StatType {
    pub const COUNT: usize = 5;

    pub const ALL: [StatType; StatType::COUNT] = [
        StatType::Attack,
        StatType::AbilityPower,
        StatType::Defense,
        StatType::MagicResist,
        StatType::Speed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vital {
    Health,
    Mana,
}

impl Vital {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-stat integers as authored in YAML (`attack: 10`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    pub attack: i32,
    pub ability_power: i32,
    pub defense: i32,
    pub magic_resist: i32,
    pub speed: i32,
}

impl StatBlock {
    pub fn get(&self, stat: StatType) -> i32 {
        match stat {
            StatType::Attack => self.attack,
            StatType::AbilityPower => self.ability_power,
            StatType::Defense => self.defense,
            StatType::MagicResist => self.magic_resist,
            StatType::Speed => self.speed,
        }
    }

    pub fn to_array(&self) -> [i32; StatType::COUNT] {
        StatType::ALL.map(|stat| self.get(stat))
    }

    pub fn is_empty(&self) -> bool {
        self.to_array().iter().all(|v| *v == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalBlock {
    pub health: i32,
    pub mana: i32,
}

impl Default for VitalBlock {
    fn default() -> Self {
        Self { health: 100, mana: 100 }
    }
}

impl VitalBlock {
    pub fn to_array(&self) -> [i32; Vital::COUNT] {
        [self.health, self.mana]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_block_order_matches_stat_type() {
        let block = StatBlock { attack: 1, ability_power: 2, defense: 3, magic_resist: 4, speed: 5 };
        assert_eq!(block.to_array(), [1, 2, 3, 4, 5]);
        assert_eq!(block.get(StatType::MagicResist), 4);
        assert!(StatBlock::default().is_empty());
    }

    #[test]
    fn test_position_offset() {
        let p = Position::new(5, 5);
        assert_eq!(p.offset(Direction::Up), Position::new(5, 4));
        assert_eq!(p.offset(Direction::Down), Position::new(5, 6));
        assert_eq!(p.offset(Direction::Left), Position::new(4, 5));
        assert_eq!(p.offset(Direction::Right), Position::new(6, 5));
    }

    #[test]
    fn test_position_distance_across_layers() {
        let a = Position { x: 1, y: 1, z: 0 };
        let b = Position { x: 1, y: 1, z: 1 };
        assert_eq!(a.distance(b), i32::MAX);
        assert_eq!(a.distance(Position::new(3, 2)), 2);
    }

    #[test]
    fn test_stat_indices_match_all() {
        for (i, stat) in StatType::ALL.iter().enumerate() {
            assert_eq!(stat.index(), i);
        }
    }

    #[test]
    fn test_map_instance_key_overworld() {
        let map = Uuid::new_v4();
        let key = MapInstanceKey::overworld(map);
        assert!(key.is_overworld());
        assert_eq!(key.to_string(), map.to_string());
        let other = Uuid::new_v4();
        assert_eq!(key.with_map(other), MapInstanceKey::overworld(other));
    }
}
