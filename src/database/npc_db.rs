//! NPC descriptors.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::types::{StatBlock, VitalBlock};

fn default_level() -> i32 {
    1
}

fn default_move_interval_ms() -> i64 {
    500
}

fn default_quantity() -> u32 {
    1
}

fn default_chance() -> u32 {
    100
}

/// Item left on the floor when the NPC dies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcDrop {
    pub item_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Percent, 100 always drops.
    #[serde(default = "default_chance")]
    pub chance: u32,
}

impl NpcDrop {
    pub fn roll(&self) -> bool {
        self.chance >= 100 || rand::rng().random_range(0..100) < self.chance
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcDescriptor {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub max_vitals: VitalBlock,
    #[serde(default = "default_move_interval_ms")]
    pub move_interval_ms: i64,
    #[serde(default)]
    pub passable: bool,
    /// Experience granted to the player that lands the killing blow.
    #[serde(default)]
    pub experience: i64,
    #[serde(default)]
    pub drops: Vec<NpcDrop>,
}

impl NpcDescriptor {
    pub fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            level: default_level(),
            stats: StatBlock::default(),
            max_vitals: VitalBlock::default(),
            move_interval_ms: default_move_interval_ms(),
            passable: false,
            experience: 0,
            drops: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_npc_defaults() {
        let yaml = r#"
id: "4f1f7f8e-9a57-4d57-9cb7-2b8a3e1f6c01"
name: Slime
stats:
  attack: 4
  defense: 2
"#;
        let npc: NpcDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(npc.level, 1);
        assert_eq!(npc.stats.attack, 4);
        assert_eq!(npc.stats.speed, 0);
        assert_eq!(npc.max_vitals, VitalBlock { health: 100, mana: 100 });
        assert_eq!(npc.move_interval_ms, 500);
        assert!(!npc.passable);
        assert!(npc.drops.is_empty());
    }

    #[test]
    fn test_parse_drops() {
        let yaml = r#"
id: "4f1f7f8e-9a57-4d57-9cb7-2b8a3e1f6c02"
name: Bat
drops:
  - item_id: "8d6f2c1a-0b7e-4c55-9a0f-3e2d1c4b5a60"
  - item_id: "8d6f2c1a-0b7e-4c55-9a0f-3e2d1c4b5a61"
    quantity: 3
    chance: 0
"#;
        let npc: NpcDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(npc.drops.len(), 2);
        assert_eq!((npc.drops[0].quantity, npc.drops[0].chance), (1, 100));
        assert!(npc.drops[0].roll());
        assert_eq!(npc.drops[1].quantity, 3);
        assert!(!npc.drops[1].roll());
    }
}
