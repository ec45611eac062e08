//! Spell descriptors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::types::{StatBlock, StatType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Physical,
    Magical,
}

impl DamageType {
    /// Stat that mitigates this damage type.
    pub fn defence_stat(self) -> StatType {
        match self {
            DamageType::Physical => StatType::Defense,
            DamageType::Magical => StatType::MagicResist,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellCombat {
    /// Negative values heal.
    pub damage: i32,
    pub damage_type: DamageType,
    pub scaling_stat: Option<StatType>,
    /// Percentage of `scaling_stat` added to `damage`.
    pub scaling: i32,
    /// Friendly spells only land on the caster and its allies.
    pub friendly: bool,
    pub hit_radius: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellBuff {
    pub flat: StatBlock,
    pub percentage: StatBlock,
    pub duration_ms: i64,
}

impl SpellBuff {
    pub fn is_empty(&self) -> bool {
        self.duration_ms <= 0 || (self.flat.is_empty() && self.percentage.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    /// Milliseconds per tile.
    pub speed_ms: i64,
    /// Tiles travelled before the projectile fizzles.
    pub range: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellDescriptor {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub combat: SpellCombat,
    #[serde(default)]
    pub buff: Option<SpellBuff>,
    /// Lifetime when cast as a trap; the server default applies when unset.
    #[serde(default)]
    pub trap_duration_ms: Option<i64>,
    #[serde(default)]
    pub animation_id: Option<Uuid>,
    #[serde(default)]
    pub projectile: Option<ProjectileSpec>,
}

impl SpellDescriptor {
    pub fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            combat: SpellCombat::default(),
            buff: None,
            trap_duration_ms: None,
            animation_id: None,
            projectile: None,
        }
    }

    pub fn deals_damage(&self) -> bool {
        self.combat.damage != 0 || (self.combat.scaling_stat.is_some() && self.combat.scaling != 0)
    }
}
