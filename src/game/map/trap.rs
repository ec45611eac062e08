use std::sync::Arc;

use uuid::Uuid;

use crate::database::spell_db::SpellDescriptor;
use crate::game::combat::{apply_spell, can_affect, SpellOutcome};
use crate::game::entity::{CombatantProfile, Entity};
use crate::game::types::Position;

/// A spell waiting on a tile for someone to step on it.
#[derive(Debug, Clone)]
pub struct MapTrap {
    pub id: Uuid,
    pub owner: CombatantProfile,
    pub spell: Arc<SpellDescriptor>,
    pub position: Position,
    pub expires_at: i64,
    triggered: bool,
}

impl MapTrap {
    pub fn new(owner: CombatantProfile, spell: Arc<SpellDescriptor>, position: Position, expires_at: i64) -> Self {
        Self { id: Uuid::new_v4(), owner, spell, position, expires_at, triggered: false }
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }

    /// Fires on `entity` if it stands on the trap tile and may be affected.
    /// A trap fires at most once.
    pub fn check_entity(&mut self, entity: &mut Entity, now: i64) -> Option<SpellOutcome> {
        if self.triggered || now >= self.expires_at {
            return None;
        }
        if entity.position() != self.position || entity.is_dead() {
            return None;
        }
        if !can_affect(&self.owner, entity, &self.spell) {
            return None;
        }
        self.triggered = true;
        tracing::debug!(
            "[map] [trap_triggered] trap={} spell={} target={}",
            self.id,
            self.spell.id,
            entity.id
        );
        Some(apply_spell(&self.owner, entity, &self.spell, now))
    }

    pub fn should_remove(&self, now: i64) -> bool {
        self.triggered || now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::spell_db::SpellCombat;
    use crate::game::types::{EntityId, MapInstanceKey, Vital};

    fn spell(friendly: bool) -> Arc<SpellDescriptor> {
        let mut spell = SpellDescriptor::new(Uuid::new_v4(), "spikes");
        spell.combat = SpellCombat { damage: if friendly { -10 } else { 10 }, friendly, ..SpellCombat::default() };
        Arc::new(spell)
    }

    fn player(x: i32, y: i32) -> Entity {
        Entity::new_player(EntityId::new(), "p", MapInstanceKey::overworld(Uuid::nil()), Position::new(x, y))
    }

    #[test]
    fn test_fires_once() {
        let owner = player(0, 0);
        let mut trap = MapTrap::new(owner.profile(), spell(false), Position::new(2, 2), 1_000);
        let mut first = player(2, 2);
        let mut second = player(2, 2);

        assert!(trap.check_entity(&mut first, 10).is_some());
        assert!(trap.check_entity(&mut second, 10).is_none());
        assert!(trap.should_remove(11));
        assert_eq!(second.vital(Vital::Health), second.max_vital(Vital::Health));
    }

    #[test]
    fn test_skips_other_tiles_and_expires() {
        let owner = player(0, 0);
        let mut trap = MapTrap::new(owner.profile(), spell(false), Position::new(2, 2), 100);
        let mut off_tile = player(3, 2);
        assert!(trap.check_entity(&mut off_tile, 10).is_none());
        assert!(!trap.should_remove(99));
        let mut late = player(2, 2);
        assert!(trap.check_entity(&mut late, 100).is_none());
        assert!(trap.should_remove(100));
    }

    #[test]
    fn test_hostile_trap_spares_owner() {
        let mut owner = player(2, 2);
        let mut trap = MapTrap::new(owner.profile(), spell(false), Position::new(2, 2), 1_000);
        assert!(trap.check_entity(&mut owner, 10).is_none());
        assert!(!trap.triggered());
    }

    #[test]
    fn test_friendly_trap_only_helps_allies() {
        let owner = player(0, 0);
        let mut trap = MapTrap::new(owner.profile(), spell(true), Position::new(2, 2), 1_000);
        let mut stranger = player(2, 2);
        assert!(trap.check_entity(&mut stranger, 10).is_none());

        let mut ally = player(2, 2);
        let party = Uuid::new_v4();
        ally.player_mut().unwrap().party = Some(party);
        let mut profile = owner.profile();
        profile.party = Some(party);
        let mut trap = MapTrap::new(profile, spell(true), Position::new(2, 2), 1_000);
        let outcome = trap.check_entity(&mut ally, 10).unwrap();
        assert!(outcome.amount < 0);
        assert!(trap.triggered());
    }
}
