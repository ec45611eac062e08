//! Spell resolution against stats.

use super::entity::{CombatantProfile, Entity};
use super::stats::Buff;
use super::types::{StatType, Vital};
use crate::database::spell_db::SpellDescriptor;

/// The same entity, or two players sharing a party.
pub fn is_ally(source: &CombatantProfile, target: &Entity) -> bool {
    if source.id == target.id {
        return true;
    }
    source.is_player && target.is_player() && source.party.is_some() && source.party == target.party()
}

/// Whether `spell` from `source` may land on `target`. Friendly spells only
/// land on the source and its allies; hostile ones never do.
pub fn can_affect(source: &CombatantProfile, target: &Entity, spell: &SpellDescriptor) -> bool {
    is_ally(source, target) == spell.combat.friendly
}

/// Signed amount: positive damages, negative heals.
pub fn spell_damage(source: &CombatantProfile, target: &Entity, spell: &SpellDescriptor) -> i32 {
    let combat = &spell.combat;
    let scaled = combat
        .scaling_stat
        .map(|stat| i64::from(source.stat(stat)) * i64::from(combat.scaling) / 100)
        .unwrap_or(0);
    // heals scale away from zero too
    let raw = if combat.damage < 0 {
        i64::from(combat.damage) - scaled
    } else {
        i64::from(combat.damage) + scaled
    };

    if raw > 0 {
        let defence = i64::from(target.stat_value(combat.damage_type.defence_stat()));
        let mitigated = raw * 100 / (100 + defence);
        mitigated.clamp(1, i64::from(i32::MAX)) as i32
    } else {
        raw.clamp(i64::from(i32::MIN + 1), 0) as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpellOutcome {
    /// Health removed (negative when healed).
    pub amount: i32,
    pub buffs_applied: usize,
    pub died: bool,
}

/// Applies the damage and buff components of `spell` to `target`.
pub fn apply_spell(
    source: &CombatantProfile,
    target: &mut Entity,
    spell: &SpellDescriptor,
    now: i64,
) -> SpellOutcome {
    let mut outcome = SpellOutcome::default();

    if spell.deals_damage() {
        let amount = spell_damage(source, target, spell);
        let was_alive = !target.is_dead();
        target.restore_vital(Vital::Health, Some(-amount));
        if amount > 0 && source.id != target.id {
            target.last_attacker = Some(source.id);
        }
        outcome.amount = amount;
        outcome.died = was_alive && target.is_dead();
    }

    if let Some(buff) = spell.buff.as_ref().filter(|b| !b.is_empty()) {
        for stat in StatType::ALL {
            let flat = buff.flat.get(stat);
            let percentage = buff.percentage.get(stat);
            if flat == 0 && percentage == 0 {
                continue;
            }
            target.apply_buff(
                stat,
                Buff { spell_id: spell.id, expire_time: now + buff.duration_ms, flat, percentage },
            );
            outcome.buffs_applied += 1;
        }
    }

    tracing::debug!(
        "[combat] [spell] spell={} source={} target={} amount={} buffs={}",
        spell.id,
        source.id,
        target.id,
        outcome.amount,
        outcome.buffs_applied
    );
    outcome
}
