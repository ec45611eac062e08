use std::sync::Arc;

use uuid::Uuid;

use crate::database::spell_db::SpellDescriptor;
use crate::game::entity::CombatantProfile;
use crate::game::types::{Direction, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileStep {
    /// Not yet time to move.
    Holding,
    Moved(Position),
    /// Range used up; the projectile should be removed.
    Spent,
}

/// A spell in flight along a straight line.
#[derive(Debug, Clone)]
pub struct MapProjectile {
    pub id: Uuid,
    pub owner: CombatantProfile,
    pub spell: Arc<SpellDescriptor>,
    pub position: Position,
    pub direction: Direction,
    pub speed_ms: i64,
    range_left: u32,
    next_move_at: i64,
}

impl MapProjectile {
    pub fn new(
        owner: CombatantProfile,
        spell: Arc<SpellDescriptor>,
        position: Position,
        direction: Direction,
        now: i64,
    ) -> Self {
        let (speed_ms, range) = spell.projectile.map_or((100, 1), |p| (p.speed_ms.max(1), p.range));
        Self {
            id: Uuid::new_v4(),
            owner,
            spell,
            position,
            direction,
            speed_ms,
            range_left: range,
            next_move_at: now + speed_ms,
        }
    }

    pub fn range_left(&self) -> u32 {
        self.range_left
    }

    pub fn advance(&mut self, now: i64) -> ProjectileStep {
        if self.range_left == 0 {
            return ProjectileStep::Spent;
        }
        if now < self.next_move_at {
            return ProjectileStep::Holding;
        }
        self.position = self.position.offset(self.direction);
        self.range_left -= 1;
        self.next_move_at = now + self.speed_ms;
        ProjectileStep::Moved(self.position)
    }
}
