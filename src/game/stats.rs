//! Stat engine: per-entity, per-statistic value resolution.
//!
//! A [`Stat`] combines the owner's base value, allocated points and equipment
//! bonus (passed in as [`StatInputs`]) with the spell buffs it currently holds.
//! The buff table is a concurrent map; readers never touch it directly and
//! instead read an immutable snapshot that writers replace wholesale, so the
//! packet thread can resolve a value while the simulation thread ticks it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{EntityId, StatType};

/// A time-boxed modifier sourced from a spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buff {
    pub spell_id: Uuid,
    /// Absolute expiry in server milliseconds.
    pub expire_time: i64,
    pub flat: i32,
    pub percentage: i32,
}

/// Owner-side contributions to one stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatInputs {
    pub base: i32,
    pub allocated: i32,
    pub equipment_flat: i32,
    pub equipment_percentage: i32,
}

pub struct Stat {
    kind: StatType,
    owner: EntityId,
    buffs: DashMap<Uuid, Buff>,
    snapshot: RwLock<Arc<[Buff]>>,
    dirty: AtomicBool,
}

impl Stat {
    pub fn new(kind: StatType, owner: EntityId) -> Self {
        Self {
            kind,
            owner,
            buffs: DashMap::new(),
            snapshot: RwLock::new(Arc::from(Vec::new())),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> StatType {
        self.kind
    }

    /// Resolved value, never below 1.
    pub fn value(&self, inputs: StatInputs) -> i32 {
        let buffs = self.active_buffs();

        let mut flat = i64::from(inputs.base)
            + i64::from(inputs.allocated)
            + i64::from(inputs.equipment_flat);
        let mut percentage = i64::from(inputs.equipment_percentage);
        for buff in buffs.iter() {
            flat += i64::from(buff.flat);
            percentage += i64::from(buff.percentage);
        }

        let flat = flat as f64;
        let value = (flat + flat * (percentage as f64 / 100.0)).ceil();
        value.clamp(1.0, f64::from(i32::MAX)) as i32
    }

    /// Current buff snapshot. Cheap to call; the slice is never mutated.
    pub fn active_buffs(&self) -> Arc<[Buff]> {
        self.snapshot.read().clone()
    }

    pub fn buff(&self, spell_id: Uuid) -> Option<Buff> {
        self.buffs.get(&spell_id).map(|b| *b)
    }

    /// Expires buffs at `now` and reports whether the owner should resend
    /// this stat. The dirty flag is consumed by this call.
    pub fn update(&self, now: i64, inputs: StatInputs) -> bool {
        let before = self.value(inputs);

        let mut removed = false;
        self.buffs.retain(|_, buff| {
            let keep = buff.expire_time > now;
            removed |= !keep;
            keep
        });
        if removed {
            self.refresh_snapshot();
            tracing::trace!("[stat] [expired] owner={} stat={:?}", self.owner, self.kind);
        }

        let changed = self.value(inputs) != before;
        changed | self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Upserts by spell id: a recast replaces the previous timer and values.
    pub fn add_buff(&self, buff: Buff, inputs: StatInputs) {
        let before = self.value(inputs);
        self.buffs.insert(buff.spell_id, buff);
        self.refresh_snapshot();
        if self.value(inputs) != before {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Drops every buff (respawn, death).
    pub fn reset(&self) {
        if self.buffs.is_empty() {
            return;
        }
        self.buffs.clear();
        self.refresh_snapshot();
        self.dirty.store(true, Ordering::Release);
    }

    /// Flags an owner-side change (equipment, allocation) for the next update.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn refresh_snapshot(&self) {
        // Collect under the write lock so concurrent writers publish in order.
        let mut slot = self.snapshot.write();
        *slot = self.buffs.iter().map(|entry| *entry.value()).collect();
    }
}

impl std::fmt::Debug for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stat")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("buffs", &self.active_buffs().len())
            .finish()
    }
}
