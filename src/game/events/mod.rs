//! Scripted map events and the command VM that runs them.
//!
//! Each [`Event`] owns its call stack; nothing outside the owning map
//! instance's update touches it. Player replies arrive through
//! [`Event::submit_response`], which only records the reply for the VM to
//! pick up on its next step.

pub mod command;
pub mod condition;
pub mod processing;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use self::command::{CommandInstance, ResponseKind};
use self::condition::{meets_conditions, ConditionEnv};
use super::entity::{CombatantProfile, Entity};
use super::map::batch::MovementBatch;
use super::movement::{MoveRoute, Mover, StepOutcome};
use super::types::{Direction, EntityId, MapInstanceKey, Position};
use super::variables::ServerVariables;
use crate::database::event_db::{EventDescriptor, EventPage, Trigger};
use crate::database::map_db::MapDescriptor;
use crate::database::npc_db::NpcDescriptor;
use crate::database::spell_db::SpellDescriptor;
use crate::database::GameDatabase;
use crate::network::packet::{EventSpawned, MovementUpdate, Packet};
use crate::network::sink::PacketSink;

pub const SELF_SWITCH_COUNT: usize = 4;

/// Identifies an event inside a map instance. `player` is set for
/// per-player copies of non-global events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub descriptor_id: Uuid,
    pub player: Option<EntityId>,
}

impl EventKey {
    pub fn global(descriptor_id: Uuid) -> Self {
        Self { descriptor_id, player: None }
    }

    pub fn for_player(descriptor_id: Uuid, player: EntityId) -> Self {
        Self { descriptor_id, player: Some(player) }
    }

    /// Entity id used for this event on the wire.
    pub fn wire_id(&self) -> EntityId {
        EntityId(self.descriptor_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Idle,
    Running,
    Waiting,
    WaitingForResponse(ResponseKind),
    WaitingForRoute,
}

/// Side effects that need the whole map instance (or the world).
#[derive(Debug, Clone)]
pub enum MapEffect {
    Warp {
        player: EntityId,
        map_id: Uuid,
        position: Position,
        direction: Direction,
    },
    SetEventRoute {
        key: EventKey,
        route: MoveRoute,
    },
    SpawnNpc {
        npc: Arc<NpcDescriptor>,
        position: Position,
        direction: Direction,
        spawner: EventKey,
    },
    DespawnNpcs {
        spawner: EventKey,
    },
    PlaceSpell {
        owner: CombatantProfile,
        spell: Arc<SpellDescriptor>,
        position: Position,
        direction: Direction,
    },
    GlobalChat {
        text: String,
    },
}

/// Everything an event may read or write during one step.
pub struct EventScope<'a> {
    pub now: i64,
    pub map: MapInstanceKey,
    pub descriptor: &'a MapDescriptor,
    pub db: &'a GameDatabase,
    pub server_vars: &'a ServerVariables,
    pub entities: &'a DashMap<EntityId, Entity>,
    /// Active-route flag of every event on the instance, taken before the
    /// event phase started.
    pub route_status: &'a HashMap<EventKey, bool>,
    pub npc_count: usize,
    pub observers: &'a [EntityId],
    pub sink: &'a dyn PacketSink,
    pub batch: &'a MovementBatch,
    pub can_enter: &'a dyn Fn(Position) -> bool,
    pub effects: Vec<MapEffect>,
}

impl EventScope<'_> {
    /// Sends to the holding player of a per-player event, or to every
    /// observer for a global one.
    pub fn send_for(&self, key: &EventKey, packet: &Packet) {
        match key.player {
            Some(player) => self.sink.send_packet(player, packet),
            None => self.sink.broadcast(self.observers, packet),
        }
    }
}

#[derive(Debug)]
pub struct Event {
    pub key: EventKey,
    pub descriptor: Arc<EventDescriptor>,
    page_index: Option<usize>,
    pub mover: Mover,
    call_stack: Vec<CommandInstance>,
    pub self_switches: [bool; SELF_SWITCH_COUNT],
    wait_until: Option<i64>,
    pending_response: Option<u32>,
    active_player: Option<EntityId>,
    /// Page selection has run at least once.
    initialised: bool,
}

impl Event {
    pub fn new(key: EventKey, descriptor: Arc<EventDescriptor>) -> Self {
        let mover = Mover::new(descriptor.position, Direction::Down, 0);
        Self {
            key,
            descriptor,
            page_index: None,
            mover,
            call_stack: Vec::new(),
            self_switches: [false; SELF_SWITCH_COUNT],
            wait_until: None,
            pending_response: None,
            active_player: None,
            initialised: false,
        }
    }

    pub fn page_index(&self) -> Option<usize> {
        self.page_index
    }

    pub fn page(&self) -> Option<&Arc<EventPage>> {
        self.page_index.and_then(|i| self.descriptor.pages.get(i))
    }

    pub fn passable(&self) -> bool {
        self.page().is_none_or(|p| p.passable)
    }

    pub fn position(&self) -> Position {
        self.mover.position
    }

    pub fn active_player(&self) -> Option<EntityId> {
        self.active_player
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn is_idle(&self) -> bool {
        self.call_stack.is_empty()
    }

    pub fn state(&self) -> VmState {
        let Some(top) = self.call_stack.last() else {
            return VmState::Idle;
        };
        if let Some(kind) = top.waiting_for_response {
            VmState::WaitingForResponse(kind)
        } else if top.waiting_for_route.is_some() {
            VmState::WaitingForRoute
        } else if self.wait_until.is_some() {
            VmState::Waiting
        } else {
            VmState::Running
        }
    }

    /// Starts the active page if it uses `trigger` and the VM is idle.
    pub fn trigger(&mut self, player: EntityId, trigger: Trigger) -> bool {
        if !self.is_idle() || self.key.player.is_some_and(|p| p != player) {
            return false;
        }
        let Some(page) = self.page().cloned() else {
            return false;
        };
        if page.trigger != trigger {
            return false;
        }
        self.start(page, Some(player));
        true
    }

    /// Records a reply for the next step. Ignored unless the event is
    /// waiting on `player`.
    pub fn submit_response(&mut self, player: EntityId, response: u32) -> bool {
        if self.active_player != Some(player) {
            return false;
        }
        if !matches!(self.state(), VmState::WaitingForResponse(_)) {
            return false;
        }
        self.pending_response = Some(response);
        true
    }

    fn start(&mut self, page: Arc<EventPage>, player: Option<EntityId>) {
        tracing::debug!(
            "[event] [start] event={} player={:?}",
            self.key.descriptor_id,
            player
        );
        self.call_stack.push(CommandInstance::root(page));
        self.active_player = player;
        self.pending_response = None;
        self.wait_until = None;
    }

    /// Forces the VM back to idle (holding player left, map unload).
    pub fn stop(&mut self) {
        self.call_stack.clear();
        self.active_player = None;
        self.pending_response = None;
        self.wait_until = None;
    }

    /// One cycle: walk the route, refresh the page while idle, then run at
    /// most one command.
    pub fn update(&mut self, scope: &mut EventScope<'_>) {
        if self.mover.has_active_route() {
            if let StepOutcome::Moved { to, .. } = self.mover.advance_route(scope.now, scope.can_enter) {
                scope.batch.add_movement(
                    MovementUpdate {
                        entity: self.key.wire_id(),
                        position: to,
                        direction: self.mover.direction,
                        correction: false,
                    },
                    self.key.player,
                );
            }
        }

        if self.is_idle() {
            self.refresh_page(scope);
            if let Some(page) = self.page().cloned() {
                if page.trigger == Trigger::Autorun {
                    self.start(page, self.key.player);
                }
            }
        }

        if !self.is_idle() {
            self.step(scope);
        }
    }

    fn refresh_page(&mut self, scope: &EventScope<'_>) {
        let selected = {
            let guard = self.key.player.and_then(|id| scope.entities.get(&id));
            let env = ConditionEnv {
                player: guard.as_deref(),
                server_vars: scope.server_vars,
                self_switches: &self.self_switches,
                map_id: scope.map.map_id,
                npc_count: scope.npc_count,
            };
            self.descriptor.pages.iter().rposition(|page| meets_conditions(&page.conditions, &env))
        };

        if self.initialised && selected == self.page_index {
            return;
        }
        self.initialised = true;
        self.page_index = selected;

        match self.page().cloned() {
            Some(page) => {
                self.mover.move_interval_ms = page.move_interval_ms;
                self.mover.direction = page.direction;
                match &page.move_route {
                    Some(route) => self.mover.set_route(route.clone()),
                    None => self.mover.clear_route(),
                }
            }
            None => self.mover.clear_route(),
        }

        tracing::debug!(
            "[event] [page] event={} player={:?} page={:?}",
            self.key.descriptor_id,
            self.key.player,
            self.page_index
        );
        scope.send_for(&self.key, &Packet::EventSpawned(self.spawned_packet()));
    }

    /// Current appearance, as sent to observers.
    pub fn spawned_packet(&self) -> EventSpawned {
        EventSpawned {
            event_id: self.key.descriptor_id,
            position: self.mover.position,
            direction: self.mover.direction,
            page: self.page_index.map(|i| i as u32),
            passable: self.passable(),
        }
    }

    /// Drops exhausted frames from the top of the stack.
    fn pop_exhausted(&mut self) {
        while self
            .call_stack
            .last()
            .is_some_and(|frame| frame.is_exhausted() && !frame.is_suspended())
        {
            self.call_stack.pop();
        }
        if self.call_stack.is_empty() {
            self.active_player = None;
            self.pending_response = None;
            self.wait_until = None;
        }
    }
}
