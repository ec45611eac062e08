//! The VM step: resolve waits, then dispatch one command.
//!
//! The cursor of the current frame moves past a command before the command
//! runs, so a command that pushes a frame leaves its parent pointing at the
//! next command. Dangling list or descriptor references are logged and
//! skipped.

use std::sync::Arc;

use super::command::{
    AnimationTarget, CommandInstance, EventCommand, ResponseKind, RouteTarget, RouteWait,
};
use super::condition::{meets_condition, meets_conditions, ConditionEnv};
use super::{Event, EventKey, EventScope, MapEffect};
use crate::database::event_db::EventPage;
use crate::game::combat::apply_spell;
use crate::game::entity::{CombatantProfile, Entity};
use crate::game::types::{EntityId, Position, Vital};
use crate::game::variables::{VariableRef, VariableScope, VariableValue};
use crate::network::packet::{
    ActionMessage, AnimationAnchor, AnimationUpdate, ChatChannel, ChatMessage, EntityVitals,
    EventDialog, MessageColor, Packet,
};

impl Event {
    pub(super) fn step(&mut self, scope: &mut EventScope<'_>) {
        if let Some(until) = self.wait_until {
            if scope.now < until {
                return;
            }
            self.wait_until = None;
        }

        let Some(frame) = self.call_stack.last_mut() else {
            return;
        };

        if let Some(kind) = frame.waiting_for_response {
            // The reply is consumed on its own step.
            let Some(response) = self.pending_response.take() else {
                return;
            };
            frame.waiting_for_response = None;
            let branch = match kind {
                ResponseKind::Dialogue => None,
                ResponseKind::Choice => (response as usize)
                    .checked_sub(1)
                    .and_then(|i| frame.branch_ids.get(i).copied())
                    .flatten(),
            };
            frame.branch_ids.clear();
            let page = Arc::clone(&frame.page);
            if let Some(list_id) = branch {
                self.enter_list(page, list_id);
            }
            self.pop_exhausted();
            return;
        }

        if let Some(wait) = frame.waiting_for_route {
            let active = match wait {
                RouteWait::ThisEvent => self.mover.has_active_route(),
                // a despawned entity cancels the wait
                RouteWait::Entity(id) => scope
                    .entities
                    .get(&id)
                    .is_some_and(|e| e.mover.has_active_route()),
                RouteWait::Event(key) => scope.route_status.get(&key).copied().unwrap_or(false),
            };
            if active {
                return;
            }
            frame.waiting_for_route = None;
        }

        let page = Arc::clone(&frame.page);
        let list_id = frame.list_id;
        let index = frame.index();
        frame.advance();

        match page.list(list_id).and_then(|list| list.get(index)) {
            Some(command) => self.process_command(command, &page, scope),
            None => tracing::debug!(
                "[event] [dangling_list] event={} list={}",
                self.key.descriptor_id,
                list_id
            ),
        }
        self.pop_exhausted();
    }

    fn enter_list(&mut self, page: Arc<EventPage>, list_id: uuid::Uuid) {
        if page.list(list_id).is_some() {
            self.call_stack.push(CommandInstance::new(page, list_id));
        } else {
            tracing::debug!(
                "[event] [dangling_branch] event={} list={}",
                self.key.descriptor_id,
                list_id
            );
        }
    }

    fn current_frame(&mut self) -> Option<&mut CommandInstance> {
        self.call_stack.last_mut()
    }

    fn condition_env<'s>(
        &'s self,
        scope: &'s EventScope<'_>,
        player: Option<&'s Entity>,
    ) -> ConditionEnv<'s> {
        ConditionEnv {
            player,
            server_vars: scope.server_vars,
            self_switches: &self.self_switches,
            map_id: scope.map.map_id,
            npc_count: scope.npc_count,
        }
    }

    fn send_vitals(&self, scope: &EventScope<'_>, entity: &Entity) {
        scope.sink.broadcast(
            scope.observers,
            &Packet::EntityVitals(EntityVitals {
                entity: entity.id,
                vitals: entity.vitals(),
                max_vitals: entity.max_vitals(),
            }),
        );
    }

    fn process_command(
        &mut self,
        command: &EventCommand,
        page: &Arc<EventPage>,
        scope: &mut EventScope<'_>,
    ) {
        let player = self.active_player;

        match command {
            EventCommand::ShowText { text } => {
                let Some(player) = player else { return };
                self.pending_response = None;
                scope.sink.send_packet(
                    player,
                    &Packet::EventDialog(EventDialog {
                        event_id: self.key.descriptor_id,
                        text: text.clone(),
                        options: Vec::new(),
                    }),
                );
                if let Some(frame) = self.current_frame() {
                    frame.waiting_for_response = Some(ResponseKind::Dialogue);
                }
            }

            EventCommand::ShowOptions { text, options } => {
                let Some(player) = player else { return };
                self.pending_response = None;
                scope.sink.send_packet(
                    player,
                    &Packet::EventDialog(EventDialog {
                        event_id: self.key.descriptor_id,
                        text: text.clone(),
                        options: options.iter().map(|o| o.text.clone()).collect(),
                    }),
                );
                if let Some(frame) = self.current_frame() {
                    frame.branch_ids = options.iter().map(|o| o.branch).collect();
                    frame.waiting_for_response = Some(ResponseKind::Choice);
                }
            }

            EventCommand::AddChatboxText { text, channel } => {
                let packet = Packet::ChatMessage(ChatMessage { channel: *channel, text: text.clone() });
                match channel {
                    ChatChannel::Player => {
                        if let Some(player) = player {
                            scope.sink.send_packet(player, &packet);
                        }
                    }
                    ChatChannel::Local => scope.sink.broadcast(scope.observers, &packet),
                    ChatChannel::Global => scope.effects.push(MapEffect::GlobalChat { text: text.clone() }),
                }
            }

            EventCommand::SetVariable { variable, modification } => {
                let value = {
                    let guard = player.and_then(|id| scope.entities.get(&id));
                    let env = self.condition_env(scope, guard.as_deref());
                    let current = env.variable(*variable);
                    modification.apply(&current, |r| Some(env.variable(r)))
                };
                self.store_variable(scope, player, *variable, value);
            }

            EventCommand::SetSelfSwitch { switch, value } => match self.self_switches.get_mut(*switch) {
                Some(slot) => *slot = *value,
                None => tracing::debug!(
                    "[event] [bad_switch] event={} switch={}",
                    self.key.descriptor_id,
                    switch
                ),
            },

            EventCommand::ConditionalBranch { condition, true_branch, false_branch } => {
                let passed = {
                    let guard = player.and_then(|id| scope.entities.get(&id));
                    let env = self.condition_env(scope, guard.as_deref());
                    meets_condition(condition, &env)
                };
                let branch = if passed { true_branch } else { false_branch };
                if let Some(list_id) = branch {
                    self.enter_list(Arc::clone(page), *list_id);
                }
            }

            EventCommand::ExitEventProcess => {
                self.call_stack.clear();
            }

            EventCommand::Label { .. } => {}

            EventCommand::GoToLabel { name } => {
                let target = self
                    .call_stack
                    .iter()
                    .enumerate()
                    .rev()
                    .find_map(|(depth, frame)| frame.find_label(name).map(|index| (depth, index)));
                match target {
                    Some((depth, index)) => {
                        self.call_stack.truncate(depth + 1);
                        if let Some(frame) = self.current_frame() {
                            frame.set_index(index + 1);
                        }
                    }
                    None => tracing::debug!(
                        "[event] [unknown_label] event={} label={}",
                        self.key.descriptor_id,
                        name
                    ),
                }
            }

            EventCommand::StartCommonEvent { event_id } => {
                let Some(common) = scope.db.common_event(*event_id) else {
                    tracing::warn!(
                        "[event] [missing_common_event] event={} common_event={}",
                        self.key.descriptor_id,
                        event_id
                    );
                    return;
                };
                let selected = {
                    let guard = player.and_then(|id| scope.entities.get(&id));
                    let env = self.condition_env(scope, guard.as_deref());
                    common
                        .pages
                        .iter()
                        .rev()
                        .find(|p| meets_conditions(&p.conditions, &env))
                        .cloned()
                };
                if let Some(common_page) = selected {
                    let root = common_page.root_list;
                    self.enter_list(common_page, root);
                }
            }

            EventCommand::RestoreHp { amount } => {
                self.with_player(scope, player, |event, scope, entity| {
                    entity.restore_vital(Vital::Health, *amount);
                    event.send_vitals(scope, entity);
                });
            }

            EventCommand::RestoreMp { amount } => {
                self.with_player(scope, player, |event, scope, entity| {
                    entity.restore_vital(Vital::Mana, *amount);
                    event.send_vitals(scope, entity);
                });
            }

            EventCommand::GiveExperience { amount } => {
                self.with_player(scope, player, |_, _, entity| {
                    let gained = entity.give_experience(*amount);
                    if gained > 0 {
                        tracing::info!("[event] [level_up] player={} level={}", entity.id, entity.level);
                    }
                });
            }

            EventCommand::ChangeLevel { level } => {
                self.with_player(scope, player, |_, _, entity| entity.set_level(*level));
            }

            EventCommand::WarpPlayer { map_id, x, y, direction } => {
                let Some(player) = player else { return };
                let current = scope.entities.get(&player).map(|e| (e.mover.position.z, e.mover.direction));
                let Some((z, facing)) = current else { return };
                scope.effects.push(MapEffect::Warp {
                    player,
                    map_id: *map_id,
                    position: Position { x: *x, y: *y, z },
                    direction: direction.unwrap_or(facing),
                });
            }

            EventCommand::SetMoveRoute { target, route } => match target {
                RouteTarget::Player => {
                    self.with_player(scope, player, |_, _, entity| entity.mover.set_route(route.clone()));
                }
                RouteTarget::ThisEvent => self.mover.set_route(route.clone()),
                RouteTarget::Event { event_id } => {
                    let key = self.sibling_key(scope, *event_id);
                    scope.effects.push(MapEffect::SetEventRoute { key, route: route.clone() });
                }
            },

            EventCommand::WaitForRouteCompletion { target } => {
                let wait = match target {
                    RouteTarget::Player => match player {
                        Some(player) => RouteWait::Entity(player),
                        None => return,
                    },
                    RouteTarget::ThisEvent => RouteWait::ThisEvent,
                    RouteTarget::Event { event_id } => RouteWait::Event(self.sibling_key(scope, *event_id)),
                };
                if let Some(frame) = self.current_frame() {
                    frame.waiting_for_route = Some(wait);
                }
            }

            EventCommand::PlayAnimation { animation_id, target } => {
                let anchor = match target {
                    AnimationTarget::Player => match player {
                        Some(player) => AnimationAnchor::Entity(player),
                        None => return,
                    },
                    AnimationTarget::ThisEvent => AnimationAnchor::Tile(self.mover.position),
                    AnimationTarget::Tile { x, y } => AnimationAnchor::Tile(Position {
                        x: *x,
                        y: *y,
                        z: self.mover.position.z,
                    }),
                };
                scope.batch.add_animation(
                    AnimationUpdate { animation_id: *animation_id, anchor, direction: self.mover.direction },
                    self.key.player,
                );
            }

            EventCommand::Wait { ms } => {
                self.wait_until = Some(scope.now.saturating_add((*ms).max(0)));
            }

            EventCommand::CastSpellOn { spell_id } => {
                let Some(spell) = scope.db.spell(*spell_id) else {
                    tracing::warn!(
                        "[event] [missing_spell] event={} spell={}",
                        self.key.descriptor_id,
                        spell_id
                    );
                    return;
                };
                let now = scope.now;
                self.with_player(scope, player, |event, scope, entity| {
                    let outcome = apply_spell(&CombatantProfile::environment(), entity, &spell, now);
                    if outcome.amount != 0 {
                        let (text, color) = if outcome.amount > 0 {
                            (format!("-{}", outcome.amount), MessageColor::Damage)
                        } else {
                            (format!("+{}", -outcome.amount), MessageColor::Heal)
                        };
                        scope.batch.add_action_message(
                            ActionMessage { position: entity.position(), text, color },
                            None,
                        );
                    }
                    if let Some(animation_id) = spell.animation_id {
                        scope.batch.add_animation(
                            AnimationUpdate {
                                animation_id,
                                anchor: AnimationAnchor::Entity(entity.id),
                                direction: entity.mover.direction,
                            },
                            None,
                        );
                    }
                    event.send_vitals(scope, entity);
                });
            }

            EventCommand::SpawnNpc { npc_id, x, y, direction } => match scope.db.npc(*npc_id) {
                Some(npc) => scope.effects.push(MapEffect::SpawnNpc {
                    npc,
                    position: Position { x: *x, y: *y, z: self.mover.position.z },
                    direction: *direction,
                    spawner: self.key,
                }),
                None => tracing::warn!(
                    "[event] [missing_npc] event={} npc={}",
                    self.key.descriptor_id,
                    npc_id
                ),
            },

            EventCommand::DespawnNpcs => {
                scope.effects.push(MapEffect::DespawnNpcs { spawner: self.key });
            }

            EventCommand::CastSpellAt { spell_id, x, y, direction } => {
                let Some(spell) = scope.db.spell(*spell_id) else {
                    tracing::warn!(
                        "[event] [missing_spell] event={} spell={}",
                        self.key.descriptor_id,
                        spell_id
                    );
                    return;
                };
                let owner = player
                    .and_then(|p| scope.entities.get(&p).map(|e| e.profile()))
                    .unwrap_or_else(CombatantProfile::environment);
                scope.effects.push(MapEffect::PlaceSpell {
                    owner,
                    spell,
                    position: Position { x: *x, y: *y, z: self.mover.position.z },
                    direction: *direction,
                });
            }
        }
    }

    /// Runs `f` on the VM's player if it is still on this map.
    fn with_player(
        &self,
        scope: &EventScope<'_>,
        player: Option<EntityId>,
        f: impl FnOnce(&Event, &EventScope<'_>, &mut Entity),
    ) {
        let Some(player) = player else { return };
        match scope.entities.get_mut(&player) {
            Some(mut entity) => f(self, scope, &mut entity),
            None => tracing::debug!(
                "[event] [player_gone] event={} player={}",
                self.key.descriptor_id,
                player
            ),
        }
    }

    /// Key of another event on the same instance, as seen by this event.
    fn sibling_key(&self, scope: &EventScope<'_>, event_id: uuid::Uuid) -> EventKey {
        let global = scope.descriptor.event(event_id).is_none_or(|d| d.global);
        if global {
            EventKey::global(event_id)
        } else {
            EventKey { descriptor_id: event_id, player: self.key.player }
        }
    }

    fn store_variable(
        &self,
        scope: &EventScope<'_>,
        player: Option<EntityId>,
        variable: VariableRef,
        value: VariableValue,
    ) {
        match variable.scope {
            VariableScope::Server => scope.server_vars.set(variable.variable_id, value),
            VariableScope::Player => {
                self.with_player(scope, player, |_, _, entity| {
                    if let Some(data) = entity.player_mut() {
                        data.variables.insert(variable.variable_id, value);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dashmap::DashMap;
    use uuid::Uuid;

    use super::*;
    use crate::database::event_db::{EventDescriptor, Trigger};
    use crate::database::map_db::MapDescriptor;
    use crate::database::spell_db::SpellDescriptor;
    use crate::database::GameDatabase;
    use crate::game::events::command::DialogueOption;
    use crate::game::events::condition::{Condition, ConditionKind};
    use crate::game::events::VmState;
    use crate::game::map::batch::MovementBatch;
    use crate::game::movement::{MoveRoute, MoveStep};
    use crate::game::types::{Direction, MapInstanceKey};
    use crate::game::variables::{ServerVariables, VariableMod};
    use crate::network::packet::PacketType;
    use crate::network::sink::RecordingSink;

    struct Harness {
        db: GameDatabase,
        map: MapDescriptor,
        server_vars: ServerVariables,
        entities: DashMap<EntityId, Entity>,
        route_status: HashMap<EventKey, bool>,
        sink: RecordingSink,
        batch: MovementBatch,
        player: EntityId,
        now: i64,
    }

    impl Harness {
        fn new() -> Self {
            let map = MapDescriptor::new(Uuid::new_v4(), "test", 10, 10);
            let player = EntityId::new();
            let entities = DashMap::new();
            entities.insert(
                player,
                Entity::new_player(player, "hero", MapInstanceKey::overworld(map.id), Position::new(1, 1)),
            );
            Self {
                db: GameDatabase::new(),
                map,
                server_vars: ServerVariables::new(),
                entities,
                route_status: HashMap::new(),
                sink: RecordingSink::new(),
                batch: MovementBatch::new(),
                player,
                now: 1_000,
            }
        }

        fn event(&self, pages: Vec<EventPage>) -> Event {
            let descriptor = EventDescriptor::new(Uuid::new_v4(), "e", Position::new(3, 3), pages);
            Event::new(EventKey::for_player(descriptor.id, self.player), Arc::new(descriptor))
        }

        fn tick(&mut self, event: &mut Event) -> Vec<MapEffect> {
            let can_enter = |_: Position| true;
            let observers = [self.player];
            let mut scope = EventScope {
                now: self.now,
                map: MapInstanceKey::overworld(self.map.id),
                descriptor: &self.map,
                db: &self.db,
                server_vars: &self.server_vars,
                entities: &self.entities,
                route_status: &self.route_status,
                npc_count: 0,
                observers: &observers,
                sink: &self.sink,
                batch: &self.batch,
                can_enter: &can_enter,
                effects: Vec::new(),
            };
            event.update(&mut scope);
            scope.effects
        }

        fn server_var(&self, id: Uuid) -> i64 {
            self.server_vars.get(id).unwrap_or_default().as_integer()
        }
    }

    fn add(id: Uuid, value: i64) -> EventCommand {
        EventCommand::SetVariable {
            variable: VariableRef { scope: VariableScope::Server, variable_id: id },
            modification: VariableMod::Add { value },
        }
    }

    fn action_page(commands: Vec<EventCommand>) -> EventPage {
        EventPage::with_commands(Trigger::ActionButton, commands)
    }

    #[test]
    fn test_flat_list_runs_one_command_per_tick() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![add(var, 1), add(var, 1), add(var, 1)])]);

        h.tick(&mut event);
        assert!(event.trigger(h.player, Trigger::ActionButton));
        assert_eq!(event.state(), VmState::Running);

        for expected in 1..=3 {
            h.tick(&mut event);
            assert_eq!(h.server_var(var), expected);
        }
        assert_eq!(event.state(), VmState::Idle);
        assert_eq!(event.active_player(), None);
    }

    #[test]
    fn test_trigger_rejects_other_player_and_wrong_trigger() {
        let mut h = Harness::new();
        let mut event = h.event(vec![action_page(vec![EventCommand::DespawnNpcs])]);
        h.tick(&mut event);
        assert!(!event.trigger(EntityId::new(), Trigger::ActionButton));
        assert!(!event.trigger(h.player, Trigger::PlayerCollide));
        assert!(event.is_idle());
    }

    #[test]
    fn test_dangling_branch_is_skipped() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let branch = EventCommand::ConditionalBranch {
            condition: Condition::new(ConditionKind::NoNpcsOnMap),
            true_branch: Some(Uuid::new_v4()),
            false_branch: None,
        };
        let mut event = h.event(vec![action_page(vec![branch, add(var, 5)])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        h.tick(&mut event);
        assert_eq!(event.call_depth(), 1);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 5);
        assert!(event.is_idle());
    }

    #[test]
    fn test_show_options_enters_chosen_branch() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut page = action_page(vec![]);
        let yes = page.add_list(vec![add(var, 10)]);
        let no = page.add_list(vec![add(var, 100)]);
        let root = page.root_list;
        page.command_lists.insert(
            root,
            vec![
                EventCommand::ShowOptions {
                    text: "Pick".into(),
                    options: vec![
                        DialogueOption { text: "yes".into(), branch: Some(yes) },
                        DialogueOption { text: "no".into(), branch: Some(no) },
                    ],
                },
                add(var, 1),
            ],
        );
        let mut event = h.event(vec![page]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        h.tick(&mut event);
        assert_eq!(event.state(), VmState::WaitingForResponse(ResponseKind::Choice));
        let dialogs: Vec<_> = h
            .sink
            .packets_for(h.player)
            .into_iter()
            .filter(|p| p.packet_type() == PacketType::EventDialog)
            .collect();
        assert_eq!(dialogs.len(), 1);

        // waiting does not advance
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 0);

        assert!(!event.submit_response(EntityId::new(), 2));
        assert!(event.submit_response(h.player, 2));
        h.tick(&mut event);
        assert_eq!(event.call_depth(), 2);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 100);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 101);
        assert!(event.is_idle());
    }

    #[test]
    fn test_go_to_label_loops() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![
            EventCommand::Label { name: "top".into() },
            add(var, 1),
            EventCommand::GoToLabel { name: "top".into() },
        ])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        for _ in 0..7 {
            h.tick(&mut event);
        }
        // label, add, goto, add, goto, add, goto
        assert_eq!(h.server_var(var), 3);
        assert!(!event.is_idle());

        event.stop();
        assert!(event.is_idle());
    }

    #[test]
    fn test_wait_holds_until_deadline() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![EventCommand::Wait { ms: 500 }, add(var, 1)])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        h.tick(&mut event);
        assert_eq!(event.state(), VmState::Waiting);
        h.now += 499;
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 0);
        h.now += 1;
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 1);
        assert!(event.is_idle());
    }

    #[test]
    fn test_unbounded_wait_never_wraps() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![EventCommand::Wait { ms: i64::MAX }, add(var, 1)])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        h.tick(&mut event);
        h.now += 1_000_000;
        h.tick(&mut event);
        assert_eq!(event.state(), VmState::Waiting);
        assert_eq!(h.server_var(var), 0);
    }

    #[test]
    fn test_cast_spell_at_places_spell_owned_by_player() {
        let mut h = Harness::new();
        let spell = h.db.insert_spell(SpellDescriptor::new(Uuid::new_v4(), "Snare"));
        let missing = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![
            EventCommand::CastSpellAt { spell_id: missing, x: 0, y: 0, direction: Direction::Down },
            EventCommand::CastSpellAt { spell_id: spell.id, x: 4, y: 5, direction: Direction::Left },
        ])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        assert!(h.tick(&mut event).is_empty());
        let effects = h.tick(&mut event);
        match effects.as_slice() {
            [MapEffect::PlaceSpell { owner, spell: placed, position, direction }] => {
                assert_eq!(owner.id, h.player);
                assert_eq!(placed.id, spell.id);
                assert_eq!((position.x, position.y), (4, 5));
                assert_eq!(*direction, Direction::Left);
            }
            other => panic!("expected one PlaceSpell, got {:?}", other),
        }
        assert!(event.is_idle());
    }

    #[test]
    fn test_route_wait_on_despawned_player_is_cancelled() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let route = MoveRoute {
            steps: vec![MoveStep::Move { direction: Direction::Right }; 3],
            repeat: false,
            ignore_if_blocked: false,
        };
        let mut event = h.event(vec![action_page(vec![
            EventCommand::SetMoveRoute { target: RouteTarget::Player, route },
            EventCommand::WaitForRouteCompletion { target: RouteTarget::Player },
            add(var, 1),
        ])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);

        h.tick(&mut event);
        assert!(h.entities.get(&h.player).is_some_and(|e| e.mover.has_active_route()));
        h.tick(&mut event);
        assert_eq!(event.state(), VmState::WaitingForRoute);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 0);

        h.entities.remove(&h.player);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 1);
    }

    #[test]
    fn test_missing_common_event_is_a_no_op() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![
            EventCommand::StartCommonEvent { event_id: Uuid::new_v4() },
            add(var, 1),
        ])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);
        h.tick(&mut event);
        assert_eq!(event.call_depth(), 1);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 1);
    }

    #[test]
    fn test_common_event_runs_as_sub_frame() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let common = h.db.insert_common_event(EventDescriptor::new(
            Uuid::new_v4(),
            "common",
            Position::new(0, 0),
            vec![action_page(vec![add(var, 7)])],
        ));
        let mut event = h.event(vec![action_page(vec![EventCommand::StartCommonEvent { event_id: common.id }])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);
        h.tick(&mut event);
        assert_eq!(event.call_depth(), 2);
        h.tick(&mut event);
        assert_eq!(h.server_var(var), 7);
        assert!(event.is_idle());
    }

    #[test]
    fn test_highest_matching_page_wins_and_autorun_starts() {
        let mut h = Harness::new();
        let var = Uuid::new_v4();
        let mut gated = EventPage::with_commands(
            Trigger::Autorun,
            vec![add(var, 1), EventCommand::SetSelfSwitch { switch: 0, value: false }],
        );
        gated.conditions.push(Condition::new(ConditionKind::SelfSwitch { switch: 0, value: true }));
        let mut event = h.event(vec![action_page(vec![]), gated]);

        h.tick(&mut event);
        assert_eq!(event.page_index(), Some(0));
        assert!(event.is_idle());

        event.self_switches[0] = true;
        // page refresh, autorun start and first command share the tick
        h.tick(&mut event);
        assert_eq!(event.page_index(), Some(1));
        assert_eq!(h.server_var(var), 1);
        h.tick(&mut event);
        assert!(event.is_idle());
        h.tick(&mut event);
        assert_eq!(event.page_index(), Some(0));
        assert_eq!(h.server_var(var), 1);
    }

    #[test]
    fn test_effects_are_collected() {
        let mut h = Harness::new();
        let target = Uuid::new_v4();
        let mut event = h.event(vec![action_page(vec![
            EventCommand::WarpPlayer { map_id: target, x: 4, y: 5, direction: None },
            EventCommand::DespawnNpcs,
        ])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);
        let effects = h.tick(&mut event);
        assert!(matches!(
            effects.as_slice(),
            [MapEffect::Warp { map_id, position, .. }] if *map_id == target && position.x == 4 && position.y == 5
        ));
        let effects = h.tick(&mut event);
        assert!(matches!(effects.as_slice(), [MapEffect::DespawnNpcs { .. }]));
    }

    #[test]
    fn test_restore_and_experience_touch_player() {
        let mut h = Harness::new();
        if let Some(mut player) = h.entities.get_mut(&h.player) {
            player.set_vital(Vital::Health, 1);
        }
        let mut event = h.event(vec![action_page(vec![
            EventCommand::RestoreHp { amount: None },
            EventCommand::ChangeLevel { level: 5 },
        ])]);
        h.tick(&mut event);
        event.trigger(h.player, Trigger::ActionButton);
        h.tick(&mut event);
        h.tick(&mut event);
        let player = h.entities.get(&h.player).unwrap();
        assert_eq!(player.vital(Vital::Health), player.max_vital(Vital::Health));
        assert_eq!(player.level, 5);
        assert!(h
            .sink
            .packets_for(h.player)
            .iter()
            .any(|p| p.packet_type() == PacketType::EntityVitals));
    }
}
