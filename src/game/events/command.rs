//! Event commands and VM activation records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::condition::Condition;
use super::EventKey;
use crate::database::event_db::EventPage;
use crate::game::movement::MoveRoute;
use crate::game::types::{Direction, EntityId};
use crate::game::variables::{VariableMod, VariableRef};
use crate::network::packet::ChatChannel;

/// Whose move route a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    Player,
    ThisEvent,
    Event { event_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationTarget {
    Player,
    ThisEvent,
    Tile { x: i32, y: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueOption {
    pub text: String,
    /// List entered when this option is picked.
    #[serde(default)]
    pub branch: Option<Uuid>,
}

/// One scripting primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventCommand {
    ShowText {
        text: String,
    },
    ShowOptions {
        text: String,
        options: Vec<DialogueOption>,
    },
    AddChatboxText {
        text: String,
        #[serde(default)]
        channel: ChatChannel,
    },
    SetVariable {
        variable: VariableRef,
        modification: VariableMod,
    },
    SetSelfSwitch {
        switch: usize,
        value: bool,
    },
    ConditionalBranch {
        condition: Condition,
        #[serde(default)]
        true_branch: Option<Uuid>,
        #[serde(default)]
        false_branch: Option<Uuid>,
    },
    ExitEventProcess,
    Label {
        name: String,
    },
    GoToLabel {
        name: String,
    },
    StartCommonEvent {
        event_id: Uuid,
    },
    /// `None` restores to full.
    RestoreHp {
        #[serde(default)]
        amount: Option<i32>,
    },
    RestoreMp {
        #[serde(default)]
        amount: Option<i32>,
    },
    GiveExperience {
        amount: i64,
    },
    ChangeLevel {
        level: i32,
    },
    WarpPlayer {
        map_id: Uuid,
        x: i32,
        y: i32,
        #[serde(default)]
        direction: Option<Direction>,
    },
    SetMoveRoute {
        target: RouteTarget,
        route: MoveRoute,
    },
    WaitForRouteCompletion {
        target: RouteTarget,
    },
    PlayAnimation {
        animation_id: Uuid,
        target: AnimationTarget,
    },
    Wait {
        ms: i64,
    },
    CastSpellOn {
        spell_id: Uuid,
    },
    /// Launches the spell as a projectile when it has one, otherwise lays it
    /// as a trap on the tile. The VM's player, if any, owns it.
    CastSpellAt {
        spell_id: Uuid,
        x: i32,
        y: i32,
        #[serde(default)]
        direction: Direction,
    },
    SpawnNpc {
        npc_id: Uuid,
        x: i32,
        y: i32,
        #[serde(default)]
        direction: Direction,
    },
    DespawnNpcs,
}

/// Reply a suspended frame expects from its player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Any reply continues.
    Dialogue,
    /// Reply `i` (1-based) enters `branch_ids[i - 1]`.
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteWait {
    ThisEvent,
    Entity(EntityId),
    Event(EventKey),
}

/// One frame of the call stack: a command list and a cursor into it.
#[derive(Debug, Clone)]
pub struct CommandInstance {
    pub page: Arc<EventPage>,
    pub list_id: Uuid,
    index: usize,
    pub branch_ids: Vec<Option<Uuid>>,
    pub waiting_for_response: Option<ResponseKind>,
    pub waiting_for_route: Option<RouteWait>,
}

impl CommandInstance {
    pub fn new(page: Arc<EventPage>, list_id: Uuid) -> Self {
        Self {
            page,
            list_id,
            index: 0,
            branch_ids: Vec::new(),
            waiting_for_response: None,
            waiting_for_route: None,
        }
    }

    pub fn root(page: Arc<EventPage>) -> Self {
        let list_id = page.root_list;
        Self::new(page, list_id)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Clamped to `[0, len]`; `len` marks the list exhausted.
    pub fn set_index(&mut self, index: usize) {
        self.index = index.min(self.len());
    }

    pub fn advance(&mut self) {
        self.set_index(self.index + 1);
    }

    /// A dangling list id reads as an empty list.
    pub fn len(&self) -> usize {
        self.page.list(self.list_id).map_or(0, |l| l.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn command(&self) -> Option<&EventCommand> {
        self.page.list(self.list_id)?.get(self.index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.waiting_for_response.is_some() || self.waiting_for_route.is_some()
    }

    pub fn find_label(&self, name: &str) -> Option<usize> {
        self.page.list(self.list_id)?.iter().position(|c| {
            matches!(c, EventCommand::Label { name: label } if label == name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::event_db::Trigger;

    fn page(commands: Vec<EventCommand>) -> Arc<EventPage> {
        Arc::new(EventPage::with_commands(Trigger::ActionButton, commands))
    }

    #[test]
    fn test_index_is_clamped() {
        let mut frame = CommandInstance::root(page(vec![EventCommand::DespawnNpcs; 2]));
        assert_eq!(frame.len(), 2);
        frame.set_index(10);
        assert_eq!(frame.index(), 2);
        assert!(frame.is_exhausted());
        assert!(frame.command().is_none());
        frame.advance();
        assert_eq!(frame.index(), 2);
    }

    #[test]
    fn test_command_follows_index() {
        let mut frame = CommandInstance::root(page(vec![
            EventCommand::Wait { ms: 1 },
            EventCommand::Wait { ms: 2 },
        ]));
        assert_eq!(frame.command(), Some(&EventCommand::Wait { ms: 1 }));
        frame.set_index(1);
        assert_eq!(frame.command(), Some(&EventCommand::Wait { ms: 2 }));
    }

    #[test]
    fn test_dangling_list_is_exhausted() {
        let frame = CommandInstance::new(page(vec![]), Uuid::new_v4());
        assert!(frame.is_empty());
        assert!(frame.is_exhausted());
    }

    #[test]
    fn test_find_label() {
        let frame = CommandInstance::root(page(vec![
            EventCommand::Wait { ms: 1 },
            EventCommand::Label { name: "loop".into() },
        ]));
        assert_eq!(frame.find_label("loop"), Some(1));
        assert_eq!(frame.find_label("missing"), None);
    }

    #[test]
    fn test_parse_commands() {
        let yaml = r#"
- type: show_options
  text: Buy?
  options:
    - text: "Yes"
      branch: "8f14e45f-ceea-4672-a7e7-d2b4f0e0e001"
    - text: "No"
- type: set_move_route
  target: this_event
  route:
    steps:
      - step: turn
        direction: Left
- type: add_chatbox_text
  text: hello
  channel: global
- type: exit_event_process
"#;
        let commands: Vec<EventCommand> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(commands.len(), 4);
        match &commands[0] {
            EventCommand::ShowOptions { options, .. } => {
                assert!(options[0].branch.is_some());
                assert!(options[1].branch.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(matches!(commands[1], EventCommand::SetMoveRoute { target: RouteTarget::ThisEvent, .. }));
        assert!(matches!(commands[2], EventCommand::AddChatboxText { channel: ChatChannel::Global, .. }));
        assert_eq!(commands[3], EventCommand::ExitEventProcess);
    }
}
