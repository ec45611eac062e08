//! Event descriptors: placed map events and common events.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::events::command::EventCommand;
use crate::game::events::condition::Condition;
use crate::game::movement::MoveRoute;
use crate::game::types::{Direction, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    ActionButton,
    PlayerCollide,
    Autorun,
}

fn default_move_interval_ms() -> i64 {
    500
}

/// One page of an event. The active page is the highest-index page whose
/// conditions all hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub passable: bool,
    #[serde(default = "default_move_interval_ms")]
    pub move_interval_ms: i64,
    #[serde(default)]
    pub direction: Direction,
    /// Route the event walks while idle.
    #[serde(default)]
    pub move_route: Option<MoveRoute>,
    pub root_list: Uuid,
    #[serde(default)]
    pub command_lists: HashMap<Uuid, Vec<EventCommand>>,
}

impl EventPage {
    /// Page with a single root list.
    pub fn with_commands(trigger: Trigger, commands: Vec<EventCommand>) -> Self {
        let root_list = Uuid::new_v4();
        Self {
            trigger,
            conditions: Vec::new(),
            passable: false,
            move_interval_ms: default_move_interval_ms(),
            direction: Direction::default(),
            move_route: None,
            root_list,
            command_lists: HashMap::from([(root_list, commands)]),
        }
    }

    pub fn list(&self, id: Uuid) -> Option<&[EventCommand]> {
        self.command_lists.get(&id).map(|l| l.as_slice())
    }

    /// Adds a branch list and returns its id.
    pub fn add_list(&mut self, commands: Vec<EventCommand>) -> Uuid {
        let id = Uuid::new_v4();
        self.command_lists.insert(id, commands);
        id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub id: Uuid,
    pub name: String,
    /// Global events exist once per map instance; the others once per player.
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub position: Position,
    pub pages: Vec<Arc<EventPage>>,
}

impl EventDescriptor {
    pub fn new(id: Uuid, name: &str, position: Position, pages: Vec<EventPage>) -> Self {
        Self {
            id,
            name: name.to_string(),
            global: false,
            position,
            pages: pages.into_iter().map(Arc::new).collect(),
        }
    }
}
