//! Map descriptors: bounds, blocked tiles, neighbours and placed events.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event_db::EventDescriptor;
use crate::game::types::{Direction, Position};

/// A blocked cell. Blocking applies to every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

/// Maps bordering this one, stitched edge to edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Neighbours {
    pub up: Option<Uuid>,
    pub down: Option<Uuid>,
    pub left: Option<Uuid>,
    pub right: Option<Uuid>,
}

impl Neighbours {
    pub fn get(&self, direction: Direction) -> Option<Uuid> {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Uuid> {
        [self.up, self.down, self.left, self.right].into_iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDescriptor {
    pub id: Uuid,
    pub name: String,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub blocked: HashSet<Tile>,
    #[serde(default)]
    pub neighbours: Neighbours,
    #[serde(default)]
    pub events: Vec<Arc<EventDescriptor>>,
}

impl MapDescriptor {
    pub fn new(id: Uuid, name: &str, width: i32, height: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            width,
            height,
            blocked: HashSet::new(),
            neighbours: Neighbours::default(),
            events: Vec::new(),
        }
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        (0..self.width).contains(&position.x) && (0..self.height).contains(&position.y)
    }

    /// Out-of-bounds tiles count as blocked.
    pub fn is_blocked(&self, position: Position) -> bool {
        !self.in_bounds(position) || self.blocked.contains(&Tile { x: position.x, y: position.y })
    }

    pub fn event(&self, id: Uuid) -> Option<&Arc<EventDescriptor>> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Where a step off the edge in `direction` lands on the neighbouring map,
    /// assuming the neighbour shares this map's size along the shared edge.
    pub fn edge_crossing(
        &self,
        from: Position,
        direction: Direction,
        neighbour: &MapDescriptor,
    ) -> Position {
        let mut to = from.offset(direction);
        match direction {
            Direction::Up => to.y = neighbour.height - 1,
            Direction::Down => to.y = 0,
            Direction::Left => to.x = neighbour.width - 1,
            Direction::Right => to.x = 0,
        }
        to.x = to.x.clamp(0, (neighbour.width - 1).max(0));
        to.y = to.y.clamp(0, (neighbour.height - 1).max(0));
        to
    }
}
