//! Tile movement and scripted move routes.
//!
//! Both entities and event pages own a [`Mover`]. Routes are advanced by the
//! owning map instance once per cycle; a finished route is cleared so that
//! anyone waiting on it sees completion on their next poll.

use serde::{Deserialize, Serialize};

use super::types::{Direction, Position};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MoveStep {
    Move { direction: Direction },
    Turn { direction: Direction },
    Wait { ms: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveRoute {
    pub steps: Vec<MoveStep>,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub ignore_if_blocked: bool,
}

/// What a call to [`Mover::advance_route`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No route, or not yet time for the next step.
    Idle,
    Moved { from: Position, to: Position },
    Turned,
    Waiting,
    Blocked,
}

#[derive(Debug, Clone)]
struct RouteProgress {
    route: MoveRoute,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct Mover {
    pub position: Position,
    pub direction: Direction,
    pub move_interval_ms: i64,
    next_move_at: i64,
    route: Option<RouteProgress>,
}

impl Mover {
    pub fn new(position: Position, direction: Direction, move_interval_ms: i64) -> Self {
        Self {
            position,
            direction,
            move_interval_ms: move_interval_ms.max(0),
            next_move_at: 0,
            route: None,
        }
    }

    pub fn set_route(&mut self, route: MoveRoute) {
        if route.steps.is_empty() {
            self.route = None;
        } else {
            self.route = Some(RouteProgress { route, index: 0 });
        }
    }

    pub fn clear_route(&mut self) {
        self.route = None;
    }

    pub fn has_active_route(&self) -> bool {
        self.route.is_some()
    }

    pub fn can_act(&self, now: i64) -> bool {
        now >= self.next_move_at
    }

    /// Single manual step (player input). Returns the new position when the
    /// step was taken; a blocked step still turns the mover.
    pub fn try_step(
        &mut self,
        direction: Direction,
        now: i64,
        can_enter: impl Fn(Position) -> bool,
    ) -> Option<Position> {
        if !self.can_act(now) {
            return None;
        }
        self.direction = direction;
        let target = self.position.offset(direction);
        if !can_enter(target) {
            return None;
        }
        self.position = target;
        self.next_move_at = now + self.move_interval_ms;
        Some(target)
    }

    /// Executes at most one route step.
    pub fn advance_route(&mut self, now: i64, can_enter: impl Fn(Position) -> bool) -> StepOutcome {
        if !self.can_act(now) {
            return StepOutcome::Idle;
        }
        let Some(progress) = self.route.as_mut() else {
            return StepOutcome::Idle;
        };
        let Some(step) = progress.route.steps.get(progress.index).cloned() else {
            self.route = None;
            return StepOutcome::Idle;
        };

        let outcome = match step {
            MoveStep::Move { direction } => {
                self.direction = direction;
                let from = self.position;
                let to = from.offset(direction);
                if can_enter(to) {
                    self.position = to;
                    self.next_move_at = now + self.move_interval_ms;
                    progress.index += 1;
                    StepOutcome::Moved { from, to }
                } else {
                    if progress.route.ignore_if_blocked {
                        progress.index += 1;
                    }
                    StepOutcome::Blocked
                }
            }
            MoveStep::Turn { direction } => {
                self.direction = direction;
                progress.index += 1;
                StepOutcome::Turned
            }
            MoveStep::Wait { ms } => {
                self.next_move_at = now.saturating_add(ms.max(0));
                progress.index += 1;
                StepOutcome::Waiting
            }
        };

        if progress.index >= progress.route.steps.len() {
            if progress.route.repeat {
                progress.index = 0;
            } else {
                self.route = None;
            }
        }
        outcome
    }
}
