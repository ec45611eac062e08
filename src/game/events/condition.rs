//! Page and branch conditions, and variable comparison dispatch.
//!
//! Condition and comparison shapes are closed enums, so every kind has a
//! handler by construction and dispatch is a single `match`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SELF_SWITCH_COUNT;
use crate::game::entity::Entity;
use crate::game::types::StatType;
use crate::game::variables::{ServerVariables, VariableRef, VariableScope, VariableValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerComparator {
    #[serde(alias = "=")]
    Equal,
    #[serde(alias = ">=")]
    GreaterOrEqual,
    #[serde(alias = "<=")]
    LessOrEqual,
    #[serde(alias = ">")]
    Greater,
    #[serde(alias = "<")]
    Less,
    #[serde(alias = "!=")]
    NotEqual,
}

impl IntegerComparator {
    pub fn compare(self, left: i64, right: i64) -> bool {
        match self {
            IntegerComparator::Equal => left == right,
            IntegerComparator::GreaterOrEqual => left >= right,
            IntegerComparator::LessOrEqual => left <= right,
            IntegerComparator::Greater => left > right,
            IntegerComparator::Less => left < right,
            IntegerComparator::NotEqual => left != right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringComparator {
    Equal,
    Contains,
}

fn default_true() -> bool {
    true
}

/// How a variable's current value is tested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableComparison {
    Boolean {
        /// `false` turns the test into "not equal".
        #[serde(default = "default_true")]
        equal: bool,
        #[serde(default)]
        value: bool,
        /// Compare against another variable instead of `value`.
        #[serde(default)]
        compare_to: Option<VariableRef>,
    },
    Integer {
        comparator: IntegerComparator,
        #[serde(default)]
        value: i64,
        #[serde(default)]
        compare_to: Option<VariableRef>,
    },
    String {
        comparator: StringComparator,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    VariableIs {
        variable: VariableRef,
        comparison: VariableComparison,
    },
    /// Player level when `stat` is unset, otherwise the resolved stat.
    LevelOrStat {
        #[serde(default)]
        stat: Option<StatType>,
        comparator: IntegerComparator,
        value: i64,
    },
    SelfSwitch {
        switch: usize,
        value: bool,
    },
    MapIs {
        map_id: Uuid,
    },
    NoNpcsOnMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub negated: bool,
    pub check: ConditionKind,
}

impl Condition {
    pub fn new(check: ConditionKind) -> Self {
        Self { negated: false, check }
    }

    pub fn negated(check: ConditionKind) -> Self {
        Self { negated: true, check }
    }
}

/// What a condition may look at.
pub struct ConditionEnv<'a> {
    pub player: Option<&'a Entity>,
    pub server_vars: &'a ServerVariables,
    pub self_switches: &'a [bool; SELF_SWITCH_COUNT],
    pub map_id: Uuid,
    pub npc_count: usize,
}

impl ConditionEnv<'_> {
    /// Unset variables and player variables without a player read as 0.
    pub fn variable(&self, variable: VariableRef) -> VariableValue {
        match variable.scope {
            VariableScope::Player => self
                .player
                .and_then(|p| p.player())
                .map(|data| data.variable(variable.variable_id))
                .unwrap_or_default(),
            VariableScope::Server => self.server_vars.get(variable.variable_id).unwrap_or_default(),
        }
    }
}

pub fn check_variable_comparison(
    current: &VariableValue,
    comparison: &VariableComparison,
    env: &ConditionEnv<'_>,
) -> bool {
    match comparison {
        VariableComparison::Boolean { equal, value, compare_to } => {
            let other = match compare_to {
                Some(r) => env.variable(*r).as_boolean(),
                None => *value,
            };
            (current.as_boolean() == other) == *equal
        }
        VariableComparison::Integer { comparator, value, compare_to } => {
            let other = match compare_to {
                Some(r) => env.variable(*r).as_integer(),
                None => *value,
            };
            comparator.compare(current.as_integer(), other)
        }
        VariableComparison::String { comparator, value } => {
            let current = current.as_string();
            match comparator {
                StringComparator::Equal => current == *value,
                StringComparator::Contains => current.contains(value.as_str()),
            }
        }
    }
}

pub fn meets_condition(condition: &Condition, env: &ConditionEnv<'_>) -> bool {
    let result = match &condition.check {
        ConditionKind::VariableIs { variable, comparison } => {
            check_variable_comparison(&env.variable(*variable), comparison, env)
        }
        ConditionKind::LevelOrStat { stat, comparator, value } => match env.player {
            Some(player) => {
                let current = match stat {
                    Some(stat) => i64::from(player.stat_value(*stat)),
                    None => i64::from(player.level),
                };
                comparator.compare(current, *value)
            }
            None => false,
        },
        ConditionKind::SelfSwitch { switch, value } => {
            env.self_switches.get(*switch).is_some_and(|s| s == value)
        }
        ConditionKind::MapIs { map_id } => env.map_id == *map_id,
        ConditionKind::NoNpcsOnMap => env.npc_count == 0,
    };
    result != condition.negated
}

pub fn meets_conditions(conditions: &[Condition], env: &ConditionEnv<'_>) -> bool {
    conditions.iter().all(|c| meets_condition(c, env))
}
