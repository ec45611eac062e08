//! Script variables: values, the server-wide table and modifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl Default for VariableValue {
    fn default() -> Self {
        VariableValue::Integer(0)
    }
}

impl VariableValue {
    pub fn as_boolean(&self) -> bool {
        match self {
            VariableValue::Boolean(b) => *b,
            VariableValue::Integer(i) => *i != 0,
            VariableValue::String(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }

    pub fn as_integer(&self) -> i64 {
        match self {
            VariableValue::Boolean(b) => i64::from(*b),
            VariableValue::Integer(i) => *i,
            VariableValue::String(s) => s.trim().parse().unwrap_or(0),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            VariableValue::Boolean(b) => b.to_string(),
            VariableValue::Integer(i) => i.to_string(),
            VariableValue::String(s) => s.clone(),
        }
    }
}

/// Which table a variable id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Player,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableRef {
    pub scope: VariableScope,
    pub variable_id: Uuid,
}

/// Server-wide variables, shared by every map instance.
#[derive(Debug, Default)]
pub struct ServerVariables {
    values: DashMap<Uuid, VariableValue>,
    dirty: AtomicBool,
}

impl ServerVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<Uuid, VariableValue>) -> Self {
        Self { values: values.into_iter().collect(), dirty: AtomicBool::new(false) }
    }

    pub fn get(&self, id: Uuid) -> Option<VariableValue> {
        self.values.get(&id).map(|v| v.clone())
    }

    pub fn set(&self, id: Uuid, value: VariableValue) {
        self.values.insert(id, value);
        self.dirty.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> HashMap<Uuid, VariableValue> {
        self.values.iter().map(|e| (*e.key(), e.value().clone())).collect()
    }

    /// Returns whether anything changed since the last call.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// A `set_variable` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum VariableMod {
    SetBoolean { value: bool },
    SetInteger { value: i64 },
    Add { value: i64 },
    Subtract { value: i64 },
    Multiply { value: i64 },
    Divide { value: i64 },
    Random { low: i64, high: i64 },
    SystemTime,
    Copy { from: VariableRef },
    SetString { value: String },
    Replace { find: String, replace: String },
}

impl VariableMod {
    /// Computes the new value. `lookup` resolves other variables for `copy`.
    pub fn apply(
        &self,
        current: &VariableValue,
        lookup: impl Fn(VariableRef) -> Option<VariableValue>,
    ) -> VariableValue {
        match self {
            VariableMod::SetBoolean { value } => VariableValue::Boolean(*value),
            VariableMod::SetInteger { value } => VariableValue::Integer(*value),
            VariableMod::Add { value } => {
                VariableValue::Integer(current.as_integer().saturating_add(*value))
            }
            VariableMod::Subtract { value } => {
                VariableValue::Integer(current.as_integer().saturating_sub(*value))
            }
            VariableMod::Multiply { value } => {
                VariableValue::Integer(current.as_integer().saturating_mul(*value))
            }
            VariableMod::Divide { value } => match current.as_integer().checked_div(*value) {
                Some(v) => VariableValue::Integer(v),
                None => current.clone(),
            },
            VariableMod::Random { low, high } => {
                let (lo, hi) = if low <= high { (*low, *high) } else { (*high, *low) };
                VariableValue::Integer(rand::rng().random_range(lo..=hi))
            }
            VariableMod::SystemTime => {
                VariableValue::Integer(chrono::Utc::now().timestamp_millis())
            }
            VariableMod::Copy { from } => lookup(*from).unwrap_or_default(),
            VariableMod::SetString { value } => VariableValue::String(value.clone()),
            VariableMod::Replace { find, replace } => {
                if find.is_empty() {
                    current.clone()
                } else {
                    VariableValue::String(current.as_string().replace(find.as_str(), replace))
                }
            }
        }
    }
}
