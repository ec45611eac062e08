//! Persistence boundary for player records and server variables.
//!
//! Every call may fail. Callers log the failure with the entity id and keep
//! running on in-memory state; nothing here retries.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::game::entity::InventorySlot;
use crate::game::types::{Direction, EntityId, Position, StatBlock, VitalBlock};
use crate::game::variables::VariableValue;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed yaml in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Saved state of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: EntityId,
    pub name: String,
    pub map_id: Uuid,
    pub position: Position,
    #[serde(default)]
    pub direction: Direction,
    pub level: i32,
    #[serde(default)]
    pub experience: i64,
    #[serde(default)]
    pub base_stats: StatBlock,
    #[serde(default)]
    pub stat_points: StatBlock,
    pub vitals: VitalBlock,
    pub max_vitals: VitalBlock,
    #[serde(default)]
    pub party: Option<Uuid>,
    #[serde(default)]
    pub variables: HashMap<Uuid, VariableValue>,
    #[serde(default)]
    pub inventory: Vec<InventorySlot>,
}

pub trait Persistence: Send + Sync {
    fn load_player(&self, id: EntityId) -> Result<Option<PlayerRecord>, PersistenceError>;
    fn save_player(&self, record: &PlayerRecord) -> Result<(), PersistenceError>;
    fn load_server_variables(&self) -> Result<HashMap<Uuid, VariableValue>, PersistenceError>;
    fn save_server_variables(
        &self,
        values: &HashMap<Uuid, VariableValue>,
    ) -> Result<(), PersistenceError>;
}

/// One YAML file per player under `players/`, plus `server_variables.yaml`.
#[derive(Debug, Clone)]
pub struct YamlStore {
    root: PathBuf,
}

impl YamlStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn player_path(&self, id: EntityId) -> PathBuf {
        self.root.join("players").join(format!("{}.yaml", id))
    }

    fn server_variables_path(&self) -> PathBuf {
        self.root.join("server_variables.yaml")
    }

    fn read<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, PersistenceError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::Io { path: path.to_path_buf(), source: e }),
        };
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|e| PersistenceError::Yaml { path: path.to_path_buf(), source: e })
    }

    /// Writes to a sibling temp file and renames it over the target.
    fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
        let yaml = serde_yaml::to_string(value)
            .map_err(|e| PersistenceError::Yaml { path: path.to_path_buf(), source: e })?;
        let io_err = |e| PersistenceError::Io { path: path.to_path_buf(), source: e };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

impl Persistence for YamlStore {
    fn load_player(&self, id: EntityId) -> Result<Option<PlayerRecord>, PersistenceError> {
        Self::read(&self.player_path(id))
    }

    fn save_player(&self, record: &PlayerRecord) -> Result<(), PersistenceError> {
        Self::write(&self.player_path(record.id), record)
    }

    fn load_server_variables(&self) -> Result<HashMap<Uuid, VariableValue>, PersistenceError> {
        Ok(Self::read(&self.server_variables_path())?.unwrap_or_default())
    }

    fn save_server_variables(
        &self,
        values: &HashMap<Uuid, VariableValue>,
    ) -> Result<(), PersistenceError> {
        Self::write(&self.server_variables_path(), values)
    }
}

/// In-process store. Saves can be switched to fail for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: Mutex<HashMap<EntityId, PlayerRecord>>,
    server_variables: Mutex<HashMap<Uuid, VariableValue>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Release);
    }

    pub fn insert_player(&self, record: PlayerRecord) {
        self.players.lock().insert(record.id, record);
    }

    pub fn player(&self, id: EntityId) -> Option<PlayerRecord> {
        self.players.lock().get(&id).cloned()
    }

    pub fn server_variables(&self) -> HashMap<Uuid, VariableValue> {
        self.server_variables.lock().clone()
    }

    fn check_saves(&self) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::Acquire) {
            return Err(PersistenceError::Unavailable("saves disabled".to_string()));
        }
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn load_player(&self, id: EntityId) -> Result<Option<PlayerRecord>, PersistenceError> {
        Ok(self.player(id))
    }

    fn save_player(&self, record: &PlayerRecord) -> Result<(), PersistenceError> {
        self.check_saves()?;
        self.insert_player(record.clone());
        Ok(())
    }

    fn load_server_variables(&self) -> Result<HashMap<Uuid, VariableValue>, PersistenceError> {
        Ok(self.server_variables())
    }

    fn save_server_variables(
        &self,
        values: &HashMap<Uuid, VariableValue>,
    ) -> Result<(), PersistenceError> {
        self.check_saves()?;
        *self.server_variables.lock() = values.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PlayerRecord {
        PlayerRecord {
            id: EntityId::new(),
            name: "tester".to_string(),
            map_id: Uuid::new_v4(),
            position: Position::new(3, 4),
            direction: Direction::Left,
            level: 7,
            experience: 120,
            base_stats: StatBlock { attack: 5, ..Default::default() },
            stat_points: StatBlock::default(),
            vitals: VitalBlock { health: 40, mana: 10 },
            max_vitals: VitalBlock { health: 50, mana: 20 },
            party: None,
            variables: HashMap::from([
                (Uuid::new_v4(), VariableValue::Integer(3)),
                (Uuid::new_v4(), VariableValue::String("quest".to_string())),
            ]),
            inventory: vec![InventorySlot { item_id: Uuid::new_v4(), quantity: 2 }],
        }
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("realm_store_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_yaml_store_player_round_trip() {
        let root = temp_root();
        let store = YamlStore::new(&root);
        let rec = record();

        assert!(store.load_player(rec.id).unwrap().is_none());
        store.save_player(&rec).unwrap();
        assert_eq!(store.load_player(rec.id).unwrap(), Some(rec));
        assert!(!root.join("players").read_dir().unwrap().any(|e| {
            e.unwrap().path().extension().is_some_and(|ext| ext == "tmp")
        }));

        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_yaml_store_server_variables() {
        let root = temp_root();
        let store = YamlStore::new(&root);
        assert!(store.load_server_variables().unwrap().is_empty());

        let values = HashMap::from([(Uuid::new_v4(), VariableValue::Boolean(true))]);
        store.save_server_variables(&values).unwrap();
        assert_eq!(store.load_server_variables().unwrap(), values);

        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_yaml_store_malformed_file() {
        let root = temp_root();
        let store = YamlStore::new(&root);
        let id = EntityId::new();
        fs::create_dir_all(root.join("players")).unwrap();
        fs::write(store.player_path(id), "id: [broken").unwrap();

        assert!(matches!(store.load_player(id), Err(PersistenceError::Yaml { .. })));

        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_memory_store_failing_saves() {
        let store = MemoryStore::new();
        let rec = record();
        store.set_fail_saves(true);
        assert!(store.save_player(&rec).is_err());
        assert!(store.player(rec.id).is_none());

        store.set_fail_saves(false);
        store.save_player(&rec).unwrap();
        assert_eq!(store.load_player(rec.id).unwrap(), Some(rec));
    }
}
