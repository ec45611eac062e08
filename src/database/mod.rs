//! Descriptor tables loaded from YAML, plus the persistence boundary.
//!
//! A [`GameDatabase`] is built once at startup and shared behind an `Arc`;
//! descriptors never change while the server runs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub mod event_db;
pub mod map_db;
pub mod npc_db;
pub mod spell_db;
pub mod store;

use event_db::EventDescriptor;
use map_db::MapDescriptor;
use npc_db::NpcDescriptor;
use spell_db::SpellDescriptor;

#[derive(Debug, Default)]
pub struct GameDatabase {
    spells: HashMap<Uuid, Arc<SpellDescriptor>>,
    npcs: HashMap<Uuid, Arc<NpcDescriptor>>,
    common_events: HashMap<Uuid, Arc<EventDescriptor>>,
    maps: HashMap<Uuid, Arc<MapDescriptor>>,
}

impl GameDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `spells.yaml`, `npcs.yaml`, `common_events.yaml` and every
    /// `maps/*.yaml` under `dir`. Missing files leave their table empty.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut db = Self::new();

        for spell in read_table::<SpellDescriptor>(&dir.join("spells.yaml"), "spell_db")? {
            db.insert_spell(spell);
        }
        for npc in read_table::<NpcDescriptor>(&dir.join("npcs.yaml"), "npc_db")? {
            db.insert_npc(npc);
        }
        for event in read_table::<EventDescriptor>(&dir.join("common_events.yaml"), "event_db")? {
            db.insert_common_event(event);
        }

        let maps_dir = dir.join("maps");
        if maps_dir.is_dir() {
            let mut paths: Vec<_> = fs::read_dir(&maps_dir)
                .with_context(|| format!("Failed to list {}", maps_dir.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
                .collect();
            paths.sort();
            for path in paths {
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read map file: {}", path.display()))?;
                let map: MapDescriptor = serde_yaml::from_str(&contents)
                    .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;
                db.insert_map(map);
            }
            tracing::info!("[map_db] read done count={}", db.maps.len());
        } else {
            tracing::warn!("[map_db] no maps directory at {}", maps_dir.display());
        }

        Ok(db)
    }

    pub fn insert_spell(&mut self, spell: SpellDescriptor) -> Arc<SpellDescriptor> {
        let spell = Arc::new(spell);
        self.spells.insert(spell.id, Arc::clone(&spell));
        spell
    }

    pub fn insert_npc(&mut self, npc: NpcDescriptor) -> Arc<NpcDescriptor> {
        let npc = Arc::new(npc);
        self.npcs.insert(npc.id, Arc::clone(&npc));
        npc
    }

    pub fn insert_common_event(&mut self, event: EventDescriptor) -> Arc<EventDescriptor> {
        let event = Arc::new(event);
        self.common_events.insert(event.id, Arc::clone(&event));
        event
    }

    pub fn insert_map(&mut self, map: MapDescriptor) -> Arc<MapDescriptor> {
        let map = Arc::new(map);
        self.maps.insert(map.id, Arc::clone(&map));
        map
    }

    pub fn spell(&self, id: Uuid) -> Option<Arc<SpellDescriptor>> {
        self.spells.get(&id).cloned()
    }

    pub fn npc(&self, id: Uuid) -> Option<Arc<NpcDescriptor>> {
        self.npcs.get(&id).cloned()
    }

    pub fn common_event(&self, id: Uuid) -> Option<Arc<EventDescriptor>> {
        self.common_events.get(&id).cloned()
    }

    pub fn map(&self, id: Uuid) -> Option<Arc<MapDescriptor>> {
        self.maps.get(&id).cloned()
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }
}

fn read_table<T: DeserializeOwned>(path: &Path, component: &str) -> Result<Vec<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("[{}] missing {}, table left empty", component, path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let rows: Vec<T> = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;
    tracing::info!("[{}] read done count={}", component, rows.len());
    Ok(rows)
}
