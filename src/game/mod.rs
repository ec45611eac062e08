//! The simulation: entities and their stats, the event VM, and map instances.

pub mod combat;
pub mod entity;
pub mod events;
pub mod map;
pub mod movement;
pub mod stats;
pub mod types;
pub mod variables;
