//! Realm - MMORPG server core
//!
//! Authoritative simulation of map instances, scripted events and combat,
//! with a compressed binary wire format for game clients.

/// Server configuration (YAML)
pub mod config;
/// Clock and process lifecycle
pub mod core;
/// Authored content and persistence
pub mod database;
/// Entities, events and map instances
pub mod game;
/// Wire format, framing and outbound delivery
pub mod network;
/// World registry, logic cycle and TCP front-end
pub mod servers;
