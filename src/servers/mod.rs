//! Server-side services built on the simulation:
//! - world: instance registry and shared services
//! - logic: the parallel update cycle
//! - game: TCP sessions

pub mod game;
pub mod logic;
pub mod world;
