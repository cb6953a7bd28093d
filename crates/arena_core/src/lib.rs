//! # Arena Core
//!
//! Deterministic simulation core for a grid-based bomb arena.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond parsing RON config text
//! - No system randomness (one seeded RNG per simulation)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless runners and batch balance runs
//! - Replays from recorded input
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`grid`] - Tile grid and spatial queries
//! - [`pathfinding`] - A* over the tile grid
//! - [`hazard`] - Hazard fuses and blast fronts
//! - [`collision`] - Contact pair classification
//! - [`opponent`] - Opponent decision making and autonomous placement
//! - [`buffs`] - Mutually exclusive timed buffs
//! - [`physics`] - Fixed-step physics world
//! - [`simulation`] - Per-frame orchestrator
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod buffs;
pub mod collision;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod grid;
pub mod hazard;
pub mod layout;
pub mod math;
pub mod opponent;
pub mod pathfinding;
pub mod physics;
pub mod pickup;
pub mod player;
pub mod simulation;
pub mod timer;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffs::{BuffKind, BuffScheduler};
    pub use crate::config::{Difficulty, SimConfig};
    pub use crate::entity::{Entity, EntityId, EntityKind, Payload};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{GameEvent, GameOverReason, Outcome, TickEvents};
    pub use crate::grid::{SpatialMap, Tile, TileGrid};
    pub use crate::hazard::{HazardOwner, PlacementRejected};
    pub use crate::layout::{MapLayout, ObjectCode};
    pub use crate::math::{millis, whole, Direction, Fixed, GridPos, Vec2Fixed};
    pub use crate::pickup::CollectibleKind;
    pub use crate::player::{FrameInput, PlayerInput};
    pub use crate::simulation::Simulation;
}
