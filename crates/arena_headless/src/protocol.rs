//! JSON protocol for headless arena sessions.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Game state updates and responses
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready",...}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers each command; `tick` answers with the events of
//!    the advanced frames
//! 4. `quit` answers `{"type":"bye"}` and ends the session
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0,"width":9,"height":9}
//! -> {"cmd":"tick","count":4,"frame_ms":250,"input":{"players":[{"direction":"up"},{}]}}
//! <- {"type":"events","tick":4,"events":[]}
//! -> {"cmd":"tick","input":{"players":[{"place_hazard":true},{}]}}
//! <- {"type":"events","tick":5,"events":[{"event":"hazard_placed",...}]}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":5,...}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use arena_core::buffs::BuffKind;
use arena_core::config::Difficulty;
use arena_core::entity::{Entity, EntityId, EntityKind, Payload};
use arena_core::events::{GameEvent, Outcome};
use arena_core::grid::SpatialMap;
use arena_core::math::GridPos;
use arena_core::player::FrameInput;
use arena_core::simulation::Simulation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Error type for protocol IO.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Reading commands or writing responses failed.
    #[error("Protocol IO failed: {0}")]
    Io(#[from] std::io::Error),
    /// A line is not a valid command.
    #[error("Malformed command: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the simulation by `count` frames of `frame_ms` each,
    /// applying the same input to every frame.
    Tick {
        /// Frames to run.
        #[serde(default = "default_tick_count")]
        count: u32,
        /// Frame duration in milliseconds.
        #[serde(default = "default_frame_ms")]
        frame_ms: u32,
        /// Input held for every frame.
        #[serde(default)]
        input: FrameInput,
    },

    /// Query current game state without advancing time.
    Query,

    /// Pause the simulation.
    Pause,

    /// Resume after a pause.
    Resume,

    /// Change opponent difficulty.
    Difficulty {
        /// New tier.
        level: Difficulty,
    },

    /// Report the current state hash (for determinism verification).
    Hash,

    /// End the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

fn default_frame_ms() -> u32 {
    16
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Get command name for error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Difficulty { .. } => "difficulty",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
        /// Grid width in cells.
        width: i32,
        /// Grid height in cells.
        height: i32,
    },

    /// Full observable state.
    State(StateSnapshot),

    /// Notifications produced by advanced frames.
    Events {
        /// Tick after the last advanced frame.
        tick: u64,
        /// In order.
        events: Vec<GameEvent>,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash value.
        hash: u64,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// The offending command, when it parsed.
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Goodbye message before shutdown.
    Bye,
}

impl Response {
    /// Create a ready response.
    pub fn ready(sim: &Simulation) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick: sim.tick_count(),
            width: sim.grid().width(),
            height: sim.grid().height(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

// ============================================================================
// State Types
// ============================================================================

/// Observable state of a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Current tick.
    pub tick: u64,
    /// Win/lose state.
    pub outcome: Outcome,
    /// Whether the simulation is paused.
    pub paused: bool,
    /// Opponent tier.
    pub difficulty: Difficulty,
    /// Seconds left on the level countdown.
    pub time_remaining: f64,
    /// `None` when the level has no exit.
    pub exit_locked: Option<bool>,
    /// Running buff, if any.
    pub buff: Option<BuffKind>,
    /// Every entity, ascending by id.
    pub entities: Vec<EntityState>,
    /// Determinism hash.
    pub hash: u64,
}

/// Observable state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Entity id.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Grid cell.
    pub cell: GridPos,
    /// Continuous position, for display only.
    pub x: f64,
    /// Continuous position, for display only.
    pub y: f64,
    /// Alive / armed / burning.
    pub live: bool,
    /// Player details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerSummary>,
}

/// Player fields a controller needs to plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// Input slot.
    pub slot: u8,
    /// Concurrent hazard limit.
    pub hazard_budget: u32,
    /// Hazards currently armed.
    pub live_hazards: u32,
    /// Blast radius.
    pub blast_radius: u32,
    /// Freeze charges.
    pub freeze_charges: u32,
    /// Immunity charges.
    pub immunity_charges: u32,
}

impl EntityState {
    /// Capture one entity.
    pub fn from_entity(entity: &Entity) -> Self {
        let player = match &entity.payload {
            Payload::Player(p) => Some(PlayerSummary {
                slot: p.slot,
                hazard_budget: p.hazard_budget,
                live_hazards: p.live_hazards,
                blast_radius: p.blast_radius,
                freeze_charges: p.freeze_charges,
                immunity_charges: p.immunity_charges,
            }),
            _ => None,
        };
        Self {
            id: entity.id,
            kind: entity.kind(),
            cell: entity.cell(),
            x: entity.position.x.to_num(),
            y: entity.position.y.to_num(),
            live: entity.is_live(),
            player,
        }
    }
}

impl StateSnapshot {
    /// Capture the current state of a simulation.
    pub fn capture(sim: &Simulation) -> Self {
        let entities = sim
            .entities()
            .sorted_ids()
            .into_iter()
            .filter_map(|id| sim.entity(id))
            .map(EntityState::from_entity)
            .collect();
        let buff = [BuffKind::Freeze, BuffKind::Immunity]
            .into_iter()
            .find(|&kind| sim.buffs().is_active(kind));
        Self {
            tick: sim.tick_count(),
            outcome: sim.outcome(),
            paused: sim.is_paused(),
            difficulty: sim.difficulty(),
            time_remaining: sim.time_remaining().to_num(),
            exit_locked: sim.exit_locked(),
            buff,
            entities,
            hash: sim.state_hash(),
        }
    }
}
