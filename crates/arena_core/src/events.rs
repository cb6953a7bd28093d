//! One-way notifications emitted by a frame.
//!
//! Audio, HUD and persistence layers consume these; nothing in the
//! core reads them back.

use serde::{Deserialize, Serialize};

use crate::buffs::BuffKind;
use crate::entity::{EntityId, EntityKind};
use crate::hazard::HazardOwner;
use crate::math::GridPos;
use crate::pickup::CollectibleKind;

/// Why the game ended in defeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    /// The level countdown ran out.
    TimeUp,
    /// Every player died.
    AllPlayersDead,
}

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A hazard was placed.
    HazardPlaced {
        /// The new hazard.
        hazard: EntityId,
        /// Who placed it.
        owner: HazardOwner,
        /// Where.
        cell: GridPos,
    },
    /// A hazard detonated.
    HazardDetonated {
        /// The hazard.
        hazard: EntityId,
        /// Where.
        cell: GridPos,
        /// Number of blast fronts spawned.
        blast_cells: u32,
    },
    /// A breakable obstacle was destroyed.
    ObstacleDestroyed {
        /// Where.
        cell: GridPos,
    },
    /// An agent started dying.
    AgentDied {
        /// The agent.
        entity: EntityId,
        /// Player or opponent.
        kind: EntityKind,
    },
    /// A player picked up a collectible.
    CollectiblePicked {
        /// The player.
        player: EntityId,
        /// What was picked up.
        kind: CollectibleKind,
    },
    /// A buff started.
    BuffActivated {
        /// Which buff.
        kind: BuffKind,
    },
    /// A buff ran out.
    BuffExpired {
        /// Which buff.
        kind: BuffKind,
    },
    /// The last opponent is gone and the exit opened.
    ExitUnlocked {
        /// Exit cell.
        cell: GridPos,
    },
    /// The level was won.
    ExitReached,
    /// The level was lost.
    GameOver {
        /// Why.
        reason: GameOverReason,
    },
}

/// Final state of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Still playing.
    #[default]
    InProgress,
    /// Exit reached.
    Victory,
    /// Timer ran out or all players died.
    Defeat,
}

/// Events generated during a simulation frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Notifications in the order they happened.
    pub events: Vec<GameEvent>,
    /// Physics sub-steps executed.
    pub physics_steps: u32,
}

impl TickEvents {
    /// Record an event.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Whether any event matches.
    #[must_use]
    pub fn contains(&self, predicate: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.iter().any(predicate)
    }

    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.physics_steps == 0
    }
}
