//! Player agent state and per-frame input.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::entity::Life;
use crate::math::Direction;

/// Input for one player during one frame.
///
/// The action flags are edge-triggered: the caller sets them only on
/// the frame the key went down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Held movement direction.
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Place a hazard at the player's cell.
    #[serde(default)]
    pub place_hazard: bool,
    /// Spend a freeze charge.
    #[serde(default)]
    pub activate_freeze: bool,
    /// Spend an immunity charge.
    #[serde(default)]
    pub activate_immunity: bool,
}

impl PlayerInput {
    /// Just a movement direction.
    #[must_use]
    pub const fn moving(direction: Direction) -> Self {
        Self {
            direction: Some(direction),
            place_hazard: false,
            activate_freeze: false,
            activate_immunity: false,
        }
    }
}

/// Input for every controllable player during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInput {
    /// Indexed by player slot.
    #[serde(default)]
    pub players: [PlayerInput; 2],
}

impl FrameInput {
    /// Input for player one only.
    #[must_use]
    pub const fn single(input: PlayerInput) -> Self {
        Self {
            players: [input, PlayerInput {
                direction: None,
                place_hazard: false,
                activate_freeze: false,
                activate_immunity: false,
            }],
        }
    }

    /// Input for a slot; unknown slots get no input.
    #[must_use]
    pub fn for_slot(&self, slot: u8) -> PlayerInput {
        self.players.get(slot as usize).copied().unwrap_or_default()
    }
}

/// Player-specific agent state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerState {
    /// Controller slot (0 or 1).
    pub slot: u8,
    /// Life cycle.
    pub life: Life,
    /// Current movement direction.
    pub heading: Option<Direction>,
    /// Concurrent hazard limit.
    pub hazard_budget: u32,
    /// Hazards placed and not yet detonated.
    pub live_hazards: u32,
    /// Blast radius of placed hazards.
    pub blast_radius: u32,
    /// Unspent freeze buffs.
    pub freeze_charges: u32,
    /// Unspent immunity buffs.
    pub immunity_charges: u32,
}

impl PlayerState {
    /// Fresh player with starting upgrades.
    #[must_use]
    pub fn new(slot: u8, config: &SimConfig) -> Self {
        Self {
            slot,
            life: Life::Alive,
            heading: None,
            hazard_budget: config.starting_hazard_budget,
            live_hazards: 0,
            blast_radius: config.starting_blast_radius,
            freeze_charges: 0,
            immunity_charges: 0,
        }
    }

    /// Return a hazard slot after detonation.
    pub fn release_hazard(&mut self) {
        self.live_hazards = self.live_hazards.saturating_sub(1);
    }
}
