//! Scripted player input for headless playtesting.
//!
//! A [`Strategy`] names how player input is produced; a [`Controller`]
//! turns it into one [`FrameInput`] per frame. Controllers own their
//! own seeded RNG so the simulation's RNG stream is never touched.

use std::path::Path;
use std::str::FromStr;

use arena_core::math::Direction;
use arena_core::player::{FrameInput, PlayerInput};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for strategy operations.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Name does not match a built-in strategy.
    #[error("Unknown strategy '{0}' (expected idle, wander or a .ron script path)")]
    Unknown(String),
    /// Failed to read file.
    #[error("Failed to read input script: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse input script: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// How player input is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// No input at all.
    Idle,
    /// Random held directions, re-chosen every `turn_every` frames, and a
    /// hazard every `hazard_every` frames.
    Wander {
        /// Frames between direction changes.
        turn_every: u64,
        /// Frames between hazard placements; 0 never places.
        hazard_every: u64,
    },
    /// Recorded input, looped.
    Script(Vec<FrameInput>),
}

impl Default for Strategy {
    fn default() -> Self {
        Self::wander()
    }
}

impl Strategy {
    /// Wander with default timings.
    pub fn wander() -> Self {
        Self::Wander {
            turn_every: 30,
            hazard_every: 240,
        }
    }

    /// Load a recorded input script from a RON file: a list of
    /// `(players: ((direction: Some(up)), (place_hazard: true)))` frames.
    pub fn load_script<P: AsRef<Path>>(path: P) -> Result<Self, StrategyError> {
        let contents = std::fs::read_to_string(path)?;
        Self::script_from_ron(&contents)
    }

    /// Parse a recorded input script from RON text.
    pub fn script_from_ron(text: &str) -> Result<Self, StrategyError> {
        let frames: Vec<FrameInput> = ron::from_str(text)?;
        Ok(Self::Script(frames))
    }

    /// Build a controller for one game.
    pub fn controller(&self, seed: u64) -> Controller {
        Controller {
            strategy: self.clone(),
            rng: Pcg32::seed_from_u64(seed),
            held: None,
        }
    }
}

impl FromStr for Strategy {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "wander" => Ok(Self::wander()),
            path if path.ends_with(".ron") => Self::load_script(path),
            other => Err(StrategyError::Unknown(other.to_string())),
        }
    }
}

/// Per-game input generator.
#[derive(Debug, Clone)]
pub struct Controller {
    strategy: Strategy,
    rng: Pcg32,
    held: Option<Direction>,
}

impl Controller {
    /// Input for `frame`. Call once per frame, in order.
    pub fn input(&mut self, frame: u64) -> FrameInput {
        match &self.strategy {
            Strategy::Idle => FrameInput::default(),
            Strategy::Wander {
                turn_every,
                hazard_every,
            } => {
                if frame % (*turn_every).max(1) == 0 {
                    // One in five turns stands still.
                    let pick = self.rng.gen_range(0..5);
                    self.held = Direction::ALL.get(pick).copied();
                }
                FrameInput::single(PlayerInput {
                    direction: self.held,
                    place_hazard: *hazard_every > 0 && frame > 0 && frame % hazard_every == 0,
                    ..PlayerInput::default()
                })
            }
            Strategy::Script(frames) => {
                if frames.is_empty() {
                    return FrameInput::default();
                }
                frames[(frame % frames.len() as u64) as usize]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_produces_nothing() {
        let mut controller = Strategy::Idle.controller(1);
        for frame in 0..10 {
            assert_eq!(controller.input(frame), FrameInput::default());
        }
    }

    #[test]
    fn test_wander_is_seeded() {
        let collect = |seed| {
            let mut controller = Strategy::wander().controller(seed);
            (0..300).map(|f| controller.input(f)).collect::<Vec<_>>()
        };
        assert_eq!(collect(5), collect(5));
        assert_ne!(collect(5), collect(6));
    }

    #[test]
    fn test_wander_places_periodically() {
        let strategy = Strategy::Wander {
            turn_every: 10,
            hazard_every: 4,
        };
        let mut controller = strategy.controller(0);
        let placements: Vec<u64> = (0..13)
            .filter(|&f| controller.input(f).players[0].place_hazard)
            .collect();
        assert_eq!(placements, vec![4, 8, 12]);
    }

    #[test]
    fn test_wander_holds_direction_between_turns() {
        let mut controller = Strategy::Wander {
            turn_every: 8,
            hazard_every: 0,
        }
        .controller(3);
        let first = controller.input(0).players[0].direction;
        for frame in 1..8 {
            assert_eq!(controller.input(frame).players[0].direction, first);
        }
    }

    #[test]
    fn test_script_loops() {
        let strategy = Strategy::script_from_ron(
            "[(players: ((direction: Some(up)), (direction: None))),
              (players: ((place_hazard: true), (direction: None)))]",
        )
        .expect("valid script");
        let mut controller = strategy.controller(0);
        assert_eq!(controller.input(0).players[0].direction, Some(Direction::Up));
        assert!(controller.input(1).players[0].place_hazard);
        assert_eq!(controller.input(2).players[0].direction, Some(Direction::Up));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("idle".parse::<Strategy>().ok(), Some(Strategy::Idle));
        assert_eq!("wander".parse::<Strategy>().ok(), Some(Strategy::wander()));
        assert!(matches!("rush".parse::<Strategy>(), Err(StrategyError::Unknown(_))));
        assert!(matches!(
            "/nonexistent/script.ron".parse::<Strategy>(),
            Err(StrategyError::ReadError(_))
        ));
    }
}
