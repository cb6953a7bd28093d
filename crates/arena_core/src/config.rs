//! Simulation tuning loaded from RON.
//!
//! Every timing and balance constant lives in [`SimConfig`]. Durations
//! and speeds are written as decimal seconds in RON and held as
//! [`Fixed`] at runtime.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     seed: 7,
//!     difficulty: Hard,
//!     multiplayer: false,
//!     hazard_fuse: 3.0,
//!     blast_lifetime: 0.4,
//! )
//! ```
//!
//! Omitted fields fall back to [`SimConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, millis, whole, Fixed};

/// Opponent behavior tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    /// Random walk only.
    Easy,
    /// Pursuit with pathfinding.
    #[default]
    Medium,
    /// Faster pursuit plus autonomous hazard placement.
    Hard,
}

impl Difficulty {
    /// Whether opponents chase players at this tier.
    #[must_use]
    pub const fn pursues(self) -> bool {
        matches!(self, Self::Medium | Self::Hard)
    }

    /// Whether opponents place hazards at this tier.
    #[must_use]
    pub const fn places_hazards(self) -> bool {
        matches!(self, Self::Hard)
    }
}

impl std::str::FromStr for Difficulty {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(GameError::InvalidConfig(format!("unknown difficulty '{other}'"))),
        }
    }
}

/// Upper bound for blast radius and concurrent-hazard settings.
pub const UPGRADE_CAP: u32 = 8;

/// All tunable simulation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the simulation RNG.
    pub seed: u64,
    /// Opponent behavior tier.
    pub difficulty: Difficulty,
    /// Two-player mode.
    pub multiplayer: bool,

    // Physics
    /// Fixed physics sub-step in seconds.
    #[serde(with = "decimal_serde")]
    pub physics_step: Fixed,
    /// Longest frame the accumulator will absorb in one call.
    #[serde(with = "decimal_serde")]
    pub max_frame_time: Fixed,

    // Hazards
    /// Seconds from placement to detonation.
    #[serde(with = "decimal_serde")]
    pub hazard_fuse: Fixed,
    /// Seconds a blast front stays alive.
    #[serde(with = "decimal_serde")]
    pub blast_lifetime: Fixed,

    // Timers
    /// Seconds a freeze or immunity buff lasts.
    #[serde(with = "decimal_serde")]
    pub buff_duration: Fixed,
    /// Seconds on the level countdown.
    #[serde(with = "decimal_serde")]
    pub level_duration: Fixed,
    /// Player death animation length.
    #[serde(with = "decimal_serde")]
    pub player_death_duration: Fixed,
    /// Opponent death animation length.
    #[serde(with = "decimal_serde")]
    pub opponent_death_duration: Fixed,

    // Agents
    /// Player movement speed in cells per second.
    #[serde(with = "decimal_serde")]
    pub player_speed: Fixed,
    /// Opponent speed on easy.
    #[serde(with = "decimal_serde")]
    pub opponent_speed_easy: Fixed,
    /// Opponent speed on medium.
    #[serde(with = "decimal_serde")]
    pub opponent_speed_medium: Fixed,
    /// Opponent speed on hard.
    #[serde(with = "decimal_serde")]
    pub opponent_speed_hard: Fixed,
    /// Random-walk re-decision interval.
    #[serde(with = "decimal_serde")]
    pub wander_cooldown: Fixed,
    /// Pursuit re-decision interval.
    #[serde(with = "decimal_serde")]
    pub pursuit_cooldown: Fixed,
    /// Pursuit engagement radius in cells.
    pub detection_radius: u32,

    // Autonomous placement
    /// Shared interval between opponent placements.
    #[serde(with = "decimal_serde")]
    pub placement_cooldown: Fixed,
    /// Blast radius of opponent hazards.
    pub placement_radius: u32,

    // Player upgrades
    /// Concurrent hazards a player starts with.
    pub starting_hazard_budget: u32,
    /// Blast radius a player starts with.
    pub starting_blast_radius: u32,
    /// Concurrent hazard cap.
    pub max_hazard_budget: u32,
    /// Blast radius cap.
    pub max_blast_radius: u32,
    /// Freeze and immunity collectibles hidden per level, each.
    pub hidden_buffs_per_kind: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            difficulty: Difficulty::default(),
            multiplayer: false,
            physics_step: Fixed::from_bits((1_i64 << 32) / 60),
            max_frame_time: millis(250),
            hazard_fuse: whole(3),
            blast_lifetime: millis(400),
            buff_duration: whole(15),
            level_duration: whole(240),
            player_death_duration: millis(700),
            opponent_death_duration: millis(500),
            player_speed: whole(3),
            opponent_speed_easy: whole(1),
            opponent_speed_medium: millis(1200),
            opponent_speed_hard: millis(1500),
            wander_cooldown: whole(1),
            pursuit_cooldown: millis(500),
            detection_radius: 5,
            placement_cooldown: whole(2),
            placement_radius: 2,
            starting_hazard_budget: 1,
            starting_blast_radius: 1,
            max_hazard_budget: 8,
            max_blast_radius: 8,
            hidden_buffs_per_kind: 2,
        }
    }
}

impl SimConfig {
    /// Parse and validate a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a RON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| GameError::ConfigRead {
            path: path.as_ref().display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_ron_str(&text)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.physics_step <= Fixed::ZERO {
            return Err(GameError::InvalidConfig("physics_step must be positive".into()));
        }
        if self.max_frame_time < self.physics_step {
            return Err(GameError::InvalidConfig(
                "max_frame_time must be at least one physics_step".into(),
            ));
        }
        for (name, value) in [
            ("max_blast_radius", self.max_blast_radius),
            ("max_hazard_budget", self.max_hazard_budget),
            ("placement_radius", self.placement_radius),
        ] {
            if !(1..=UPGRADE_CAP).contains(&value) {
                return Err(GameError::InvalidConfig(format!(
                    "{name} must be in 1..={UPGRADE_CAP}"
                )));
            }
        }
        if self.starting_blast_radius == 0 || self.starting_blast_radius > self.max_blast_radius {
            return Err(GameError::InvalidConfig(format!(
                "starting_blast_radius must be in 1..={}",
                self.max_blast_radius
            )));
        }
        if self.starting_hazard_budget == 0 || self.starting_hazard_budget > self.max_hazard_budget
        {
            return Err(GameError::InvalidConfig(format!(
                "starting_hazard_budget must be in 1..={}",
                self.max_hazard_budget
            )));
        }
        Ok(())
    }

    /// Opponent speed for a difficulty tier.
    #[must_use]
    pub fn opponent_speed(&self, difficulty: Difficulty) -> Fixed {
        match difficulty {
            Difficulty::Easy => self.opponent_speed_easy,
            Difficulty::Medium => self.opponent_speed_medium,
            Difficulty::Hard => self.opponent_speed_hard,
        }
    }

    /// Re-decision interval for a difficulty tier.
    #[must_use]
    pub fn decision_cooldown(&self, difficulty: Difficulty) -> Fixed {
        if difficulty.pursues() {
            self.pursuit_cooldown
        } else {
            self.wander_cooldown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hazard_fuse, Fixed::from_num(3));
        assert_eq!(config.max_blast_radius, 8);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SimConfig::from_ron_str("(seed: 42, difficulty: Hard, hazard_fuse: 1.5)")
            .expect("config should parse");
        assert_eq!(config.seed, 42);
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.hazard_fuse, Fixed::from_num(1.5));
        assert_eq!(config.buff_duration, Fixed::from_num(15));
    }

    #[test]
    fn test_invalid_step_rejected() {
        let result = SimConfig::from_ron_str("(physics_step: 0.0)");
        assert!(matches!(result, Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_radius_and_budget_bounds() {
        for text in [
            "(max_blast_radius: 9)",
            "(max_hazard_budget: 12)",
            "(placement_radius: 0)",
            "(placement_radius: 9)",
            "(max_blast_radius: 0, starting_blast_radius: 0)",
        ] {
            let result = SimConfig::from_ron_str(text);
            assert!(matches!(result, Err(GameError::InvalidConfig(_))), "{text}");
        }
        let config = SimConfig::from_ron_str("(max_blast_radius: 4, placement_radius: 8)")
            .expect("in range");
        assert_eq!(config.max_blast_radius, 4);
    }

    #[test]
    fn test_malformed_ron_rejected() {
        let result = SimConfig::from_ron_str("(seed: \"nope\")");
        assert!(matches!(result, Err(GameError::ConfigParse(_))));
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("HARD".parse::<Difficulty>().ok(), Some(Difficulty::Hard));
        assert!("impossible".parse::<Difficulty>().is_err());
        assert!(!Difficulty::Easy.pursues());
        assert!(Difficulty::Hard.places_hazards());
    }

    #[test]
    fn test_speed_per_difficulty() {
        let config = SimConfig::default();
        assert_eq!(config.opponent_speed(Difficulty::Easy), Fixed::from_num(1));
        assert!(config.opponent_speed(Difficulty::Hard) > config.opponent_speed(Difficulty::Medium));
        assert_eq!(config.decision_cooldown(Difficulty::Easy), Fixed::from_num(1));
        assert_eq!(config.decision_cooldown(Difficulty::Medium), Fixed::from_num(0.5));
    }
}
