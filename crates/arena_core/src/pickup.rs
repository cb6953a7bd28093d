//! Collectibles and their effect on a player.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::player::PlayerState;

/// What a collectible grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectibleKind {
    /// One more concurrent hazard.
    HazardBudget,
    /// One more cell of blast radius.
    BlastRadius,
    /// One freeze charge.
    Freeze,
    /// One immunity charge.
    Immunity,
}

/// Apply a collectible to a player.
///
/// Returns whether the collectible was consumed. Upgrades at their cap
/// are left in place for the other player.
pub fn apply(kind: CollectibleKind, player: &mut PlayerState, config: &SimConfig) -> bool {
    match kind {
        CollectibleKind::HazardBudget => {
            if player.hazard_budget >= config.max_hazard_budget {
                return false;
            }
            player.hazard_budget += 1;
        }
        CollectibleKind::BlastRadius => {
            if player.blast_radius >= config.max_blast_radius {
                return false;
            }
            player.blast_radius += 1;
        }
        CollectibleKind::Freeze => player.freeze_charges += 1,
        CollectibleKind::Immunity => player.immunity_charges += 1,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrades_cap_at_limit() {
        let config = SimConfig::default();
        let mut player = PlayerState::new(0, &config);

        for _ in 0..7 {
            assert!(apply(CollectibleKind::BlastRadius, &mut player, &config));
        }
        assert_eq!(player.blast_radius, 8);
        assert!(!apply(CollectibleKind::BlastRadius, &mut player, &config));
        assert_eq!(player.blast_radius, 8);

        player.hazard_budget = 8;
        assert!(!apply(CollectibleKind::HazardBudget, &mut player, &config));
    }

    #[test]
    fn test_buff_charges_accumulate() {
        let config = SimConfig::default();
        let mut player = PlayerState::new(0, &config);
        assert!(apply(CollectibleKind::Freeze, &mut player, &config));
        assert!(apply(CollectibleKind::Freeze, &mut player, &config));
        assert!(apply(CollectibleKind::Immunity, &mut player, &config));
        assert_eq!(player.freeze_charges, 2);
        assert_eq!(player.immunity_charges, 1);
    }
}
