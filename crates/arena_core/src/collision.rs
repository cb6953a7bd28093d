//! Collision pair classification.
//!
//! Contacts are classified from the two colliders' [`ColliderKind`]s
//! through a single `match` on the (unordered) pair. The table yields a
//! [`Resolution`]: the gameplay effect to apply and, independently,
//! whether the physical response is cancelled. The orchestrator applies
//! effects; the physics world consults [`PairTable`] before solving.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::physics::{ColliderKind, ColliderTag, ContactHooks};

/// Gameplay consequence of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactEffect {
    /// No gameplay effect.
    None,
    /// Kill this player if it is alive and not immune.
    KillPlayer(EntityId),
    /// Kill this opponent if it is alive.
    KillOpponent(EntityId),
    /// Destroy this breakable obstacle.
    DestroyBreakable(EntityId),
}

/// Outcome of classifying a contact pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// What happens in the game.
    pub effect: ContactEffect,
    /// Whether the physics solver skips this pair.
    pub cancel_impulse: bool,
}

impl Resolution {
    const UNMODIFIED: Self = Self {
        effect: ContactEffect::None,
        cancel_impulse: false,
    };

    const fn cancelled(effect: ContactEffect) -> Self {
        Self {
            effect,
            cancel_impulse: true,
        }
    }
}

/// Classify a contact between two colliders. The order of the pair is
/// not significant.
#[must_use]
pub fn classify(a: ColliderTag, b: ColliderTag) -> Resolution {
    use ColliderKind::{Blast, Breakable, Opponent, Player};

    // Normalize so each unordered pair has one spelling below.
    let (a, b) = if a.kind <= b.kind { (a, b) } else { (b, a) };

    match (a.kind, b.kind) {
        (Player, Opponent) => Resolution::cancelled(ContactEffect::KillPlayer(a.entity)),
        (Player, Blast { .. }) => Resolution::cancelled(ContactEffect::KillPlayer(a.entity)),
        (Opponent, Blast { from_opponent: true }) => Resolution::cancelled(ContactEffect::None),
        (Opponent, Blast { from_opponent: false }) => {
            Resolution::cancelled(ContactEffect::KillOpponent(a.entity))
        }
        (Breakable, Blast { .. }) => Resolution {
            effect: ContactEffect::DestroyBreakable(a.entity),
            cancel_impulse: false,
        },
        (Player, Player) => Resolution::cancelled(ContactEffect::None),
        _ => Resolution::UNMODIFIED,
    }
}

/// [`ContactHooks`] backed by [`classify`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PairTable;

impl ContactHooks for PairTable {
    fn solve_contact(&self, a: ColliderTag, b: ColliderTag) -> bool {
        !classify(a, b).cancel_impulse
    }
}
