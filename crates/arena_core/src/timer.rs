//! Polled countdowns.
//!
//! Every delayed action in the simulation (fuses, blast expiry, buff
//! expiry, death animations, the level clock) is a [`Countdown`] that
//! the orchestrator advances once per unpaused frame. Nothing fires on
//! its own, so pausing is simply not calling [`Countdown::advance`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Remaining time until something happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Countdown {
    #[serde(with = "fixed_serde")]
    remaining: Fixed,
}

impl Countdown {
    /// Start a countdown of `duration` seconds.
    #[must_use]
    pub const fn new(duration: Fixed) -> Self {
        Self {
            remaining: duration,
        }
    }

    /// Subtract elapsed time.
    ///
    /// Returns `true` only on the call that crosses zero. Further calls
    /// keep the countdown at zero and return `false`.
    pub fn advance(&mut self, dt: Fixed) -> bool {
        if self.remaining <= Fixed::ZERO {
            return false;
        }
        self.remaining = (self.remaining - dt).max(Fixed::ZERO);
        self.remaining == Fixed::ZERO
    }

    /// Time left, never negative.
    #[must_use]
    pub const fn remaining(&self) -> Fixed {
        self.remaining
    }

    /// Whether the countdown has reached zero.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        self.remaining <= Fixed::ZERO
    }

    /// Restart with a new duration.
    pub fn reset(&mut self, duration: Fixed) {
        self.remaining = duration;
    }
}
