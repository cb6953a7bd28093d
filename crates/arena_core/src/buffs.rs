//! Shared, mutually exclusive timed buffs.
//!
//! At most one of freeze and immunity runs at a time. Triggering either
//! while one is active is a no-op. Each lasts a fixed duration counted
//! in simulated time, so a paused frame (which never calls
//! [`BuffScheduler::advance`]) leaves the remaining time untouched.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;
use crate::timer::Countdown;

/// A player-wide timed effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffKind {
    /// Opponents stop moving and deciding.
    Freeze,
    /// Players ignore hostile contact and blasts.
    Immunity,
}

/// Freeze and immunity state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuffScheduler {
    freeze: Option<Countdown>,
    immunity: Option<Countdown>,
}

impl BuffScheduler {
    /// No buff active.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a buff is running.
    #[must_use]
    pub const fn is_active(&self, kind: BuffKind) -> bool {
        match kind {
            BuffKind::Freeze => self.freeze.is_some(),
            BuffKind::Immunity => self.immunity.is_some(),
        }
    }

    /// Whether any buff is running.
    #[must_use]
    pub const fn any_active(&self) -> bool {
        self.freeze.is_some() || self.immunity.is_some()
    }

    /// Time left on a buff, if running.
    #[must_use]
    pub fn remaining(&self, kind: BuffKind) -> Option<Fixed> {
        self.slot(kind).as_ref().map(Countdown::remaining)
    }

    /// Start a buff for `duration` seconds.
    ///
    /// Returns `false` without changing anything if either buff is
    /// already running.
    pub fn activate(&mut self, kind: BuffKind, duration: Fixed) -> bool {
        if self.any_active() {
            return false;
        }
        *self.slot_mut(kind) = Some(Countdown::new(duration));
        tracing::debug!(?kind, "buff activated");
        true
    }

    /// Advance running buffs and return the ones that just expired.
    pub fn advance(&mut self, dt: Fixed) -> Vec<BuffKind> {
        let mut expired = Vec::new();
        for kind in [BuffKind::Freeze, BuffKind::Immunity] {
            let slot = self.slot_mut(kind);
            if let Some(countdown) = slot.as_mut() {
                countdown.advance(dt);
                if countdown.is_elapsed() {
                    *slot = None;
                    expired.push(kind);
                }
            }
        }
        expired
    }

    const fn slot(&self, kind: BuffKind) -> &Option<Countdown> {
        match kind {
            BuffKind::Freeze => &self.freeze,
            BuffKind::Immunity => &self.immunity,
        }
    }

    fn slot_mut(&mut self, kind: BuffKind) -> &mut Option<Countdown> {
        match kind {
            BuffKind::Freeze => &mut self.freeze,
            BuffKind::Immunity => &mut self.immunity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_activation_is_exclusive() {
        let mut buffs = BuffScheduler::new();
        assert!(buffs.activate(BuffKind::Freeze, secs(15)));
        assert!(!buffs.activate(BuffKind::Immunity, secs(15)));
        assert!(!buffs.activate(BuffKind::Freeze, secs(15)));
        assert!(buffs.is_active(BuffKind::Freeze));
        assert!(!buffs.is_active(BuffKind::Immunity));
    }

    #[test]
    fn test_freeze_blocked_by_immunity() {
        let mut buffs = BuffScheduler::new();
        assert!(buffs.activate(BuffKind::Immunity, secs(15)));
        assert!(!buffs.activate(BuffKind::Freeze, secs(15)));
        assert!(buffs.is_active(BuffKind::Immunity));
        assert!(!buffs.is_active(BuffKind::Freeze));
    }

    #[test]
    fn test_expiry_reported_once() {
        let mut buffs = BuffScheduler::new();
        buffs.activate(BuffKind::Immunity, secs(15));
        assert!(buffs.advance(secs(14)).is_empty());
        assert_eq!(buffs.remaining(BuffKind::Immunity), Some(secs(1)));
        assert_eq!(buffs.advance(secs(1)), vec![BuffKind::Immunity]);
        assert!(buffs.advance(secs(1)).is_empty());
        assert!(!buffs.any_active());
    }

    #[test]
    fn test_reactivate_after_expiry() {
        let mut buffs = BuffScheduler::new();
        buffs.activate(BuffKind::Freeze, secs(2));
        buffs.advance(secs(2));
        assert!(buffs.activate(BuffKind::Immunity, secs(2)));
    }
}
