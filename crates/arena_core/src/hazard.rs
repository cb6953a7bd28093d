//! Hazard (bomb) and blast-front life cycle.
//!
//! A [`Hazard`] counts down its fuse while unpaused. When the fuse runs
//! out it detonates exactly once: [`blast_cells`] walks the four axes
//! from its cell, one [`Blast`] is spawned per visited cell, and the
//! hazard's [`DetonationEffect`] is handed back to the orchestrator.
//! Blasts age independently and expire after a fixed lifetime.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::grid::SpatialMap;
use crate::math::{Direction, Fixed, GridPos};
use crate::timer::Countdown;

/// Who placed a hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardOwner {
    /// A player agent.
    Player(EntityId),
    /// An opponent agent.
    Opponent(EntityId),
}

impl HazardOwner {
    /// Whether an opponent placed the hazard.
    #[must_use]
    pub const fn is_opponent(self) -> bool {
        matches!(self, Self::Opponent(_))
    }

    /// The placing entity.
    #[must_use]
    pub const fn entity(self) -> EntityId {
        match self {
            Self::Player(id) | Self::Opponent(id) => id,
        }
    }
}

/// What to do when a hazard detonates.
///
/// Chosen by the owner at placement and returned exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetonationEffect {
    /// Give a concurrent-hazard slot back to this player.
    ReleasePlayerBudget(EntityId),
    /// Free the shared autonomous-placement slot.
    ReleasePlacerLock,
}

/// Why a placement was refused. Rejection never changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementRejected {
    /// A live hazard already occupies the cell.
    CellOccupied,
    /// The owner has no free concurrent-hazard slot.
    BudgetExhausted,
    /// The owner is dead or missing.
    OwnerUnavailable,
}

impl std::fmt::Display for PlacementRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::CellOccupied => "cell already holds a live hazard",
            Self::BudgetExhausted => "owner is at its concurrent-hazard limit",
            Self::OwnerUnavailable => "owner cannot place hazards",
        };
        f.write_str(reason)
    }
}

/// A placed bomb counting down to detonation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hazard {
    /// Placing agent.
    pub owner: HazardOwner,
    /// Cells reached along each axis.
    pub radius: u32,
    fuse: Countdown,
    paused: bool,
    inert: bool,
    on_detonate: DetonationEffect,
}

impl Hazard {
    /// Arm a new hazard.
    #[must_use]
    pub fn new(owner: HazardOwner, radius: u32, fuse: Fixed, on_detonate: DetonationEffect) -> Self {
        Self {
            owner,
            radius,
            fuse: Countdown::new(fuse),
            paused: false,
            inert: false,
            on_detonate,
        }
    }

    /// Mirror the external pause flag.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Whether the fuse is currently suspended.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the hazard has already detonated.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.inert
    }

    /// Time until detonation.
    #[must_use]
    pub const fn remaining(&self) -> Fixed {
        self.fuse.remaining()
    }

    /// Advance the fuse.
    ///
    /// Returns `true` when the hazard is due to detonate. Paused and
    /// inert hazards never advance.
    pub fn advance(&mut self, dt: Fixed) -> bool {
        if self.paused || self.inert {
            return false;
        }
        self.fuse.advance(dt);
        self.fuse.is_elapsed()
    }

    /// Mark the hazard inert and hand back its effect.
    ///
    /// Only the first call returns `Some`.
    pub fn detonate(&mut self) -> Option<DetonationEffect> {
        if self.inert {
            return None;
        }
        self.inert = true;
        Some(self.on_detonate)
    }
}

/// Whether `owner` may place a hazard.
///
/// `occupied` is whether the target cell already holds a live hazard,
/// `live` and `budget` the owner's undetonated count and limit.
pub fn check_placement(occupied: bool, live: u32, budget: u32) -> Result<(), PlacementRejected> {
    if occupied {
        return Err(PlacementRejected::CellOccupied);
    }
    if live >= budget {
        return Err(PlacementRejected::BudgetExhausted);
    }
    Ok(())
}

/// One cell reached by a detonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlastCell {
    /// Reached cell.
    pub cell: GridPos,
    /// Whether the cell holds the breakable obstacle that stopped this arm.
    pub breaks_obstacle: bool,
}

/// Cells reached by a detonation at `origin`.
///
/// The origin comes first, followed by each arm in [`Direction::ALL`]
/// order. An arm stops before a permanent obstacle and stops on (not
/// past) the first breakable obstacle.
pub fn blast_cells<M: SpatialMap + ?Sized>(map: &M, origin: GridPos, radius: u32) -> Vec<BlastCell> {
    let mut cells = vec![BlastCell {
        cell: origin,
        breaks_obstacle: false,
    }];

    for direction in Direction::ALL {
        for distance in 1..=radius as i32 {
            let cell = origin.offset(direction, distance);
            if map.is_blocked(cell) {
                break;
            }
            if map.is_breakable(cell) {
                cells.push(BlastCell {
                    cell,
                    breaks_obstacle: true,
                });
                break;
            }
            cells.push(BlastCell {
                cell,
                breaks_obstacle: false,
            });
        }
    }

    cells
}

/// A per-cell damage front left by a detonation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blast {
    /// Hazard that produced this front.
    pub source: EntityId,
    /// Whether an opponent placed that hazard.
    pub from_opponent: bool,
    age: Countdown,
}

impl Blast {
    /// Spawn a blast front that lives for `lifetime` seconds.
    #[must_use]
    pub fn new(source: EntityId, from_opponent: bool, lifetime: Fixed) -> Self {
        Self {
            source,
            from_opponent,
            age: Countdown::new(lifetime),
        }
    }

    /// Age the front. Returns `true` on the frame it expires.
    pub fn advance(&mut self, dt: Fixed) -> bool {
        self.age.advance(dt)
    }

    /// Whether the front has outlived its lifetime.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age.is_elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Tile, TileGrid};
    use crate::math::millis;

    fn player_hazard(radius: u32) -> Hazard {
        Hazard::new(
            HazardOwner::Player(1),
            radius,
            Fixed::from_num(3),
            DetonationEffect::ReleasePlayerBudget(1),
        )
    }

    #[test]
    fn test_fuse_counts_down() {
        let mut hazard = player_hazard(1);
        assert!(!hazard.advance(Fixed::from_num(2)));
        assert_eq!(hazard.remaining(), Fixed::from_num(1));
        assert!(hazard.advance(Fixed::from_num(1)));
    }

    #[test]
    fn test_paused_fuse_holds() {
        let mut hazard = player_hazard(1);
        hazard.advance(millis(500));
        let before = hazard.remaining();

        hazard.set_paused(true);
        for _ in 0..100 {
            assert!(!hazard.advance(millis(100)));
        }
        hazard.set_paused(false);
        assert_eq!(hazard.remaining(), before);
    }

    #[test]
    fn test_detonates_once() {
        let mut hazard = player_hazard(2);
        hazard.advance(Fixed::from_num(3));
        assert_eq!(hazard.detonate(), Some(DetonationEffect::ReleasePlayerBudget(1)));
        assert!(hazard.is_inert());
        assert_eq!(hazard.detonate(), None);
        assert!(!hazard.advance(Fixed::from_num(1)));
    }

    #[test]
    fn test_placement_checks() {
        assert_eq!(check_placement(false, 0, 1), Ok(()));
        assert_eq!(check_placement(true, 0, 1), Err(PlacementRejected::CellOccupied));
        assert_eq!(check_placement(false, 1, 1), Err(PlacementRejected::BudgetExhausted));
        assert_eq!(check_placement(false, 7, 8), Ok(()));
    }

    #[test]
    fn test_blast_on_open_grid() {
        let grid = TileGrid::new(10, 10);
        let cells = blast_cells(&grid, GridPos::new(5, 5), 2);
        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0].cell, GridPos::new(5, 5));
        assert!(cells.iter().all(|c| !c.breaks_obstacle));
        assert!(cells.iter().any(|c| c.cell == GridPos::new(3, 5)));
        assert!(cells.iter().any(|c| c.cell == GridPos::new(5, 7)));
    }

    #[test]
    fn test_blast_stops_before_wall() {
        let mut grid = TileGrid::new(10, 10);
        grid.set_tile(GridPos::new(6, 5), Tile::Wall);
        let cells = blast_cells(&grid, GridPos::new(5, 5), 3);
        assert!(!cells.iter().any(|c| c.cell.x > 5 && c.cell.y == 5));
        assert_eq!(cells.len(), 1 + 3 * 3);
    }

    #[test]
    fn test_blast_consumes_first_breakable() {
        let mut grid = TileGrid::new(10, 10);
        grid.set_tile(GridPos::new(6, 5), Tile::Breakable);
        grid.set_tile(GridPos::new(7, 5), Tile::Breakable);
        let cells = blast_cells(&grid, GridPos::new(4, 5), 3);

        let east: Vec<_> = cells.iter().filter(|c| c.cell.y == 5 && c.cell.x > 4).collect();
        assert_eq!(east.len(), 2);
        assert_eq!(east[1].cell, GridPos::new(6, 5));
        assert!(east[1].breaks_obstacle);
    }

    #[test]
    fn test_blast_clipped_by_grid_edge() {
        let grid = TileGrid::new(3, 3);
        let cells = blast_cells(&grid, GridPos::new(0, 0), 5);
        // Origin plus two cells up and two cells right.
        assert_eq!(cells.len(), 5);
    }

    #[test]
    fn test_blast_expires() {
        let mut blast = Blast::new(9, false, millis(400));
        assert!(!blast.advance(millis(300)));
        assert!(!blast.is_expired());
        assert!(blast.advance(millis(100)));
        assert!(blast.is_expired());
        assert!(!blast.advance(millis(100)));
    }

    #[test]
    fn test_owner_helpers() {
        assert!(HazardOwner::Opponent(4).is_opponent());
        assert_eq!(HazardOwner::Player(2).entity(), 2);
    }
}
