//! Test fixtures and helpers.
//!
//! Pre-built grids, layouts and simulations for consistent testing.

use arena_core::config::{Difficulty, SimConfig};
use arena_core::events::GameEvent;
use arena_core::grid::{Tile, TileGrid};
use arena_core::layout::{MapLayout, ObjectCode};
use arena_core::math::{millis, GridPos};
use arena_core::player::FrameInput;
use arena_core::simulation::Simulation;
use fixed::types::I32F32;

/// Frame length used throughout the tests: a quarter second, exact in
/// fixed point and equal to the default frame clamp.
pub const FRAME: I32F32 = millis(250);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Default config with a seed and difficulty.
#[must_use]
pub fn config(seed: u64, difficulty: Difficulty) -> SimConfig {
    SimConfig {
        seed,
        difficulty,
        ..SimConfig::default()
    }
}

/// Open grid with the given cells set to permanent and breakable obstacles.
#[must_use]
pub fn grid_with(width: i32, height: i32, walls: &[GridPos], breakables: &[GridPos]) -> TileGrid {
    let mut grid = TileGrid::new(width, height);
    for &cell in walls {
        grid.set_tile(cell, Tile::Wall);
    }
    for &cell in breakables {
        grid.set_tile(cell, Tile::Breakable);
    }
    grid
}

/// Grid split in two by a full-height wall column at `x`.
#[must_use]
pub fn partitioned_grid(width: i32, height: i32, x: i32) -> TileGrid {
    let walls: Vec<GridPos> = (0..height).map(|y| GridPos::new(x, y)).collect();
    grid_with(width, height, &walls, &[])
}

/// A small walled level: player start in the lower-left corner, two
/// opponents, a pillar pattern of permanent obstacles, a row of
/// breakables (one hiding a radius upgrade) and an explicit exit.
///
/// ```text
/// y=8  #########
/// y=7  #.....O.#
/// y=6  #.#.#.#.#
/// y=5  #.......#
/// y=4  #.#B#B#.#
/// y=3  #..BrB..#
/// y=2  #.#.#.#.#
/// y=1  #S....OE#
/// y=0  #########
/// ```
#[must_use]
pub fn arena_layout() -> MapLayout {
    let mut layout = MapLayout::walled(9, 9);
    for x in [2, 4, 6] {
        for y in [2, 4, 6] {
            layout.place(GridPos::new(x, y), ObjectCode::Wall);
        }
    }
    layout.place(GridPos::new(3, 4), ObjectCode::Breakable);
    layout.place(GridPos::new(5, 4), ObjectCode::Breakable);
    layout.place(GridPos::new(3, 3), ObjectCode::Breakable);
    layout.place(GridPos::new(5, 3), ObjectCode::Breakable);
    layout.place(GridPos::new(4, 3), ObjectCode::BreakableWithRadius);
    layout.place(GridPos::new(1, 1), ObjectCode::Entrance);
    layout.place(GridPos::new(6, 1), ObjectCode::Opponent);
    layout.place(GridPos::new(6, 7), ObjectCode::Opponent);
    layout.place(GridPos::new(7, 1), ObjectCode::Exit);
    layout
}

/// Materialize [`arena_layout`] with the given config.
///
/// # Panics
///
/// Panics if the fixture layout is rejected, which would be a bug in
/// the fixture itself.
#[must_use]
pub fn arena_sim(config: SimConfig) -> Simulation {
    Simulation::from_layout(&arena_layout(), config).expect("fixture layout is valid")
}

/// Advance `frames` frames with the same input, collecting events.
pub fn run_frames(sim: &mut Simulation, frames: usize, input: &FrameInput) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for _ in 0..frames {
        events.extend(sim.tick(FRAME, input).events);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::grid::SpatialMap;

    #[test]
    fn test_arena_fixture_loads() {
        let sim = arena_sim(config(1, Difficulty::Easy));
        assert_eq!(sim.players().len(), 1);
        assert_eq!(sim.opponents().len(), 2);
        assert_eq!(sim.exit_locked(), Some(true));
        assert_eq!(sim.grid().breakable_count(), 5);
    }

    #[test]
    fn test_partitioned_grid() {
        let grid = partitioned_grid(6, 4, 3);
        assert!((0..4).all(|y| grid.is_blocked(GridPos::new(3, y))));
        assert!(!grid.is_blocked(GridPos::new(2, 0)));
    }
}
