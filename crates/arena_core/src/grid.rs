//! Tile grid and the spatial queries everything else is built on.
//!
//! The grid only knows about obstacles. Agents, hazards and collectibles
//! live in the simulation's entity storage and are looked up there.

use serde::{Deserialize, Serialize};

use crate::math::GridPos;

/// Static contents of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    /// Walkable floor.
    #[default]
    Open,
    /// Indestructible obstacle.
    Wall,
    /// Obstacle that a blast destroys.
    Breakable,
}

/// Read-only obstacle queries over a tile grid.
///
/// Cells outside the grid count as permanently blocked, so searches
/// never have to bounds-check separately.
pub trait SpatialMap {
    /// Grid width in cells.
    fn width(&self) -> i32;

    /// Grid height in cells.
    fn height(&self) -> i32;

    /// Whether a cell holds a permanent obstacle (or lies off the grid).
    fn is_blocked(&self, cell: GridPos) -> bool;

    /// Whether a cell holds a breakable obstacle.
    fn is_breakable(&self, cell: GridPos) -> bool;

    /// Whether a cell lies on the grid.
    fn in_bounds(&self, cell: GridPos) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width() && cell.y < self.height()
    }

    /// Whether an agent can stand on a cell.
    fn is_passable(&self, cell: GridPos) -> bool {
        !self.is_blocked(cell) && !self.is_breakable(cell)
    }
}

/// Dense row-major tile storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Create an all-open grid. Negative dimensions are clamped to zero.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            tiles: vec![Tile::Open; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    fn index(&self, cell: GridPos) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    /// Tile at a cell, `None` off the grid.
    #[must_use]
    pub fn tile(&self, cell: GridPos) -> Option<Tile> {
        self.index(cell).map(|i| self.tiles[i])
    }

    /// Overwrite a tile. Returns `false` off the grid.
    pub fn set_tile(&mut self, cell: GridPos, tile: Tile) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Clear a breakable obstacle.
    ///
    /// Returns `true` only when a breakable obstacle was actually
    /// removed, so repeated calls for the same cell are no-ops.
    pub fn destroy_breakable(&mut self, cell: GridPos) -> bool {
        match self.index(cell) {
            Some(i) if self.tiles[i] == Tile::Breakable => {
                self.tiles[i] = Tile::Open;
                true
            }
            _ => false,
        }
    }

    /// All cells in column-major order (x outer, y inner).
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        (0..self.width).flat_map(move |x| (0..self.height).map(move |y| GridPos::new(x, y)))
    }

    /// Breakable cells in column-major order.
    #[must_use]
    pub fn breakable_cells(&self) -> Vec<GridPos> {
        self.cells().filter(|&c| self.is_breakable(c)).collect()
    }

    /// Number of breakable obstacles left.
    #[must_use]
    pub fn breakable_count(&self) -> usize {
        self.tiles.iter().filter(|&&t| t == Tile::Breakable).count()
    }
}

impl SpatialMap for TileGrid {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn is_blocked(&self, cell: GridPos) -> bool {
        !matches!(self.tile(cell), Some(Tile::Open | Tile::Breakable))
    }

    fn is_breakable(&self, cell: GridPos) -> bool {
        self.tile(cell) == Some(Tile::Breakable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_is_blocked() {
        let grid = TileGrid::new(4, 3);
        assert!(grid.is_blocked(GridPos::new(-1, 0)));
        assert!(grid.is_blocked(GridPos::new(4, 0)));
        assert!(grid.is_blocked(GridPos::new(0, 3)));
        assert!(!grid.is_blocked(GridPos::new(3, 2)));
    }

    #[test]
    fn test_tile_queries() {
        let mut grid = TileGrid::new(5, 5);
        grid.set_tile(GridPos::new(1, 1), Tile::Wall);
        grid.set_tile(GridPos::new(2, 2), Tile::Breakable);

        assert!(grid.is_blocked(GridPos::new(1, 1)));
        assert!(!grid.is_breakable(GridPos::new(1, 1)));
        assert!(!grid.is_blocked(GridPos::new(2, 2)));
        assert!(grid.is_breakable(GridPos::new(2, 2)));
        assert!(!grid.is_passable(GridPos::new(2, 2)));
        assert!(grid.is_passable(GridPos::new(3, 3)));
    }

    #[test]
    fn test_destroy_breakable_once() {
        let mut grid = TileGrid::new(5, 5);
        let cell = GridPos::new(2, 3);
        grid.set_tile(cell, Tile::Breakable);
        assert_eq!(grid.breakable_count(), 1);

        assert!(grid.destroy_breakable(cell));
        assert!(!grid.destroy_breakable(cell));
        assert_eq!(grid.tile(cell), Some(Tile::Open));
        assert_eq!(grid.breakable_count(), 0);
    }

    #[test]
    fn test_destroy_ignores_walls() {
        let mut grid = TileGrid::new(3, 3);
        grid.set_tile(GridPos::new(0, 0), Tile::Wall);
        assert!(!grid.destroy_breakable(GridPos::new(0, 0)));
        assert_eq!(grid.tile(GridPos::new(0, 0)), Some(Tile::Wall));
    }

    #[test]
    fn test_breakable_cells_column_major() {
        let mut grid = TileGrid::new(3, 3);
        grid.set_tile(GridPos::new(2, 0), Tile::Breakable);
        grid.set_tile(GridPos::new(0, 2), Tile::Breakable);
        grid.set_tile(GridPos::new(0, 1), Tile::Breakable);
        assert_eq!(
            grid.breakable_cells(),
            vec![GridPos::new(0, 1), GridPos::new(0, 2), GridPos::new(2, 0)]
        );
    }
}
