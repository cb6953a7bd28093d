//! Pre-parsed map layouts.
//!
//! A [`MapLayout`] is the coordinate → object-type mapping a level is
//! built from. Reading it from disk is the caller's job; the core only
//! materializes it (see [`Simulation::from_layout`](crate::simulation::Simulation::from_layout)).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::GridPos;

/// Largest grid side a layout may imply.
pub const MAX_DIMENSION: i32 = 1024;

/// Known object-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCode {
    /// `0`: permanent obstacle.
    Wall,
    /// `1`: breakable obstacle.
    Breakable,
    /// `2`: player start.
    Entrance,
    /// `3`: opponent.
    Opponent,
    /// `4`: exit.
    Exit,
    /// `5`: breakable obstacle hiding a hazard-budget upgrade.
    BreakableWithBudget,
    /// `6`: breakable obstacle hiding a blast-radius upgrade.
    BreakableWithRadius,
}

impl ObjectCode {
    /// Decode a raw type integer.
    #[must_use]
    pub const fn from_raw(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Wall),
            1 => Some(Self::Breakable),
            2 => Some(Self::Entrance),
            3 => Some(Self::Opponent),
            4 => Some(Self::Exit),
            5 => Some(Self::BreakableWithBudget),
            6 => Some(Self::BreakableWithRadius),
            _ => None,
        }
    }

    /// Raw type integer.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Wall => 0,
            Self::Breakable => 1,
            Self::Entrance => 2,
            Self::Opponent => 3,
            Self::Exit => 4,
            Self::BreakableWithBudget => 5,
            Self::BreakableWithRadius => 6,
        }
    }
}

/// Coordinate → raw object-type mapping.
///
/// Codes are kept raw so unknown values survive until materialization,
/// where they are reported and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayout {
    cells: BTreeMap<GridPos, i32>,
}

impl MapLayout {
    /// Empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw code at a cell, replacing any previous entry.
    pub fn insert(&mut self, cell: GridPos, code: i32) {
        self.cells.insert(cell, code);
    }

    /// Set a known code at a cell.
    pub fn place(&mut self, cell: GridPos, code: ObjectCode) {
        self.insert(cell, code.raw());
    }

    /// Builder form of [`MapLayout::place`].
    #[must_use]
    pub fn with(mut self, cell: GridPos, code: ObjectCode) -> Self {
        self.place(cell, code);
        self
    }

    /// Raw code at a cell.
    #[must_use]
    pub fn get(&self, cell: GridPos) -> Option<i32> {
        self.cells.get(&cell).copied()
    }

    /// Entries in column-major order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPos, i32)> + '_ {
        self.cells.iter().map(|(&cell, &code)| (cell, code))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the layout has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Grid size implied by the largest coordinates (`max + 1`),
    /// saturating at `i32::MAX`.
    #[must_use]
    pub fn dimensions(&self) -> (i32, i32) {
        let width = self.cells.keys().map(|c| c.x.saturating_add(1)).max().unwrap_or(0);
        let height = self.cells.keys().map(|c| c.y.saturating_add(1)).max().unwrap_or(0);
        (width.max(0), height.max(0))
    }

    /// Check that every coordinate is non-negative and the implied grid
    /// fits in [`MAX_DIMENSION`] cells per side, returning its size.
    pub fn checked_dimensions(&self) -> Result<(i32, i32)> {
        if let Some(cell) = self.cells.keys().find(|c| c.x < 0 || c.y < 0) {
            return Err(GameError::InvalidLayout(format!("negative coordinate {cell}")));
        }
        let (width, height) = self.dimensions();
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(GameError::InvalidLayout(format!(
                "grid {width}x{height} exceeds {MAX_DIMENSION} cells per side"
            )));
        }
        Ok((width, height))
    }

    /// Surround a `width` × `height` area with permanent obstacles.
    ///
    /// Useful for tests and generated levels; existing entries on the
    /// border are overwritten.
    #[must_use]
    pub fn walled(width: i32, height: i32) -> Self {
        let mut layout = Self::new();
        for x in 0..width {
            layout.place(GridPos::new(x, 0), ObjectCode::Wall);
            layout.place(GridPos::new(x, height - 1), ObjectCode::Wall);
        }
        for y in 0..height {
            layout.place(GridPos::new(0, y), ObjectCode::Wall);
            layout.place(GridPos::new(width - 1, y), ObjectCode::Wall);
        }
        layout
    }
}
