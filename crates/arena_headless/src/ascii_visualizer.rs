//! ASCII arena renderer for quick terminal review.
//!
//! One character per cell, top row first (row `height - 1` is printed
//! first since `+y` is up). Later layers win: tiles, then entrances and
//! exits, collectibles, hazards, blast fronts, opponents, players.

use std::collections::BTreeMap;

use arena_core::entity::{EntityKind, Payload};
use arena_core::grid::{SpatialMap, Tile};
use arena_core::math::GridPos;
use arena_core::pickup::CollectibleKind;
use arena_core::simulation::Simulation;

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Append a legend and status line.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
    /// Draw collectibles hidden under breakable obstacles.
    pub reveal_hidden: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: true,
            reveal_hidden: false,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GREEN: &str = "\x1b[32m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

fn color_of(ch: char) -> &'static str {
    match ch {
        '#' | '.' => colors::GRAY,
        '%' => colors::YELLOW,
        '1' | '2' => colors::GREEN,
        'O' | 'o' => colors::RED,
        '*' | '~' => colors::BOLD,
        _ => colors::CYAN,
    }
}

fn collectible_char(kind: CollectibleKind) -> char {
    match kind {
        CollectibleKind::HazardBudget => 'b',
        CollectibleKind::BlastRadius => 'r',
        CollectibleKind::Freeze => 'f',
        CollectibleKind::Immunity => 'i',
    }
}

/// Render the arena as ASCII art.
pub fn render_ascii(sim: &Simulation, config: &AsciiConfig) -> String {
    let grid = sim.grid();
    let mut cells: BTreeMap<GridPos, char> = grid
        .cells()
        .map(|cell| {
            let ch = match grid.tile(cell) {
                Some(Tile::Wall) => '#',
                Some(Tile::Breakable) => '%',
                _ => '.',
            };
            (cell, ch)
        })
        .collect();

    let layers = [
        EntityKind::Entrance,
        EntityKind::Exit,
        EntityKind::Collectible,
        EntityKind::Hazard,
        EntityKind::Blast,
        EntityKind::Opponent,
        EntityKind::Player,
    ];
    for kind in layers {
        for id in sim.entities().ids_of(kind) {
            let Some(entity) = sim.entity(id) else {
                continue;
            };
            let cell = entity.cell();
            let ch = match &entity.payload {
                Payload::Entrance => 'S',
                Payload::Exit(exit) if exit.locked => 'e',
                Payload::Exit(_) => 'E',
                Payload::Collectible(_) if grid.is_breakable(cell) && !config.reveal_hidden => continue,
                Payload::Collectible(kind) => collectible_char(*kind),
                Payload::Hazard(_) => '*',
                Payload::Blast(_) => '~',
                Payload::Opponent(o) if o.life.is_alive() => 'O',
                Payload::Opponent(_) => 'o',
                Payload::Player(p) if p.life.is_alive() => char::from(b'1' + p.slot),
                Payload::Player(_) => 'x',
                Payload::Wall | Payload::Breakable => continue,
            };
            if let Some(slot) = cells.get_mut(&cell) {
                *slot = ch;
            }
        }
    }

    let mut output = String::new();
    for y in (0..grid.height()).rev() {
        for x in 0..grid.width() {
            let ch = cells.get(&GridPos::new(x, y)).copied().unwrap_or(' ');
            if config.use_color {
                output.push_str(color_of(ch));
                output.push(ch);
                output.push_str(colors::RESET);
            } else {
                output.push(ch);
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        output.push_str("# wall  % breakable  S entrance  e/E exit (locked/open)  * hazard  ~ blast\n");
        output.push_str("1/2 player  x dead  O opponent  o dying  b/r/f/i budget/radius/freeze/immunity\n");
        output.push_str(&format!(
            "tick {}  outcome {:?}  time left {:.1}s  opponents {}\n",
            sim.tick_count(),
            sim.outcome(),
            sim.time_remaining().to_num::<f64>(),
            sim.opponents().len()
        ));
    }
    output
}
