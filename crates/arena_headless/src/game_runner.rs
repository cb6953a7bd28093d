//! Scripted game execution for headless testing.
//!
//! Runs one level from a layout to completion (or a frame limit) with a
//! scripted input [`Strategy`], collecting [`GameMetrics`].
//!
//! All loops are bounded: a game stops at `max_frames` even if the
//! level timer was configured out of reach.

use arena_core::config::SimConfig;
use arena_core::error::Result;
use arena_core::events::Outcome;
use arena_core::layout::MapLayout;
use arena_core::math::{millis, Fixed};
use arena_core::simulation::Simulation;
use tracing::{debug, info};

use crate::metrics::{GameMetrics, MetricsCollector};
use crate::strategies::Strategy;

/// Configuration for a single game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Simulation settings; `sim.seed` seeds the simulation.
    pub sim: SimConfig,
    /// Input generator.
    pub strategy: Strategy,
    /// Frame duration.
    pub frame_time: Fixed,
    /// Hard frame limit.
    pub max_frames: u64,
}

impl GameConfig {
    /// Frames at 60 fps with the given strategy.
    #[must_use]
    pub fn new(sim: SimConfig, strategy: Strategy) -> Self {
        Self {
            sim,
            strategy,
            frame_time: millis(16),
            max_frames: 60 * 300,
        }
    }
}

/// Run one game to its outcome or the frame limit.
pub fn run_game(layout: &MapLayout, config: &GameConfig) -> Result<GameMetrics> {
    let seed = config.sim.seed;
    let mut sim = Simulation::from_layout(layout, config.sim.clone())?;
    let mut controller = config.strategy.controller(seed);
    let mut collector = MetricsCollector::new(seed);

    for frame in 0..config.max_frames {
        let input = controller.input(frame);
        let events = sim.tick(config.frame_time, &input);
        collector.record(sim.tick_count(), &events.events);
        if sim.outcome() != Outcome::InProgress {
            debug!(seed, frame, outcome = ?sim.outcome(), "Game finished");
            break;
        }
    }

    let metrics = collector.finish(&sim);
    info!(
        seed,
        ticks = metrics.duration_ticks,
        outcome = ?metrics.outcome,
        opponents_killed = metrics.opponents_killed,
        "Game complete"
    );
    Ok(metrics)
}
