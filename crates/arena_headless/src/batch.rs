//! Batch game runner.
//!
//! Runs one game per seed in parallel using rayon and aggregates the
//! metrics. Each game owns its simulation, so results do not depend on
//! thread count or scheduling.

use std::path::Path;
use std::time::Instant;

use arena_core::layout::MapLayout;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::game_runner::{run_game, GameConfig};
use crate::metrics::{BatchSummary, GameMetrics};

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Settings shared by every game; the seed is replaced per game.
    pub game: GameConfig,
    /// Number of games to run.
    pub game_count: u32,
    /// First seed; game `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Maximum parallel games (0 = use rayon default).
    pub parallel_games: usize,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Individual game metrics, ordered by seed.
    pub games: Vec<GameMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Run a batch of games.
pub fn run_batch(layout: &MapLayout, config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        games = config.game_count,
        seed_start = config.seed_start,
        parallel = config.parallel_games,
        "Starting batch run"
    );

    let seeds: Vec<u64> = (0..u64::from(config.game_count))
        .map(|i| config.seed_start + i)
        .collect();
    let play = |seed: u64| {
        let mut game = config.game.clone();
        game.sim.seed = seed;
        run_game(layout, &game).map_err(|e| BatchError {
            seed,
            message: e.to_string(),
        })
    };

    let outcomes: Vec<Result<GameMetrics, BatchError>> = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games)
            .build()
        {
            Ok(pool) => pool.install(|| seeds.par_iter().map(|&s| play(s)).collect()),
            Err(e) => {
                warn!(error = %e, "Failed to build thread pool, using global pool");
                seeds.par_iter().map(|&s| play(s)).collect()
            }
        }
    } else {
        seeds.par_iter().map(|&s| play(s)).collect()
    };

    let mut games = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(metrics) => games.push(metrics),
            Err(e) => {
                warn!(seed = e.seed, error = %e.message, "Game failed");
                errors.push(e);
            }
        }
    }

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        completed = games.len(),
        failed = errors.len(),
        victories = summary.victories,
        duration_secs = format!("{duration_seconds:.1}"),
        "Batch complete"
    );

    BatchResults {
        games,
        summary,
        duration_seconds,
        errors,
    }
}
