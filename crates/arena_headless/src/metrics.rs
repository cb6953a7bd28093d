//! Game metrics collection for batch analysis.
//!
//! A [`MetricsCollector`] watches the events of one game and produces a
//! [`GameMetrics`] record; [`BatchSummary`] aggregates many of them.

use arena_core::entity::EntityKind;
use arena_core::events::{GameEvent, GameOverReason, Outcome};
use arena_core::simulation::Simulation;
use serde::{Deserialize, Serialize};

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Random seed used.
    pub seed: u64,
    /// Frames simulated.
    pub duration_ticks: u64,
    /// Final outcome; `InProgress` when the frame limit hit first.
    pub outcome: Outcome,
    /// Why the game was lost, if it was.
    pub defeat_reason: Option<GameOverReason>,
    /// Hazards placed by players.
    pub player_hazards: u32,
    /// Hazards placed by opponents.
    pub opponent_hazards: u32,
    /// Breakable obstacles destroyed.
    pub obstacles_destroyed: u32,
    /// Opponents killed.
    pub opponents_killed: u32,
    /// Players killed.
    pub players_killed: u32,
    /// Collectibles picked up.
    pub collectibles_picked: u32,
    /// Buffs activated.
    pub buffs_activated: u32,
    /// Tick the exit unlocked, if it did.
    pub exit_unlocked_at: Option<u64>,
    /// Opponents still in the level at the end.
    pub opponents_remaining: u32,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

/// Tallies events as a game runs.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
}

impl MetricsCollector {
    /// Start collecting for a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            metrics: GameMetrics {
                seed,
                ..GameMetrics::default()
            },
        }
    }

    /// Record the events of the frame that ended at `tick`.
    pub fn record(&mut self, tick: u64, events: &[GameEvent]) {
        let m = &mut self.metrics;
        for event in events {
            match event {
                GameEvent::HazardPlaced { owner, .. } => {
                    if owner.is_opponent() {
                        m.opponent_hazards += 1;
                    } else {
                        m.player_hazards += 1;
                    }
                }
                GameEvent::HazardDetonated { .. } => {}
                GameEvent::ObstacleDestroyed { .. } => m.obstacles_destroyed += 1,
                GameEvent::AgentDied { kind, .. } => match kind {
                    EntityKind::Opponent => m.opponents_killed += 1,
                    EntityKind::Player => m.players_killed += 1,
                    _ => {}
                },
                GameEvent::CollectiblePicked { .. } => m.collectibles_picked += 1,
                GameEvent::BuffActivated { .. } => m.buffs_activated += 1,
                GameEvent::BuffExpired { .. } => {}
                GameEvent::ExitUnlocked { .. } => m.exit_unlocked_at = Some(tick),
                GameEvent::ExitReached => {}
                GameEvent::GameOver { reason } => m.defeat_reason = Some(*reason),
            }
        }
    }

    /// Close the record from the final simulation state.
    #[must_use]
    pub fn finish(mut self, sim: &Simulation) -> GameMetrics {
        self.metrics.duration_ticks = sim.tick_count();
        self.metrics.outcome = sim.outcome();
        self.metrics.opponents_remaining = sim.opponents().len() as u32;
        self.metrics.final_state_hash = sim.state_hash();
        self.metrics
    }
}

/// Aggregate over a batch of games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games played.
    pub games: u32,
    /// Exit reached.
    pub victories: u32,
    /// Lost to the level timer.
    pub timeouts: u32,
    /// Every player died.
    pub deaths: u32,
    /// Frame limit reached first.
    pub unfinished: u32,
    /// Victories / games.
    pub victory_rate: f64,
    /// Mean frames per game.
    pub mean_ticks: f64,
    /// Mean opponents killed per game.
    pub mean_opponents_killed: f64,
    /// Mean obstacles destroyed per game.
    pub mean_obstacles_destroyed: f64,
}

impl BatchSummary {
    /// Summarize finished games.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }
        let count = games.len() as f64;
        let mean = |f: fn(&GameMetrics) -> u64| games.iter().map(f).sum::<u64>() as f64 / count;
        let tally = |f: fn(&GameMetrics) -> bool| games.iter().filter(|g| f(g)).count() as u32;

        let victories = tally(|g| g.outcome == Outcome::Victory);
        Self {
            games: games.len() as u32,
            victories,
            timeouts: tally(|g| g.defeat_reason == Some(GameOverReason::TimeUp)),
            deaths: tally(|g| g.defeat_reason == Some(GameOverReason::AllPlayersDead)),
            unfinished: tally(|g| g.outcome == Outcome::InProgress),
            victory_rate: f64::from(victories) / count,
            mean_ticks: mean(|g| g.duration_ticks),
            mean_opponents_killed: mean(|g| u64::from(g.opponents_killed)),
            mean_obstacles_destroyed: mean(|g| u64::from(g.obstacles_destroyed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::hazard::HazardOwner;
    use arena_core::math::GridPos;

    fn game(outcome: Outcome, reason: Option<GameOverReason>, ticks: u64) -> GameMetrics {
        GameMetrics {
            outcome,
            defeat_reason: reason,
            duration_ticks: ticks,
            ..GameMetrics::default()
        }
    }

    #[test]
    fn test_collector_tallies_events() {
        let mut collector = MetricsCollector::new(9);
        collector.record(
            3,
            &[
                GameEvent::HazardPlaced {
                    hazard: 5,
                    owner: HazardOwner::Player(1),
                    cell: GridPos::new(1, 1),
                },
                GameEvent::HazardPlaced {
                    hazard: 6,
                    owner: HazardOwner::Opponent(2),
                    cell: GridPos::new(4, 4),
                },
                GameEvent::ObstacleDestroyed {
                    cell: GridPos::new(2, 1),
                },
                GameEvent::AgentDied {
                    entity: 2,
                    kind: EntityKind::Opponent,
                },
                GameEvent::ExitUnlocked {
                    cell: GridPos::new(7, 7),
                },
            ],
        );
        let m = &collector.metrics;
        assert_eq!((m.player_hazards, m.opponent_hazards), (1, 1));
        assert_eq!(m.obstacles_destroyed, 1);
        assert_eq!(m.opponents_killed, 1);
        assert_eq!(m.players_killed, 0);
        assert_eq!(m.exit_unlocked_at, Some(3));
        assert_eq!(m.seed, 9);
    }

    #[test]
    fn test_batch_summary() {
        let games = vec![
            game(Outcome::Victory, None, 100),
            game(Outcome::Defeat, Some(GameOverReason::AllPlayersDead), 50),
            game(Outcome::Defeat, Some(GameOverReason::TimeUp), 200),
            game(Outcome::InProgress, None, 250),
        ];
        let summary = BatchSummary::from_games(&games);
        assert_eq!(summary.games, 4);
        assert_eq!(summary.victories, 1);
        assert_eq!(summary.deaths, 1);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.unfinished, 1);
        assert!((summary.victory_rate - 0.25).abs() < f64::EPSILON);
        assert!((summary.mean_ticks - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_batch_summary() {
        assert_eq!(BatchSummary::from_games(&[]), BatchSummary::default());
    }
}
