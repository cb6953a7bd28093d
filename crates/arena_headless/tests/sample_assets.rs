//! The sample map and config shipped with the repository load and play.

use std::path::PathBuf;

use arena_core::config::{Difficulty, SimConfig};
use arena_core::entity::EntityKind;
use arena_core::simulation::Simulation;
use arena_headless::{load_map, run_game, GameConfig, Strategy};

fn repo_file(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

#[test]
fn test_sample_config_matches_defaults_where_spelled_exactly() {
    let config = SimConfig::load(repo_file("configs/default.ron")).expect("sample config");
    let defaults = SimConfig::default();
    assert_eq!(config.difficulty, Difficulty::Medium);
    assert_eq!(config.hazard_fuse, defaults.hazard_fuse);
    assert_eq!(config.level_duration, defaults.level_duration);
    assert_eq!(config.max_blast_radius, 8);
    assert_eq!(config.placement_radius, defaults.placement_radius);
}

#[test]
fn test_sample_map_builds_a_level() {
    let layout = load_map(repo_file("maps/arena-01.properties")).expect("sample map");
    assert_eq!(layout.dimensions(), (15, 11));

    let sim = Simulation::from_layout(&layout, SimConfig::default()).expect("valid level");
    let entities = sim.entities();
    assert_eq!(entities.count_of(EntityKind::Player), 1);
    assert_eq!(entities.count_of(EntityKind::Opponent), 4);
    assert_eq!(entities.count_of(EntityKind::Exit), 1);
    assert_eq!(sim.exit_locked(), Some(true));
}

#[test]
fn test_sample_map_plays_deterministically() {
    let layout = load_map(repo_file("maps/arena-01.properties")).expect("sample map");
    let config = SimConfig::load(repo_file("configs/default.ron")).expect("sample config");
    let game = GameConfig {
        max_frames: 1200,
        ..GameConfig::new(config, Strategy::wander())
    };
    let first = run_game(&layout, &game).expect("game");
    let second = run_game(&layout, &game).expect("game");
    assert_eq!(first, second);
    assert!(first.duration_ticks > 0);
}
