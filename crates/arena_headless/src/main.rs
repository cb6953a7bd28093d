//! Headless arena runner.
//!
//! Runs a level without graphics, controlled via JSON on stdin/stdout or
//! driven by a scripted input strategy.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p arena_headless -- run --map maps/arena-01.properties
//!
//! # Run one scripted game and print its metrics
//! cargo run -p arena_headless -- simulate --map maps/arena-01.properties --seed 7
//!
//! # Run a batch of seeds
//! cargo run -p arena_headless -- batch --map maps/arena-01.properties --count 200 --output results/batch.json
//!
//! # Print the starting arena
//! cargo run -p arena_headless -- render --map maps/arena-01.properties --reveal
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::{Path, PathBuf};

use arena_core::config::{Difficulty, SimConfig};
use arena_core::layout::MapLayout;
use arena_core::math::millis;
use arena_core::simulation::Simulation;
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arena_headless::{
    ascii_visualizer::{render_ascii, AsciiConfig},
    batch::{run_batch, BatchConfig},
    game_runner::{run_game, GameConfig},
    map_file::{load_map, MapFileError},
    protocol::ProtocolError,
    runner::{HeadlessConfig, HeadlessRunner},
    strategies::{Strategy, StrategyError},
};

#[derive(Parser)]
#[command(name = "arena_headless")]
#[command(about = "Headless bomb arena runner for scripted play and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one level interactively over stdin/stdout
    Run {
        /// Level layout (properties file)
        #[arg(short, long)]
        map: PathBuf,

        /// Simulation config (RON); defaults if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,
    },

    /// Run one scripted game and print its metrics as JSON
    Simulate {
        #[arg(short, long)]
        map: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Difficulty (overrides the config file)
        #[arg(long)]
        difficulty: Option<Difficulty>,

        /// `idle`, `wander`, or a RON input script
        #[arg(long, default_value = "wander")]
        strategy: String,

        /// Frame limit
        #[arg(long, default_value = "18000")]
        frames: u64,

        /// Frame duration in milliseconds
        #[arg(long, default_value = "16")]
        frame_ms: u32,
    },

    /// Run many seeds in parallel
    Batch {
        #[arg(short, long)]
        map: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of games to run
        #[arg(short = 'n', long, default_value = "100")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Results file
        #[arg(short, long, default_value = "results/batch.json")]
        output: PathBuf,

        #[arg(long, default_value = "wander")]
        strategy: String,

        #[arg(long, default_value = "18000")]
        frames: u64,
    },

    /// Print the level as ASCII
    Render {
        #[arg(short, long)]
        map: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Show collectibles hidden under breakables
        #[arg(long)]
        reveal: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Sim(#[from] arena_core::error::GameError),

    #[error("map file: {0}")]
    Map(#[from] MapFileError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("frame_ms must be positive")]
    ZeroFrameTime,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for protocol and results.
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    let result = match cli.command {
        Commands::Run {
            map,
            config,
            auto_state,
        } => cmd_run(&map, config.as_deref(), auto_state),
        Commands::Simulate {
            map,
            config,
            seed,
            difficulty,
            strategy,
            frames,
            frame_ms,
        } => cmd_simulate(&map, config.as_deref(), seed, difficulty, &strategy, frames, frame_ms),
        Commands::Batch {
            map,
            config,
            count,
            seed,
            parallel,
            output,
            strategy,
            frames,
        } => cmd_batch(&map, config.as_deref(), count, seed, parallel, &output, &strategy, frames),
        Commands::Render {
            map,
            config,
            seed,
            no_color,
            reveal,
        } => cmd_render(&map, config.as_deref(), seed, no_color, reveal),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

fn load_inputs(map: &Path, config: Option<&Path>) -> Result<(MapLayout, SimConfig), CliError> {
    let layout = load_map(map)?;
    let sim = match config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    tracing::debug!(map = %map.display(), entries = layout.len(), seed = sim.seed, "Inputs loaded");
    Ok((layout, sim))
}

fn cmd_run(map: &Path, config: Option<&Path>, auto_state: bool) -> Result<(), CliError> {
    let (layout, sim_config) = load_inputs(map, config)?;
    let sim = Simulation::from_layout(&layout, sim_config)?;
    let mut runner = HeadlessRunner::new(
        sim,
        HeadlessConfig {
            auto_state_output: auto_state,
        },
    );
    runner.run(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}

fn cmd_simulate(
    map: &Path,
    config: Option<&Path>,
    seed: Option<u64>,
    difficulty: Option<Difficulty>,
    strategy: &str,
    frames: u64,
    frame_ms: u32,
) -> Result<(), CliError> {
    if frame_ms == 0 {
        return Err(CliError::ZeroFrameTime);
    }
    let (layout, mut sim_config) = load_inputs(map, config)?;
    if let Some(seed) = seed {
        sim_config.seed = seed;
    }
    if let Some(difficulty) = difficulty {
        sim_config.difficulty = difficulty;
    }
    let game = GameConfig {
        frame_time: millis(i64::from(frame_ms)),
        max_frames: frames,
        ..GameConfig::new(sim_config, strategy.parse::<Strategy>()?)
    };
    let metrics = run_game(&layout, &game)?;
    let json = serde_json::to_string_pretty(&metrics).map_err(io::Error::other)?;
    println!("{json}");
    Ok(())
}

fn cmd_batch(
    map: &Path,
    config: Option<&Path>,
    count: u32,
    seed: u64,
    parallel: usize,
    output: &Path,
    strategy: &str,
    frames: u64,
) -> Result<(), CliError> {
    let (layout, sim_config) = load_inputs(map, config)?;
    let batch = BatchConfig {
        game: GameConfig {
            max_frames: frames,
            ..GameConfig::new(sim_config, strategy.parse::<Strategy>()?)
        },
        game_count: count,
        seed_start: seed,
        parallel_games: parallel,
    };

    let results = run_batch(&layout, &batch);
    results.save(output)?;

    let summary = &results.summary;
    eprintln!("\n=== Batch Results ===");
    eprintln!("Games completed: {}", summary.games);
    if !results.errors.is_empty() {
        eprintln!("Games FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Victories: {} ({:.1}%)  timeouts: {}  deaths: {}  unfinished: {}",
        summary.victories,
        summary.victory_rate * 100.0,
        summary.timeouts,
        summary.deaths,
        summary.unfinished
    );
    eprintln!(
        "Mean ticks: {:.0}  opponents killed: {:.2}  obstacles destroyed: {:.2}",
        summary.mean_ticks, summary.mean_opponents_killed, summary.mean_obstacles_destroyed
    );
    for error in results.errors.iter().take(10) {
        eprintln!("  seed {}: {}", error.seed, error.message);
    }
    eprintln!("\nResults saved to: {}", output.display());
    Ok(())
}

fn cmd_render(
    map: &Path,
    config: Option<&Path>,
    seed: Option<u64>,
    no_color: bool,
    reveal: bool,
) -> Result<(), CliError> {
    let (layout, mut sim_config) = load_inputs(map, config)?;
    if let Some(seed) = seed {
        sim_config.seed = seed;
    }
    let sim = Simulation::from_layout(&layout, sim_config)?;
    let ascii = AsciiConfig {
        show_legend: true,
        use_color: !no_color,
        reveal_hidden: reveal,
    };
    print!("{}", render_ascii(&sim, &ascii));
    Ok(())
}
