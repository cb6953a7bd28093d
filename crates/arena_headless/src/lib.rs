//! Headless arena runner for scripted play and CI verification.
//!
//! This crate drives `arena_core` without graphics:
//!
//! - **Interactive sessions**: an external controller plays a level via
//!   JSON commands on stdin, with responses on stdout
//! - **Scripted games**: a level runs to completion with generated or
//!   recorded input, producing metrics
//! - **Batch runs**: many seeds in parallel, aggregated for balance review
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, query, pause, ...)
//! - **stdout**: State updates and responses (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See the [`protocol`] module for every command and response.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p arena_headless -- run --map maps/arena-01.properties
//!
//! # Run a scripted game
//! cargo run -p arena_headless -- simulate --map maps/arena-01.properties --strategy wander
//!
//! # Run 100 seeds
//! cargo run -p arena_headless -- batch --map maps/arena-01.properties --count 100
//! ```

pub mod ascii_visualizer;
pub mod batch;
pub mod game_runner;
pub mod map_file;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod strategies;

pub use ascii_visualizer::{render_ascii, AsciiConfig};
pub use batch::{run_batch, BatchConfig, BatchResults};
pub use game_runner::{run_game, GameConfig};
pub use map_file::{load_map, parse_map, MapFileError};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, ProtocolError, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use strategies::{Controller, Strategy, StrategyError};
