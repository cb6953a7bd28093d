//! Error types for the arena simulation.
//!
//! Only setup can fail. Once a [`Simulation`](crate::simulation::Simulation)
//! exists, every frame completes; rejected gameplay actions are reported
//! through their own return types instead of this enum.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all arena simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Config text failed to parse.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Config file could not be read.
    #[error("Failed to read config '{path}': {message}")]
    ConfigRead {
        /// Path to the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },

    /// Config values are out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Layout cannot start a game.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// Snapshot text could not be written or read.
    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u32),
}
