//! Map files in the `x,y=type` properties format.
//!
//! One entry per line. Blank lines and lines starting with `#` or `!`
//! are comments. `:` is accepted as the separator as well as `=`.
//!
//! ```text
//! # 0 wall, 1 breakable, 2 entrance, 3 opponent, 4 exit,
//! # 5 breakable hiding a budget upgrade, 6 breakable hiding a radius upgrade
//! 0,0=0
//! 1,1=2
//! 3,1=1
//! ```
//!
//! Codes are kept raw: unknown values reach the simulation, which
//! reports and skips them.

use std::path::Path;

use arena_core::layout::MapLayout;
use arena_core::math::GridPos;
use thiserror::Error;

/// Error type for map file loading.
#[derive(Error, Debug)]
pub enum MapFileError {
    /// Failed to read the file.
    #[error("Failed to read map file: {0}")]
    Io(#[from] std::io::Error),
    /// A line is not `x,y=type`.
    #[error("Line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
}

/// Parse map text.
pub fn parse_map(text: &str) -> Result<MapLayout, MapFileError> {
    let mut layout = MapLayout::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (cell, code) = parse_entry(line).map_err(|message| MapFileError::Syntax {
            line: index + 1,
            message,
        })?;
        layout.insert(cell, code);
    }
    Ok(layout)
}

/// Read and parse a map file.
pub fn load_map<P: AsRef<Path>>(path: P) -> Result<MapLayout, MapFileError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let layout = parse_map(&text)?;
    tracing::debug!(path = %path.as_ref().display(), entries = layout.len(), "Map file loaded");
    Ok(layout)
}

fn parse_entry(line: &str) -> Result<(GridPos, i32), String> {
    let (key, value) = line
        .split_once(['=', ':'])
        .ok_or_else(|| format!("expected `x,y=type`, got `{line}`"))?;
    let (x, y) = key
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y` coordinates, got `{}`", key.trim()))?;
    let x = parse_int(x, "x")?;
    let y = parse_int(y, "y")?;
    if x < 0 || y < 0 {
        return Err(format!("negative coordinate ({x}, {y})"));
    }
    let code = parse_int(value, "type")?;
    Ok((GridPos::new(x, y), code))
}

fn parse_int(text: &str, what: &str) -> Result<i32, String> {
    text.trim()
        .parse()
        .map_err(|e| format!("invalid {what} `{}`: {e}", text.trim()))
}
