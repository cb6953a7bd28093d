//! Fixed-point math and grid coordinates for deterministic simulation.
//!
//! All gameplay logic reasons in integer grid coordinates ([`GridPos`]),
//! while physics bodies carry continuous sub-tile positions ([`Vec2Fixed`]).
//! Continuous positions never use floating point: floats produce
//! different results on different CPUs and would break replays and
//! the determinism harness.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Exactly one half, used for round-half-up cell snapping.
pub const HALF: Fixed = Fixed::from_bits(1 << 31);

/// Build a fixed-point duration from whole milliseconds.
///
/// Rounds toward positive infinity, so `n * millis(a) >= millis(n * a)`:
/// frames summed against a duration never fall short of it.
/// Usable in `const` context, which `Fixed::from_num` is not.
#[must_use]
pub const fn millis(ms: i64) -> Fixed {
    let scaled = ms << 32;
    if scaled >= 0 {
        Fixed::from_bits((scaled + 999) / 1000)
    } else {
        Fixed::from_bits(scaled / 1000)
    }
}

/// Build a fixed-point value from a whole number in `const` context.
#[must_use]
pub const fn whole(n: i32) -> Fixed {
    Fixed::from_bits((n as i64) << 32)
}

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for human-edited decimal values.
///
/// Config files spell durations and speeds as plain decimals
/// (`fuse: 3.0`). The value is converted to fixed point once, at load
/// time, so the simulation itself never sees a float.
pub mod decimal_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a decimal into a fixed-point number.
    ///
    /// Rounds up to the next representable value, matching
    /// [`millis`](super::millis), so `0.4` here equals `millis(400)`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        let bits = (value * SCALE).ceil();
        if !bits.is_finite() || bits < -(2f64.powi(63)) || bits >= 2f64.powi(63) {
            return Err(D::Error::custom(format!("{value} is out of fixed-point range")));
        }
        Ok(Fixed::from_bits(bits as i64))
    }

    const SCALE: f64 = (1_u64 << 32) as f64;
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Whether both components are exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Integer (column, row) cell on the tile grid.
///
/// Row grows upward: [`Direction::Up`] is `+y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Snap a continuous position to the nearest cell (round half up).
    #[must_use]
    pub fn from_world(pos: Vec2Fixed) -> Self {
        Self {
            x: (pos.x + HALF).floor().to_num::<i32>(),
            y: (pos.y + HALF).floor().to_num::<i32>(),
        }
    }

    /// Continuous position of the cell center.
    #[must_use]
    pub fn to_world(self) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(self.x), Fixed::from_num(self.y))
    }

    /// The neighbouring cell one step in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The cell `distance` steps away in `direction`.
    #[must_use]
    pub const fn offset(self, direction: Direction, distance: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// Manhattan distance in cells.
    #[must_use]
    pub const fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Squared Euclidean distance in cells.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `+y`
    Up,
    /// `-y`
    Down,
    /// `-x`
    Left,
    /// `+x`
    Right,
}

impl Direction {
    /// All four directions in a fixed order.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit cell offset for this direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// Direction for a unit cell offset, if it is one.
    #[must_use]
    pub const fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, 1) => Some(Self::Up),
            (0, -1) => Some(Self::Down),
            (-1, 0) => Some(Self::Left),
            (1, 0) => Some(Self::Right),
            _ => None,
        }
    }

    /// Velocity of magnitude `speed` along this direction.
    #[must_use]
    pub fn velocity(self, speed: Fixed) -> Vec2Fixed {
        let (dx, dy) = self.delta();
        Vec2Fixed::new(Fixed::from_num(dx) * speed, Fixed::from_num(dy) * speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        let dist_sq = a.distance_squared(b);
        // 3² + 4² = 25
        assert_eq!(dist_sq, Fixed::from_num(25));
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_const_helpers() {
        assert_eq!(whole(3), Fixed::from_num(3));
        assert_eq!(millis(500), Fixed::from_num(0.5));
        assert_eq!(HALF, Fixed::from_num(0.5));
        assert!(millis(400) < Fixed::from_num(0.4) + Fixed::DELTA * 2);
        assert_eq!(millis(-250), Fixed::from_num(-0.25));
    }

    #[test]
    fn test_millis_frames_reach_their_total() {
        for (frame_ms, total_ms) in [(100, 400), (100, 3000), (16, 496), (33, 3003), (7, 700)] {
            let frames = total_ms / frame_ms;
            let summed = (0..frames).fold(Fixed::ZERO, |acc, _| acc + millis(frame_ms));
            assert!(summed >= millis(total_ms), "{frames} x {frame_ms}ms");
            assert!(summed - millis(frame_ms) < millis(total_ms), "{frames} x {frame_ms}ms");
        }
    }

    #[test]
    fn test_decimal_serde_matches_millis() {
        #[derive(serde::Deserialize)]
        struct Wrapper(#[serde(with = "decimal_serde")] Fixed);

        for (text, ms) in [("0.4", 400), ("0.1", 100), ("0.7", 700), ("0.016", 16), ("3.0", 3000)] {
            let Wrapper(value) = ron::from_str(text).expect("decimal");
            assert_eq!(value, millis(ms), "{text}");
        }
        assert!(ron::from_str::<Wrapper>("1e30").is_err());
    }

    #[test]
    fn test_grid_snapping_rounds_half_up() {
        let pos = Vec2Fixed::new(Fixed::from_num(2.5), Fixed::from_num(2.49));
        assert_eq!(GridPos::from_world(pos), GridPos::new(3, 2));

        let pos = Vec2Fixed::new(Fixed::from_num(-0.4), Fixed::from_num(0.51));
        assert_eq!(GridPos::from_world(pos), GridPos::new(0, 1));
    }

    #[test]
    fn test_grid_roundtrip_through_world() {
        let cell = GridPos::new(7, 4);
        assert_eq!(GridPos::from_world(cell.to_world()), cell);
    }

    #[test]
    fn test_direction_deltas() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(direction));
        }
        assert_eq!(Direction::from_delta(1, 1), None);
        assert_eq!(GridPos::new(5, 5).offset(Direction::Left, 3), GridPos::new(2, 5));
    }

    #[test]
    fn test_grid_distances() {
        let a = GridPos::new(1, 1);
        let b = GridPos::new(4, 5);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(a.distance_squared(b), 25);
    }
}
