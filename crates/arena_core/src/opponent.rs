//! Opponent decision making.
//!
//! Each frame every opponent runs [`update_opponent`]: dead opponents
//! play out their death animation, frozen ones hold still, and active
//! ones pick a heading according to the difficulty tier.
//!
//! - **Easy**: random walk, re-deciding every second or as soon as the
//!   current heading runs into an obstacle or another opponent.
//! - **Medium / Hard**: pursue the nearest live player inside the
//!   detection radius along an A* path, re-deciding every half second,
//!   and fall back to random walk when there is no usable route.
//!
//! Hard opponents additionally place hazards through the shared
//! [`PlacementGate`].

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{Difficulty, SimConfig};
use crate::entity::{EntityId, Life};
use crate::grid::SpatialMap;
use crate::math::{fixed_serde, Direction, Fixed, GridPos, Vec2Fixed};
use crate::pathfinding::find_path_on;

// ============================================================================
// State
// ============================================================================

/// Opponent-specific agent state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpponentState {
    /// Life cycle.
    pub life: Life,
    /// Current movement direction; `None` stands still.
    pub heading: Option<Direction>,
    /// Mirrors the shared freeze buff.
    pub frozen: bool,
    #[serde(with = "fixed_serde")]
    cooldown: Fixed,
}

impl Default for OpponentState {
    fn default() -> Self {
        Self::new()
    }
}

impl OpponentState {
    /// New opponent that decides on its first active frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            life: Life::Alive,
            heading: None,
            frozen: false,
            cooldown: Fixed::ZERO,
        }
    }

    /// Time until the next scheduled re-decision.
    #[must_use]
    pub const fn cooldown(&self) -> Fixed {
        self.cooldown
    }
}

/// What an opponent did this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Death animation running; `finished` on its last frame.
    Dead {
        /// Whether the animation just completed.
        finished: bool,
    },
    /// Frozen in place.
    Frozen,
    /// Heading unchanged.
    Keep,
    /// Picked a random heading (possibly none).
    Wander,
    /// Stepping along a path toward a player.
    Pursue,
    /// Standing on the pursued player's cell.
    Hold,
}

/// What an opponent can see when deciding.
pub struct Surroundings<'a, M: SpatialMap + ?Sized> {
    /// Obstacle map.
    pub map: &'a M,
    /// This opponent's position.
    pub position: Vec2Fixed,
    /// Positions of the other live opponents.
    pub others: &'a [Vec2Fixed],
    /// Cells of live players.
    pub players: &'a [GridPos],
}

impl<M: SpatialMap + ?Sized> Surroundings<'_, M> {
    /// Whether another opponent is within one cell on both axes of `cell`.
    #[must_use]
    pub fn is_crowded(&self, cell: GridPos) -> bool {
        let target = cell.to_world();
        self.others.iter().any(|other| {
            (other.x - target.x).abs() <= Fixed::ONE && (other.y - target.y).abs() <= Fixed::ONE
        })
    }

    /// Directions whose destination is open and uncrowded, in [`Direction::ALL`] order.
    #[must_use]
    pub fn open_directions(&self) -> Vec<Direction> {
        let cell = GridPos::from_world(self.position);
        Direction::ALL
            .into_iter()
            .filter(|&d| {
                let next = cell.step(d);
                self.map.is_passable(next) && !self.is_crowded(next)
            })
            .collect()
    }

    /// Nearest live player within `radius` cells (Euclidean, rounded positions).
    #[must_use]
    pub fn nearest_player_within(&self, radius: u32) -> Option<GridPos> {
        let cell = GridPos::from_world(self.position);
        let limit = i64::from(radius) * i64::from(radius);
        self.players
            .iter()
            .copied()
            .map(|p| (cell.distance_squared(p), p))
            .filter(|&(d, _)| d <= limit)
            .min_by_key(|&(d, _)| d)
            .map(|(_, p)| p)
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Advance one opponent by one frame.
pub fn update_opponent<M, R>(
    state: &mut OpponentState,
    env: &Surroundings<'_, M>,
    difficulty: Difficulty,
    config: &SimConfig,
    dt: Fixed,
    rng: &mut R,
) -> Decision
where
    M: SpatialMap + ?Sized,
    R: Rng + ?Sized,
{
    if !state.life.is_alive() {
        state.heading = None;
        let finished = state.life.advance(dt);
        return Decision::Dead { finished };
    }
    if state.frozen {
        state.heading = None;
        return Decision::Frozen;
    }

    state.cooldown -= dt;

    if difficulty.pursues() {
        pursue_or_wander(state, env, config, rng)
    } else {
        random_walk(state, env, config, rng)
    }
}

fn random_walk<M, R>(
    state: &mut OpponentState,
    env: &Surroundings<'_, M>,
    config: &SimConfig,
    rng: &mut R,
) -> Decision
where
    M: SpatialMap + ?Sized,
    R: Rng + ?Sized,
{
    let mut decision = Decision::Keep;
    if state.cooldown <= Fixed::ZERO {
        state.heading = pick_random_heading(env, rng);
        state.cooldown = config.wander_cooldown;
        decision = Decision::Wander;
    }

    if let Some(heading) = state.heading {
        let next = GridPos::from_world(env.position).step(heading);
        if !env.map.is_passable(next) || env.is_crowded(next) {
            state.heading = pick_random_heading(env, rng);
            decision = Decision::Wander;
        }
    }
    decision
}

fn pursue_or_wander<M, R>(
    state: &mut OpponentState,
    env: &Surroundings<'_, M>,
    config: &SimConfig,
    rng: &mut R,
) -> Decision
where
    M: SpatialMap + ?Sized,
    R: Rng + ?Sized,
{
    if state.cooldown > Fixed::ZERO {
        return Decision::Keep;
    }
    state.cooldown = config.pursuit_cooldown;

    let Some(goal) = env.nearest_player_within(config.detection_radius) else {
        state.heading = pick_random_heading(env, rng);
        return Decision::Wander;
    };

    match next_step_toward(env, goal) {
        PursuitStep::Step(direction) => {
            state.heading = Some(direction);
            Decision::Pursue
        }
        PursuitStep::Arrived => {
            state.heading = None;
            Decision::Hold
        }
        PursuitStep::NoRoute => {
            state.heading = pick_random_heading(env, rng);
            Decision::Wander
        }
    }
}

enum PursuitStep {
    Step(Direction),
    Arrived,
    NoRoute,
}

fn next_step_toward<M: SpatialMap + ?Sized>(env: &Surroundings<'_, M>, goal: GridPos) -> PursuitStep {
    let start = GridPos::from_world(env.position);
    let Some(path) = find_path_on(env.map, start, goal) else {
        return PursuitStep::NoRoute;
    };
    if path.iter().any(|&cell| env.map.is_breakable(cell)) {
        return PursuitStep::NoRoute;
    }

    let mut next = path[0];
    if next == start && path.len() > 1 {
        next = path[1];
    }
    if next == start {
        return PursuitStep::Arrived;
    }
    if env.is_crowded(next) {
        return PursuitStep::NoRoute;
    }

    match Direction::from_delta(next.x - start.x, next.y - start.y) {
        Some(direction) => PursuitStep::Step(direction),
        None => PursuitStep::NoRoute,
    }
}

fn pick_random_heading<M, R>(env: &Surroundings<'_, M>, rng: &mut R) -> Option<Direction>
where
    M: SpatialMap + ?Sized,
    R: Rng + ?Sized,
{
    env.open_directions().choose(rng).copied()
}

// ============================================================================
// Autonomous placement
// ============================================================================

/// Shared gate for opponent hazard placement.
///
/// One cooldown and one placer slot for all opponents. The slot holds
/// the hazard currently in flight and is released when it detonates,
/// which also restarts the cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementGate {
    #[serde(with = "fixed_serde")]
    cooldown: Fixed,
    placer: Option<EntityId>,
}

impl PlacementGate {
    /// Gate that opens after `initial_cooldown` seconds.
    #[must_use]
    pub const fn new(initial_cooldown: Fixed) -> Self {
        Self {
            cooldown: initial_cooldown,
            placer: None,
        }
    }

    /// Whether a placement may be attempted now.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.cooldown <= Fixed::ZERO && self.placer.is_none()
    }

    /// Hazard holding the slot, if any.
    #[must_use]
    pub const fn placer(&self) -> Option<EntityId> {
        self.placer
    }

    /// Remaining shared cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Fixed {
        self.cooldown
    }

    /// Occupy the slot with a freshly placed hazard.
    pub fn claim(&mut self, hazard: EntityId) {
        self.placer = Some(hazard);
    }

    /// Free the slot and restart the cooldown.
    pub fn release(&mut self, cooldown: Fixed) {
        self.placer = None;
        self.cooldown = cooldown;
    }

    /// Run down the shared cooldown.
    pub fn tick(&mut self, dt: Fixed) {
        self.cooldown = (self.cooldown - dt).max(Fixed::ZERO);
    }
}

/// Pick the opponent that places the next hazard.
pub fn choose_placer<R: Rng + ?Sized>(candidates: &[EntityId], rng: &mut R) -> Option<EntityId> {
    candidates.choose(rng).copied()
}
