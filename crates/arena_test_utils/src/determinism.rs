//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A level replayed from the same layout, config and input script must
//! end in the same state. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`arena_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **System randomness**: The only RNG is the seeded `Pcg32` owned by
//!   each simulation.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual modules (pathfinding, blast walks, etc.)
//! 2. **Property tests**: Random input scripts must still replay exactly
//! 3. **Integration tests**: Full levels are reproducible
//! 4. **Parallel tests**: Running N simulations on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use arena_core::player::FrameInput;
use arena_core::simulation::Simulation;

use crate::fixtures::FRAME;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of frames simulated.
    pub frames: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Frames: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.frames,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare final hashes.
///
/// Generic over the state so it also covers pieces smaller than a whole
/// [`Simulation`].
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    frames: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut state = setup();
            for frame in 0..frames {
                step(&mut state, frame);
            }
            hash(&state)
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        frames,
    }
}

/// Replay a scripted level twice and compare the final hashes.
///
/// `script` maps a frame number to that frame's input.
pub fn verify_simulation_determinism<F, I>(setup_fn: F, frames: u64, script: I) -> bool
where
    F: Fn() -> Simulation,
    I: Fn(u64) -> FrameInput,
{
    verify_determinism(
        2,
        frames,
        &setup_fn,
        |sim, frame| {
            sim.tick(FRAME, &script(frame));
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches hidden shared state: every simulation owns its physics, RNG
/// and placement gate, so the hashes must all agree.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F, I>(
    setup_fn: F,
    num_sims: usize,
    frames: u64,
    script: I,
) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
    I: Fn(u64) -> FrameInput + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for frame in 0..frames {
                        sim.tick(FRAME, &script(frame));
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        frames,
    }
}

/// Compare two runs frame-by-frame, finding the first divergence.
///
/// Returns `None` if the runs agree throughout, `Some(frame)` for the
/// first frame after which their hashes differ (0 for the initial state).
pub fn find_first_divergence<F, I>(setup_fn: F, frames: u64, script: I) -> Option<u64>
where
    F: Fn() -> Simulation,
    I: Fn(u64) -> FrameInput,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for frame in 0..frames {
        let input = script(frame);
        sim1.tick(FRAME, &input);
        sim2.tick(FRAME, &input);

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(frame = frame + 1, "Simulations diverged");
            return Some(frame + 1);
        }
    }

    None
}

/// Verify that a RON snapshot restores the exact state, and that the
/// restored copy keeps evolving identically to the original.
pub fn verify_snapshot_determinism<F, I>(setup_fn: F, frames: u64, script: I) -> bool
where
    F: Fn() -> Simulation,
    I: Fn(u64) -> FrameInput,
{
    let mut sim = setup_fn();
    for frame in 0..frames {
        sim.tick(FRAME, &script(frame));
    }

    let Ok(text) = sim.to_ron() else {
        return false;
    };
    let Ok(mut restored) = Simulation::from_ron(&text) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for frame in frames..frames * 2 {
        let input = script(frame);
        sim.tick(FRAME, &input);
        restored.tick(FRAME, &input);
    }
    restored.state_hash() == sim.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism and property testing.
///
/// These strategies generate random but reproducible inputs.
pub mod strategies {
    use arena_core::math::{Direction, Fixed, GridPos};
    use arena_core::physics::{ColliderKind, ColliderTag};
    use arena_core::player::{FrameInput, PlayerInput};
    use proptest::prelude::*;

    /// Any of the four directions.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        prop::sample::select(Direction::ALL.to_vec())
    }

    /// A cell inside a `width` × `height` grid.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = GridPos> {
        (0..width, 0..height).prop_map(|(x, y)| GridPos::new(x, y))
    }

    /// Frame time between 0 and 0.5 s in millisecond steps, so some
    /// frames exceed the default clamp.
    pub fn arb_frame_time() -> impl Strategy<Value = Fixed> {
        (0i32..=500).prop_map(|ms| Fixed::from_num(ms) / 1000)
    }

    /// One player's input for a frame.
    pub fn arb_player_input() -> impl Strategy<Value = PlayerInput> {
        (
            proptest::option::of(arb_direction()),
            prop::bool::weighted(0.05),
            prop::bool::weighted(0.01),
            prop::bool::weighted(0.01),
        )
            .prop_map(|(direction, place_hazard, activate_freeze, activate_immunity)| PlayerInput {
                direction,
                place_hazard,
                activate_freeze,
                activate_immunity,
            })
    }

    /// Input for both slots.
    pub fn arb_frame_input() -> impl Strategy<Value = FrameInput> {
        (arb_player_input(), arb_player_input()).prop_map(|(a, b)| FrameInput { players: [a, b] })
    }

    /// A recorded input script.
    pub fn arb_input_script(max_len: usize) -> impl Strategy<Value = Vec<FrameInput>> {
        proptest::collection::vec(arb_frame_input(), 1..max_len)
    }

    /// Any collider kind.
    pub fn arb_collider_kind() -> impl Strategy<Value = ColliderKind> {
        prop_oneof![
            Just(ColliderKind::Wall),
            Just(ColliderKind::Breakable),
            Just(ColliderKind::Player),
            Just(ColliderKind::Opponent),
            any::<bool>().prop_map(|from_opponent| ColliderKind::Blast { from_opponent }),
        ]
    }

    /// A collider tag with a small entity id.
    pub fn arb_collider_tag() -> impl Strategy<Value = ColliderTag> {
        (1u32..100, arb_collider_kind()).prop_map(|(entity, kind)| ColliderTag { entity, kind })
    }
}
