//! Core simulation loop.
//!
//! [`Simulation`] owns everything one level needs: the tile grid, the
//! entity records, the physics world, the seeded RNG, the buff
//! scheduler, the shared placement gate and the level clock. The host
//! calls [`Simulation::tick`] once per rendered frame with the elapsed
//! time and that frame's input.
//!
//! # Frame order
//!
//! 1. Buffs and the level clock
//! 2. Players: movement, hazard placement, buff activation
//! 3. Opponents, then removal of opponents whose death animation ended
//! 4. Exit unlock
//! 5. Hazard fuses and blast ages
//! 6. Shared placement cooldown
//! 7. Removal of detonated hazards and expired blasts
//! 8. Collectible pickup
//! 9. Physics sub-steps, then contact dispatch in step order
//! 10. Outcome
//!
//! A paused simulation skips the whole frame.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - One seeded [`Pcg32`] owned by the simulation
//! - Consistent iteration order (sorted entity IDs)
//! - Same layout, config and frames always produce the same state hash
//!
//! # Example
//!
//! ```
//! use arena_core::math::{millis, GridPos};
//! use arena_core::player::FrameInput;
//! use arena_core::simulation::Simulation;
//! use arena_core::config::SimConfig;
//!
//! let mut sim = Simulation::new(10, 10, SimConfig::default());
//! let player = sim.spawn_player(GridPos::new(2, 2));
//! sim.place_hazard(player).expect("free cell");
//!
//! let events = sim.tick(millis(250), &FrameInput::default());
//! assert_eq!(sim.tick_count(), 1);
//! assert!(events.events.is_empty());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::buffs::{BuffKind, BuffScheduler};
use crate::collision::{classify, ContactEffect, PairTable};
use crate::config::{Difficulty, SimConfig};
use crate::entity::{Entity, EntityId, EntityKind, EntityStorage, ExitState, Payload};
use crate::error::{GameError, Result};
use crate::events::{GameEvent, GameOverReason, Outcome, TickEvents};
use crate::grid::{SpatialMap, Tile, TileGrid};
use crate::hazard::{
    blast_cells, check_placement, Blast, DetonationEffect, Hazard, HazardOwner, PlacementRejected,
};
use crate::layout::{MapLayout, ObjectCode};
use crate::math::{millis, Direction, Fixed, GridPos, Vec2Fixed};
use crate::opponent::{choose_placer, update_opponent, Decision, OpponentState, PlacementGate, Surroundings};
use crate::physics::{Body, ColliderKind, ColliderTag, PhysicsWorld};
use crate::pickup::{self, CollectibleKind};
use crate::player::{FrameInput, PlayerState};
use crate::timer::Countdown;

/// Half side length of player and opponent colliders.
pub const AGENT_HALF_EXTENT: Fixed = millis(300);

/// Half side length of obstacle and blast colliders.
pub const TILE_HALF_EXTENT: Fixed = millis(500);

type BodyFactory = fn(Vec2Fixed, Fixed, ColliderTag) -> Body;

/// The arena simulation.
///
/// Owns all game state for one level and advances it deterministically.
/// Nothing here is global: two simulations never share physics, RNG or
/// placement state, so tests can run many in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Frames advanced so far.
    tick: u64,
    config: SimConfig,
    grid: TileGrid,
    entities: EntityStorage,
    physics: PhysicsWorld,
    rng: Pcg32,
    buffs: BuffScheduler,
    gate: PlacementGate,
    level_timer: Countdown,
    paused: bool,
    outcome: Outcome,
    /// Detonated hazards and expired blasts awaiting the flush.
    #[serde(skip)]
    removals: Vec<EntityId>,
    /// Events raised since the last frame was returned.
    #[serde(skip)]
    outbox: Vec<GameEvent>,
}

impl Simulation {
    /// Create an empty `width` × `height` arena.
    ///
    /// The simulation starts at tick 0 with no entities. Use the
    /// `spawn_*` methods or [`Simulation::from_layout`] to populate it.
    #[must_use]
    pub fn new(width: i32, height: i32, config: SimConfig) -> Self {
        Self {
            tick: 0,
            grid: TileGrid::new(width, height),
            entities: EntityStorage::new(),
            physics: PhysicsWorld::new(config.physics_step, config.max_frame_time),
            rng: Pcg32::seed_from_u64(config.seed),
            buffs: BuffScheduler::new(),
            gate: PlacementGate::new(config.placement_cooldown),
            level_timer: Countdown::new(config.level_duration),
            paused: false,
            outcome: Outcome::InProgress,
            removals: Vec::new(),
            outbox: Vec::new(),
            config,
        }
    }

    /// Materialize a level from a pre-parsed layout.
    ///
    /// Grid size is the largest coordinate plus one. Unknown object codes
    /// are logged and skipped. Player one spawns on the first entrance;
    /// in multiplayer, player two spawns on the second entrance, which is
    /// created if the layout has only one. Without an exit in the layout,
    /// one is hidden under a random breakable obstacle. Freeze and
    /// immunity collectibles are hidden under further breakables.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] for out-of-range config values
    /// and [`GameError::InvalidLayout`] for an empty layout, one without
    /// a player start, or one with coordinates outside
    /// `0..MAX_DIMENSION`.
    pub fn from_layout(layout: &MapLayout, config: SimConfig) -> Result<Self> {
        config.validate()?;
        if layout.is_empty() {
            return Err(GameError::InvalidLayout("layout has no entries".into()));
        }

        let (width, height) = layout.checked_dimensions()?;
        let mut sim = Self::new(width, height, config);
        let mut entrances = Vec::new();
        let mut has_exit = false;

        for (cell, raw) in layout.iter() {
            match ObjectCode::from_raw(raw) {
                Some(ObjectCode::Wall) => {
                    sim.spawn_wall(cell);
                }
                Some(ObjectCode::Breakable) => {
                    sim.spawn_breakable(cell);
                }
                Some(ObjectCode::Entrance) => {
                    sim.spawn_entrance(cell);
                    entrances.push(cell);
                }
                Some(ObjectCode::Opponent) => {
                    sim.spawn_opponent(cell);
                }
                Some(ObjectCode::Exit) => {
                    sim.spawn_exit(cell);
                    has_exit = true;
                }
                Some(ObjectCode::BreakableWithBudget) => {
                    sim.spawn_breakable(cell);
                    sim.spawn_collectible(cell, CollectibleKind::HazardBudget);
                }
                Some(ObjectCode::BreakableWithRadius) => {
                    sim.spawn_breakable(cell);
                    sim.spawn_collectible(cell, CollectibleKind::BlastRadius);
                }
                None => tracing::warn!(%cell, code = raw, "Unknown object type in layout, skipping"),
            }
        }

        let Some(&first) = entrances.first() else {
            return Err(GameError::InvalidLayout("no player start".into()));
        };
        sim.spawn_player(first);

        if sim.config.multiplayer {
            let second = match entrances.get(1) {
                Some(&cell) => Some(cell),
                None => {
                    let found = sim.find_second_entrance();
                    if let Some(cell) = found {
                        sim.spawn_entrance(cell);
                    }
                    found
                }
            };
            match second {
                Some(cell) => {
                    sim.spawn_player(cell);
                }
                None => tracing::warn!("No cell can host a second player start"),
            }
        }

        if !has_exit {
            sim.hide_exit();
        }
        sim.hide_buffs();

        tracing::info!(
            width,
            height,
            entities = sim.entities.len(),
            difficulty = ?sim.config.difficulty,
            "Level loaded"
        );
        Ok(sim)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Frames advanced so far. Paused frames do not count.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Tile grid.
    #[must_use]
    pub const fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Entity records.
    #[must_use]
    pub const fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Look up one entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Physics world.
    #[must_use]
    pub const fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Buff state.
    #[must_use]
    pub const fn buffs(&self) -> &BuffScheduler {
        &self.buffs
    }

    /// Shared autonomous-placement gate.
    #[must_use]
    pub const fn placement_gate(&self) -> &PlacementGate {
        &self.gate
    }

    /// Current outcome.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Time left on the level clock.
    #[must_use]
    pub const fn time_remaining(&self) -> Fixed {
        self.level_timer.remaining()
    }

    /// Whether frames are currently skipped.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current opponent behavior tier.
    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    /// Player state by entity id.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] if `id` is not a player.
    pub fn player(&self, id: EntityId) -> Result<&PlayerState> {
        self.entities
            .get(id)
            .and_then(Entity::as_player)
            .ok_or(GameError::EntityNotFound(id))
    }

    /// Player entities in slot order.
    #[must_use]
    pub fn players(&self) -> Vec<EntityId> {
        self.entities.ids_of(EntityKind::Player)
    }

    /// Opponent entities, dying ones included.
    #[must_use]
    pub fn opponents(&self) -> Vec<EntityId> {
        self.entities.ids_of(EntityKind::Opponent)
    }

    /// Whether the exit is locked; `None` when the level has no exit.
    #[must_use]
    pub fn exit_locked(&self) -> Option<bool> {
        self.entities
            .ids_of(EntityKind::Exit)
            .into_iter()
            .filter_map(|id| self.entities.get(id))
            .find_map(|e| match e.payload {
                Payload::Exit(exit) => Some(exit.locked),
                _ => None,
            })
    }

    /// Everything whose position rounds to `cell`, in id order.
    #[must_use]
    pub fn occupants(&self, cell: GridPos) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, e)| e.cell() == cell)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Live hazard on a cell, if any.
    #[must_use]
    pub fn live_hazard_at(&self, cell: GridPos) -> Option<EntityId> {
        self.entities
            .ids_at(cell, EntityKind::Hazard)
            .into_iter()
            .find(|&id| self.entities.get(id).is_some_and(Entity::is_live))
    }

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    /// Add a permanent obstacle.
    pub fn spawn_wall(&mut self, cell: GridPos) -> EntityId {
        self.grid.set_tile(cell, Tile::Wall);
        self.spawn_with_body(cell, Payload::Wall, Body::fixed, TILE_HALF_EXTENT, ColliderKind::Wall)
    }

    /// Add a breakable obstacle.
    pub fn spawn_breakable(&mut self, cell: GridPos) -> EntityId {
        self.grid.set_tile(cell, Tile::Breakable);
        self.spawn_with_body(
            cell,
            Payload::Breakable,
            Body::fixed,
            TILE_HALF_EXTENT,
            ColliderKind::Breakable,
        )
    }

    /// Add a player start marker.
    pub fn spawn_entrance(&mut self, cell: GridPos) -> EntityId {
        self.entities.insert(Entity::at(cell, Payload::Entrance))
    }

    /// Add a locked exit.
    pub fn spawn_exit(&mut self, cell: GridPos) -> EntityId {
        self.entities
            .insert(Entity::at(cell, Payload::Exit(ExitState { locked: true })))
    }

    /// Add a collectible. It stays hidden while a breakable obstacle
    /// covers its cell.
    pub fn spawn_collectible(&mut self, cell: GridPos, kind: CollectibleKind) -> EntityId {
        self.entities.insert(Entity::at(cell, Payload::Collectible(kind)))
    }

    /// Add a player in the next free controller slot.
    pub fn spawn_player(&mut self, cell: GridPos) -> EntityId {
        let slot = self.entities.count_of(EntityKind::Player) as u8;
        let state = PlayerState::new(slot, &self.config);
        let id = self.spawn_with_body(
            cell,
            Payload::Player(state),
            Body::dynamic,
            AGENT_HALF_EXTENT,
            ColliderKind::Player,
        );
        tracing::debug!(player = id, slot, %cell, "Player spawned");
        id
    }

    /// Add an opponent.
    pub fn spawn_opponent(&mut self, cell: GridPos) -> EntityId {
        let mut state = OpponentState::new();
        state.frozen = self.buffs.is_active(BuffKind::Freeze);
        self.spawn_with_body(
            cell,
            Payload::Opponent(state),
            Body::dynamic,
            AGENT_HALF_EXTENT,
            ColliderKind::Opponent,
        )
    }

    fn spawn_with_body(
        &mut self,
        cell: GridPos,
        payload: Payload,
        make: BodyFactory,
        half_extent: Fixed,
        kind: ColliderKind,
    ) -> EntityId {
        let id = self.entities.insert(Entity::at(cell, payload));
        let tag = ColliderTag { entity: id, kind };
        let handle = self.physics.insert(make(cell.to_world(), half_extent, tag));
        if let Some(entity) = self.entities.get_mut(id) {
            entity.body = Some(handle);
        }
        id
    }

    fn spawn_blast(&mut self, cell: GridPos, source: EntityId, from_opponent: bool) -> EntityId {
        let blast = Blast::new(source, from_opponent, self.config.blast_lifetime);
        self.spawn_with_body(
            cell,
            Payload::Blast(blast),
            Body::kinematic,
            TILE_HALF_EXTENT,
            ColliderKind::Blast { from_opponent },
        )
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Place a hazard on a player's cell.
    ///
    /// Rejected without any state change when the cell already holds a
    /// live hazard, when the player is at its concurrent-hazard budget,
    /// or when the player is dead or unknown.
    pub fn place_hazard(&mut self, player: EntityId) -> std::result::Result<EntityId, PlacementRejected> {
        let Some(entity) = self.entities.get(player) else {
            return Err(PlacementRejected::OwnerUnavailable);
        };
        let cell = entity.cell();
        let Some(state) = entity.as_player().filter(|p| p.life.is_alive()) else {
            return Err(PlacementRejected::OwnerUnavailable);
        };
        check_placement(
            self.live_hazard_at(cell).is_some(),
            state.live_hazards,
            state.hazard_budget,
        )?;
        let radius = state.blast_radius;

        if let Some(state) = self.entities.get_mut(player).and_then(Entity::as_player_mut) {
            state.live_hazards += 1;
        }
        Ok(self.arm_hazard(
            cell,
            HazardOwner::Player(player),
            radius,
            DetonationEffect::ReleasePlayerBudget(player),
        ))
    }

    fn arm_hazard(
        &mut self,
        cell: GridPos,
        owner: HazardOwner,
        radius: u32,
        effect: DetonationEffect,
    ) -> EntityId {
        let mut hazard = Hazard::new(owner, radius, self.config.hazard_fuse, effect);
        hazard.set_paused(self.paused);
        let id = self.entities.insert(Entity::at(cell, Payload::Hazard(hazard)));
        tracing::debug!(hazard = id, ?owner, %cell, radius, "Hazard placed");
        self.outbox.push(GameEvent::HazardPlaced {
            hazard: id,
            owner,
            cell,
        });
        id
    }

    /// Spend one of a player's buff charges.
    ///
    /// Returns `false` without consuming anything when the player has no
    /// charge of that kind, is dead, or any buff is already running.
    pub fn activate_buff(&mut self, player: EntityId, kind: BuffKind) -> bool {
        let Some(state) = self
            .entities
            .get(player)
            .and_then(Entity::as_player)
            .filter(|p| p.life.is_alive())
        else {
            return false;
        };
        let charges = match kind {
            BuffKind::Freeze => state.freeze_charges,
            BuffKind::Immunity => state.immunity_charges,
        };
        if charges == 0 || !self.buffs.activate(kind, self.config.buff_duration) {
            return false;
        }

        if let Some(state) = self.entities.get_mut(player).and_then(Entity::as_player_mut) {
            match kind {
                BuffKind::Freeze => state.freeze_charges -= 1,
                BuffKind::Immunity => state.immunity_charges -= 1,
            }
        }
        self.outbox.push(GameEvent::BuffActivated { kind });
        self.sync_frozen();
        true
    }

    /// Set the external pause flag and mirror it onto every hazard.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        for id in self.entities.ids_of(EntityKind::Hazard) {
            if let Some(Payload::Hazard(hazard)) = self.entities.get_mut(id).map(|e| &mut e.payload) {
                hazard.set_paused(paused);
            }
        }
        tracing::info!(paused, "Pause toggled");
    }

    /// Switch the opponent behavior tier mid-game.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.config.difficulty = difficulty;
        tracing::info!(?difficulty, "Difficulty changed");
    }

    /// Start an agent's death animation.
    ///
    /// Returns `false` if the entity is not a live agent. Immunity is
    /// not consulted here.
    pub fn kill_agent(&mut self, id: EntityId) -> bool {
        let player_death = self.config.player_death_duration;
        let opponent_death = self.config.opponent_death_duration;
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        let body = entity.body;
        let (killed, kind) = match &mut entity.payload {
            Payload::Player(player) => (player.life.kill(player_death), EntityKind::Player),
            Payload::Opponent(opponent) => (opponent.life.kill(opponent_death), EntityKind::Opponent),
            _ => return false,
        };
        if !killed {
            return false;
        }

        if let Some(handle) = body {
            self.physics.set_velocity(handle, Vec2Fixed::ZERO);
        }
        tracing::debug!(entity = id, ?kind, "Agent died");
        self.outbox.push(GameEvent::AgentDied { entity: id, kind });
        true
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Advance the simulation by one frame.
    ///
    /// `frame_time` is clamped to `[0, max_frame_time]`. Returns the
    /// events raised during the frame, including any raised by actions
    /// taken since the previous frame. A paused simulation returns an
    /// empty result and changes nothing.
    pub fn tick(&mut self, frame_time: Fixed, input: &FrameInput) -> TickEvents {
        if self.paused {
            return TickEvents::default();
        }
        let dt = frame_time.clamp(Fixed::ZERO, self.config.max_frame_time);

        // 1. Buffs and level clock
        for kind in self.buffs.advance(dt) {
            tracing::debug!(?kind, "Buff expired");
            self.outbox.push(GameEvent::BuffExpired { kind });
        }
        self.sync_frozen();
        self.run_level_timer(dt);

        // 2. Players
        self.run_players(dt, input);

        // 3. Opponents
        self.run_opponents(dt);
        self.run_autonomous_placement();

        // 4. Exit
        self.run_exit_unlock();

        // 5. Hazards and blasts (fronts spawned this frame start aging next frame)
        let blasts = self.entities.ids_of(EntityKind::Blast);
        self.run_hazards(dt);
        self.run_blasts(&blasts, dt);

        // 6. Shared placement cooldown
        self.gate.tick(dt);

        // 7. Removals
        self.flush_removals();

        // 8. Pickups
        self.run_pickups();

        // 9. Physics
        let physics_steps = self.run_physics(dt);

        // 10. Outcome
        self.run_outcome();

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            events: std::mem::take(&mut self.outbox),
            physics_steps,
        }
    }

    fn sync_frozen(&mut self) {
        let frozen = self.buffs.is_active(BuffKind::Freeze);
        for id in self.entities.ids_of(EntityKind::Opponent) {
            if let Some(opponent) = self.entities.get_mut(id).and_then(Entity::as_opponent_mut) {
                opponent.frozen = frozen;
            }
        }
    }

    fn run_level_timer(&mut self, dt: Fixed) {
        if self.outcome != Outcome::InProgress || !self.level_timer.advance(dt) {
            return;
        }
        // Timeout ignores immunity.
        for id in self.entities.ids_of(EntityKind::Player) {
            self.kill_agent(id);
        }
        self.outcome = Outcome::Defeat;
        tracing::info!(tick = self.tick, "Level timer expired");
        self.outbox.push(GameEvent::GameOver {
            reason: GameOverReason::TimeUp,
        });
    }

    fn run_players(&mut self, dt: Fixed, input: &FrameInput) {
        for id in self.entities.ids_of(EntityKind::Player) {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let body = entity.body;
            let Some(state) = entity.as_player_mut() else {
                continue;
            };

            if state.life.is_alive() {
                let command = input.for_slot(state.slot);
                state.heading = command.direction;
                let velocity = command
                    .direction
                    .map_or(Vec2Fixed::ZERO, |d| d.velocity(self.config.player_speed));
                if let Some(handle) = body {
                    self.physics.set_velocity(handle, velocity);
                }

                if command.place_hazard {
                    if let Err(reason) = self.place_hazard(id) {
                        tracing::debug!(player = id, %reason, "Hazard placement rejected");
                    }
                }
                if command.activate_freeze {
                    self.activate_buff(id, BuffKind::Freeze);
                }
                if command.activate_immunity {
                    self.activate_buff(id, BuffKind::Immunity);
                }
            } else {
                state.heading = None;
                let finished = state.life.advance(dt);
                if let Some(handle) = body {
                    self.physics.set_velocity(handle, Vec2Fixed::ZERO);
                }
                if finished {
                    self.detach_body(id);
                    tracing::debug!(player = id, "Player death animation finished");
                }
            }
        }
    }

    fn run_opponents(&mut self, dt: Fixed) {
        let difficulty = self.config.difficulty;
        let speed = self.config.opponent_speed(difficulty);
        let ids = self.entities.ids_of(EntityKind::Opponent);
        let live: Vec<(EntityId, Vec2Fixed)> = ids
            .iter()
            .filter_map(|&id| self.entities.get(id))
            .filter(|e| e.is_live())
            .map(|e| (e.id, e.position))
            .collect();
        let players = self.live_player_cells();
        let mut finished = Vec::new();

        for id in ids {
            let others: Vec<Vec2Fixed> = live
                .iter()
                .filter(|&&(other, _)| other != id)
                .map(|&(_, position)| position)
                .collect();

            let Self {
                entities,
                grid,
                physics,
                rng,
                config,
                ..
            } = self;
            let Some(entity) = entities.get_mut(id) else {
                continue;
            };
            let body = entity.body;
            let position = entity.position;
            let Some(state) = entity.as_opponent_mut() else {
                continue;
            };

            let env = Surroundings {
                map: &*grid,
                position,
                others: &others,
                players: &players,
            };
            let decision = update_opponent(state, &env, difficulty, config, dt, rng);
            tracing::trace!(opponent = id, ?decision, heading = ?state.heading, "Opponent decided");

            let velocity = state.heading.map_or(Vec2Fixed::ZERO, |h| h.velocity(speed));
            if let Some(handle) = body {
                physics.set_velocity(handle, velocity);
            }
            if let Decision::Dead { finished: true } = decision {
                finished.push(id);
            }
        }

        for id in finished {
            self.detach_body(id);
            self.entities.remove(id);
            tracing::debug!(opponent = id, "Opponent removed");
        }
    }

    fn run_autonomous_placement(&mut self) {
        if !self.config.difficulty.places_hazards() || !self.gate.is_open() {
            return;
        }
        let candidates: Vec<EntityId> = self
            .entities
            .ids_of(EntityKind::Opponent)
            .into_iter()
            .filter(|&id| {
                self.entities
                    .get(id)
                    .and_then(Entity::as_opponent)
                    .is_some_and(|o| o.life.is_alive() && !o.frozen)
            })
            .collect();
        let Some(placer) = choose_placer(&candidates, &mut self.rng) else {
            return;
        };
        let Some(cell) = self.entities.get(placer).map(Entity::cell) else {
            return;
        };
        if self.live_hazard_at(cell).is_some() {
            tracing::debug!(opponent = placer, %cell, "Autonomous placement skipped, cell occupied");
            return;
        }

        let hazard = self.arm_hazard(
            cell,
            HazardOwner::Opponent(placer),
            self.config.placement_radius,
            DetonationEffect::ReleasePlacerLock,
        );
        self.gate.claim(hazard);
    }

    fn run_exit_unlock(&mut self) {
        if self.entities.count_of(EntityKind::Opponent) > 0 {
            return;
        }
        for id in self.entities.ids_of(EntityKind::Exit) {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let cell = entity.cell();
            if let Payload::Exit(exit) = &mut entity.payload {
                if exit.locked {
                    exit.locked = false;
                    tracing::info!(%cell, "Exit unlocked");
                    self.outbox.push(GameEvent::ExitUnlocked { cell });
                }
            }
        }
    }

    fn run_hazards(&mut self, dt: Fixed) {
        let mut detonated = Vec::new();
        for id in self.entities.ids_of(EntityKind::Hazard) {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let cell = entity.cell();
            let Payload::Hazard(hazard) = &mut entity.payload else {
                continue;
            };
            hazard.set_paused(self.paused);
            if hazard.advance(dt) {
                if let Some(effect) = hazard.detonate() {
                    detonated.push((id, cell, hazard.radius, hazard.owner.is_opponent(), effect));
                }
            }
        }

        for (id, cell, radius, from_opponent, effect) in detonated {
            self.apply_detonation_effect(effect);
            let reached = blast_cells(&self.grid, cell, radius);
            for front in &reached {
                self.spawn_blast(front.cell, id, from_opponent);
            }
            tracing::debug!(hazard = id, %cell, fronts = reached.len(), "Hazard detonated");
            self.outbox.push(GameEvent::HazardDetonated {
                hazard: id,
                cell,
                blast_cells: reached.len() as u32,
            });
            self.removals.push(id);
        }
    }

    fn apply_detonation_effect(&mut self, effect: DetonationEffect) {
        match effect {
            DetonationEffect::ReleasePlayerBudget(player) => {
                if let Some(state) = self.entities.get_mut(player).and_then(Entity::as_player_mut) {
                    state.release_hazard();
                }
            }
            DetonationEffect::ReleasePlacerLock => self.gate.release(self.config.placement_cooldown),
        }
    }

    fn run_blasts(&mut self, ids: &[EntityId], dt: Fixed) {
        for &id in ids {
            if let Some(Payload::Blast(blast)) = self.entities.get_mut(id).map(|e| &mut e.payload) {
                if blast.advance(dt) {
                    self.removals.push(id);
                }
            }
        }
    }

    fn flush_removals(&mut self) {
        for id in std::mem::take(&mut self.removals) {
            if let Some(entity) = self.entities.remove(id) {
                if let Some(handle) = entity.body {
                    self.physics.remove(handle);
                }
            }
        }
    }

    fn run_pickups(&mut self) {
        let players: Vec<(EntityId, GridPos)> = self
            .entities
            .ids_of(EntityKind::Player)
            .into_iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| e.is_live())
            .map(|e| (e.id, e.cell()))
            .collect();

        for id in self.entities.ids_of(EntityKind::Collectible) {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let Payload::Collectible(kind) = &entity.payload else {
                continue;
            };
            let kind = *kind;
            let cell = entity.cell();
            if self.grid.is_breakable(cell) {
                continue;
            }

            for &(player, player_cell) in &players {
                if player_cell != cell {
                    continue;
                }
                let consumed = self
                    .entities
                    .get_mut(player)
                    .and_then(Entity::as_player_mut)
                    .is_some_and(|state| pickup::apply(kind, state, &self.config));
                if consumed {
                    self.entities.remove(id);
                    tracing::debug!(player, ?kind, %cell, "Collectible picked up");
                    self.outbox.push(GameEvent::CollectiblePicked { player, kind });
                    break;
                }
            }
        }
    }

    fn run_physics(&mut self, dt: Fixed) -> u32 {
        let report = self.physics.advance(dt, &PairTable);

        for kind in [EntityKind::Player, EntityKind::Opponent] {
            for id in self.entities.ids_of(kind) {
                let Some(entity) = self.entities.get_mut(id) else {
                    continue;
                };
                if let Some(position) = entity.body.and_then(|h| self.physics.position(h)) {
                    entity.position = position;
                }
            }
        }

        for contact in &report.contacts {
            let resolution = classify(contact.first_tag, contact.second_tag);
            self.apply_contact(resolution.effect);
        }
        report.steps
    }

    fn apply_contact(&mut self, effect: ContactEffect) {
        match effect {
            ContactEffect::None => {}
            ContactEffect::KillPlayer(id) => {
                if !self.buffs.is_active(BuffKind::Immunity) {
                    self.kill_agent(id);
                }
            }
            ContactEffect::KillOpponent(id) => {
                self.kill_agent(id);
            }
            ContactEffect::DestroyBreakable(id) => self.destroy_breakable(id),
        }
    }

    fn destroy_breakable(&mut self, id: EntityId) {
        let Some(cell) = self
            .entities
            .get(id)
            .filter(|e| e.kind() == EntityKind::Breakable)
            .map(Entity::cell)
        else {
            return;
        };
        if !self.grid.destroy_breakable(cell) {
            return;
        }
        if let Some(entity) = self.entities.remove(id) {
            if let Some(handle) = entity.body {
                self.physics.remove(handle);
            }
        }
        tracing::debug!(%cell, "Breakable obstacle destroyed");
        self.outbox.push(GameEvent::ObstacleDestroyed { cell });
    }

    fn run_outcome(&mut self) {
        if self.outcome != Outcome::InProgress {
            return;
        }
        let players = self.entities.ids_of(EntityKind::Player);
        if players.is_empty() {
            return;
        }

        // In multiplayer one death ends the run for both players.
        if self.config.multiplayer
            && players
                .iter()
                .filter_map(|&id| self.entities.get(id))
                .any(|e| !e.is_live())
        {
            for &id in &players {
                self.kill_agent(id);
            }
        }

        let all_dead = players
            .iter()
            .filter_map(|&id| self.entities.get(id))
            .all(|e| !e.is_live());
        if all_dead {
            self.outcome = Outcome::Defeat;
            tracing::info!(tick = self.tick, "All players dead");
            self.outbox.push(GameEvent::GameOver {
                reason: GameOverReason::AllPlayersDead,
            });
            return;
        }

        let Some(exit) = self.unlocked_exit_cell() else {
            return;
        };
        let multiplayer = self.config.multiplayer;
        let reached = players
            .iter()
            .filter_map(|&id| self.entities.get(id))
            .filter(|e| multiplayer || e.as_player().is_some_and(|p| p.slot == 0))
            .all(|e| e.is_live() && e.cell() == exit);
        if reached {
            self.outcome = Outcome::Victory;
            tracing::info!(tick = self.tick, %exit, "Exit reached");
            self.outbox.push(GameEvent::ExitReached);
        }
    }

    fn unlocked_exit_cell(&self) -> Option<GridPos> {
        self.entities
            .ids_of(EntityKind::Exit)
            .into_iter()
            .filter_map(|id| self.entities.get(id))
            .find(|e| matches!(e.payload, Payload::Exit(ExitState { locked: false })))
            .map(Entity::cell)
    }

    fn live_player_cells(&self) -> Vec<GridPos> {
        self.entities
            .ids_of(EntityKind::Player)
            .into_iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| e.is_live())
            .map(Entity::cell)
            .collect()
    }

    fn detach_body(&mut self, id: EntityId) {
        if let Some(handle) = self.entities.get_mut(id).and_then(|e| e.body.take()) {
            self.physics.remove(handle);
        }
    }

    // ------------------------------------------------------------------
    // Level setup helpers
    // ------------------------------------------------------------------

    fn hide_exit(&mut self) {
        let candidates: Vec<GridPos> = self
            .grid
            .breakable_cells()
            .into_iter()
            .filter(|&c| self.entities.ids_at(c, EntityKind::Collectible).is_empty())
            .collect();
        match candidates.choose(&mut self.rng) {
            Some(&cell) => {
                self.spawn_exit(cell);
                tracing::debug!(%cell, "Exit hidden under breakable obstacle");
            }
            None => tracing::warn!("No breakable obstacle can host the exit, level has no exit"),
        }
    }

    fn hide_buffs(&mut self) {
        let per_kind = self.config.hidden_buffs_per_kind as usize;
        if per_kind == 0 {
            return;
        }
        for kind in [CollectibleKind::Immunity, CollectibleKind::Freeze] {
            let candidates: Vec<GridPos> = self
                .grid
                .breakable_cells()
                .into_iter()
                .filter(|&c| self.hosts_nothing(c))
                .collect();
            if candidates.len() < per_kind {
                tracing::warn!(?kind, available = candidates.len(), "Too few breakable obstacles to hide buffs");
                continue;
            }
            let chosen: Vec<GridPos> = candidates
                .choose_multiple(&mut self.rng, per_kind)
                .copied()
                .collect();
            for cell in chosen {
                self.spawn_collectible(cell, kind);
            }
        }
    }

    fn hosts_nothing(&self, cell: GridPos) -> bool {
        self.entities.ids_at(cell, EntityKind::Collectible).is_empty()
            && self.entities.ids_at(cell, EntityKind::Exit).is_empty()
    }

    fn is_empty_cell(&self, cell: GridPos) -> bool {
        self.grid.tile(cell) == Some(Tile::Open) && self.entities.iter().all(|(_, e)| e.cell() != cell)
    }

    /// First interior cell, column-major, that is empty, has at least
    /// two empty neighbours and no neighbouring opponent.
    fn find_second_entrance(&self) -> Option<GridPos> {
        let (width, height) = (self.grid.width(), self.grid.height());
        (1..width - 1)
            .flat_map(|x| (1..height - 1).map(move |y| GridPos::new(x, y)))
            .find(|&cell| {
                let empty_neighbours = Direction::ALL
                    .iter()
                    .filter(|&&d| self.is_empty_cell(cell.step(d)))
                    .count();
                let opponent_adjacent = Direction::ALL
                    .iter()
                    .any(|&d| !self.entities.ids_at(cell.step(d), EntityKind::Opponent).is_empty());
                self.is_empty_cell(cell) && empty_neighbours >= 2 && !opponent_adjacent
            })
    }

    // ------------------------------------------------------------------
    // Hashing and snapshots
    // ------------------------------------------------------------------

    /// Compute a hash of the current simulation state.
    ///
    /// Used for determinism verification: two simulations fed the same
    /// frames must produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.paused.hash(&mut hasher);
        self.outcome.hash(&mut hasher);
        self.config.difficulty.hash(&mut hasher);

        // Entities in deterministic order
        let ids = self.entities.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(entity) = self.entities.get(id) {
                entity.hash_state(&mut hasher);
            }
        }

        self.grid.hash(&mut hasher);
        self.physics.hash(&mut hasher);
        self.buffs.hash(&mut hasher);
        self.gate.hash(&mut hasher);
        self.level_timer.hash(&mut hasher);
        // Pcg32 has no Hash; its next output stands in for its state.
        self.rng.clone().next_u64().hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the full simulation state to RON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_ron(&self) -> Result<String> {
        ron::to_string(self).map_err(|e| GameError::Snapshot(e.to_string()))
    }

    /// Restore a simulation from [`Simulation::to_ron`] output.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid snapshot.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::whole;
    use crate::player::PlayerInput;

    const FRAME: Fixed = millis(250);

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    fn run(sim: &mut Simulation, frames: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..frames {
            events.extend(sim.tick(FRAME, &idle()).events);
        }
        events
    }

    fn frozen_sim(width: i32, height: i32) -> Simulation {
        let mut sim = Simulation::new(width, height, SimConfig::default());
        sim.buffs.activate(BuffKind::Freeze, whole(100));
        sim
    }

    fn blast_at(sim: &Simulation, cell: GridPos) -> bool {
        !sim.entities.ids_at(cell, EntityKind::Blast).is_empty()
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new(10, 8, SimConfig::default());
        assert_eq!(sim.tick_count(), 0);
        assert!(sim.entities().is_empty());
        assert_eq!(sim.outcome(), Outcome::InProgress);
        assert_eq!(sim.grid().width(), 10);
        assert_eq!(sim.exit_locked(), None);
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::new(5, 5, SimConfig::default());
        let events = sim.tick(FRAME, &idle());
        assert_eq!(sim.tick_count(), 1);
        assert!(events.physics_steps >= 14);
    }

    #[test]
    fn test_place_hazard_rejections() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));

        let hazard = sim.place_hazard(player).expect("first placement");
        assert_eq!(sim.live_hazard_at(GridPos::new(2, 2)), Some(hazard));
        assert_eq!(sim.place_hazard(player), Err(PlacementRejected::CellOccupied));
        assert_eq!(sim.place_hazard(999), Err(PlacementRejected::OwnerUnavailable));

        assert_eq!(sim.player(player).map(|p| p.live_hazards).ok(), Some(1));
        assert!(matches!(sim.player(hazard), Err(GameError::EntityNotFound(_))));
    }

    #[test]
    fn test_budget_exhausted_elsewhere() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        sim.place_hazard(player).expect("first placement");

        // Move the player one cell over by hand.
        if let Some(entity) = sim.entities.get_mut(player) {
            entity.position = GridPos::new(3, 2).to_world();
        }
        assert_eq!(sim.place_hazard(player), Err(PlacementRejected::BudgetExhausted));
        assert_eq!(sim.entities.count_of(EntityKind::Hazard), 1);
    }

    #[test]
    fn test_hazard_detonates_and_releases_budget() {
        let mut sim = Simulation::new(12, 5, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        sim.place_hazard(player).expect("placement");

        let mut events = Vec::new();
        for _ in 0..4 {
            events.extend(sim.tick(FRAME, &FrameInput::single(PlayerInput::moving(Direction::Right))).events);
        }
        events.extend(run(&mut sim, 8));

        assert!(events.iter().any(|e| matches!(e, GameEvent::HazardDetonated { blast_cells: 5, .. })));
        let state = sim.entity(player).and_then(Entity::as_player).expect("player");
        assert_eq!(state.live_hazards, 0);
        assert!(state.life.is_alive());
        assert_eq!(sim.entities.count_of(EntityKind::Hazard), 0);
        assert!(blast_at(&sim, GridPos::new(2, 2)));
    }

    #[test]
    fn test_blasts_expire() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        sim.arm_hazard(
            GridPos::new(5, 5),
            HazardOwner::Player(999),
            1,
            DetonationEffect::ReleasePlayerBudget(999),
        );
        run(&mut sim, 12);
        assert_eq!(sim.entities.count_of(EntityKind::Blast), 5);
        run(&mut sim, 2);
        assert_eq!(sim.entities.count_of(EntityKind::Blast), 0);
        assert!(sim.physics().is_empty());
    }

    #[test]
    fn test_player_hazard_kills_frozen_opponent() {
        let mut sim = frozen_sim(10, 10);
        let opponent = sim.spawn_opponent(GridPos::new(4, 2));
        sim.arm_hazard(
            GridPos::new(3, 2),
            HazardOwner::Player(999),
            1,
            DetonationEffect::ReleasePlayerBudget(999),
        );

        let events = run(&mut sim, 12);
        assert!(events.contains(&GameEvent::AgentDied {
            entity: opponent,
            kind: EntityKind::Opponent,
        }));
    }

    #[test]
    fn test_opponent_hazard_spares_opponents() {
        let mut sim = frozen_sim(10, 10);
        let opponent = sim.spawn_opponent(GridPos::new(4, 2));
        sim.arm_hazard(
            GridPos::new(3, 2),
            HazardOwner::Opponent(opponent),
            1,
            DetonationEffect::ReleasePlacerLock,
        );

        let events = run(&mut sim, 12);
        assert!(events.iter().any(|e| matches!(e, GameEvent::HazardDetonated { .. })));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::AgentDied { .. })));
        assert!(sim.entity(opponent).is_some_and(Entity::is_live));
    }

    #[test]
    fn test_breakable_stops_and_is_destroyed() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        sim.spawn_breakable(GridPos::new(5, 2));
        sim.arm_hazard(
            GridPos::new(4, 2),
            HazardOwner::Player(999),
            3,
            DetonationEffect::ReleasePlayerBudget(999),
        );

        let events = run(&mut sim, 12);
        assert!(events.contains(&GameEvent::ObstacleDestroyed {
            cell: GridPos::new(5, 2)
        }));
        assert!(!sim.grid().is_breakable(GridPos::new(5, 2)));
        assert!(blast_at(&sim, GridPos::new(5, 2)));
        assert!(!blast_at(&sim, GridPos::new(6, 2)));
        assert_eq!(sim.entities.count_of(EntityKind::Breakable), 0);
    }

    #[test]
    fn test_immunity_blocks_blast_death() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        if let Some(state) = sim.entities.get_mut(player).and_then(Entity::as_player_mut) {
            state.immunity_charges = 1;
        }
        assert!(sim.activate_buff(player, BuffKind::Immunity));
        sim.place_hazard(player).expect("placement");

        let events = run(&mut sim, 12);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::AgentDied { .. })));
        assert!(sim.entity(player).is_some_and(Entity::is_live));
    }

    #[test]
    fn test_own_blast_kills_player() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        sim.place_hazard(player).expect("placement");

        let events = run(&mut sim, 12);
        assert!(events.contains(&GameEvent::AgentDied {
            entity: player,
            kind: EntityKind::Player,
        }));
        assert!(events.contains(&GameEvent::GameOver {
            reason: GameOverReason::AllPlayersDead,
        }));
        assert_eq!(sim.outcome(), Outcome::Defeat);

        // Reported once; the dead record stays and loses its body.
        let later = run(&mut sim, 4);
        assert!(!later.iter().any(|e| matches!(e, GameEvent::GameOver { .. })));
        assert!(sim.entity(player).is_some_and(|e| e.body.is_none()));
    }

    #[test]
    fn test_buffs_are_exclusive() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        assert!(!sim.activate_buff(player, BuffKind::Freeze));

        if let Some(state) = sim.entities.get_mut(player).and_then(Entity::as_player_mut) {
            state.freeze_charges = 1;
            state.immunity_charges = 1;
        }
        assert!(sim.activate_buff(player, BuffKind::Freeze));
        assert!(!sim.activate_buff(player, BuffKind::Immunity));
        assert!(sim.buffs().is_active(BuffKind::Freeze));
        assert!(!sim.buffs().is_active(BuffKind::Immunity));

        let state = sim.entity(player).and_then(Entity::as_player).expect("player");
        assert_eq!((state.freeze_charges, state.immunity_charges), (0, 1));
    }

    #[test]
    fn test_freeze_stops_opponents_until_expiry() {
        let mut config = SimConfig::default();
        config.buff_duration = whole(1);
        let mut sim = Simulation::new(10, 10, config);
        let player = sim.spawn_player(GridPos::new(8, 8));
        let opponent = sim.spawn_opponent(GridPos::new(4, 4));
        if let Some(state) = sim.entities.get_mut(player).and_then(Entity::as_player_mut) {
            state.freeze_charges = 1;
        }

        let input = FrameInput::single(PlayerInput {
            activate_freeze: true,
            ..PlayerInput::default()
        });
        let events = sim.tick(FRAME, &input).events;
        assert!(events.contains(&GameEvent::BuffActivated { kind: BuffKind::Freeze }));

        let start = sim.entity(opponent).map(|e| e.position);
        run(&mut sim, 2);
        assert_eq!(sim.entity(opponent).map(|e| e.position), start);
        assert!(sim.entity(opponent).and_then(Entity::as_opponent).is_some_and(|o| o.frozen));

        let events = run(&mut sim, 2);
        assert!(events.contains(&GameEvent::BuffExpired { kind: BuffKind::Freeze }));
        assert!(sim.entity(opponent).and_then(Entity::as_opponent).is_some_and(|o| !o.frozen));
    }

    #[test]
    fn test_collectible_pickup() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        sim.spawn_collectible(GridPos::new(2, 2), CollectibleKind::BlastRadius);
        let hidden = sim.spawn_collectible(GridPos::new(5, 5), CollectibleKind::Freeze);
        sim.spawn_breakable(GridPos::new(5, 5));

        let events = sim.tick(FRAME, &idle()).events;
        assert!(events.contains(&GameEvent::CollectiblePicked {
            player,
            kind: CollectibleKind::BlastRadius,
        }));
        assert_eq!(sim.entity(player).and_then(Entity::as_player).map(|p| p.blast_radius), Some(2));
        assert!(sim.entity(hidden).is_some());
    }

    #[test]
    fn test_capped_upgrade_stays_on_floor() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        if let Some(state) = sim.entities.get_mut(player).and_then(Entity::as_player_mut) {
            state.hazard_budget = 8;
        }
        let upgrade = sim.spawn_collectible(GridPos::new(2, 2), CollectibleKind::HazardBudget);
        sim.tick(FRAME, &idle());
        assert!(sim.entity(upgrade).is_some());
    }

    #[test]
    fn test_exit_unlocks_when_last_opponent_removed() {
        let mut sim = frozen_sim(10, 10);
        sim.spawn_player(GridPos::new(1, 1));
        sim.spawn_exit(GridPos::new(8, 8));
        let opponent = sim.spawn_opponent(GridPos::new(5, 5));

        run(&mut sim, 2);
        assert_eq!(sim.exit_locked(), Some(true));

        assert!(sim.kill_agent(opponent));
        let first = sim.tick(FRAME, &idle()).events;
        assert!(!first.iter().any(|e| matches!(e, GameEvent::ExitUnlocked { .. })));
        assert_eq!(sim.exit_locked(), Some(true));

        let second = sim.tick(FRAME, &idle()).events;
        assert!(second.contains(&GameEvent::ExitUnlocked {
            cell: GridPos::new(8, 8)
        }));
        assert_eq!(sim.exit_locked(), Some(false));
        assert!(sim.opponents().is_empty());
    }

    #[test]
    fn test_victory_on_unlocked_exit() {
        let mut sim = Simulation::new(5, 5, SimConfig::default());
        sim.spawn_player(GridPos::new(2, 2));
        sim.spawn_exit(GridPos::new(2, 2));

        let events = sim.tick(FRAME, &idle()).events;
        assert!(events.contains(&GameEvent::ExitReached));
        assert_eq!(sim.outcome(), Outcome::Victory);
        assert!(!sim.tick(FRAME, &idle()).events.contains(&GameEvent::ExitReached));
    }

    #[test]
    fn test_level_timer_ends_game() {
        let mut config = SimConfig::default();
        config.level_duration = whole(1);
        let mut sim = Simulation::new(5, 5, config);
        let player = sim.spawn_player(GridPos::new(2, 2));
        if let Some(state) = sim.entities.get_mut(player).and_then(Entity::as_player_mut) {
            state.immunity_charges = 1;
        }
        assert!(sim.activate_buff(player, BuffKind::Immunity));

        let events = run(&mut sim, 4);
        assert!(events.contains(&GameEvent::GameOver {
            reason: GameOverReason::TimeUp,
        }));
        assert_eq!(sim.outcome(), Outcome::Defeat);
        assert!(!sim.entity(player).is_some_and(Entity::is_live));
        assert_eq!(
            events.iter().filter(|e| matches!(e, GameEvent::GameOver { .. })).count(),
            1
        );
    }

    #[test]
    fn test_pause_freezes_everything() {
        let mut sim = Simulation::new(10, 10, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        let hazard = sim.place_hazard(player).expect("placement");
        run(&mut sim, 3);

        sim.set_paused(true);
        let hash = sim.state_hash();
        let remaining = sim.entity(hazard).and_then(Entity::as_hazard).map(Hazard::remaining);
        assert!(sim.entity(hazard).and_then(Entity::as_hazard).is_some_and(Hazard::is_paused));

        for _ in 0..20 {
            assert!(sim.tick(FRAME, &FrameInput::single(PlayerInput::moving(Direction::Up))).is_empty());
        }
        assert_eq!(sim.state_hash(), hash);

        sim.set_paused(false);
        assert_eq!(
            sim.entity(hazard).and_then(Entity::as_hazard).map(Hazard::remaining),
            remaining
        );
        assert!(!sim.entity(hazard).and_then(Entity::as_hazard).is_some_and(Hazard::is_paused));
    }

    #[test]
    fn test_autonomous_placement_cycle() {
        let mut config = SimConfig::default();
        config.difficulty = Difficulty::Hard;
        let layout = MapLayout::walled(7, 7).with(GridPos::new(1, 1), ObjectCode::Entrance);
        let mut sim = Simulation::from_layout(&layout, config).expect("layout");
        // Keep the player out of reach so the opponent only wanders.
        let opponent = sim.spawn_opponent(GridPos::new(5, 5));

        let events = run(&mut sim, 9);
        let placed = events.iter().find_map(|e| match e {
            GameEvent::HazardPlaced {
                hazard,
                owner: HazardOwner::Opponent(placer),
                ..
            } => Some((*hazard, *placer)),
            _ => None,
        });
        let (hazard, placer) = placed.expect("opponent placed a hazard");
        assert_eq!(placer, opponent);
        assert_eq!(sim.placement_gate().placer(), Some(hazard));

        let events = run(&mut sim, 12);
        assert!(events.iter().any(|e| matches!(e, GameEvent::HazardDetonated { hazard: h, .. } if *h == hazard)));
        assert_eq!(sim.placement_gate().placer(), None);
        // Released on the detonation frame, then one more frame of cooldown.
        assert_eq!(sim.placement_gate().cooldown(), whole(2) - FRAME - FRAME);
    }

    #[test]
    fn test_from_layout_requires_player_start() {
        let layout = MapLayout::walled(5, 5);
        assert!(matches!(
            Simulation::from_layout(&layout, SimConfig::default()),
            Err(GameError::InvalidLayout(_))
        ));
        assert!(matches!(
            Simulation::from_layout(&MapLayout::new(), SimConfig::default()),
            Err(GameError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_from_layout_rejects_oversized_grid() {
        let layout = MapLayout::new()
            .with(GridPos::new(1, 1), ObjectCode::Entrance)
            .with(GridPos::new(i32::MAX, 1), ObjectCode::Wall);
        assert!(matches!(
            Simulation::from_layout(&layout, SimConfig::default()),
            Err(GameError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_from_layout_materializes_entities() {
        let mut layout = MapLayout::walled(8, 6)
            .with(GridPos::new(1, 1), ObjectCode::Entrance)
            .with(GridPos::new(3, 3), ObjectCode::Opponent)
            .with(GridPos::new(4, 1), ObjectCode::BreakableWithRadius)
            .with(GridPos::new(5, 1), ObjectCode::Breakable)
            .with(GridPos::new(6, 1), ObjectCode::Breakable);
        layout.insert(GridPos::new(2, 4), 42);

        let sim = Simulation::from_layout(&layout, SimConfig::default()).expect("layout");
        assert_eq!((sim.grid().width(), sim.grid().height()), (8, 6));
        assert_eq!(sim.players().len(), 1);
        assert_eq!(sim.opponents().len(), 1);
        assert_eq!(sim.entities.count_of(EntityKind::Breakable), 3);
        assert!(sim.occupants(GridPos::new(2, 4)).is_empty());

        // Exit hidden under one of the breakables without an upgrade.
        let exit = sim.entities.ids_of(EntityKind::Exit);
        assert_eq!(exit.len(), 1);
        let exit_cell = sim.entity(exit[0]).map(Entity::cell).expect("exit");
        assert!([GridPos::new(5, 1), GridPos::new(6, 1)].contains(&exit_cell));

        // Only one breakable hosts nothing, too few for two of each buff.
        assert_eq!(sim.entities.count_of(EntityKind::Collectible), 1);
    }

    #[test]
    fn test_hidden_buffs_on_distinct_breakables() {
        let mut layout = MapLayout::walled(12, 4).with(GridPos::new(1, 1), ObjectCode::Entrance);
        for x in 3..11 {
            layout.place(GridPos::new(x, 2), ObjectCode::Breakable);
        }
        let sim = Simulation::from_layout(&layout, SimConfig::default()).expect("layout");

        let cells: Vec<GridPos> = sim
            .entities
            .ids_of(EntityKind::Collectible)
            .into_iter()
            .filter_map(|id| sim.entity(id).map(Entity::cell))
            .collect();
        assert_eq!(cells.len(), 4);
        let mut unique = cells.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert!(cells.iter().all(|&c| sim.grid().is_breakable(c)));
    }

    #[test]
    fn test_multiplayer_creates_second_entrance() {
        let mut config = SimConfig::default();
        config.multiplayer = true;
        let layout = MapLayout::walled(6, 6)
            .with(GridPos::new(4, 4), ObjectCode::Entrance)
            .with(GridPos::new(1, 2), ObjectCode::Opponent);
        let sim = Simulation::from_layout(&layout, config).expect("layout");

        assert_eq!(sim.players().len(), 2);
        assert_eq!(sim.entities.count_of(EntityKind::Entrance), 2);
        let second = sim.entity(sim.players()[1]).map(Entity::cell);
        // (1,1) and (1,3) touch the opponent at (1,2).
        assert_eq!(second, Some(GridPos::new(1, 4)));
    }

    #[test]
    fn test_multiplayer_death_ends_game_for_both() {
        let mut config = SimConfig::default();
        config.multiplayer = true;
        let mut sim = Simulation::new(6, 6, config);
        let first = sim.spawn_player(GridPos::new(1, 1));
        let second = sim.spawn_player(GridPos::new(4, 4));
        sim.spawn_exit(GridPos::new(1, 1));

        assert!(sim.kill_agent(second));
        let events = sim.tick(FRAME, &idle()).events;

        assert_eq!(sim.outcome(), Outcome::Defeat);
        assert!(!sim.entity(first).is_some_and(Entity::is_live));
        assert!(events.contains(&GameEvent::AgentDied {
            entity: first,
            kind: EntityKind::Player,
        }));
        assert!(events.contains(&GameEvent::GameOver {
            reason: GameOverReason::AllPlayersDead,
        }));
        assert!(!events.contains(&GameEvent::ExitReached));
        assert_eq!(sim.exit_locked(), Some(false));
    }

    #[test]
    fn test_single_player_death_is_defeat() {
        let mut sim = Simulation::new(6, 6, SimConfig::default());
        let player = sim.spawn_player(GridPos::new(2, 2));
        sim.kill_agent(player);
        let events = sim.tick(FRAME, &idle()).events;
        assert_eq!(sim.outcome(), Outcome::Defeat);
        assert_eq!(
            events.iter().filter(|e| matches!(e, GameEvent::AgentDied { .. })).count(),
            1
        );
    }

    #[test]
    fn test_deterministic_hash() {
        let mut config = SimConfig::default();
        config.seed = 77;
        config.difficulty = Difficulty::Hard;
        let layout = MapLayout::walled(9, 9)
            .with(GridPos::new(1, 1), ObjectCode::Entrance)
            .with(GridPos::new(7, 7), ObjectCode::Opponent)
            .with(GridPos::new(4, 4), ObjectCode::Opponent)
            .with(GridPos::new(4, 2), ObjectCode::Breakable);

        let mut sim1 = Simulation::from_layout(&layout, config.clone()).expect("layout");
        let mut sim2 = Simulation::from_layout(&layout, config).expect("layout");
        for _ in 0..60 {
            sim1.tick(FRAME, &idle());
            sim2.tick(FRAME, &idle());
        }
        assert_eq!(sim1.state_hash(), sim2.state_hash());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let layout = MapLayout::walled(7, 7)
            .with(GridPos::new(1, 1), ObjectCode::Entrance)
            .with(GridPos::new(5, 5), ObjectCode::Opponent);
        let mut sim = Simulation::from_layout(&layout, SimConfig::default()).expect("layout");
        run(&mut sim, 5);

        let text = sim.to_ron().expect("serialize");
        let restored = Simulation::from_ron(&text).expect("deserialize");
        assert_eq!(sim.state_hash(), restored.state_hash());
    }
}
