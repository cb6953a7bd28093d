//! The unified entity record.
//!
//! Every thing in the arena is one [`Entity`]: a position, an optional
//! physics body and a [`Payload`] holding the kind-specific state.
//! Behavior is written as free functions and `match`es on the payload
//! rather than as methods on a type hierarchy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hazard::{Blast, Hazard};
use crate::math::{Fixed, GridPos, Vec2Fixed};
use crate::opponent::OpponentState;
use crate::physics::BodyHandle;
use crate::pickup::CollectibleKind;
use crate::player::PlayerState;
use crate::timer::Countdown;

/// Unique identifier for entities.
pub type EntityId = u32;

// ============================================================================
// Kind tags
// ============================================================================

/// Payload discriminant, used for filtering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Permanent obstacle.
    Wall,
    /// Breakable obstacle.
    Breakable,
    /// Level exit.
    Exit,
    /// Player spawn point.
    Entrance,
    /// Upgrade or buff pickup.
    Collectible,
    /// Placed bomb.
    Hazard,
    /// Blast front cell.
    Blast,
    /// Player agent.
    Player,
    /// Opponent agent.
    Opponent,
}

// ============================================================================
// Agent life cycle
// ============================================================================

/// Live → dying → gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Life {
    /// Moving and vulnerable.
    #[default]
    Alive,
    /// Death animation playing.
    Dying(Countdown),
    /// Animation finished, physics body detached.
    Gone,
}

impl Life {
    /// Whether the agent is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }

    /// Start the death animation.
    ///
    /// Returns `false` if the agent was already dead.
    pub fn kill(&mut self, animation: Fixed) -> bool {
        if self.is_alive() {
            *self = Self::Dying(Countdown::new(animation));
            true
        } else {
            false
        }
    }

    /// Advance the death animation.
    ///
    /// Returns `true` on the frame the animation finishes.
    pub fn advance(&mut self, dt: Fixed) -> bool {
        if let Self::Dying(countdown) = self {
            countdown.advance(dt);
            if countdown.is_elapsed() {
                *self = Self::Gone;
                return true;
            }
        }
        false
    }
}

/// Exit door state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExitState {
    /// Locked while opponents remain.
    pub locked: bool,
}

// ============================================================================
// Entity record
// ============================================================================

/// Kind-specific entity state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Payload {
    /// Permanent obstacle.
    Wall,
    /// Breakable obstacle.
    Breakable,
    /// Level exit.
    Exit(ExitState),
    /// Player spawn point.
    Entrance,
    /// Pickup, possibly hidden under a breakable obstacle.
    Collectible(CollectibleKind),
    /// Placed bomb.
    Hazard(Hazard),
    /// Blast front cell.
    Blast(Blast),
    /// Player agent.
    Player(PlayerState),
    /// Opponent agent.
    Opponent(OpponentState),
}

impl Payload {
    /// Discriminant of this payload.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Wall => EntityKind::Wall,
            Self::Breakable => EntityKind::Breakable,
            Self::Exit(_) => EntityKind::Exit,
            Self::Entrance => EntityKind::Entrance,
            Self::Collectible(_) => EntityKind::Collectible,
            Self::Hazard(_) => EntityKind::Hazard,
            Self::Blast(_) => EntityKind::Blast,
            Self::Player(_) => EntityKind::Player,
            Self::Opponent(_) => EntityKind::Opponent,
        }
    }
}

/// Anything occupying space in the arena.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Continuous position; synced from the physics body for agents.
    pub position: Vec2Fixed,
    /// Physics presence, if any.
    pub body: Option<BodyHandle>,
    /// Kind-specific state.
    pub payload: Payload,
}

impl Entity {
    /// Create an entity at a cell center.
    #[must_use]
    pub fn at(cell: GridPos, payload: Payload) -> Self {
        Self {
            id: 0,
            position: cell.to_world(),
            body: None,
            payload,
        }
    }

    /// Discriminant of the payload.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Grid cell containing this entity.
    #[must_use]
    pub fn cell(&self) -> GridPos {
        GridPos::from_world(self.position)
    }

    /// Liveness flag.
    ///
    /// Agents are alive until killed, hazards until they detonate,
    /// blasts until they expire. Static entities are always live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        match &self.payload {
            Payload::Player(player) => player.life.is_alive(),
            Payload::Opponent(opponent) => opponent.life.is_alive(),
            Payload::Hazard(hazard) => !hazard.is_inert(),
            Payload::Blast(blast) => !blast.is_expired(),
            _ => true,
        }
    }

    /// Player state, if this is a player.
    #[must_use]
    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.payload {
            Payload::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Mutable player state, if this is a player.
    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.payload {
            Payload::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Opponent state, if this is an opponent.
    #[must_use]
    pub fn as_opponent(&self) -> Option<&OpponentState> {
        match &self.payload {
            Payload::Opponent(opponent) => Some(opponent),
            _ => None,
        }
    }

    /// Mutable opponent state, if this is an opponent.
    pub fn as_opponent_mut(&mut self) -> Option<&mut OpponentState> {
        match &mut self.payload {
            Payload::Opponent(opponent) => Some(opponent),
            _ => None,
        }
    }

    /// Hazard state, if this is a hazard.
    #[must_use]
    pub fn as_hazard(&self) -> Option<&Hazard> {
        match &self.payload {
            Payload::Hazard(hazard) => Some(hazard),
            _ => None,
        }
    }

    /// Blast state, if this is a blast front.
    #[must_use]
    pub fn as_blast(&self) -> Option<&Blast> {
        match &self.payload {
            Payload::Blast(blast) => Some(blast),
            _ => None,
        }
    }

    /// Hash the fields that matter for determinism checks.
    pub fn hash_state<H: std::hash::Hasher>(&self, hasher: &mut H) {
        use std::hash::Hash;
        self.id.hash(hasher);
        self.position.x.to_bits().hash(hasher);
        self.position.y.to_bits().hash(hasher);
        self.body.hash(hasher);
        self.payload.hash(hasher);
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Storage for all entities in the simulation.
///
/// Uses a `HashMap` for O(1) entity lookup by ID, with deterministic
/// iteration via sorted keys when processing a frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStorage {
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted IDs of entities of one kind.
    #[must_use]
    pub fn ids_of(&self, kind: EntityKind) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .values()
            .filter(|e| e.kind() == kind)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of entities of one kind.
    #[must_use]
    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind() == kind).count()
    }

    /// Sorted IDs of entities of one kind standing on a cell.
    #[must_use]
    pub fn ids_at(&self, cell: GridPos, kind: EntityKind) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .values()
            .filter(|e| e.kind() == kind && e.cell() == cell)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_assigns_sequential_ids() {
        let mut storage = EntityStorage::new();
        let a = storage.insert(Entity::at(GridPos::new(0, 0), Payload::Wall));
        let b = storage.insert(Entity::at(GridPos::new(1, 0), Payload::Breakable));
        assert_eq!((a, b), (1, 2));
        assert_eq!(storage.get(b).map(Entity::kind), Some(EntityKind::Breakable));
        assert_eq!(storage.sorted_ids(), vec![1, 2]);
    }

    #[test]
    fn test_kind_queries() {
        let mut storage = EntityStorage::new();
        storage.insert(Entity::at(GridPos::new(0, 0), Payload::Wall));
        let b = storage.insert(Entity::at(GridPos::new(2, 3), Payload::Breakable));
        storage.insert(Entity::at(GridPos::new(4, 0), Payload::Wall));

        assert_eq!(storage.count_of(EntityKind::Wall), 2);
        assert_eq!(storage.ids_at(GridPos::new(2, 3), EntityKind::Breakable), vec![b]);
        assert!(storage.ids_at(GridPos::new(2, 3), EntityKind::Wall).is_empty());
    }

    #[test]
    fn test_life_transitions() {
        let mut life = Life::Alive;
        assert!(life.kill(Fixed::from_num(0.5)));
        assert!(!life.kill(Fixed::from_num(0.5)));
        assert!(!life.is_alive());

        assert!(!life.advance(Fixed::from_num(0.25)));
        assert!(life.advance(Fixed::from_num(0.25)));
        assert_eq!(life, Life::Gone);
        assert!(!life.advance(Fixed::from_num(1)));
    }

    #[test]
    fn test_static_entities_are_live() {
        let wall = Entity::at(GridPos::new(1, 1), Payload::Wall);
        assert!(wall.is_live());
        assert_eq!(wall.cell(), GridPos::new(1, 1));
    }
}
