//! Deterministic fixed-step physics.
//!
//! A deliberately small rigid-body world: axis-aligned boxes, three
//! body types and no rotation. Everything runs on [`Fixed`] math so a
//! replayed input stream reproduces the exact same contacts.
//!
//! # Stepping
//!
//! [`PhysicsWorld::advance`] takes a variable frame time, adds it to an
//! accumulator and runs as many fixed-size [`PhysicsWorld::step`]s as
//! fit. The remainder carries over to the next frame.
//!
//! # Contacts
//!
//! Each sub-step integrates velocities, finds every overlapping pair
//! except `Fixed`–`Fixed`, and records the pairs that were not touching
//! on the previous sub-step as [`ContactEvent`]s. Before pushing bodies
//! apart, the world asks a [`ContactHooks`] implementation whether the
//! pair should be solved at all, which is how agents pass through blast
//! fronts and through each other.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Handle to a body in a [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves, never pushed.
    Fixed,
    /// Moves by its own velocity, never pushed.
    Kinematic,
    /// Moves by its own velocity and is pushed out of solved contacts.
    Dynamic,
}

/// Gameplay category attached to a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColliderKind {
    /// Permanent obstacle.
    Wall,
    /// Breakable obstacle.
    Breakable,
    /// Player agent.
    Player,
    /// Opponent agent.
    Opponent,
    /// Blast front.
    Blast {
        /// Whether the hazard that produced it was placed by an opponent.
        from_opponent: bool,
    },
}

/// User data carried by every body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderTag {
    /// Owning entity.
    pub entity: EntityId,
    /// Gameplay category.
    pub kind: ColliderKind,
}

/// A rigid body with an axis-aligned square collider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Body {
    /// Body type.
    pub body_type: BodyType,
    /// Center position.
    pub position: Vec2Fixed,
    /// Velocity in cells per second.
    pub velocity: Vec2Fixed,
    /// Half the side length of the collider.
    #[serde(with = "fixed_serde")]
    pub half_extent: Fixed,
    /// Gameplay tag.
    pub tag: ColliderTag,
}

impl Body {
    /// Immovable body.
    #[must_use]
    pub fn fixed(position: Vec2Fixed, half_extent: Fixed, tag: ColliderTag) -> Self {
        Self::new(BodyType::Fixed, position, half_extent, tag)
    }

    /// Self-moving body that ignores contacts.
    #[must_use]
    pub fn kinematic(position: Vec2Fixed, half_extent: Fixed, tag: ColliderTag) -> Self {
        Self::new(BodyType::Kinematic, position, half_extent, tag)
    }

    /// Body that is pushed out of solved contacts.
    #[must_use]
    pub fn dynamic(position: Vec2Fixed, half_extent: Fixed, tag: ColliderTag) -> Self {
        Self::new(BodyType::Dynamic, position, half_extent, tag)
    }

    fn new(body_type: BodyType, position: Vec2Fixed, half_extent: Fixed, tag: ColliderTag) -> Self {
        Self {
            body_type,
            position,
            velocity: Vec2Fixed::ZERO,
            half_extent,
            tag,
        }
    }

    fn overlap(&self, other: &Self) -> Option<(Fixed, Fixed)> {
        let reach = self.half_extent + other.half_extent;
        let ox = reach - (self.position.x - other.position.x).abs();
        let oy = reach - (self.position.y - other.position.y).abs();
        (ox > Fixed::ZERO && oy > Fixed::ZERO).then_some((ox, oy))
    }
}

/// A pair of bodies that started touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Lower handle of the pair.
    pub first: BodyHandle,
    /// Higher handle of the pair.
    pub second: BodyHandle,
    /// Tag of `first`.
    pub first_tag: ColliderTag,
    /// Tag of `second`.
    pub second_tag: ColliderTag,
}

/// Per-pair solver filter.
pub trait ContactHooks {
    /// Whether to resolve penetration between two touching bodies.
    fn solve_contact(&self, a: ColliderTag, b: ColliderTag) -> bool;
}

/// Hooks that solve every contact.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveAll;

impl ContactHooks for SolveAll {
    fn solve_contact(&self, _a: ColliderTag, _b: ColliderTag) -> bool {
        true
    }
}

/// Result of one [`PhysicsWorld::advance`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Sub-steps executed.
    pub steps: u32,
    /// Contacts that began, in step order.
    pub contacts: Vec<ContactEvent>,
}

/// Fixed-step rigid-body world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicsWorld {
    bodies: BTreeMap<BodyHandle, Body>,
    next_handle: u32,
    touching: BTreeSet<(BodyHandle, BodyHandle)>,
    #[serde(with = "fixed_serde")]
    step_size: Fixed,
    #[serde(with = "fixed_serde")]
    max_frame_time: Fixed,
    #[serde(with = "fixed_serde")]
    accumulator: Fixed,
}

impl PhysicsWorld {
    /// Create an empty world with the given sub-step and frame clamp.
    #[must_use]
    pub fn new(step_size: Fixed, max_frame_time: Fixed) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_handle: 0,
            touching: BTreeSet::new(),
            step_size,
            max_frame_time,
            accumulator: Fixed::ZERO,
        }
    }

    /// Add a body.
    pub fn insert(&mut self, body: Body) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(handle, body);
        handle
    }

    /// Remove a body and forget its contacts.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        self.touching.retain(|&(a, b)| a != handle && b != handle);
        self.bodies.remove(&handle)
    }

    /// Look up a body.
    #[must_use]
    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle)
    }

    /// Current position of a body.
    #[must_use]
    pub fn position(&self, handle: BodyHandle) -> Option<Vec2Fixed> {
        self.bodies.get(&handle).map(|b| b.position)
    }

    /// Set a body's velocity. Fixed bodies ignore this.
    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2Fixed) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            if body.body_type != BodyType::Fixed {
                body.velocity = velocity;
            }
        }
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the world has no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Unconsumed frame time.
    #[must_use]
    pub const fn accumulator(&self) -> Fixed {
        self.accumulator
    }

    /// Accumulate frame time and run every whole sub-step it covers.
    pub fn advance<H: ContactHooks + ?Sized>(&mut self, frame_time: Fixed, hooks: &H) -> StepReport {
        let frame_time = frame_time.clamp(Fixed::ZERO, self.max_frame_time);
        self.accumulator += frame_time;

        let mut report = StepReport::default();
        while self.accumulator >= self.step_size {
            let mut contacts = self.step(self.step_size, hooks);
            report.contacts.append(&mut contacts);
            report.steps += 1;
            self.accumulator -= self.step_size;
        }
        report
    }

    /// Run exactly one sub-step of `dt` seconds.
    pub fn step<H: ContactHooks + ?Sized>(&mut self, dt: Fixed, hooks: &H) -> Vec<ContactEvent> {
        for body in self.bodies.values_mut() {
            if body.body_type != BodyType::Fixed && !body.velocity.is_zero() {
                body.position = body.position + body.velocity.scale(dt);
            }
        }

        let handles: Vec<BodyHandle> = self.bodies.keys().copied().collect();
        let mut now_touching = BTreeSet::new();
        let mut began = Vec::new();

        for (i, &ha) in handles.iter().enumerate() {
            for &hb in &handles[i + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(&ha), self.bodies.get(&hb)) else {
                    continue;
                };
                if a.body_type == BodyType::Fixed && b.body_type == BodyType::Fixed {
                    continue;
                }
                let Some((ox, oy)) = a.overlap(b) else {
                    continue;
                };

                now_touching.insert((ha, hb));
                if !self.touching.contains(&(ha, hb)) {
                    began.push(ContactEvent {
                        first: ha,
                        second: hb,
                        first_tag: a.tag,
                        second_tag: b.tag,
                    });
                }

                if hooks.solve_contact(a.tag, b.tag) {
                    self.separate(ha, hb, ox, oy);
                }
            }
        }

        self.touching = now_touching;
        began
    }

    /// Push dynamic bodies apart along the axis of least penetration.
    fn separate(&mut self, ha: BodyHandle, hb: BodyHandle, ox: Fixed, oy: Fixed) {
        let (Some(a), Some(b)) = (self.bodies.get(&ha), self.bodies.get(&hb)) else {
            return;
        };
        let a_moves = a.body_type == BodyType::Dynamic;
        let b_moves = b.body_type == BodyType::Dynamic;
        if !a_moves && !b_moves {
            return;
        }

        let along_x = ox <= oy;
        let depth = if along_x { ox } else { oy };
        let delta = b.position - a.position;
        // Direction from a to b on the chosen axis; coincident centers push b positive.
        let sign = if along_x { delta.x } else { delta.y };
        let sign = if sign < Fixed::ZERO { -Fixed::ONE } else { Fixed::ONE };

        let (share_a, share_b) = match (a_moves, b_moves) {
            (true, true) => (depth / 2, depth / 2),
            (true, false) => (depth, Fixed::ZERO),
            _ => (Fixed::ZERO, depth),
        };

        if let Some(a) = self.bodies.get_mut(&ha) {
            push(a, along_x, -sign, share_a);
        }
        if let Some(b) = self.bodies.get_mut(&hb) {
            push(b, along_x, sign, share_b);
        }
    }
}

/// Move `body` by `amount` along `sign` on one axis and drop the velocity
/// component heading back into the contact.
fn push(body: &mut Body, along_x: bool, sign: Fixed, amount: Fixed) {
    if amount == Fixed::ZERO {
        return;
    }
    if along_x {
        body.position.x += sign * amount;
        if body.velocity.x * sign < Fixed::ZERO {
            body.velocity.x = Fixed::ZERO;
        }
    } else {
        body.position.y += sign * amount;
        if body.velocity.y * sign < Fixed::ZERO {
            body.velocity.y = Fixed::ZERO;
        }
    }
}
