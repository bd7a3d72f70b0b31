//! Vertical character motion under gravity.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use action_core::{ActorId, MovementDriver, Vec3};
use tracing::trace;

/// Motion state of one simulated avatar.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyState {
    pub location: Vec3,
    pub velocity: Vec3,
}

impl BodyState {
    pub fn is_airborne(&self) -> bool {
        self.location.z > 0.0 || self.velocity.z > 0.0
    }
}

#[derive(Debug)]
struct World {
    gravity: f32,
    bodies: BTreeMap<ActorId, BodyState>,
}

/// Point-mass bodies that fall under gravity and stop on the ground plane
/// `z = 0`. Horizontal motion is integrated but never constrained.
#[derive(Clone, Debug)]
pub struct SimulatedBody(Arc<Mutex<World>>);

impl SimulatedBody {
    pub const DEFAULT_GRAVITY: f32 = 980.0;

    pub fn new(gravity: f32) -> Self {
        Self(Arc::new(Mutex::new(World {
            gravity,
            bodies: BTreeMap::new(),
        })))
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn spawn(&self, actor: ActorId, location: Vec3) {
        self.world().bodies.insert(
            actor,
            BodyState {
                location,
                velocity: Vec3::ZERO,
            },
        );
    }

    pub fn state(&self, actor: ActorId) -> Option<BodyState> {
        self.world().bodies.get(&actor).copied()
    }

    /// Integrates every body over `dt` seconds. Returns the actors that
    /// touched down during the step.
    pub fn step(&self, dt: f32) -> Vec<ActorId> {
        let mut world = self.world();
        let gravity = world.gravity;
        let mut landed = Vec::new();

        for (&actor, body) in world.bodies.iter_mut() {
            if !body.is_airborne() {
                continue;
            }
            body.velocity.z -= gravity * dt;
            body.location = body.location + body.velocity * dt;
            if body.location.z <= 0.0 {
                body.location.z = 0.0;
                body.velocity = Vec3::ZERO;
                trace!(%actor, "body landed");
                landed.push(actor);
            }
        }
        landed
    }
}

impl Default for SimulatedBody {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GRAVITY)
    }
}

impl MovementDriver for SimulatedBody {
    fn is_falling(&self, avatar: ActorId) -> bool {
        self.state(avatar).is_some_and(|body| body.is_airborne())
    }

    fn velocity(&self, avatar: ActorId) -> Vec3 {
        self.state(avatar).map(|body| body.velocity).unwrap_or_default()
    }

    fn set_velocity(&mut self, avatar: ActorId, velocity: Vec3) {
        if let Some(body) = self.world().bodies.get_mut(&avatar) {
            body.velocity = velocity;
        }
    }

    fn location(&self, avatar: ActorId) -> Vec3 {
        self.state(avatar).map(|body| body.location).unwrap_or_default()
    }
}
