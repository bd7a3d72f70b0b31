//! Collaborators the engine talks to but does not own.
//!
//! Animation playback, character movement and the effect/attribute system
//! are black boxes reached through the traits below. Hosts install their
//! implementations in an [`ActionEnv`]; the defaults accept every request and
//! never produce events, which is enough for headless tests.

use crate::handle::ActorId;
use crate::math::Vec3;
use crate::tag::GameplayTag;

/// Owner and avatar of an action system. The avatar may not exist yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorInfo {
    pub owner: ActorId,
    pub avatar: Option<ActorId>,
}

impl ActorInfo {
    /// Owner that is also its own avatar.
    pub const fn embodied(actor: ActorId) -> Self {
        Self {
            owner: actor,
            avatar: Some(actor),
        }
    }

    pub const fn without_avatar(owner: ActorId) -> Self {
        Self {
            owner,
            avatar: None,
        }
    }
}

/// Montage playback report delivered by the animation collaborator.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationEvent {
    pub montage: String,
    pub kind: AnimationEventKind,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnimationEventKind {
    NotifyBegin { notify: String },
    NotifyEnd { notify: String },
    BlendingOut { interrupted: bool },
    Ended { interrupted: bool },
}

impl AnimationEvent {
    pub fn notify_begin(montage: impl Into<String>, notify: impl Into<String>) -> Self {
        Self {
            montage: montage.into(),
            kind: AnimationEventKind::NotifyBegin {
                notify: notify.into(),
            },
        }
    }

    pub fn ended(montage: impl Into<String>, interrupted: bool) -> Self {
        Self {
            montage: montage.into(),
            kind: AnimationEventKind::Ended { interrupted },
        }
    }
}

pub trait AnimationDriver: Send {
    /// Returns true if an asset exists at `path`.
    fn resolve_montage(&self, path: &str) -> bool;

    /// Starts a montage and returns its length. A non-positive length means
    /// playback failed.
    fn play_montage(
        &mut self,
        avatar: ActorId,
        montage: &str,
        rate: f32,
        start_section: Option<&str>,
    ) -> f32;

    fn stop_montage(&mut self, avatar: ActorId, montage: &str, blend_out: f32);

    fn is_playing(&self, avatar: ActorId, montage: &str) -> bool;
}

pub trait MovementDriver: Send {
    fn is_falling(&self, avatar: ActorId) -> bool;

    fn velocity(&self, avatar: ActorId) -> Vec3;

    fn set_velocity(&mut self, avatar: ActorId, velocity: Vec3);

    fn location(&self, avatar: ActorId) -> Vec3;
}

/// Attribute, cost and effect system.
pub trait EffectDriver: Send {
    fn can_afford(&self, _owner: ActorId, _action: &str) -> bool {
        true
    }

    fn commit_cost(&mut self, _owner: ActorId, _action: &str) {}

    fn apply_effect_to_self(&mut self, _owner: ActorId, _effect: &GameplayTag, _level: u32) {}

    fn execute_cue(&mut self, _owner: ActorId, _cue: &GameplayTag) {}

    /// Spawns an actor of `class`. `None` when the class cannot be spawned.
    fn spawn_actor(&mut self, _owner: ActorId, _class: &str) -> Option<ActorId> {
        None
    }

    fn destroy_actor(&mut self, _actor: ActorId) {}
}

#[derive(Debug, Default)]
pub struct NullAnimation;

impl AnimationDriver for NullAnimation {
    fn resolve_montage(&self, _path: &str) -> bool {
        true
    }

    fn play_montage(&mut self, _: ActorId, _: &str, _: f32, _: Option<&str>) -> f32 {
        1.0
    }

    fn stop_montage(&mut self, _: ActorId, _: &str, _: f32) {}

    fn is_playing(&self, _: ActorId, _: &str) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NullMovement;

impl MovementDriver for NullMovement {
    fn is_falling(&self, _: ActorId) -> bool {
        false
    }

    fn velocity(&self, _: ActorId) -> Vec3 {
        Vec3::ZERO
    }

    fn set_velocity(&mut self, _: ActorId, _: Vec3) {}

    fn location(&self, _: ActorId) -> Vec3 {
        Vec3::ZERO
    }
}

#[derive(Debug, Default)]
pub struct NullEffects;

impl EffectDriver for NullEffects {}

/// Bundle of collaborators installed on an action system component.
pub struct ActionEnv {
    pub animation: Box<dyn AnimationDriver>,
    pub movement: Box<dyn MovementDriver>,
    pub effects: Box<dyn EffectDriver>,
}

impl ActionEnv {
    pub fn new(
        animation: Box<dyn AnimationDriver>,
        movement: Box<dyn MovementDriver>,
        effects: Box<dyn EffectDriver>,
    ) -> Self {
        Self {
            animation,
            movement,
            effects,
        }
    }

    #[must_use]
    pub fn with_animation(mut self, animation: impl AnimationDriver + 'static) -> Self {
        self.animation = Box::new(animation);
        self
    }

    #[must_use]
    pub fn with_movement(mut self, movement: impl MovementDriver + 'static) -> Self {
        self.movement = Box::new(movement);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl EffectDriver + 'static) -> Self {
        self.effects = Box::new(effects);
        self
    }
}

impl Default for ActionEnv {
    fn default() -> Self {
        Self::new(
            Box::new(NullAnimation),
            Box::new(NullMovement),
            Box::new(NullEffects),
        )
    }
}

impl std::fmt::Debug for ActionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEnv").finish_non_exhaustive()
    }
}
