//! Data-driven phase state machine for character actions.
//!
//! `action-core` drives every action through named phases (Begin, Execute,
//! Landing, Recovery, Interrupt, End) using ordered transition rules fired by
//! task events, gameplay events, phase timeouts and Immediate chains. It is
//! deterministic and single-threaded: time only moves when the host calls
//! [`ActionSystemComponent::advance`], and all collaborators (animation,
//! movement, effects) are reached through the traits in [`env`].
//!
//! All mutation flows through [`component::ActionSystemComponent`], which
//! lends its state to one [`action::ActionInstance`] at a time.
pub mod action;
pub mod behavior;
pub mod component;
pub mod condition;
pub mod config;
pub mod env;
pub mod error;
pub mod handle;
pub mod math;
pub mod net;
pub mod payload;
pub mod phase;
pub mod rule;
pub mod tag;
pub mod task;
pub mod timer;

pub use action::{
    ActionDefinition, ActionHooks, ActionInstance, ActionTemplate, ActivationPolicy,
    CooldownSpec, InstancingPolicy, LevelTable, NoHooks, PhaseContext, SystemContext,
    SystemRequest,
};
pub use behavior::{BehaviorKind, PhaseBehavior};
pub use component::{
    ActionSpec, ActionSystemComponent, ActionSystemEvent, ActiveAction, ReplicationMessage,
};
pub use condition::{Condition, ConditionContext, PhaseCondition};
pub use config::ActionSystemConfig;
pub use env::{
    ActionEnv, ActorInfo, AnimationDriver, AnimationEvent, AnimationEventKind, EffectDriver,
    MovementDriver, NullAnimation, NullEffects, NullMovement,
};
pub use error::{ActionError, ActivationFailure, ClassifiedError, ErrorSeverity};
pub use handle::{ActionSpecHandle, ActiveActionHandle, ActorId, PredictionKey, TaskId};
pub use math::{Vec3, constant_velocity, interp_to};
pub use net::{NetExecutionPolicy, NetRole};
pub use payload::{ContextPayload, PayloadValue};
pub use phase::{PhaseData, PhaseInfo, PhaseTable, TableIssue};
pub use rule::{TransitionOutcome, TransitionRule, TransitionTrigger};
pub use tag::{GameplayTag, TagContainer, TagCountContainer};
pub use task::{ActionTask, Lifecycle, TaskContext, TaskSpec};
