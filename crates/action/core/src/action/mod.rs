//! Action definitions, templates, instances and the phase engine.
//!
//! An [`ActionTemplate`] is the read-only class-level description (phase
//! table, code rules, hook factory) shared by every [`ActionInstance`]. The
//! instance owns the current phase, its tasks and the bookkeeping needed to
//! tear everything down deterministically.

mod context;
mod definition;
mod engine;
mod instance;
mod template;

pub use context::{PhaseContext, SystemContext, SystemRequest};
pub use definition::{
    ActionDefinition, ActivationPolicy, CooldownSpec, InstancingPolicy, LevelTable,
};
pub use instance::{ActionInstance, InstanceState};
pub use template::{ActionHooks, ActionTemplate, NoHooks};

pub(crate) use instance::StoreRequest;
