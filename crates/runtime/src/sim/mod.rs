//! Simulated collaborators standing in for an animation system, character
//! movement, and the attribute/effect layer.
//!
//! Each collaborator is a cheap cloneable handle over shared state: one clone
//! is boxed into the component's [`action_core::ActionEnv`], the other stays
//! with the worker so it can advance time and read results.

mod body;
mod effects;
mod montage;

pub use body::{BodyState, SimulatedBody};
pub use effects::{EffectRecord, SimulatedEffects};
pub use montage::{MontageLibrary, MontagePlayer, MontageTimeline};
