//! Data-driven side effects run on phase enter and exit.

use tracing::{trace, warn};

use crate::action::PhaseContext;
use crate::net::NetExecutionPolicy;
use crate::task::TaskSpec;
use crate::tag::{GameplayTag, TagContainer};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseBehavior {
    #[cfg_attr(feature = "serde", serde(default))]
    pub net_policy: NetExecutionPolicy,
    pub kind: BehaviorKind,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BehaviorKind {
    /// Adds one stack of each tag to the owner, recorded on the instance.
    AddTags(TagContainer),
    /// Removes stacks this instance granted. Foreign stacks are untouched.
    RemoveTags(TagContainer),
    RunTask(TaskSpec),
    EndAllTasks,
    EndAction { cancelled: bool },
    /// When task event `event` is posted during this phase, copy payload
    /// entry `source_key` into the action payload under `destination_key`.
    StoreTaskResult {
        event: GameplayTag,
        source_key: String,
        destination_key: String,
    },
    StartCooldown,
    ApplyEffectToSelf(GameplayTag),
    ExecuteCue(GameplayTag),
    /// Spawns an actor owned by the action; destroyed when the action ends.
    SpawnActionActor(String),
    CancelActionsWithTags(TagContainer),
}

impl PhaseBehavior {
    pub fn new(kind: BehaviorKind) -> Self {
        Self {
            net_policy: NetExecutionPolicy::All,
            kind,
        }
    }

    pub fn server_only(kind: BehaviorKind) -> Self {
        Self {
            net_policy: NetExecutionPolicy::ServerOnly,
            kind,
        }
    }

    pub fn client_only(kind: BehaviorKind) -> Self {
        Self {
            net_policy: NetExecutionPolicy::ClientOnly,
            kind,
        }
    }

    pub fn ends_action(&self) -> bool {
        matches!(self.kind, BehaviorKind::EndAction { .. })
    }

    pub fn execute(&self, ctx: &mut PhaseContext<'_, '_>) {
        if !self.net_policy.allows(ctx.role()) {
            trace!(
                action = ctx.action_name(),
                policy = %self.net_policy,
                role = %ctx.role(),
                "behavior skipped by net policy"
            );
            return;
        }
        match &self.kind {
            BehaviorKind::AddTags(tags) => ctx.add_tags(tags),
            BehaviorKind::RemoveTags(tags) => ctx.remove_tags(tags),
            BehaviorKind::RunTask(spec) => {
                if let Err(err) = ctx.run_task_spec(spec) {
                    warn!(action = ctx.action_name(), error = %err, "task not started");
                }
            }
            BehaviorKind::EndAllTasks => ctx.end_all_tasks(),
            BehaviorKind::EndAction { cancelled } => {
                if *cancelled {
                    ctx.cancel_action();
                } else {
                    ctx.end_action();
                }
            }
            BehaviorKind::StoreTaskResult {
                event,
                source_key,
                destination_key,
            } => ctx.store_task_result(event.clone(), source_key, destination_key),
            BehaviorKind::StartCooldown => ctx.start_cooldown(),
            BehaviorKind::ApplyEffectToSelf(effect) => ctx.apply_effect_to_self(effect),
            BehaviorKind::ExecuteCue(cue) => ctx.execute_cue(cue),
            BehaviorKind::SpawnActionActor(class) => {
                ctx.spawn_actor(class);
            }
            BehaviorKind::CancelActionsWithTags(tags) => ctx.cancel_actions_with_tags(tags),
        }
    }
}
