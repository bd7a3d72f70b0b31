//! Read-only views of an actor's action state.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use action_core::{
    ActionSpecHandle, ActionSystemComponent, ActiveActionHandle, ActorId, GameplayTag, Lifecycle,
    NetRole,
};

use crate::sim::{BodyState, EffectRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveActionSnapshot {
    pub handle: ActiveActionHandle,
    pub spec: ActionSpecHandle,
    pub name: String,
    pub phase: Option<GameplayTag>,
    pub lifecycle: Lifecycle,
    pub started_at: Duration,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantedActionSnapshot {
    pub handle: ActionSpecHandle,
    pub name: String,
    pub level: u32,
    pub activation_count: u32,
}

/// State of one actor's action system at a point in simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub actor: ActorId,
    pub role: NetRole,
    pub time: Duration,
    pub granted: Vec<GrantedActionSnapshot>,
    pub active: Vec<ActiveActionSnapshot>,
    /// Owned tags with their stack counts.
    pub tags: Vec<(GameplayTag, u32)>,
    pub airborne: bool,
    pub height: f32,
    /// Effects, cues and spawned actors caused by this actor so far.
    pub effects: Vec<EffectRecord>,
}

impl ActorSnapshot {
    pub(crate) fn capture(
        actor: ActorId,
        component: &ActionSystemComponent,
        body: Option<BodyState>,
        effects: Vec<EffectRecord>,
    ) -> Self {
        let granted = component
            .specs()
            .map(|spec| GrantedActionSnapshot {
                handle: spec.handle,
                name: spec.name().to_string(),
                level: spec.level,
                activation_count: spec.activation_count,
            })
            .collect();
        let active = component
            .active_actions()
            .map(|entry| ActiveActionSnapshot {
                handle: entry.handle,
                spec: entry.spec,
                name: entry.instance.name().to_string(),
                phase: entry.current_phase().cloned(),
                lifecycle: entry.instance.lifecycle(),
                started_at: entry.started_at,
                tasks: entry
                    .instance
                    .task_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();
        let tags = component
            .owned_tags()
            .iter()
            .map(|(tag, count)| (tag.clone(), count))
            .collect();

        Self {
            actor,
            role: component.role(),
            time: component.now(),
            granted,
            active,
            tags,
            airborne: body.is_some_and(|b| b.is_airborne()),
            height: body.map(|b| b.location.z).unwrap_or_default(),
            effects,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|(owned, _)| owned.as_str() == tag)
    }

    pub fn active_named(&self, name: &str) -> Option<&ActiveActionSnapshot> {
        self.active.iter().find(|action| action.name == name)
    }
}
