use std::time::Duration;

use tracing::{debug, warn};

use super::{ActionTemplate, InstanceState, StoreRequest};
use crate::component::ActionSystemEvent;
use crate::config::ActionSystemConfig;
use crate::env::{ActionEnv, ActorInfo};
use crate::error::ActionError;
use crate::handle::{ActiveActionHandle, ActorId, TaskId};
use crate::net::NetRole;
use crate::payload::ContextPayload;
use crate::tag::{GameplayTag, TagContainer, TagCountContainer};
use crate::task::{ActionTask, TaskSpec, secs};
use crate::timer::{SystemTimer, TimerQueue};

/// Work an instance hands back to its owning component.
#[derive(Clone, Debug, PartialEq)]
pub enum SystemRequest {
    /// The instance reached `Ended`; release it.
    ActionEnded {
        handle: ActiveActionHandle,
        cancelled: bool,
    },
    /// Cancel active actions tagged with any of `with` and none of `without`.
    CancelActions {
        with: TagContainer,
        without: TagContainer,
        except: Option<ActiveActionHandle>,
    },
}

/// Component-owned state lent to an instance for one engine call.
pub struct SystemContext<'a> {
    pub now: Duration,
    pub role: NetRole,
    pub actor: ActorInfo,
    pub config: &'a ActionSystemConfig,
    pub env: &'a mut ActionEnv,
    pub timers: &'a mut TimerQueue<SystemTimer>,
    pub owned_tags: &'a mut TagCountContainer,
    pub outbox: &'a mut Vec<ActionSystemEvent>,
    pub requests: &'a mut Vec<SystemRequest>,
}

impl SystemContext<'_> {
    pub fn reborrow(&mut self) -> SystemContext<'_> {
        SystemContext {
            now: self.now,
            role: self.role,
            actor: self.actor,
            config: self.config,
            env: &mut *self.env,
            timers: &mut *self.timers,
            owned_tags: &mut *self.owned_tags,
            outbox: &mut *self.outbox,
            requests: &mut *self.requests,
        }
    }
}

/// API available to phase behaviors and action hooks.
pub struct PhaseContext<'a, 's> {
    pub(crate) state: &'a mut InstanceState,
    pub(crate) template: &'a ActionTemplate,
    pub(crate) sys: &'a mut SystemContext<'s>,
}

impl<'a, 's> PhaseContext<'a, 's> {
    pub(crate) fn new(
        state: &'a mut InstanceState,
        template: &'a ActionTemplate,
        sys: &'a mut SystemContext<'s>,
    ) -> Self {
        Self {
            state,
            template,
            sys,
        }
    }

    // ===== queries =====

    pub fn action_name(&self) -> &str {
        &self.state.name
    }

    pub fn template(&self) -> &ActionTemplate {
        self.template
    }

    pub fn phase(&self) -> Option<&GameplayTag> {
        self.state.current_phase.as_ref()
    }

    pub fn level(&self) -> u32 {
        self.state.level
    }

    pub fn now(&self) -> Duration {
        self.sys.now
    }

    pub fn role(&self) -> NetRole {
        self.sys.role
    }

    pub fn has_authority(&self) -> bool {
        self.sys.role.has_authority()
    }

    pub fn owner(&self) -> ActorId {
        self.sys.actor.owner
    }

    pub fn avatar(&self) -> Option<ActorId> {
        self.sys.actor.avatar
    }

    pub fn config(&self) -> &ActionSystemConfig {
        self.sys.config
    }

    pub fn env(&mut self) -> &mut ActionEnv {
        &mut *self.sys.env
    }

    pub fn owner_tags(&self) -> &TagCountContainer {
        &*self.sys.owned_tags
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.state.payload
    }

    pub fn payload_mut(&mut self) -> &mut ContextPayload {
        &mut self.state.payload
    }

    /// Value from the template's level table at the instance level.
    pub fn level_value(&self, key: &str) -> Option<f32> {
        self.template
            .definition()
            .level_table
            .as_ref()?
            .value(self.state.level, key)
    }

    /// Like [`Self::level_value`], but a missing value ends the action.
    pub fn require_level_value(&mut self, key: &str) -> Option<f32> {
        let value = self.level_value(key);
        if value.is_none() {
            warn!(action = %self.state.name, key, level = self.state.level, "level value missing");
            self.state.fail(ActionError::MissingLevelData {
                action: self.state.name.clone(),
                level: self.state.level,
            });
        }
        value
    }

    // ===== tasks =====

    pub fn run_task(&mut self, task: impl ActionTask + 'static) -> Result<TaskId, ActionError> {
        self.state.add_task(Box::new(task), self.sys)
    }

    pub fn run_task_spec(&mut self, spec: &TaskSpec) -> Result<TaskId, ActionError> {
        self.state.add_task(spec.instantiate(), self.sys)
    }

    pub fn end_task(&mut self, id: TaskId, cancelled: bool) -> bool {
        self.state.end_task(id, cancelled, self.sys)
    }

    pub fn end_all_tasks(&mut self) {
        self.state.end_all_tasks(true, self.sys);
    }

    pub fn task_count(&self) -> usize {
        self.state.tasks.iter().filter(|slot| slot.is_running()).count()
    }

    // ===== tags =====

    /// Adds one stack to the owner and records it for removal on end.
    pub fn add_tag(&mut self, tag: &GameplayTag) {
        if !tag.is_valid() {
            return;
        }
        self.sys.owned_tags.add_stack(tag, 1);
        self.state.granted_tags.add_stack(tag, 1);
    }

    pub fn add_tags(&mut self, tags: &TagContainer) {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    /// Removes one stack this instance granted. Other sources are untouched.
    pub fn remove_tag(&mut self, tag: &GameplayTag) {
        if self.state.granted_tags.count(tag) == 0 {
            return;
        }
        self.state.granted_tags.remove_stack(tag, 1);
        self.sys.owned_tags.remove_stack(tag, 1);
    }

    pub fn remove_tags(&mut self, tags: &TagContainer) {
        for tag in tags {
            self.remove_tag(tag);
        }
    }

    // ===== flow =====

    /// Asks for a transition to `phase`.
    ///
    /// Raised during a transition, the request is parked (latest wins) and
    /// applied when the running transition completes. Otherwise it is applied
    /// when the current engine call settles.
    pub fn request_phase(&mut self, phase: impl Into<GameplayTag>) {
        if !self.state.is_executing() {
            return;
        }
        let phase = phase.into();
        if let Some(previous) = self.state.pending_phase.replace(phase.clone()) {
            debug!(action = %self.state.name, %previous, next = %phase, "pending phase replaced");
        }
    }

    pub fn end_action(&mut self) {
        if self.state.is_executing() {
            self.state.end_request.get_or_insert(false);
        }
    }

    pub fn cancel_action(&mut self) {
        if self.state.is_executing() {
            self.state.end_request = Some(true);
        }
    }

    pub fn cancel_actions_with_tags(&mut self, tags: &TagContainer) {
        if tags.is_empty() {
            return;
        }
        self.sys.requests.push(SystemRequest::CancelActions {
            with: tags.clone(),
            without: TagContainer::new(),
            except: self.state.handle,
        });
    }

    /// Payload entry `source_key` of task event `event` is copied into the
    /// action payload as `destination_key`. Cleared when the phase exits.
    pub fn store_task_result(
        &mut self,
        event: GameplayTag,
        source_key: impl Into<String>,
        destination_key: impl Into<String>,
    ) {
        self.state.store_requests.push(StoreRequest {
            event,
            source_key: source_key.into(),
            destination_key: destination_key.into(),
        });
    }

    // ===== collaborators =====

    /// Adds the template's cooldown tag and schedules its removal.
    pub fn start_cooldown(&mut self) {
        let Some(cooldown) = self.template.definition().cooldown.as_ref() else {
            return;
        };
        self.sys.owned_tags.add_stack(&cooldown.tag, 1);
        let due = self.sys.now.saturating_add(secs(cooldown.duration));
        self.sys.timers.schedule(
            due,
            SystemTimer::Cooldown {
                tag: cooldown.tag.clone(),
            },
        );
        debug!(action = %self.state.name, tag = %cooldown.tag, duration = cooldown.duration, "cooldown started");
    }

    pub fn apply_effect_to_self(&mut self, effect: &GameplayTag) {
        let owner = self.sys.actor.owner;
        let level = self.state.level;
        self.sys.env.effects.apply_effect_to_self(owner, effect, level);
    }

    pub fn execute_cue(&mut self, cue: &GameplayTag) {
        let owner = self.sys.actor.owner;
        self.sys.env.effects.execute_cue(owner, cue);
    }

    /// Spawns an actor destroyed when the action ends.
    pub fn spawn_actor(&mut self, class: &str) -> Option<ActorId> {
        let owner = self.sys.actor.owner;
        let spawned = self.sys.env.effects.spawn_actor(owner, class);
        match spawned {
            Some(actor) => self.state.spawned_actors.push(actor),
            None => warn!(action = %self.state.name, class, "action actor not spawned"),
        }
        spawned
    }
}
