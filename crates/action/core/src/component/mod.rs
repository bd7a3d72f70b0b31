//! Action system component: the per-actor registry of granted and active
//! actions.
//!
//! The component owns everything an instance borrows during an engine call
//! (clock, timer queue, owner tags, collaborators, outbox) and lends it out
//! as a [`SystemContext`]. Instances report back through [`SystemRequest`]s
//! that are drained after every call.

mod activation;
mod events;
mod spec;

pub use events::{ActionSystemEvent, ReplicationMessage};
pub use spec::{ActionSpec, ActiveAction};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::action::{
    ActionInstance, ActionTemplate, ActivationPolicy, InstancingPolicy, SystemContext,
    SystemRequest,
};
use crate::config::ActionSystemConfig;
use crate::env::{ActionEnv, ActorInfo, AnimationEvent};
use crate::handle::{ActionSpecHandle, ActiveActionHandle, ActorId, PredictionKey};
use crate::net::NetRole;
use crate::payload::ContextPayload;
use crate::phase::PhaseInfo;
use crate::rule::TransitionOutcome;
use crate::tag::{GameplayTag, TagContainer, TagCountContainer, names};
use crate::timer::{SystemTimer, TimerQueue};

/// Per-actor owner of granted specs and active instances.
pub struct ActionSystemComponent {
    actor: ActorInfo,
    role: NetRole,
    config: ActionSystemConfig,
    env: ActionEnv,
    now: Duration,
    timers: TimerQueue<SystemTimer>,
    owned_tags: TagCountContainer,
    specs: Vec<ActionSpec>,
    active: Vec<ActiveAction>,
    /// Predicted activations awaiting the authority's verdict.
    pending_predictions: BTreeMap<PredictionKey, ActionSpecHandle>,
    outbox: Vec<ActionSystemEvent>,
    requests: Vec<SystemRequest>,
    next_spec: ActionSpecHandle,
    next_active: ActiveActionHandle,
    next_prediction: PredictionKey,
}

impl ActionSystemComponent {
    pub fn new(actor: ActorInfo, role: NetRole, config: ActionSystemConfig) -> Self {
        Self {
            actor,
            role,
            config,
            env: ActionEnv::default(),
            now: Duration::ZERO,
            timers: TimerQueue::new(),
            owned_tags: TagCountContainer::new(),
            specs: Vec::new(),
            active: Vec::new(),
            pending_predictions: BTreeMap::new(),
            outbox: Vec::new(),
            requests: Vec::new(),
            next_spec: ActionSpecHandle::new(1),
            next_active: ActiveActionHandle::new(1),
            next_prediction: PredictionKey::new(1),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: ActionEnv) -> Self {
        self.env = env;
        self
    }

    // ===== queries =====

    pub fn actor(&self) -> ActorInfo {
        self.actor
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn config(&self) -> &ActionSystemConfig {
        &self.config
    }

    pub fn env_mut(&mut self) -> &mut ActionEnv {
        &mut self.env
    }

    pub fn owned_tags(&self) -> &TagCountContainer {
        &self.owned_tags
    }

    pub fn has_tag(&self, tag: &GameplayTag) -> bool {
        self.owned_tags.has_matching_tag(tag)
    }

    pub fn spec(&self, handle: ActionSpecHandle) -> Option<&ActionSpec> {
        self.specs.iter().find(|spec| spec.handle == handle)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ActionSpec> + '_ {
        self.specs.iter()
    }

    pub fn find_spec(&self, name: &str) -> Option<ActionSpecHandle> {
        self.specs
            .iter()
            .find(|spec| spec.name() == name)
            .map(|spec| spec.handle)
    }

    pub fn active_actions(&self) -> impl Iterator<Item = &ActiveAction> + '_ {
        self.active.iter()
    }

    pub fn active(&self, handle: ActiveActionHandle) -> Option<&ActiveAction> {
        self.active.iter().find(|entry| entry.handle == handle)
    }

    /// Most recent activation of `spec` still owned by the component.
    pub fn active_for_spec(&self, spec: ActionSpecHandle) -> Option<&ActiveAction> {
        self.active.iter().rev().find(|entry| entry.spec == spec)
    }

    pub fn is_active(&self, spec: ActionSpecHandle) -> bool {
        self.active_for_spec(spec).is_some()
    }

    pub fn current_phase(&self, handle: ActiveActionHandle) -> Option<&GameplayTag> {
        self.active(handle)?.current_phase()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_predictions(&self) -> usize {
        self.pending_predictions.len()
    }

    /// Takes the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<ActionSystemEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ===== loose tags =====

    /// Tag stack owned by the host rather than by an action.
    pub fn add_loose_tag(&mut self, tag: impl Into<GameplayTag>) {
        let tag = tag.into();
        if tag.is_valid() {
            self.owned_tags.add_stack(&tag, 1);
        }
    }

    pub fn remove_loose_tag(&mut self, tag: &GameplayTag) {
        self.owned_tags.remove_stack(tag, 1);
    }

    // ===== grants =====

    /// Grants `template` at `level`. InstancedPerActor templates granted
    /// twice return the existing spec.
    pub fn grant_action(
        &mut self,
        template: Arc<ActionTemplate>,
        level: u32,
        input_tag: Option<GameplayTag>,
    ) -> ActionSpecHandle {
        if template.definition().instancing_policy == InstancingPolicy::InstancedPerActor {
            if let Some(existing) = self
                .specs
                .iter()
                .find(|spec| Arc::ptr_eq(&spec.template, &template))
            {
                debug!(action = %template.name(), spec = %existing.handle, "already granted");
                return existing.handle;
            }
        }
        for issue in template.validate() {
            warn!(action = %template.name(), %issue, "phase table issue");
        }

        let handle = self.next_spec.bump();
        let policy = template.definition().activation_policy;
        info!(action = %template.name(), spec = %handle, level, "action granted");
        self.specs
            .push(ActionSpec::new(handle, template, level, input_tag));

        if matches!(
            policy,
            ActivationPolicy::OnGrant | ActivationPolicy::OnGrantAndRemove
        ) {
            // Failure is reported through the outbox.
            let _ = self.try_execute_action(handle, None);
        }
        handle
    }

    /// Cancels the spec's running activations, then removes it.
    pub fn remove_action(&mut self, spec: ActionSpecHandle) -> bool {
        let running: Vec<ActiveActionHandle> = self
            .active
            .iter()
            .filter(|entry| entry.spec == spec)
            .map(|entry| entry.handle)
            .collect();
        for handle in running {
            self.cancel_action(handle);
        }
        let before = self.specs.len();
        self.specs.retain(|entry| entry.handle != spec);
        self.pending_predictions.retain(|_, pending| *pending != spec);
        let removed = before != self.specs.len();
        if removed {
            info!(spec = %spec, "action removed");
        }
        removed
    }

    pub fn remove_all_actions(&mut self) {
        let handles: Vec<ActionSpecHandle> = self.specs.iter().map(|spec| spec.handle).collect();
        for handle in handles {
            self.remove_action(handle);
        }
    }

    // ===== ending =====

    pub fn end_action(&mut self, handle: ActiveActionHandle) {
        self.with_instance(handle, |instance, sys| instance.end_action(false, sys));
        self.process_requests();
    }

    pub fn cancel_action(&mut self, handle: ActiveActionHandle) {
        self.with_instance(handle, |instance, sys| instance.end_action(true, sys));
        self.process_requests();
    }

    /// Cancels active actions tagged with any of `with` and none of
    /// `without`. An empty `with` cancels nothing.
    pub fn cancel_actions(&mut self, with: &TagContainer, without: &TagContainer) -> usize {
        self.requests.push(SystemRequest::CancelActions {
            with: with.clone(),
            without: without.clone(),
            except: None,
        });
        let before = self.active.len();
        self.process_requests();
        before.saturating_sub(self.active.len())
    }

    pub fn request_phase(
        &mut self,
        handle: ActiveActionHandle,
        phase: impl Into<GameplayTag>,
    ) -> TransitionOutcome {
        let phase = phase.into();
        let outcome = self
            .with_instance(handle, |instance, sys| instance.request_phase(phase, sys))
            .unwrap_or(TransitionOutcome::Ignored);
        self.process_requests();
        outcome
    }

    // ===== signals =====

    /// Delivers a gameplay event to every active action, then activates
    /// specs triggered by it.
    pub fn handle_gameplay_event(&mut self, tag: &GameplayTag, payload: &ContextPayload) {
        trace!(event = %tag, "gameplay event");
        for handle in self.active_handles() {
            self.with_instance(handle, |instance, sys| {
                instance.handle_gameplay_event(tag, payload, sys)
            });
            self.process_requests();
        }

        let triggered: Vec<ActionSpecHandle> = self
            .specs
            .iter()
            .filter(|spec| {
                spec.template
                    .definition()
                    .event_trigger_tags
                    .has_tag_exact(tag)
            })
            .map(|spec| spec.handle)
            .collect();
        for spec in triggered {
            debug!(spec = %spec, event = %tag, "event triggers activation");
            let _ = self.try_execute_action(spec, Some(payload.clone()));
        }
    }

    pub fn handle_animation_event(&mut self, event: &AnimationEvent) {
        for handle in self.active_handles() {
            self.with_instance(handle, |instance, sys| {
                instance.handle_animation_event(event, sys)
            });
            self.process_requests();
        }
    }

    /// Posts a task event to one active action, as if a task had raised it.
    pub fn post_task_event(
        &mut self,
        handle: ActiveActionHandle,
        tag: impl Into<GameplayTag>,
        payload: ContextPayload,
    ) {
        let tag = tag.into();
        self.with_instance(handle, |instance, sys| instance.post_event(tag, payload, sys));
        self.process_requests();
    }

    pub fn input_pressed(&mut self, input: &GameplayTag) {
        self.route_input(input, true);
        let bound = self.bound_specs(input, true);
        for spec in bound {
            let running = self.spec_active_handles(spec);
            if running.is_empty() {
                let policy = self
                    .spec(spec)
                    .map(|s| s.template.definition().activation_policy);
                if matches!(
                    policy,
                    Some(ActivationPolicy::OnInputTriggered | ActivationPolicy::WhileInputActive)
                ) {
                    let _ = self.try_execute_action(spec, None);
                }
                continue;
            }
            for handle in running {
                self.post_task_event(
                    handle,
                    names::task_event::INPUT_PRESSED,
                    ContextPayload::new(),
                );
            }
        }
    }

    pub fn input_released(&mut self, input: &GameplayTag) {
        self.route_input(input, false);
        let bound = self.bound_specs(input, false);
        for spec in bound {
            let cancel_on_release = self.spec(spec).is_some_and(|s| {
                s.template.definition().activation_policy == ActivationPolicy::WhileInputActive
            });
            for handle in self.spec_active_handles(spec) {
                self.post_task_event(
                    handle,
                    names::task_event::INPUT_RELEASED,
                    ContextPayload::new(),
                );
                if cancel_on_release {
                    self.cancel_action(handle);
                }
            }
        }
    }

    /// Hands an input edge to the tasks of every active action.
    fn route_input(&mut self, input: &GameplayTag, pressed: bool) {
        for handle in self.active_handles() {
            self.with_instance(handle, |instance, sys| {
                instance.handle_input(input, pressed, sys)
            });
            self.process_requests();
        }
    }

    /// Records the avatar and activates OnSpawn specs.
    pub fn on_avatar_spawned(&mut self, avatar: ActorId) {
        self.actor.avatar = Some(avatar);
        info!(owner = %self.actor.owner, %avatar, "avatar spawned");
        let on_spawn: Vec<ActionSpecHandle> = self
            .specs
            .iter()
            .filter(|spec| {
                spec.template.definition().activation_policy == ActivationPolicy::OnSpawn
            })
            .map(|spec| spec.handle)
            .collect();
        for spec in on_spawn {
            let _ = self.try_execute_action(spec, None);
        }
    }

    // ===== time =====

    /// Advances the simulated clock by `dt`, firing due timers in order with
    /// the clock set to each due time.
    pub fn advance(&mut self, dt: Duration) {
        let target = self.now.saturating_add(dt);
        while let Some((due, timer)) = self.timers.pop_due(target) {
            self.now = due;
            self.fire_timer(timer);
        }
        self.now = target;
    }

    pub fn advance_secs(&mut self, dt: f32) {
        self.advance(crate::task::secs(dt));
    }

    fn fire_timer(&mut self, timer: SystemTimer) {
        match timer {
            SystemTimer::PhaseDuration {
                action,
                serial,
                rule,
            } => {
                self.with_instance(action, |instance, sys| {
                    instance.on_phase_timer(serial, rule, sys)
                });
            }
            SystemTimer::Task { action, task } => {
                self.with_instance(action, |instance, sys| instance.on_task_timer(task, sys));
            }
            SystemTimer::Cooldown { tag } => {
                self.owned_tags.remove_stack(&tag, 1);
                debug!(%tag, "cooldown expired");
            }
        }
        self.process_requests();
    }

    // ===== replication =====

    /// Applies the authority's phase to the active action of `spec`.
    pub fn apply_replicated_phase(&mut self, spec: ActionSpecHandle, info: &PhaseInfo) -> bool {
        let Some(handle) = self.active_for_spec(spec).map(|entry| entry.handle) else {
            trace!(spec = %spec, "replicated phase for inactive spec");
            return false;
        };
        let applied = self
            .with_instance(handle, |instance, sys| instance.apply_replicated_phase(info, sys))
            .unwrap_or(false);
        self.process_requests();
        applied
    }

    /// Evaluates a task event forwarded by a client.
    pub fn receive_task_event(
        &mut self,
        spec: ActionSpecHandle,
        tag: &GameplayTag,
        payload: &ContextPayload,
    ) -> TransitionOutcome {
        let Some(handle) = self.active_for_spec(spec).map(|entry| entry.handle) else {
            debug!(spec = %spec, event = %tag, "forwarded task event for inactive spec");
            return TransitionOutcome::Ignored;
        };
        let outcome = self
            .with_instance(handle, |instance, sys| {
                instance.receive_task_event(tag, payload, sys)
            })
            .unwrap_or(TransitionOutcome::Ignored);
        self.process_requests();
        outcome
    }

    /// Routes an inbound replication message.
    pub fn handle_replication(&mut self, message: ReplicationMessage) {
        match message {
            ReplicationMessage::ExecuteRequest {
                spec,
                prediction,
                payload,
            } => self.handle_execute_request(spec, prediction, payload),
            ReplicationMessage::TaskEvent { spec, tag, payload } => {
                self.receive_task_event(spec, &tag, &payload);
            }
            ReplicationMessage::PhaseInfo { spec, info } => {
                self.apply_replicated_phase(spec, &info);
            }
            ReplicationMessage::PredictionResult { key, accepted, .. } => {
                if accepted {
                    self.confirm_prediction(key);
                } else {
                    self.reject_prediction(key);
                }
            }
        }
    }

    // ===== internals =====

    fn active_handles(&self) -> Vec<ActiveActionHandle> {
        self.active.iter().map(|entry| entry.handle).collect()
    }

    fn spec_active_handles(&self, spec: ActionSpecHandle) -> Vec<ActiveActionHandle> {
        self.active
            .iter()
            .filter(|entry| entry.spec == spec)
            .map(|entry| entry.handle)
            .collect()
    }

    fn bound_specs(&mut self, input: &GameplayTag, held: bool) -> Vec<ActionSpecHandle> {
        self.specs
            .iter_mut()
            .filter(|spec| spec.input_tag.as_ref() == Some(input))
            .map(|spec| {
                spec.input_held = held;
                spec.handle
            })
            .collect()
    }

    /// Lends the component state to one active instance.
    fn with_instance<R>(
        &mut self,
        handle: ActiveActionHandle,
        f: impl FnOnce(&mut ActionInstance, &mut SystemContext<'_>) -> R,
    ) -> Option<R> {
        let Self {
            actor,
            role,
            config,
            env,
            now,
            timers,
            owned_tags,
            active,
            outbox,
            requests,
            ..
        } = self;
        let entry = active.iter_mut().find(|entry| entry.handle == handle)?;
        let mut sys = SystemContext {
            now: *now,
            role: *role,
            actor: *actor,
            config,
            env,
            timers,
            owned_tags,
            outbox,
            requests,
        };
        Some(f(&mut entry.instance, &mut sys))
    }

    /// Drains what instances asked of the component.
    fn process_requests(&mut self) {
        for _ in 0..ActionSystemConfig::MAX_REQUEST_ROUNDS {
            if self.requests.is_empty() {
                return;
            }
            for request in std::mem::take(&mut self.requests) {
                match request {
                    SystemRequest::ActionEnded { handle, cancelled } => {
                        self.finish_action(handle, cancelled);
                    }
                    SystemRequest::CancelActions {
                        with,
                        without,
                        except,
                    } => {
                        if with.is_empty() {
                            continue;
                        }
                        let targets: Vec<ActiveActionHandle> = self
                            .active
                            .iter()
                            .filter(|entry| Some(entry.handle) != except)
                            .filter(|entry| entry.instance.is_executing())
                            .filter(|entry| {
                                let tags = self
                                    .spec(entry.spec)
                                    .map(ActionSpec::tags)
                                    .unwrap_or_else(|| {
                                        entry.instance.template().definition().action_tags.clone()
                                    });
                                tags.has_any(&with) && !tags.has_any(&without)
                            })
                            .map(|entry| entry.handle)
                            .collect();
                        for handle in targets {
                            debug!(action = %handle, tags = %with, "cancelled by tag");
                            self.with_instance(handle, |instance, sys| {
                                instance.end_action(true, sys)
                            });
                        }
                    }
                }
            }
        }
        error!(
            pending = self.requests.len(),
            "request processing did not settle, dropping requests"
        );
        self.requests.clear();
    }

    /// Releases an ended activation.
    fn finish_action(&mut self, handle: ActiveActionHandle, cancelled: bool) {
        let Some(index) = self.active.iter().position(|entry| entry.handle == handle) else {
            return;
        };
        let entry = self.active.remove(index);
        self.timers
            .retain(|timer| timer.action() != Some(handle));
        if let Some(key) = entry.prediction {
            self.pending_predictions.remove(&key);
        }

        let identifier = &entry.instance.template().definition().identifier_tag;
        if identifier.is_valid() {
            self.owned_tags.remove_stack(identifier, 1);
        }

        let Some(spec_index) = self.specs.iter().position(|spec| spec.handle == entry.spec) else {
            return;
        };
        let spec = &mut self.specs[spec_index];
        debug!(
            action = %spec.name(),
            %handle,
            cancelled,
            activations = spec.activation_count,
            "activation released"
        );
        spec.return_instance(entry.instance);
        if spec.template.definition().activation_policy == ActivationPolicy::OnGrantAndRemove {
            info!(action = %spec.name(), spec = %spec.handle, "removing spec after activation");
            self.specs.remove(spec_index);
        }
    }
}

impl std::fmt::Debug for ActionSystemComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSystemComponent")
            .field("actor", &self.actor)
            .field("role", &self.role)
            .field("now", &self.now)
            .field("specs", &self.specs.len())
            .field("active", &self.active)
            .field("owned_tags", &self.owned_tags)
            .finish()
    }
}
