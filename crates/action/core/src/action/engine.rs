//! Phase transition engine.
//!
//! Every public entry point follows the same shape: mutate the instance,
//! then [`ActionInstance::settle`] drains what callbacks asked for (end
//! request, parked phase, queued task events) until nothing is left. All of
//! it runs synchronously on the caller's thread.

use std::sync::Arc;

use arrayvec::ArrayVec;
use tracing::{debug, error, info, trace, warn};

use super::{ActionInstance, InstancingPolicy, PhaseContext, SystemContext, SystemRequest};
use crate::component::{ActionSystemEvent, ReplicationMessage};
use crate::condition::{ConditionContext, check_all};
use crate::config::ActionSystemConfig;
use crate::env::AnimationEvent;
use crate::error::ActionError;
use crate::handle::{ActionSpecHandle, ActiveActionHandle, TaskId};
use crate::net::NetRole;
use crate::payload::{ContextPayload, PayloadValue, keys};
use crate::phase::PhaseInfo;
use crate::rule::{TransitionOutcome, TransitionSignal, TransitionTrigger, first_match};
use crate::tag::{GameplayTag, names};
use crate::task::{Lifecycle, secs};
use crate::timer::SystemTimer;

type PhaseChain = ArrayVec<GameplayTag, { ActionSystemConfig::MAX_PHASE_CHAIN }>;

impl ActionInstance {
    /// Starts an activation and enters the initial phase.
    ///
    /// Failures after this point (missing level data, undefined phase,
    /// missing avatar) end the action instead of returning an error.
    pub fn execute(
        &mut self,
        handle: ActiveActionHandle,
        spec: ActionSpecHandle,
        level: u32,
        trigger: Option<&ContextPayload>,
        sys: &mut SystemContext<'_>,
    ) -> Result<(), ActionError> {
        if matches!(self.state.lifecycle, Lifecycle::Executing | Lifecycle::Ending) {
            return Err(ActionError::AlreadyExecuting {
                action: self.state.name.clone(),
            });
        }
        let initial = self.template.initial_phase();
        if !self.template.has_phase(initial) {
            return Err(ActionError::UndefinedPhase {
                action: self.state.name.clone(),
                phase: initial.clone(),
            });
        }

        let state = &mut self.state;
        state.reset();
        state.lifecycle = Lifecycle::Executing;
        state.handle = Some(handle);
        state.spec = spec;
        state.level = level;
        state.activation_count += 1;
        state
            .payload
            .set(keys::ACTION_SPEC, PayloadValue::Spec { handle: spec, level });
        if let Some(trigger) = trigger {
            for (key, value) in trigger.iter() {
                state.payload.set(key, value.clone());
            }
        }
        info!(action = %state.name, %handle, level, "action activated");

        let template = Arc::clone(&self.template);
        let missing_row = template
            .definition()
            .level_table
            .as_ref()
            .is_some_and(|table| table.row(level).is_none());
        if missing_row {
            self.state.fail(ActionError::MissingLevelData {
                action: self.state.name.clone(),
                level,
            });
            self.settle(sys);
            return Ok(());
        }

        {
            let mut ctx = PhaseContext::new(&mut self.state, &template, sys);
            self.hooks.on_activate(&mut ctx);
            if template.definition().apply_cooldown_on_start {
                ctx.start_cooldown();
            }
        }
        if self.state.end_request.is_none() {
            self.run_phase_chain(template.initial_phase().clone(), false, sys);
        }
        self.settle(sys);

        if self.state.instancing == InstancingPolicy::NonInstanced && self.state.is_executing() {
            self.end_action(false, sys);
        }
        Ok(())
    }

    /// Enters `first`, then follows parked requests and Immediate rules
    /// until the chain settles. Returns the last phase entered.
    pub(crate) fn run_phase_chain(
        &mut self,
        first: GameplayTag,
        force: bool,
        sys: &mut SystemContext<'_>,
    ) -> Option<GameplayTag> {
        let mut chain = PhaseChain::new();
        let mut next = Some((first, force));
        let mut last = None;

        while let Some((target, force)) = next.take() {
            if !self.state.is_executing() || self.state.end_request.is_some() {
                break;
            }
            if !force && self.state.current_phase.as_ref() == Some(&target) {
                trace!(action = %self.state.name, phase = %target, "already in phase");
                next = self.state.pending_phase.take().map(|p| (p, false));
                continue;
            }
            if chain.contains(&target) {
                self.state.fail(ActionError::PhaseCycle {
                    action: self.state.name.clone(),
                    phase: target,
                });
                break;
            }
            if chain.try_push(target.clone()).is_err() {
                self.state.fail(ActionError::PhaseChainTooDeep {
                    action: self.state.name.clone(),
                    limit: ActionSystemConfig::MAX_PHASE_CHAIN,
                });
                break;
            }

            self.enter_phase(target.clone(), sys);
            last = Some(target);

            if self.state.end_request.is_some() {
                break;
            }
            next = match self.state.pending_phase.take() {
                Some(pending) => Some((pending, false)),
                None => self.immediate_target(sys).map(|p| (p, false)),
            };
        }

        if last.is_some() && self.state.is_executing() && self.state.end_request.is_none() {
            self.arm_duration_rules(sys);
        }
        last
    }

    fn enter_phase(&mut self, target: GameplayTag, sys: &mut SystemContext<'_>) {
        let template = Arc::clone(&self.template);
        if !template.has_phase(&target) {
            self.state.fail(ActionError::UndefinedPhase {
                action: self.state.name.clone(),
                phase: target,
            });
            return;
        }
        if sys.actor.avatar.is_none() {
            self.state.fail(ActionError::MissingAvatar {
                action: self.state.name.clone(),
            });
            return;
        }

        self.state.transitioning = true;
        let counter = if sys.role.has_authority() {
            let counter = self.state.replicated_phase.counter + 1;
            self.state.replicated_phase = PhaseInfo {
                phase: target.clone(),
                counter,
            };
            self.state.local_phase_counter = counter;
            counter
        } else {
            self.state.local_phase_counter += 1;
            self.state.local_phase_counter
        };

        let from = self.state.current_phase.clone();
        if let Some(previous) = &from {
            self.exit_phase(previous, sys);
        }
        self.state.current_phase = Some(target.clone());
        self.state.phase_serial += 1;

        let data = template.phase(&target);
        self.state.interrupt_on_movement =
            data.is_some_and(|d| d.can_animation_be_interrupted_by_movement);
        debug!(
            action = %self.state.name,
            from = ?from.as_ref().map(GameplayTag::as_str),
            to = %target,
            counter,
            "entering phase"
        );

        {
            let mut ctx = PhaseContext::new(&mut self.state, &template, sys);
            if let Some(data) = data {
                for behavior in &data.on_enter {
                    behavior.execute(&mut ctx);
                }
                ctx.cancel_actions_with_tags(&data.cancel_actions_with_tag);
            }
            self.hooks.on_phase_enter(&target, &mut ctx);
        }
        self.state.transitioning = false;

        if let Some(action) = self.state.handle {
            sys.outbox.push(ActionSystemEvent::PhaseChanged {
                action,
                spec: self.state.spec,
                name: self.state.name.clone(),
                from,
                to: target.clone(),
                info: PhaseInfo {
                    phase: target,
                    counter,
                },
                at: sys.now,
            });
        }
    }

    fn exit_phase(&mut self, phase: &GameplayTag, sys: &mut SystemContext<'_>) {
        for timer in self.state.phase_timers.drain(..) {
            if sys.timers.cancel(timer).is_some() {
                trace!(action = %self.state.name, %phase, due = ?timer.due(), "duration timer disarmed");
            }
        }
        self.state.end_phase_scoped_tasks(sys);

        let template = Arc::clone(&self.template);
        {
            let mut ctx = PhaseContext::new(&mut self.state, &template, sys);
            if let Some(data) = template.phase(phase) {
                for behavior in &data.on_exit {
                    behavior.execute(&mut ctx);
                }
            }
            self.hooks.on_phase_exit(phase, &mut ctx);
        }
        self.state.store_requests.clear();
        self.state.interrupt_on_movement = false;
        debug!(action = %self.state.name, %phase, "exited phase");
    }

    /// Target of the first Immediate rule of the current phase whose
    /// conditions pass.
    fn immediate_target(&self, sys: &SystemContext<'_>) -> Option<GameplayTag> {
        let phase = self.state.current_phase.as_ref()?;
        let empty = ContextPayload::new();
        let ctx = ConditionContext {
            payload: &empty,
            owner_tags: &*sys.owned_tags,
            phase,
            action_name: &self.state.name,
        };
        self.template
            .rules_for(phase)
            .find(|rule| {
                rule.trigger == TransitionTrigger::Immediate
                    && rule.is_usable()
                    && check_all(&rule.conditions, &ctx)
            })
            .map(|rule| rule.next_phase.clone())
    }

    fn arm_duration_rules(&mut self, sys: &mut SystemContext<'_>) {
        let (Some(action), Some(phase)) = (self.state.handle, self.state.current_phase.clone())
        else {
            return;
        };
        let serial = self.state.phase_serial;
        let template = Arc::clone(&self.template);
        for (index, rule) in template.rules_for(&phase).enumerate() {
            if rule.trigger != TransitionTrigger::OnDurationEnd || !rule.is_usable() {
                continue;
            }
            let due = sys.now.saturating_add(secs(rule.duration));
            let timer = sys.timers.schedule(
                due,
                SystemTimer::PhaseDuration {
                    action,
                    serial,
                    rule: index,
                },
            );
            self.state.phase_timers.push(timer);
            debug!(
                action = %self.state.name,
                %phase,
                duration = rule.duration,
                next = %rule.next_phase,
                "duration rule armed"
            );
        }
    }

    /// Offers `signal` to the current phase's rules; the first accepting
    /// rule wins. Unmatched signals are dropped.
    pub(crate) fn evaluate_transition(
        &mut self,
        signal: TransitionSignal<'_>,
        sys: &mut SystemContext<'_>,
    ) -> TransitionOutcome {
        if !self.state.is_executing() || self.state.end_request.is_some() {
            return TransitionOutcome::Ignored;
        }
        if self.state.transitioning {
            warn!(action = %self.state.name, trigger = %signal.trigger(), "signal raised during transition");
            return TransitionOutcome::Ignored;
        }
        let Some(phase) = self.state.current_phase.clone() else {
            return TransitionOutcome::Ignored;
        };

        let empty = ContextPayload::new();
        let matched = {
            let ctx = ConditionContext {
                payload: signal.payload().unwrap_or(&empty),
                owner_tags: &*sys.owned_tags,
                phase: &phase,
                action_name: &self.state.name,
            };
            first_match(self.template.rules_for(&phase), &signal, &ctx)
                .map(|(index, rule)| (index, rule.next_phase.clone()))
        };
        let Some((index, target)) = matched else {
            trace!(action = %self.state.name, %phase, trigger = %signal.trigger(), "signal unmatched");
            return TransitionOutcome::Unmatched;
        };

        debug!(
            action = %self.state.name,
            rule = index,
            trigger = %signal.trigger(),
            from = %phase,
            to = %target,
            "transition rule fired"
        );
        match self.run_phase_chain(target, false, sys) {
            Some(to) => TransitionOutcome::Transitioned { from: phase, to },
            None => TransitionOutcome::Ignored,
        }
    }

    /// Drains end requests, parked phases and queued task events.
    pub(crate) fn settle(&mut self, sys: &mut SystemContext<'_>) {
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            if rounds > ActionSystemConfig::MAX_SETTLE_ROUNDS {
                error!(action = %self.state.name, rounds, "action did not settle, cancelling");
                self.state.queued_events.clear();
                self.state.pending_phase = None;
                self.state.transitioning = false;
                self.end_action(true, sys);
                break;
            }
            if !self.state.is_executing() {
                self.state.queued_events.clear();
                self.state.pending_phase = None;
                break;
            }
            if let Some(cancelled) = self.state.end_request.take() {
                self.end_action(cancelled, sys);
                continue;
            }
            if let Some(phase) = self.state.pending_phase.take() {
                self.run_phase_chain(phase, false, sys);
                continue;
            }
            if let Some((tag, payload)) = self.state.queued_events.pop_front() {
                self.process_task_event(tag, payload, sys);
                continue;
            }
            break;
        }
    }

    fn process_task_event(
        &mut self,
        tag: GameplayTag,
        payload: ContextPayload,
        sys: &mut SystemContext<'_>,
    ) {
        let replicated = self
            .template
            .definition()
            .replicated_event_tags
            .has_tag_exact(&tag);
        if sys.role == NetRole::AutonomousProxy && replicated {
            debug!(action = %self.state.name, event = %tag, "task event forwarded to server");
            sys.outbox
                .push(ActionSystemEvent::Replication(ReplicationMessage::TaskEvent {
                    spec: self.state.spec,
                    tag,
                    payload,
                }));
            return;
        }
        self.apply_store_requests(&tag, &payload);
        self.evaluate_transition(
            TransitionSignal::TaskEvent {
                tag: &tag,
                payload: &payload,
            },
            sys,
        );
    }

    fn apply_store_requests(&mut self, tag: &GameplayTag, payload: &ContextPayload) {
        let state = &mut self.state;
        for request in state.store_requests.iter().filter(|r| &r.event == tag) {
            match payload.get(&request.source_key) {
                Some(value) => state
                    .payload
                    .set(request.destination_key.clone(), value.clone()),
                None => debug!(
                    action = %state.name,
                    key = %request.source_key,
                    "task result missing from event payload"
                ),
            }
        }
    }

    // ===== signals =====

    /// A duration timer armed under `serial` fired.
    pub fn on_phase_timer(
        &mut self,
        serial: u64,
        rule: usize,
        sys: &mut SystemContext<'_>,
    ) -> TransitionOutcome {
        if !self.state.is_executing() || serial != self.state.phase_serial {
            trace!(action = %self.state.name, serial, "stale duration timer");
            return TransitionOutcome::Ignored;
        }
        self.state.phase_timers.retain(|timer| sys.timers.is_pending(*timer));
        let outcome =
            self.evaluate_transition(TransitionSignal::DurationElapsed { rule_index: rule }, sys);
        self.settle(sys);
        outcome
    }

    pub fn on_task_timer(&mut self, task: TaskId, sys: &mut SystemContext<'_>) {
        if let Some(slot) = self.state.tasks.iter_mut().find(|slot| slot.id == task) {
            slot.timer = None;
        }
        self.state.call_task(task, sys, |t, ctx| t.on_timer(ctx));
        self.settle(sys);
    }

    /// Delivers a gameplay-wide event: movement interruption first, then
    /// every running task, then the phase's OnGameplayEvent rules.
    pub fn handle_gameplay_event(
        &mut self,
        tag: &GameplayTag,
        payload: &ContextPayload,
        sys: &mut SystemContext<'_>,
    ) -> TransitionOutcome {
        if !self.state.is_executing() {
            return TransitionOutcome::Ignored;
        }

        let movement = GameplayTag::new(names::event::MOVEMENT_STARTED);
        if self.state.interrupt_on_movement && tag.matches_tag(&movement) {
            let target = self
                .state
                .tasks
                .iter()
                .find(|slot| slot.is_running() && slot.interruptible)
                .map(|slot| slot.id);
            if let Some(id) = target {
                debug!(action = %self.state.name, task = %id, "movement interrupts animation");
                self.state.call_task(id, sys, |task, ctx| task.on_interrupt(ctx));
            }
        }

        for id in self.state.running_task_ids() {
            self.state
                .call_task(id, sys, |task, ctx| task.on_gameplay_event(tag, payload, ctx));
        }
        let outcome =
            self.evaluate_transition(TransitionSignal::GameplayEvent { tag, payload }, sys);
        self.settle(sys);
        outcome
    }

    pub fn handle_animation_event(&mut self, event: &AnimationEvent, sys: &mut SystemContext<'_>) {
        if !self.state.is_executing() {
            return;
        }
        for id in self.state.running_task_ids() {
            self.state
                .call_task(id, sys, |task, ctx| task.on_animation_event(event, ctx));
        }
        self.settle(sys);
    }

    /// Offers a local input edge to the running tasks.
    pub fn handle_input(&mut self, input: &GameplayTag, pressed: bool, sys: &mut SystemContext<'_>) {
        if !self.state.is_executing() {
            return;
        }
        for id in self.state.running_task_ids() {
            self.state
                .call_task(id, sys, |task, ctx| task.on_input(input, pressed, ctx));
        }
        self.settle(sys);
    }

    /// Posts a task event from outside any task (input, host code).
    pub fn post_event(
        &mut self,
        tag: GameplayTag,
        payload: ContextPayload,
        sys: &mut SystemContext<'_>,
    ) {
        self.state.post_task_event(tag, payload);
        self.settle(sys);
    }

    /// Evaluates a task event forwarded by a client.
    pub fn receive_task_event(
        &mut self,
        tag: &GameplayTag,
        payload: &ContextPayload,
        sys: &mut SystemContext<'_>,
    ) -> TransitionOutcome {
        if !self.state.is_executing() {
            return TransitionOutcome::Ignored;
        }
        self.apply_store_requests(tag, payload);
        let outcome = self.evaluate_transition(TransitionSignal::TaskEvent { tag, payload }, sys);
        self.settle(sys);
        outcome
    }

    /// Explicit phase change from code (also how Manual rules are taken).
    pub fn request_phase(
        &mut self,
        phase: GameplayTag,
        sys: &mut SystemContext<'_>,
    ) -> TransitionOutcome {
        if !self.state.is_executing() {
            return TransitionOutcome::Ignored;
        }
        if self.state.transitioning {
            self.state.pending_phase = Some(phase);
            return TransitionOutcome::Ignored;
        }
        let from = self.state.current_phase.clone();
        let outcome = match (self.run_phase_chain(phase, false, sys), from) {
            (Some(to), Some(from)) => TransitionOutcome::Transitioned { from, to },
            _ => TransitionOutcome::Ignored,
        };
        self.settle(sys);
        outcome
    }

    /// Applies a phase replicated by the authority. Taken only when the
    /// authority's counter is ahead of the local one.
    pub fn apply_replicated_phase(&mut self, info: &PhaseInfo, sys: &mut SystemContext<'_>) -> bool {
        if !self.state.is_executing() {
            return false;
        }
        if sys.role.has_authority() {
            warn!(action = %self.state.name, "authority ignores replicated phase");
            return false;
        }
        if info.counter <= self.state.local_phase_counter {
            trace!(
                action = %self.state.name,
                remote = info.counter,
                local = self.state.local_phase_counter,
                "replicated phase not ahead"
            );
            return false;
        }
        debug!(
            action = %self.state.name,
            phase = %info.phase,
            remote = info.counter,
            local = self.state.local_phase_counter,
            "correcting to replicated phase"
        );
        self.state.local_phase_counter = info.counter.saturating_sub(1);
        self.run_phase_chain(info.phase.clone(), true, sys);
        self.settle(sys);
        true
    }

    /// Ends the action. Idempotent: only an executing instance ends.
    ///
    /// Exits the current phase, runs the end hook, force-ends remaining
    /// tasks as cancelled, destroys spawned actors and removes the tags the
    /// instance granted before reporting to the owner.
    pub fn end_action(&mut self, cancelled: bool, sys: &mut SystemContext<'_>) {
        if !self.state.is_executing() {
            trace!(action = %self.state.name, lifecycle = %self.state.lifecycle, "end ignored");
            return;
        }
        if self.state.transitioning {
            let cancelled = cancelled || self.state.end_request.unwrap_or(false);
            self.state.end_request = Some(cancelled);
            return;
        }

        self.state.lifecycle = Lifecycle::Ending;
        self.state.end_request = None;
        if let Some(phase) = self.state.current_phase.clone() {
            self.exit_phase(&phase, sys);
        }
        self.state.current_phase = None;

        let template = Arc::clone(&self.template);
        {
            let mut ctx = PhaseContext::new(&mut self.state, &template, sys);
            self.hooks.on_action_end(cancelled, &mut ctx);
        }
        self.state.end_all_tasks(true, sys);

        let state = &mut self.state;
        state.queued_events.clear();
        state.pending_phase = None;
        state.store_requests.clear();
        for actor in state.spawned_actors.drain(..) {
            sys.env.effects.destroy_actor(actor);
        }
        for (tag, count) in state.granted_tags.drain() {
            sys.owned_tags.remove_stack(&tag, count);
        }
        state.payload.clear();
        state.lifecycle = Lifecycle::Ended;
        info!(action = %state.name, cancelled, "action ended");

        if let Some(handle) = state.handle {
            sys.outbox.push(ActionSystemEvent::ActionEnded {
                action: handle,
                spec: state.spec,
                name: state.name.clone(),
                cancelled,
            });
            sys.requests
                .push(SystemRequest::ActionEnded { handle, cancelled });
        }
    }
}
