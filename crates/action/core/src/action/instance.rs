use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use super::{ActionHooks, ActionTemplate, InstancingPolicy, SystemContext};
use crate::component::ActionSystemEvent;
use crate::error::{ActionError, ClassifiedError};
use crate::handle::{ActionSpecHandle, ActiveActionHandle, ActorId, TaskId};
use crate::payload::ContextPayload;
use crate::phase::PhaseInfo;
use crate::tag::{GameplayTag, TagCountContainer};
use crate::task::{ActionTask, Lifecycle, TaskContext, TaskOutput, TaskSlot, TickRequest};
use crate::timer::{SystemTimer, TimerHandle};

/// Copies a task event payload entry into the action payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StoreRequest {
    pub event: GameplayTag,
    pub source_key: String,
    pub destination_key: String,
}

/// Mutable state of one action instance.
pub struct InstanceState {
    pub(crate) name: String,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) handle: Option<ActiveActionHandle>,
    pub(crate) spec: ActionSpecHandle,
    pub(crate) level: u32,
    pub(crate) instancing: InstancingPolicy,
    pub(crate) activation_count: u32,

    pub(crate) current_phase: Option<GameplayTag>,
    /// Bumped on every phase entry; duration timers carry the serial they
    /// were armed under.
    pub(crate) phase_serial: u64,
    pub(crate) transitioning: bool,
    pub(crate) pending_phase: Option<GameplayTag>,
    pub(crate) replicated_phase: PhaseInfo,
    pub(crate) local_phase_counter: u32,
    pub(crate) phase_timers: Vec<TimerHandle>,
    pub(crate) interrupt_on_movement: bool,

    pub(crate) tasks: Vec<TaskSlot>,
    pub(crate) next_task_id: TaskId,

    pub(crate) granted_tags: TagCountContainer,
    pub(crate) payload: ContextPayload,
    pub(crate) store_requests: Vec<StoreRequest>,
    pub(crate) spawned_actors: Vec<ActorId>,
    pub(crate) end_request: Option<bool>,
    pub(crate) queued_events: VecDeque<(GameplayTag, ContextPayload)>,
}

impl InstanceState {
    fn new(template: &ActionTemplate) -> Self {
        Self {
            name: template.name().to_string(),
            lifecycle: Lifecycle::Inactive,
            handle: None,
            spec: ActionSpecHandle::default(),
            level: 0,
            instancing: template.definition().instancing_policy,
            activation_count: 0,
            current_phase: None,
            phase_serial: 0,
            transitioning: false,
            pending_phase: None,
            replicated_phase: PhaseInfo::default(),
            local_phase_counter: 0,
            phase_timers: Vec::new(),
            interrupt_on_movement: false,
            tasks: Vec::new(),
            next_task_id: TaskId::new(1),
            granted_tags: TagCountContainer::new(),
            payload: ContextPayload::new(),
            store_requests: Vec::new(),
            spawned_actors: Vec::new(),
            end_request: None,
            queued_events: VecDeque::new(),
        }
    }

    /// Clears per-activation state; the activation count survives.
    pub(crate) fn reset(&mut self) {
        self.lifecycle = Lifecycle::Inactive;
        self.handle = None;
        self.current_phase = None;
        self.transitioning = false;
        self.pending_phase = None;
        self.replicated_phase = PhaseInfo::default();
        self.local_phase_counter = 0;
        self.phase_timers.clear();
        self.interrupt_on_movement = false;
        self.tasks.clear();
        self.granted_tags = TagCountContainer::new();
        self.payload.clear();
        self.store_requests.clear();
        self.spawned_actors.clear();
        self.end_request = None;
        self.queued_events.clear();
    }

    pub fn is_executing(&self) -> bool {
        self.lifecycle == Lifecycle::Executing
    }

    /// Logs `error` and, when fatal, asks for the action to end cancelled.
    pub(crate) fn fail(&mut self, error: ActionError) {
        let severity = error.severity();
        if severity.ends_instance() {
            error!(
                action = %self.name,
                code = error.error_code(),
                error = %error,
                "ending action"
            );
            if self.is_executing() {
                self.end_request.get_or_insert(true);
            }
        } else {
            warn!(
                action = %self.name,
                code = error.error_code(),
                severity = severity.as_str(),
                error = %error,
                "action error"
            );
        }
    }

    /// Queues a task event for evaluation. Dropped unless executing.
    pub(crate) fn post_task_event(&mut self, tag: GameplayTag, payload: ContextPayload) {
        if !self.is_executing() {
            trace!(action = %self.name, event = %tag, "dropping task event, action not executing");
            return;
        }
        self.queued_events.push_back((tag, payload));
    }

    // ===== task supervision =====

    pub(crate) fn add_task(
        &mut self,
        task: Box<dyn ActionTask>,
        sys: &mut SystemContext<'_>,
    ) -> Result<TaskId, ActionError> {
        if self.instancing == InstancingPolicy::NonInstanced {
            return Err(ActionError::TasksRequireInstance {
                action: self.name.clone(),
            });
        }
        if !self.is_executing() {
            return Err(ActionError::ActionNotExecuting {
                action: self.name.clone(),
            });
        }
        let id = self.next_task_id.bump();
        let mut slot = TaskSlot::new(id, task);
        slot.lifecycle = Lifecycle::Executing;
        debug!(action = %self.name, task = %id, name = %slot.name, "task activated");
        self.tasks.push(slot);
        self.call_task(id, sys, |task, ctx| task.on_activate(ctx));
        Ok(id)
    }

    /// Runs one callback of a running task and applies what it asked for.
    pub(crate) fn call_task(
        &mut self,
        id: TaskId,
        sys: &mut SystemContext<'_>,
        f: impl FnOnce(&mut dyn ActionTask, &mut TaskContext<'_>),
    ) -> bool {
        let taken = self
            .tasks
            .iter_mut()
            .find(|slot| slot.id == id && slot.is_running())
            .and_then(|slot| slot.task.take());
        let Some(mut task) = taken else {
            return false;
        };

        let mut out = TaskOutput::default();
        {
            let mut ctx = TaskContext {
                task: id,
                action_name: &self.name,
                owner: sys.actor.owner,
                avatar: sys.actor.avatar,
                now: sys.now,
                role: sys.role,
                config: sys.config,
                env: &mut *sys.env,
                out: &mut out,
            };
            f(task.as_mut(), &mut ctx);
        }
        if let Some(slot) = self.tasks.iter_mut().find(|slot| slot.id == id) {
            slot.task = Some(task);
        }
        self.apply_task_output(id, out, sys);
        true
    }

    fn apply_task_output(&mut self, id: TaskId, out: TaskOutput, sys: &mut SystemContext<'_>) {
        let TaskOutput {
            events,
            end,
            tick,
            abort,
        } = out;

        if let (Some(tick), Some(action)) = (tick, self.handle) {
            if let Some(slot) = self.tasks.iter_mut().find(|slot| slot.id == id) {
                if let Some(previous) = slot.timer.take() {
                    sys.timers.cancel(previous);
                }
                if let TickRequest::Schedule(after) = tick {
                    let due = sys.now.saturating_add(after);
                    slot.timer = Some(sys.timers.schedule(due, SystemTimer::Task { action, task: id }));
                }
            }
        }
        for (tag, payload) in events {
            self.post_task_event(tag, payload);
        }
        if let Some(error) = abort {
            self.fail(error);
        }
        if let Some(cancelled) = end {
            self.end_task(id, cancelled, sys);
        }
    }

    /// Ends a task exactly once. Returns false if it was already ended.
    pub(crate) fn end_task(
        &mut self,
        id: TaskId,
        cancelled: bool,
        sys: &mut SystemContext<'_>,
    ) -> bool {
        let Some(index) = self
            .tasks
            .iter()
            .position(|slot| slot.id == id && slot.is_running())
        else {
            warn!(action = %self.name, task = %id, "task already ended");
            return false;
        };

        let slot = &mut self.tasks[index];
        slot.lifecycle = Lifecycle::Ending;
        if let Some(timer) = slot.timer.take() {
            sys.timers.cancel(timer);
        }
        let task = slot.task.take();

        if let Some(mut task) = task {
            let mut out = TaskOutput::default();
            {
                let mut ctx = TaskContext {
                    task: id,
                    action_name: &self.name,
                    owner: sys.actor.owner,
                    avatar: sys.actor.avatar,
                    now: sys.now,
                    role: sys.role,
                    config: sys.config,
                    env: &mut *sys.env,
                    out: &mut out,
                };
                task.on_end(cancelled, &mut ctx);
            }
            if !out.events.is_empty() {
                trace!(action = %self.name, task = %id, "dropping events posted while ending");
            }
        }

        let slot = self.tasks.remove(index);
        debug!(action = %self.name, task = %id, name = %slot.name, cancelled, "task ended");
        if let Some(action) = self.handle {
            sys.outbox.push(ActionSystemEvent::TaskEnded {
                action,
                task: id,
                name: slot.name,
                cancelled,
            });
        }
        true
    }

    pub(crate) fn end_all_tasks(&mut self, cancelled: bool, sys: &mut SystemContext<'_>) {
        let running: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|slot| slot.is_running())
            .map(|slot| slot.id)
            .collect();
        for id in running {
            self.end_task(id, cancelled, sys);
        }
    }

    pub(crate) fn end_phase_scoped_tasks(&mut self, sys: &mut SystemContext<'_>) {
        let scoped: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|slot| slot.is_running() && slot.phase_scoped)
            .map(|slot| slot.id)
            .collect();
        for id in scoped {
            self.end_task(id, true, sys);
        }
    }

    pub(crate) fn running_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|slot| slot.is_running())
            .map(|slot| slot.id)
            .collect()
    }
}

/// Stateful per-activation object driven by the phase transition engine.
pub struct ActionInstance {
    pub(crate) template: Arc<ActionTemplate>,
    pub(crate) hooks: Box<dyn ActionHooks>,
    pub(crate) state: InstanceState,
}

impl ActionInstance {
    pub fn new(template: Arc<ActionTemplate>) -> Self {
        let hooks = template.make_hooks();
        let state = InstanceState::new(&template);
        Self {
            template,
            hooks,
            state,
        }
    }

    pub fn template(&self) -> &Arc<ActionTemplate> {
        &self.template
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }

    pub fn is_executing(&self) -> bool {
        self.state.is_executing()
    }

    pub fn is_ended(&self) -> bool {
        self.state.lifecycle == Lifecycle::Ended
    }

    /// `None` outside `Executing`.
    pub fn current_phase(&self) -> Option<&GameplayTag> {
        self.state.current_phase.as_ref()
    }

    pub fn handle(&self) -> Option<ActiveActionHandle> {
        self.state.handle
    }

    pub fn spec(&self) -> ActionSpecHandle {
        self.state.spec
    }

    pub fn level(&self) -> u32 {
        self.state.level
    }

    pub fn activation_count(&self) -> u32 {
        self.state.activation_count
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.state.payload
    }

    pub fn replicated_phase(&self) -> &PhaseInfo {
        &self.state.replicated_phase
    }

    pub fn local_phase_counter(&self) -> u32 {
        self.state.local_phase_counter
    }

    pub fn granted_tags(&self) -> &TagCountContainer {
        &self.state.granted_tags
    }

    pub fn task_count(&self) -> usize {
        self.state.tasks.iter().filter(|slot| slot.is_running()).count()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.state
            .tasks
            .iter()
            .filter(|slot| slot.is_running())
            .map(|slot| slot.name.as_str())
            .collect()
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.state.running_task_ids()
    }

    /// Checks the single-phase invariant: a phase is set exactly while
    /// executing outside a transition.
    pub fn phase_invariant_holds(&self) -> bool {
        match self.state.lifecycle {
            Lifecycle::Executing => {
                self.state.current_phase.is_some() || self.state.transitioning
            }
            Lifecycle::Inactive | Lifecycle::Ending | Lifecycle::Ended => {
                self.state.current_phase.is_none()
            }
        }
    }
}

impl std::fmt::Debug for ActionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionInstance")
            .field("name", &self.state.name)
            .field("lifecycle", &self.state.lifecycle)
            .field("phase", &self.state.current_phase)
            .field("tasks", &self.task_count())
            .finish()
    }
}
