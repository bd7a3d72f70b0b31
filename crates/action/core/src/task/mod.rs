//! Tasks: cancellable units of in-phase work owned by one action instance.
//!
//! A task never touches its owner directly. Every callback receives a
//! [`TaskContext`] that records what the task wants (post an event, wake up
//! later, end itself, abort the action). The owner applies those requests
//! after the callback returns, which keeps ending a task from inside its own
//! callback safe.

mod delay;
mod gameplay_event;
mod input;
mod landing;
mod montage;

pub use delay::{WaitDelay, WaitPhaseDelay};
pub use gameplay_event::WaitGameplayEvent;
pub use input::{InputEdge, WaitInput};
pub use landing::LandingControl;
pub use montage::{MontageFlags, PlayMontageAndWait};

use std::time::Duration;

use crate::config::ActionSystemConfig;
use crate::env::{ActionEnv, AnimationDriver, AnimationEvent, MovementDriver};
use crate::error::ActionError;
use crate::handle::{ActorId, TaskId};
use crate::net::NetRole;
use crate::payload::ContextPayload;
use crate::tag::GameplayTag;
use crate::timer::TimerHandle;

/// Lifecycle shared by tasks and action instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifecycle {
    #[default]
    Inactive,
    Executing,
    Ending,
    Ended,
}

pub trait ActionTask: Send {
    fn name(&self) -> &str;

    /// Phase-scoped tasks are ended when the phase that started them exits.
    fn is_phase_scoped(&self) -> bool {
        false
    }

    /// Candidate for movement interruption while the phase allows it.
    fn interruptible_by_movement(&self) -> bool {
        false
    }

    fn on_activate(&mut self, ctx: &mut TaskContext<'_>);

    /// A tick scheduled through [`TaskContext::schedule_tick`] fired.
    fn on_timer(&mut self, _ctx: &mut TaskContext<'_>) {}

    fn on_animation_event(&mut self, _event: &AnimationEvent, _ctx: &mut TaskContext<'_>) {}

    fn on_gameplay_event(
        &mut self,
        _tag: &GameplayTag,
        _payload: &ContextPayload,
        _ctx: &mut TaskContext<'_>,
    ) {
    }

    /// A local input was pressed or released.
    fn on_input(&mut self, _input: &GameplayTag, _pressed: bool, _ctx: &mut TaskContext<'_>) {}

    /// Movement started while the phase allows animation interruption.
    fn on_interrupt(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.end_task(true);
    }

    /// Called exactly once. Events posted from here are dropped.
    fn on_end(&mut self, _cancelled: bool, _ctx: &mut TaskContext<'_>) {}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TickRequest {
    Schedule(Duration),
    Cancel,
}

/// Requests collected from one task callback.
#[derive(Default)]
pub(crate) struct TaskOutput {
    pub events: Vec<(GameplayTag, ContextPayload)>,
    pub end: Option<bool>,
    pub tick: Option<TickRequest>,
    pub abort: Option<ActionError>,
}

/// View of the owning action handed to task callbacks.
pub struct TaskContext<'a> {
    pub(crate) task: TaskId,
    pub(crate) action_name: &'a str,
    pub(crate) owner: ActorId,
    pub(crate) avatar: Option<ActorId>,
    pub(crate) now: Duration,
    pub(crate) role: NetRole,
    pub(crate) config: &'a ActionSystemConfig,
    pub(crate) env: &'a mut ActionEnv,
    pub(crate) out: &'a mut TaskOutput,
}

impl TaskContext<'_> {
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    pub fn action_name(&self) -> &str {
        self.action_name
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn avatar(&self) -> Option<ActorId> {
        self.avatar
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn has_authority(&self) -> bool {
        self.role.has_authority()
    }

    pub fn config(&self) -> &ActionSystemConfig {
        self.config
    }

    pub fn animation(&mut self) -> &mut dyn AnimationDriver {
        self.env.animation.as_mut()
    }

    pub fn movement(&mut self) -> &mut dyn MovementDriver {
        self.env.movement.as_mut()
    }

    /// Queues an event for the owning action's transition rules.
    pub fn post_event(&mut self, tag: impl Into<GameplayTag>, payload: ContextPayload) {
        self.out.events.push((tag.into(), payload));
    }

    /// Wakes the task up after `after`, replacing any earlier request.
    pub fn schedule_tick(&mut self, after: Duration) {
        self.out.tick = Some(TickRequest::Schedule(after));
    }

    pub fn cancel_tick(&mut self) {
        self.out.tick = Some(TickRequest::Cancel);
    }

    /// Ends this task once the callback returns.
    pub fn end_task(&mut self, cancelled: bool) {
        self.out.end.get_or_insert(cancelled);
    }

    /// Reports an error that ends the owning action.
    pub fn abort_action(&mut self, error: ActionError) {
        self.out.abort.get_or_insert(error);
    }
}

/// Bookkeeping for one task owned by an instance.
pub(crate) struct TaskSlot {
    pub id: TaskId,
    pub name: String,
    pub lifecycle: Lifecycle,
    pub task: Option<Box<dyn ActionTask>>,
    pub timer: Option<TimerHandle>,
    pub phase_scoped: bool,
    pub interruptible: bool,
}

impl TaskSlot {
    pub fn new(id: TaskId, task: Box<dyn ActionTask>) -> Self {
        Self {
            id,
            name: task.name().to_string(),
            lifecycle: Lifecycle::Inactive,
            phase_scoped: task.is_phase_scoped(),
            interruptible: task.interruptible_by_movement(),
            task: Some(task),
            timer: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Executing
    }
}

/// Data form of the built-in tasks, used by phase behaviors.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskSpec {
    WaitPhaseDelay {
        duration: f32,
    },
    WaitDelay {
        duration: f32,
    },
    WaitGameplayEvent {
        event: GameplayTag,
    },
    WaitInput {
        #[cfg_attr(feature = "serde", serde(default))]
        edge: InputEdge,
        #[cfg_attr(feature = "serde", serde(default))]
        input: Option<GameplayTag>,
    },
    PlayMontage {
        #[cfg_attr(feature = "serde", serde(default))]
        montage: Option<String>,
        #[cfg_attr(feature = "serde", serde(default = "default_rate"))]
        rate: f32,
        #[cfg_attr(feature = "serde", serde(default))]
        start_section: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        stop_when_action_ends: bool,
    },
    LandingControl {
        velocity: f32,
        duration: f32,
        #[cfg_attr(feature = "serde", serde(default))]
        interp_speed: f32,
        #[cfg_attr(feature = "serde", serde(default))]
        natural: bool,
    },
}

#[cfg(feature = "serde")]
fn default_rate() -> f32 {
    1.0
}

impl TaskSpec {
    pub fn instantiate(&self) -> Box<dyn ActionTask> {
        match self {
            Self::WaitPhaseDelay { duration } => Box::new(WaitPhaseDelay::new(*duration)),
            Self::WaitDelay { duration } => Box::new(WaitDelay::new(*duration)),
            Self::WaitGameplayEvent { event } => Box::new(WaitGameplayEvent::new(event.clone())),
            Self::WaitInput { edge, input } => Box::new(WaitInput::new(*edge, input.clone())),
            Self::PlayMontage {
                montage,
                rate,
                start_section,
                stop_when_action_ends,
            } => Box::new(
                PlayMontageAndWait::new(montage.clone())
                    .with_rate(*rate)
                    .with_start_section(start_section.clone())
                    .stop_when_action_ends(*stop_when_action_ends),
            ),
            Self::LandingControl {
                velocity,
                duration,
                interp_speed,
                natural,
            } => {
                let task = LandingControl::new(*velocity, *duration);
                Box::new(if *natural {
                    task.natural(*interp_speed)
                } else {
                    task
                })
            }
        }
    }
}

/// Seconds to a schedulable duration; negative and NaN become zero, values
/// too large to represent saturate at [`Duration::MAX`].
pub(crate) fn secs(value: f32) -> Duration {
    if value > 0.0 {
        Duration::try_from_secs_f32(value).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
