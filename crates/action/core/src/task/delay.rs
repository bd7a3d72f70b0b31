use super::{ActionTask, TaskContext, secs};
use crate::payload::ContextPayload;
use crate::tag::names::task_event;

/// Posts `Task.Event.PhaseDelay.Finished` after a delay. Ends with its phase.
#[derive(Debug, Clone)]
pub struct WaitPhaseDelay {
    duration: f32,
}

impl WaitPhaseDelay {
    pub fn new(duration: f32) -> Self {
        Self { duration }
    }
}

impl ActionTask for WaitPhaseDelay {
    fn name(&self) -> &str {
        "WaitPhaseDelay"
    }

    fn is_phase_scoped(&self) -> bool {
        true
    }

    fn on_activate(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.schedule_tick(secs(self.duration));
    }

    fn on_timer(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.post_event(task_event::PHASE_DELAY_FINISHED, ContextPayload::new());
        ctx.end_task(false);
    }
}

/// Posts `Task.Event.Delay.Finished` after a delay, across phase changes.
#[derive(Debug, Clone)]
pub struct WaitDelay {
    duration: f32,
}

impl WaitDelay {
    pub fn new(duration: f32) -> Self {
        Self { duration }
    }
}

impl ActionTask for WaitDelay {
    fn name(&self) -> &str {
        "WaitDelay"
    }

    fn on_activate(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.schedule_tick(secs(self.duration));
    }

    fn on_timer(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.post_event(task_event::DELAY_FINISHED, ContextPayload::new());
        ctx.end_task(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ActionEnv;
    use crate::task::{TickRequest, testing};
    use std::time::Duration;

    #[test]
    fn phase_delay_schedules_then_finishes() {
        let mut env = ActionEnv::default();
        let mut task = WaitPhaseDelay::new(0.5);
        assert!(task.is_phase_scoped());

        let out = testing::run(&mut env, Duration::ZERO, |ctx| task.on_activate(ctx));
        assert_eq!(out.tick, Some(TickRequest::Schedule(Duration::from_millis(500))));
        assert!(out.events.is_empty());

        let out = testing::run(&mut env, Duration::from_millis(500), |ctx| task.on_timer(ctx));
        assert_eq!(out.events[0].0, task_event::PHASE_DELAY_FINISHED);
        assert_eq!(out.end, Some(false));
    }

    #[test]
    fn negative_delay_fires_on_next_update() {
        let mut env = ActionEnv::default();
        let mut task = WaitDelay::new(-1.0);
        assert!(!task.is_phase_scoped());
        let out = testing::run(&mut env, Duration::ZERO, |ctx| task.on_activate(ctx));
        assert_eq!(out.tick, Some(TickRequest::Schedule(Duration::ZERO)));
    }
}
