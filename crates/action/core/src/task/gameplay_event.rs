use super::{ActionTask, TaskContext};
use crate::payload::ContextPayload;
use crate::tag::GameplayTag;
use crate::tag::names::task_event;

/// Waits for a gameplay event matching `event` (hierarchically) and forwards
/// its payload as `Task.Event.GameplayEvent.Received`.
#[derive(Debug, Clone)]
pub struct WaitGameplayEvent {
    event: GameplayTag,
}

impl WaitGameplayEvent {
    pub fn new(event: impl Into<GameplayTag>) -> Self {
        Self {
            event: event.into(),
        }
    }
}

impl ActionTask for WaitGameplayEvent {
    fn name(&self) -> &str {
        "WaitGameplayEvent"
    }

    fn on_activate(&mut self, _ctx: &mut TaskContext<'_>) {}

    fn on_gameplay_event(
        &mut self,
        tag: &GameplayTag,
        payload: &ContextPayload,
        ctx: &mut TaskContext<'_>,
    ) {
        if tag.matches_tag(&self.event) {
            ctx.post_event(task_event::GAMEPLAY_EVENT_RECEIVED, payload.clone());
            ctx.end_task(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ActionEnv;
    use crate::task::testing;
    use std::time::Duration;

    #[test]
    fn forwards_matching_child_event() {
        let mut env = ActionEnv::default();
        let mut task = WaitGameplayEvent::new("Event.Hit");

        let payload = ContextPayload::notify("Impact");
        let out = testing::run(&mut env, Duration::ZERO, |ctx| {
            task.on_gameplay_event(&"Event.Other".into(), &payload, ctx);
        });
        assert!(out.events.is_empty());
        assert_eq!(out.end, None);

        let out = testing::run(&mut env, Duration::ZERO, |ctx| {
            task.on_gameplay_event(&"Event.Hit.Critical".into(), &payload, ctx);
        });
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].1.notify_name(), Some("Impact"));
        assert_eq!(out.end, Some(false));
    }
}
