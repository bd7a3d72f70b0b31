use std::time::Duration;

use super::{ActionTask, TaskContext};
use crate::payload::{ContextPayload, PayloadValue, keys};
use crate::tag::GameplayTag;
use crate::tag::names::task_event;

/// Input transition a [`WaitInput`] task waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputEdge {
    #[default]
    Press,
    Release,
}

/// Waits for one press or release of a local input and posts
/// `Task.Event.Input.Wait.Pressed` or `Task.Event.Input.Wait.Released` with the
/// input tag and the seconds waited.
///
/// Without an input tag any input completes the wait; otherwise the tag must
/// match exactly.
#[derive(Debug, Clone)]
pub struct WaitInput {
    edge: InputEdge,
    input: Option<GameplayTag>,
    started_at: Duration,
}

impl WaitInput {
    pub fn press(input: Option<GameplayTag>) -> Self {
        Self::new(InputEdge::Press, input)
    }

    pub fn release(input: Option<GameplayTag>) -> Self {
        Self::new(InputEdge::Release, input)
    }

    pub fn new(edge: InputEdge, input: Option<GameplayTag>) -> Self {
        Self {
            edge,
            input: input.filter(GameplayTag::is_valid),
            started_at: Duration::ZERO,
        }
    }
}

impl ActionTask for WaitInput {
    fn name(&self) -> &str {
        match self.edge {
            InputEdge::Press => "WaitInputPress",
            InputEdge::Release => "WaitInputRelease",
        }
    }

    fn on_activate(&mut self, ctx: &mut TaskContext<'_>) {
        self.started_at = ctx.now();
    }

    fn on_input(&mut self, input: &GameplayTag, pressed: bool, ctx: &mut TaskContext<'_>) {
        if pressed != (self.edge == InputEdge::Press) {
            return;
        }
        if self.input.as_ref().is_some_and(|wanted| wanted != input) {
            return;
        }

        let waited = ctx.now().saturating_sub(self.started_at).as_secs_f32();
        let mut payload = ContextPayload::new();
        payload.set(keys::INPUT_TAG, PayloadValue::Tag(input.clone()));
        payload.set(keys::TIME_WAITED, PayloadValue::Float(waited));
        let event = match self.edge {
            InputEdge::Press => task_event::INPUT_WAIT_PRESSED,
            InputEdge::Release => task_event::INPUT_WAIT_RELEASED,
        };
        ctx.post_event(event, payload);
        ctx.end_task(false);
    }
}
