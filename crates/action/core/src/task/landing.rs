use tracing::trace;

use super::{ActionTask, TaskContext};
use crate::error::ActionError;
use crate::math::interp_to;
use crate::payload::ContextPayload;
use crate::tag::names::task_event;

/// Drives the avatar's vertical velocity until it lands.
///
/// Runs on the fixed periodic step. Each step adds the step to the elapsed
/// time and ends successfully once the avatar stops falling or the elapsed
/// time reaches `duration`.
#[derive(Debug, Clone)]
pub struct LandingControl {
    velocity: f32,
    duration: f32,
    interp_speed: f32,
    natural: bool,
    elapsed: f32,
}

impl LandingControl {
    /// Basic mode: holds `velocity` every step.
    pub fn new(velocity: f32, duration: f32) -> Self {
        Self {
            velocity,
            duration,
            interp_speed: 0.0,
            natural: false,
            elapsed: 0.0,
        }
    }

    /// Natural mode: eases toward an overshoot of `velocity`, then holds it
    /// once `1 / interp_speed` seconds have passed.
    #[must_use]
    pub fn natural(mut self, interp_speed: f32) -> Self {
        self.natural = true;
        self.interp_speed = interp_speed;
        self
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn target_velocity(&self, current: f32, step: f32) -> f32 {
        if !self.natural {
            return self.velocity;
        }
        if self.interp_speed > 0.0 && self.elapsed > 1.0 / self.interp_speed {
            return self.velocity;
        }
        let overshoot = self.velocity * (1.3 + self.interp_speed * 0.1);
        interp_to(current, overshoot, step, self.interp_speed)
    }
}

impl ActionTask for LandingControl {
    fn name(&self) -> &str {
        "LandingControl"
    }

    fn on_activate(&mut self, ctx: &mut TaskContext<'_>) {
        if ctx.avatar().is_none() {
            let action = ctx.action_name().to_string();
            ctx.abort_action(ActionError::MissingAvatar { action });
            ctx.end_task(true);
            return;
        }
        self.elapsed = 0.0;
        let step = ctx.config().step_duration();
        ctx.schedule_tick(step);
    }

    fn on_timer(&mut self, ctx: &mut TaskContext<'_>) {
        let Some(avatar) = ctx.avatar() else {
            ctx.end_task(true);
            return;
        };
        let step = ctx.config().periodic_step;
        self.elapsed += step;

        if !ctx.movement().is_falling(avatar) || self.elapsed >= self.duration {
            trace!(elapsed = self.elapsed, "landing control finished");
            ctx.post_event(task_event::COMPLETED, ContextPayload::new());
            ctx.end_task(false);
            return;
        }

        let velocity = ctx.movement().velocity(avatar);
        let vz = self.target_velocity(velocity.z, step);
        ctx.movement().set_velocity(avatar, velocity.with_z(vz));
        let step = ctx.config().step_duration();
        ctx.schedule_tick(step);
    }
}
