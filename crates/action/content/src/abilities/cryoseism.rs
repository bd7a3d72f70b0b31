//! Cryoseism: leap, slam, then freeze everything around the impact.
//!
//! The phase table lives in `data/actions/cryoseism.ron`. The hooks here
//! launch the avatar on Execute, stage the blast on the server, and drive
//! the descent on Landing.

use action_core::tag::names::{phase, task_event};
use action_core::{
    ActionHooks, ActionTemplate, GameplayTag, PayloadValue, PhaseContext, TransitionRule,
    constant_velocity,
};
use action_core::task::LandingControl;
use tracing::{debug, warn};

pub(crate) const NAME: &str = "Cryoseism";

const BLAST_ACTOR: &str = "Actors/CryoseismBlast";
const LEAP_EFFECT: &str = "Effect.Cryoseism.Leap";

mod level {
    pub const SLOW_DURATION: &str = "SlowDuration";
    pub const SLOW_MAGNITUDE: &str = "SlowMagnitude";
    pub const EXPLODE_TIME: &str = "ExplodeTime";
    pub const STUN_DURATION: &str = "StunDuration";
    pub const CHAIN_STUN_DURATION: &str = "ChainStunDuration";
    pub const INITIAL_RADIUS: &str = "InitialRadius";
    pub const CHAIN_RADIUS: &str = "ChainRadius";
    pub const LEAP_VELOCITY: &str = "LeapVelocity";
    pub const LANDING_TIME: &str = "LandingTime";
    pub const LANDING_VELOCITY: &str = "LandingVelocity";

    /// Copied into the action payload when the blast is staged.
    pub const BLAST_PARAMETERS: [&str; 7] = [
        SLOW_DURATION,
        SLOW_MAGNITUDE,
        EXPLODE_TIME,
        STUN_DURATION,
        CHAIN_STUN_DURATION,
        INITIAL_RADIUS,
        CHAIN_RADIUS,
    ];
}

/// Per-instance hooks of the Cryoseism ability.
#[derive(Debug, Default)]
pub struct CryoseismHooks {
    leaps: u32,
}

impl CryoseismHooks {
    fn leap(&mut self, ctx: &mut PhaseContext<'_, '_>) {
        let Some(velocity) = ctx.require_level_value(level::LEAP_VELOCITY) else {
            return;
        };
        self.leaps += 1;

        if let Some(avatar) = ctx.avatar() {
            let movement = &mut ctx.env().movement;
            let current = movement.velocity(avatar);
            movement.set_velocity(avatar, current.with_z(velocity));
            debug!(action = NAME, velocity, leaps = self.leaps, "leap launched");
        }

        if ctx.has_authority() {
            self.stage_blast(ctx);
        }
    }

    fn stage_blast(&self, ctx: &mut PhaseContext<'_, '_>) {
        ctx.apply_effect_to_self(&GameplayTag::new(LEAP_EFFECT));
        for key in level::BLAST_PARAMETERS {
            if let Some(value) = ctx.level_value(key) {
                ctx.payload_mut().set(key, PayloadValue::Float(value));
            }
        }
        if let Some(blast) = ctx.spawn_actor(BLAST_ACTOR) {
            debug!(action = NAME, ?blast, "blast staged");
        }
    }

    fn land(&mut self, ctx: &mut PhaseContext<'_, '_>) {
        let Some(time) = ctx.require_level_value(level::LANDING_TIME) else {
            return;
        };
        let config = ctx.config();
        let derived = constant_velocity(
            config.distance_to_ground,
            time,
            config.fallback_landing_velocity,
        );
        // A non-zero LandingVelocity row overrides the derived descent.
        let velocity = match ctx.level_value(level::LANDING_VELOCITY) {
            Some(v) if v != 0.0 => v,
            _ => derived,
        };

        if let Err(err) = ctx.run_task(LandingControl::new(velocity, time)) {
            warn!(action = NAME, %err, "landing control not started");
        }
    }
}

impl ActionHooks for CryoseismHooks {
    fn on_phase_enter(&mut self, entered: &GameplayTag, ctx: &mut PhaseContext<'_, '_>) {
        match entered.as_str() {
            phase::EXECUTE => self.leap(ctx),
            phase::LANDING => self.land(ctx),
            _ => {}
        }
    }
}

pub(crate) fn install(template: ActionTemplate) -> ActionTemplate {
    template
        .with_rule(
            phase::LANDING,
            TransitionRule::on_task_event(task_event::COMPLETED, phase::RECOVERY),
        )
        .with_hooks(CryoseismHooks::default)
}
