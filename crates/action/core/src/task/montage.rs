use bitflags::bitflags;
use tracing::{debug, warn};

use super::{ActionTask, TaskContext};
use crate::env::{AnimationEvent, AnimationEventKind};
use crate::error::ActionError;
use crate::payload::ContextPayload;
use crate::tag::names::task_event;

bitflags! {
    /// Playback milestones seen by a montage task.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MontageFlags: u8 {
        const BLENDING_OUT = 1 << 0;
        const COMPLETED = 1 << 1;
        const INTERRUPTED = 1 << 2;
    }
}

/// Plays a montage and reports its notifies and end as task events.
///
/// Notify begin/end are posted with the notify name under `NotifyName`.
/// A normal end posts `Montage.Ended` and ends the task successfully; an
/// interruption posts `Montage.Interrupted` and ends it cancelled.
#[derive(Debug, Clone)]
pub struct PlayMontageAndWait {
    montage: Option<String>,
    rate: f32,
    start_section: Option<String>,
    stop_when_action_ends: bool,
    playing: Option<String>,
    flags: MontageFlags,
}

impl PlayMontageAndWait {
    /// `None` resolves `Montages/<ActionName>` on activation.
    pub fn new(montage: Option<String>) -> Self {
        Self {
            montage,
            rate: 1.0,
            start_section: None,
            stop_when_action_ends: false,
            playing: None,
            flags: MontageFlags::empty(),
        }
    }

    pub fn montage(montage: impl Into<String>) -> Self {
        Self::new(Some(montage.into()))
    }

    #[must_use]
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    #[must_use]
    pub fn with_start_section(mut self, section: Option<String>) -> Self {
        self.start_section = section;
        self
    }

    #[must_use]
    pub fn stop_when_action_ends(mut self, stop: bool) -> Self {
        self.stop_when_action_ends = stop;
        self
    }

    pub fn flags(&self) -> MontageFlags {
        self.flags
    }

    fn resolve(&self, ctx: &mut TaskContext<'_>) -> Option<String> {
        if let Some(montage) = &self.montage {
            return Some(montage.clone());
        }
        let fallback = format!("Montages/{}", ctx.action_name());
        if ctx.animation().resolve_montage(&fallback) {
            warn!(
                action = ctx.action_name(),
                montage = %fallback,
                "montage unset, using fallback path"
            );
            Some(fallback)
        } else {
            None
        }
    }

    fn fail(&self, ctx: &mut TaskContext<'_>, resource: String) {
        let action = ctx.action_name().to_string();
        ctx.abort_action(ActionError::ResourceUnavailable { action, resource });
        ctx.end_task(true);
    }
}

impl ActionTask for PlayMontageAndWait {
    fn name(&self) -> &str {
        "PlayMontageAndWait"
    }

    fn interruptible_by_movement(&self) -> bool {
        true
    }

    fn on_activate(&mut self, ctx: &mut TaskContext<'_>) {
        let Some(avatar) = ctx.avatar() else {
            let action = ctx.action_name().to_string();
            ctx.abort_action(ActionError::MissingAvatar { action });
            ctx.end_task(true);
            return;
        };
        let Some(montage) = self.resolve(ctx) else {
            let path = format!("Montages/{}", ctx.action_name());
            self.fail(ctx, path);
            return;
        };
        if ctx.animation().is_playing(avatar, &montage) {
            debug!(montage = %montage, "montage already playing");
            ctx.post_event(task_event::MONTAGE_ALREADY_PLAYING, ContextPayload::new());
            ctx.end_task(false);
            return;
        }

        let rate = self.rate;
        let section = self.start_section.clone();
        let length = ctx
            .animation()
            .play_montage(avatar, &montage, rate, section.as_deref());
        if length <= 0.0 {
            self.fail(ctx, format!("montage '{montage}'"));
            return;
        }
        debug!(montage = %montage, length, "montage started");
        self.playing = Some(montage);
    }

    fn on_animation_event(&mut self, event: &AnimationEvent, ctx: &mut TaskContext<'_>) {
        if self.playing.as_deref() != Some(event.montage.as_str()) {
            return;
        }
        match &event.kind {
            AnimationEventKind::NotifyBegin { notify } => {
                ctx.post_event(
                    task_event::MONTAGE_NOTIFY_BEGIN,
                    ContextPayload::notify(notify.clone()),
                );
            }
            AnimationEventKind::NotifyEnd { notify } => {
                ctx.post_event(
                    task_event::MONTAGE_NOTIFY_END,
                    ContextPayload::notify(notify.clone()),
                );
            }
            AnimationEventKind::BlendingOut { interrupted } => {
                self.flags |= MontageFlags::BLENDING_OUT;
                if *interrupted {
                    self.flags |= MontageFlags::INTERRUPTED;
                }
                ctx.post_event(task_event::MONTAGE_BLEND_OUT, ContextPayload::new());
            }
            AnimationEventKind::Ended { interrupted } => {
                if *interrupted || self.flags.contains(MontageFlags::INTERRUPTED) {
                    self.flags |= MontageFlags::INTERRUPTED;
                    ctx.post_event(task_event::MONTAGE_INTERRUPTED, ContextPayload::new());
                    ctx.end_task(true);
                } else {
                    self.flags |= MontageFlags::COMPLETED;
                    ctx.post_event(task_event::MONTAGE_ENDED, ContextPayload::new());
                    ctx.end_task(false);
                }
                self.playing = None;
            }
        }
    }

    fn on_interrupt(&mut self, ctx: &mut TaskContext<'_>) {
        self.flags |= MontageFlags::INTERRUPTED;
        if let (Some(avatar), Some(montage)) = (ctx.avatar(), self.playing.take()) {
            let blend = ctx.config().montage_stop_blend_out;
            ctx.animation().stop_montage(avatar, &montage, blend);
        }
        ctx.post_event(task_event::MONTAGE_INTERRUPTED, ContextPayload::new());
        ctx.end_task(true);
    }

    fn on_end(&mut self, _cancelled: bool, ctx: &mut TaskContext<'_>) {
        if !self.stop_when_action_ends {
            return;
        }
        let (Some(avatar), Some(montage)) = (ctx.avatar(), self.playing.take()) else {
            return;
        };
        if ctx.animation().is_playing(avatar, &montage) {
            let blend = ctx.config().montage_stop_blend_out;
            ctx.animation().stop_montage(avatar, &montage, blend);
        }
    }
}
