//! Montage playback on fixed timelines.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use action_core::{ActorId, AnimationDriver, AnimationEvent, AnimationEventKind};
use tracing::{debug, trace};

/// Notify schedule and length of one montage, in seconds at rate 1.
#[derive(Clone, Debug, PartialEq)]
pub struct MontageTimeline {
    pub length: f32,
    /// `(time, notify name)`, sorted by time.
    pub notifies: Vec<(f32, String)>,
    /// Seconds before the end at which blend-out starts.
    pub blend_out: f32,
}

impl MontageTimeline {
    pub fn new(length: f32) -> Self {
        Self {
            length,
            notifies: Vec::new(),
            blend_out: 0.2,
        }
    }

    #[must_use]
    pub fn notify(mut self, at: f32, name: impl Into<String>) -> Self {
        self.notifies.push((at, name.into()));
        self.notifies.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }
}

/// Known montages keyed by asset path.
#[derive(Clone, Debug, Default)]
pub struct MontageLibrary {
    timelines: BTreeMap<String, MontageTimeline>,
}

impl MontageLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timelines for the bundled content.
    pub fn bundled() -> Self {
        Self::new().with(
            "Montages/Cryoseism",
            MontageTimeline::new(3.0)
                .notify(0.5, "StartBlast")
                .notify(1.1, "StartLanding")
                .notify(1.8, "StartRecovery"),
        )
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<String>, timeline: MontageTimeline) -> Self {
        self.timelines.insert(path.into(), timeline);
        self
    }

    pub fn get(&self, path: &str) -> Option<&MontageTimeline> {
        self.timelines.get(path)
    }
}

#[derive(Debug)]
struct Playing {
    montage: String,
    timeline: MontageTimeline,
    rate: f32,
    position: f32,
    next_notify: usize,
    blending_out: bool,
}

#[derive(Debug, Default)]
struct PlayerState {
    library: MontageLibrary,
    playing: BTreeMap<ActorId, Playing>,
    /// Events raised outside of `advance`, delivered on the next call.
    queued: Vec<(ActorId, AnimationEvent)>,
}

/// Plays montages from a [`MontageLibrary`] and reports their events as
/// simulated time passes. One montage per avatar; a new one replaces it.
#[derive(Clone, Debug, Default)]
pub struct MontagePlayer(Arc<Mutex<PlayerState>>);

impl MontagePlayer {
    pub fn new(library: MontageLibrary) -> Self {
        Self(Arc::new(Mutex::new(PlayerState {
            library,
            ..PlayerState::default()
        })))
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        // Playback state stays consistent across a panicking holder.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Montage currently playing on `avatar`.
    pub fn current(&self, avatar: ActorId) -> Option<String> {
        self.state()
            .playing
            .get(&avatar)
            .map(|playing| playing.montage.clone())
    }

    /// Moves every playing montage forward by `dt` seconds and returns the
    /// events crossed, in order per avatar.
    pub fn advance(&self, dt: f32) -> Vec<(ActorId, AnimationEvent)> {
        let mut state = self.state();
        let mut events = std::mem::take(&mut state.queued);
        let mut finished = Vec::new();

        for (&avatar, playing) in state.playing.iter_mut() {
            playing.position += dt * playing.rate;

            while let Some((at, notify)) = playing.timeline.notifies.get(playing.next_notify) {
                if *at > playing.position {
                    break;
                }
                events.push((
                    avatar,
                    AnimationEvent::notify_begin(playing.montage.clone(), notify.clone()),
                ));
                playing.next_notify += 1;
            }

            let blend_at = (playing.timeline.length - playing.timeline.blend_out).max(0.0);
            if !playing.blending_out && playing.position >= blend_at {
                playing.blending_out = true;
                events.push((
                    avatar,
                    AnimationEvent {
                        montage: playing.montage.clone(),
                        kind: AnimationEventKind::BlendingOut { interrupted: false },
                    },
                ));
            }
            if playing.position >= playing.timeline.length {
                events.push((avatar, AnimationEvent::ended(playing.montage.clone(), false)));
                finished.push(avatar);
            }
        }

        for avatar in finished {
            if let Some(playing) = state.playing.remove(&avatar) {
                debug!(%avatar, montage = %playing.montage, "montage finished");
            }
        }
        events
    }
}

impl AnimationDriver for MontagePlayer {
    fn resolve_montage(&self, path: &str) -> bool {
        self.state().library.get(path).is_some()
    }

    fn play_montage(
        &mut self,
        avatar: ActorId,
        montage: &str,
        rate: f32,
        _start_section: Option<&str>,
    ) -> f32 {
        let mut state = self.state();
        let Some(timeline) = state.library.get(montage).cloned() else {
            debug!(%avatar, montage, "montage not in library");
            return 0.0;
        };
        if rate <= 0.0 {
            return 0.0;
        }
        if let Some(previous) = state.playing.remove(&avatar) {
            state.queued.push((avatar, AnimationEvent::ended(previous.montage, true)));
        }

        let length = timeline.length / rate;
        trace!(%avatar, montage, length, "montage playing");
        state.playing.insert(
            avatar,
            Playing {
                montage: montage.to_string(),
                timeline,
                rate,
                position: 0.0,
                next_notify: 0,
                blending_out: false,
            },
        );
        length
    }

    fn stop_montage(&mut self, avatar: ActorId, montage: &str, _blend_out: f32) {
        let mut state = self.state();
        let matches = state
            .playing
            .get(&avatar)
            .is_some_and(|playing| playing.montage == montage);
        if matches {
            state.playing.remove(&avatar);
            state.queued.push((avatar, AnimationEvent::ended(montage, true)));
            debug!(%avatar, montage, "montage stopped");
        }
    }

    fn is_playing(&self, avatar: ActorId, montage: &str) -> bool {
        self.state()
            .playing
            .get(&avatar)
            .is_some_and(|playing| playing.montage == montage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERO: ActorId = ActorId::new(1);

    fn notifies(events: &[(ActorId, AnimationEvent)]) -> Vec<String> {
        events
            .iter()
            .filter_map(|(_, event)| match &event.kind {
                AnimationEventKind::NotifyBegin { notify } => Some(notify.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn notifies_fire_when_crossed() {
        let mut player = MontagePlayer::new(MontageLibrary::bundled());
        assert_eq!(player.play_montage(HERO, "Montages/Cryoseism", 1.0, None), 3.0);

        assert!(player.advance(0.4).is_empty());
        assert_eq!(notifies(&player.advance(0.2)), vec!["StartBlast"]);
        assert_eq!(
            notifies(&player.advance(1.5)),
            vec!["StartLanding", "StartRecovery"]
        );

        let tail = player.advance(1.0);
        assert!(matches!(
            tail.last().map(|(_, e)| &e.kind),
            Some(AnimationEventKind::Ended { interrupted: false })
        ));
        assert!(!player.is_playing(HERO, "Montages/Cryoseism"));
    }

    #[test]
    fn rate_scales_length() {
        let mut player = MontagePlayer::new(MontageLibrary::bundled());
        assert_eq!(player.play_montage(HERO, "Montages/Cryoseism", 2.0, None), 1.5);
        assert_eq!(notifies(&player.advance(0.25)), vec!["StartBlast"]);
    }

    #[test]
    fn unknown_montage_fails_playback() {
        let mut player = MontagePlayer::new(MontageLibrary::bundled());
        assert!(!player.resolve_montage("Montages/Missing"));
        assert_eq!(player.play_montage(HERO, "Montages/Missing", 1.0, None), 0.0);
    }

    #[test]
    fn stop_reports_interrupted_end_on_next_advance() {
        let mut player = MontagePlayer::new(MontageLibrary::bundled());
        player.play_montage(HERO, "Montages/Cryoseism", 1.0, None);
        player.stop_montage(HERO, "Montages/Cryoseism", 0.2);
        assert_eq!(player.current(HERO), None);

        let events = player.advance(0.016);
        assert_eq!(
            events,
            vec![(HERO, AnimationEvent::ended("Montages/Cryoseism", true))]
        );
    }
}
