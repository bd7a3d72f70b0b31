//! Declarative transition rules.

use strum::{Display, EnumIter};

use crate::condition::{Condition, ConditionContext, check_all};
use crate::payload::ContextPayload;
use crate::tag::GameplayTag;

/// What makes a rule fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitionTrigger {
    /// A task of this action posted an event with the rule's tag.
    OnTaskEvent,
    /// A gameplay-wide event with the rule's tag reached the owner.
    OnGameplayEvent,
    /// The phase has been current for `duration` seconds. Conditions are ignored.
    OnDurationEnd,
    /// Fires on phase entry before any external signal.
    Immediate,
    /// Never fires on its own; documents a transition made from code.
    Manual,
}

/// One potential phase change out of a source phase.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransitionRule {
    pub trigger: TransitionTrigger,
    #[cfg_attr(feature = "serde", serde(default))]
    pub event_tag: Option<GameplayTag>,
    /// Seconds after phase entry, for `OnDurationEnd`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub conditions: Vec<Condition>,
    pub next_phase: GameplayTag,
}

impl TransitionRule {
    fn new(trigger: TransitionTrigger, next_phase: impl Into<GameplayTag>) -> Self {
        Self {
            trigger,
            event_tag: None,
            duration: 0.0,
            conditions: Vec::new(),
            next_phase: next_phase.into(),
        }
    }

    pub fn on_task_event(event: impl Into<GameplayTag>, next_phase: impl Into<GameplayTag>) -> Self {
        Self {
            event_tag: Some(event.into()),
            ..Self::new(TransitionTrigger::OnTaskEvent, next_phase)
        }
    }

    pub fn on_gameplay_event(
        event: impl Into<GameplayTag>,
        next_phase: impl Into<GameplayTag>,
    ) -> Self {
        Self {
            event_tag: Some(event.into()),
            ..Self::new(TransitionTrigger::OnGameplayEvent, next_phase)
        }
    }

    pub fn on_duration_end(duration: f32, next_phase: impl Into<GameplayTag>) -> Self {
        Self {
            duration,
            ..Self::new(TransitionTrigger::OnDurationEnd, next_phase)
        }
    }

    pub fn immediate(next_phase: impl Into<GameplayTag>) -> Self {
        Self::new(TransitionTrigger::Immediate, next_phase)
    }

    pub fn manual(next_phase: impl Into<GameplayTag>) -> Self {
        Self::new(TransitionTrigger::Manual, next_phase)
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Rules without a usable destination are skipped by the engine.
    pub fn is_usable(&self) -> bool {
        self.next_phase.is_valid()
    }

    /// Does this rule accept `signal` (trigger, tag and conditions)?
    pub fn accepts(&self, signal: &TransitionSignal<'_>, index: usize, ctx: &ConditionContext<'_>) -> bool {
        if !self.is_usable() {
            return false;
        }
        match signal {
            TransitionSignal::TaskEvent { tag, .. } => {
                self.trigger == TransitionTrigger::OnTaskEvent
                    && self.event_tag.as_ref() == Some(*tag)
                    && check_all(&self.conditions, ctx)
            }
            TransitionSignal::GameplayEvent { tag, .. } => {
                self.trigger == TransitionTrigger::OnGameplayEvent
                    && self.event_tag.as_ref() == Some(*tag)
                    && check_all(&self.conditions, ctx)
            }
            TransitionSignal::DurationElapsed { rule_index } => {
                self.trigger == TransitionTrigger::OnDurationEnd && *rule_index == index
            }
        }
    }
}

/// A signal offered to the current phase's rules.
#[derive(Clone, Copy, Debug)]
pub enum TransitionSignal<'a> {
    TaskEvent {
        tag: &'a GameplayTag,
        payload: &'a ContextPayload,
    },
    GameplayEvent {
        tag: &'a GameplayTag,
        payload: &'a ContextPayload,
    },
    /// The duration timer armed for rule `rule_index` of the current phase.
    DurationElapsed { rule_index: usize },
}

impl TransitionSignal<'_> {
    pub fn trigger(&self) -> TransitionTrigger {
        match self {
            Self::TaskEvent { .. } => TransitionTrigger::OnTaskEvent,
            Self::GameplayEvent { .. } => TransitionTrigger::OnGameplayEvent,
            Self::DurationElapsed { .. } => TransitionTrigger::OnDurationEnd,
        }
    }

    pub fn payload(&self) -> Option<&ContextPayload> {
        match self {
            Self::TaskEvent { payload, .. } | Self::GameplayEvent { payload, .. } => Some(payload),
            Self::DurationElapsed { .. } => None,
        }
    }
}

/// Result of offering a signal to an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// A rule fired and the instance moved to `to`.
    Transitioned { from: GameplayTag, to: GameplayTag },
    /// No rule of the current phase accepted the signal.
    Unmatched,
    /// The instance was not in a state to evaluate signals.
    Ignored,
}

impl TransitionOutcome {
    pub fn transitioned(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }
}

/// Index of the first rule accepting `signal`, in registration order.
pub fn first_match<'r>(
    rules: impl IntoIterator<Item = &'r TransitionRule>,
    signal: &TransitionSignal<'_>,
    ctx: &ConditionContext<'_>,
) -> Option<(usize, &'r TransitionRule)> {
    rules
        .into_iter()
        .enumerate()
        .find(|(index, rule)| rule.accepts(signal, *index, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagCountContainer;

    #[test]
    fn first_registered_rule_wins() {
        let rules = [
            TransitionRule::on_task_event("Task.Event.Montage.NotifyBegin", "First"),
            TransitionRule::on_task_event("Task.Event.Montage.NotifyBegin", "Second"),
        ];
        let tags = TagCountContainer::new();
        let phase = GameplayTag::new("Phase.Action.Begin");
        let payload = ContextPayload::notify("X");
        let tag = GameplayTag::new("Task.Event.Montage.NotifyBegin");
        let ctx = ConditionContext {
            payload: &payload,
            owner_tags: &tags,
            phase: &phase,
            action_name: "T",
        };
        let signal = TransitionSignal::TaskEvent { tag: &tag, payload: &payload };

        let (index, rule) = first_match(&rules, &signal, &ctx).expect("rule");
        assert_eq!(index, 0);
        assert_eq!(rule.next_phase, "First");
    }

    #[test]
    fn event_tags_match_exactly() {
        let rules = [TransitionRule::on_gameplay_event("Event.Hit", "Stagger")];
        let tags = TagCountContainer::new();
        let phase = GameplayTag::new("Phase.Action.Begin");
        let payload = ContextPayload::new();
        let ctx = ConditionContext {
            payload: &payload,
            owner_tags: &tags,
            phase: &phase,
            action_name: "T",
        };

        let child = GameplayTag::new("Event.Hit.Critical");
        let signal = TransitionSignal::GameplayEvent { tag: &child, payload: &payload };
        assert!(first_match(&rules, &signal, &ctx).is_none());

        let exact = GameplayTag::new("Event.Hit");
        let signal = TransitionSignal::GameplayEvent { tag: &exact, payload: &payload };
        assert!(first_match(&rules, &signal, &ctx).is_some());
    }

    #[test]
    fn duration_signal_only_fires_its_rule() {
        let rules = [
            TransitionRule::on_duration_end(1.0, "A"),
            TransitionRule::on_duration_end(2.0, "B").with_condition(Condition::notify_name("never")),
        ];
        let tags = TagCountContainer::new();
        let phase = GameplayTag::new("P");
        let payload = ContextPayload::new();
        let ctx = ConditionContext {
            payload: &payload,
            owner_tags: &tags,
            phase: &phase,
            action_name: "T",
        };

        let (index, rule) =
            first_match(&rules, &TransitionSignal::DurationElapsed { rule_index: 1 }, &ctx)
                .expect("rule");
        assert_eq!(index, 1);
        assert_eq!(rule.next_phase, "B");
    }

    #[test]
    fn empty_destination_and_manual_rules_never_match() {
        let rules = [
            TransitionRule::on_gameplay_event("Event.X", GameplayTag::empty()),
            TransitionRule::manual("Somewhere"),
        ];
        let tags = TagCountContainer::new();
        let phase = GameplayTag::new("P");
        let payload = ContextPayload::new();
        let tag = GameplayTag::new("Event.X");
        let ctx = ConditionContext {
            payload: &payload,
            owner_tags: &tags,
            phase: &phase,
            action_name: "T",
        };
        let signal = TransitionSignal::GameplayEvent { tag: &tag, payload: &payload };
        assert!(first_match(&rules, &signal, &ctx).is_none());
    }
}
