//! Phase tables: per-phase rules and behaviors.

use std::collections::BTreeMap;
use std::fmt;

use crate::behavior::PhaseBehavior;
use crate::rule::{TransitionRule, TransitionTrigger};
use crate::tag::{GameplayTag, TagContainer, names};

/// Data attached to one phase.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhaseData {
    pub transitions: Vec<TransitionRule>,
    pub on_enter: Vec<PhaseBehavior>,
    pub on_exit: Vec<PhaseBehavior>,
    /// Other active actions carrying any of these tags are cancelled on entry.
    pub cancel_actions_with_tag: TagContainer,
    /// While current, a movement-start event interrupts the first montage task.
    pub can_animation_be_interrupted_by_movement: bool,
}

impl PhaseData {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rule(mut self, rule: TransitionRule) -> Self {
        self.transitions.push(rule);
        self
    }

    #[must_use]
    pub fn on_enter(mut self, behavior: PhaseBehavior) -> Self {
        self.on_enter.push(behavior);
        self
    }

    #[must_use]
    pub fn on_exit(mut self, behavior: PhaseBehavior) -> Self {
        self.on_exit.push(behavior);
        self
    }

    #[must_use]
    pub fn cancel_actions_with(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.cancel_actions_with_tag.add(tag.into());
        self
    }

    #[must_use]
    pub fn interruptible_by_movement(mut self) -> Self {
        self.can_animation_be_interrupted_by_movement = true;
        self
    }
}

/// Phase map of an action plus its entry phase.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhaseTable {
    pub initial_phase: GameplayTag,
    pub phases: BTreeMap<GameplayTag, PhaseData>,
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self {
            initial_phase: GameplayTag::new(names::phase::BEGIN),
            phases: BTreeMap::new(),
        }
    }
}

impl PhaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_initial(mut self, phase: impl Into<GameplayTag>) -> Self {
        self.initial_phase = phase.into();
        self
    }

    #[must_use]
    pub fn phase(mut self, tag: impl Into<GameplayTag>, data: PhaseData) -> Self {
        self.phases.insert(tag.into(), data);
        self
    }

    pub fn get(&self, phase: &GameplayTag) -> Option<&PhaseData> {
        self.phases.get(phase)
    }

    pub fn contains(&self, phase: &GameplayTag) -> bool {
        self.phases.contains_key(phase)
    }

    /// Lints the table. Problems are reported, not rejected.
    pub fn validate(&self) -> Vec<TableIssue> {
        let mut issues = Vec::new();
        if !self.contains(&self.initial_phase) {
            issues.push(TableIssue::MissingInitialPhase(self.initial_phase.clone()));
        }
        for (phase, data) in &self.phases {
            for rule in &data.transitions {
                if rule.next_phase.is_valid() && !self.contains(&rule.next_phase) {
                    issues.push(TableIssue::DanglingTarget {
                        phase: phase.clone(),
                        target: rule.next_phase.clone(),
                    });
                }
                if rule.trigger == TransitionTrigger::OnDurationEnd && rule.duration < 0.0 {
                    issues.push(TableIssue::NegativeDuration { phase: phase.clone() });
                }
            }
            let automatic = data
                .transitions
                .iter()
                .any(|r| r.trigger != TransitionTrigger::Manual);
            if !automatic && !data.on_enter.iter().any(PhaseBehavior::ends_action) {
                issues.push(TableIssue::DeadEnd(phase.clone()));
            }
        }
        issues
    }
}

/// Problems found by [`PhaseTable::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableIssue {
    MissingInitialPhase(GameplayTag),
    DanglingTarget { phase: GameplayTag, target: GameplayTag },
    NegativeDuration { phase: GameplayTag },
    /// No automatic rule leaves the phase and nothing ends the action on entry.
    DeadEnd(GameplayTag),
}

impl fmt::Display for TableIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInitialPhase(phase) => write!(f, "initial phase '{phase}' is not defined"),
            Self::DanglingTarget { phase, target } => {
                write!(f, "phase '{phase}' targets undefined phase '{target}'")
            }
            Self::NegativeDuration { phase } => {
                write!(f, "phase '{phase}' has a negative duration rule")
            }
            Self::DeadEnd(phase) => write!(f, "phase '{phase}' has no way to progress"),
        }
    }
}

/// Replicated phase history entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseInfo {
    pub phase: GameplayTag,
    /// Number of phase entries since activation.
    pub counter: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKind;

    #[test]
    fn validate_reports_issues_without_rejecting() {
        let table = PhaseTable::new()
            .phase(
                names::phase::BEGIN,
                PhaseData::new().rule(TransitionRule::on_duration_end(1.0, "Phase.Missing")),
            )
            .phase("Phase.Stuck", PhaseData::new().rule(TransitionRule::manual(names::phase::BEGIN)))
            .phase(
                names::phase::END,
                PhaseData::new().on_enter(PhaseBehavior::new(BehaviorKind::EndAction { cancelled: false })),
            );

        let issues = table.validate();
        assert_eq!(issues.len(), 2);
        assert!(issues.contains(&TableIssue::DanglingTarget {
            phase: names::phase::BEGIN.into(),
            target: "Phase.Missing".into(),
        }));
        assert!(issues.contains(&TableIssue::DeadEnd("Phase.Stuck".into())));
    }

    #[test]
    fn missing_initial_phase_is_reported() {
        let table = PhaseTable::new().with_initial("Phase.Nowhere");
        assert_eq!(
            table.validate(),
            vec![TableIssue::MissingInitialPhase("Phase.Nowhere".into())]
        );
    }
}
