use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{ActionDefinition, PhaseContext};
use crate::phase::{PhaseData, TableIssue};
use crate::rule::TransitionRule;
use crate::tag::GameplayTag;

/// Code-side extension points of an action.
///
/// Every hook receives the same [`PhaseContext`] phase behaviors use, so code
/// can do anything data can plus arbitrary logic. Gameplay-state mutations
/// belong behind `ctx.has_authority()`.
pub trait ActionHooks: Send {
    /// After activation bookkeeping, before the initial phase is entered.
    fn on_activate(&mut self, _ctx: &mut PhaseContext<'_, '_>) {}

    /// After the phase's on-enter behaviors ran.
    fn on_phase_enter(&mut self, _phase: &GameplayTag, _ctx: &mut PhaseContext<'_, '_>) {}

    /// After the phase's on-exit behaviors ran.
    fn on_phase_exit(&mut self, _phase: &GameplayTag, _ctx: &mut PhaseContext<'_, '_>) {}

    /// Before remaining tasks are force-ended.
    fn on_action_end(&mut self, _cancelled: bool, _ctx: &mut PhaseContext<'_, '_>) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl ActionHooks for NoHooks {}

type HookFactory = Arc<dyn Fn() -> Box<dyn ActionHooks> + Send + Sync>;

/// Read-only class-level description shared by every instance of an action.
///
/// The effective rule list of a phase is its data rules followed by the
/// code rules registered here for that phase.
#[derive(Clone)]
pub struct ActionTemplate {
    definition: ActionDefinition,
    code_rules: BTreeMap<GameplayTag, Vec<TransitionRule>>,
    hooks: HookFactory,
}

impl ActionTemplate {
    pub fn new(definition: ActionDefinition) -> Self {
        Self {
            definition,
            code_rules: BTreeMap::new(),
            hooks: Arc::new(|| Box::new(NoHooks)),
        }
    }

    /// Registers a code-defined rule after the data rules of `phase`.
    #[must_use]
    pub fn with_rule(mut self, phase: impl Into<GameplayTag>, rule: TransitionRule) -> Self {
        self.code_rules.entry(phase.into()).or_default().push(rule);
        self
    }

    /// Installs a hook factory; each instance gets its own hooks value.
    #[must_use]
    pub fn with_hooks<H, F>(mut self, factory: F) -> Self
    where
        H: ActionHooks + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.hooks = Arc::new(move || Box::new(factory()));
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    pub fn initial_phase(&self) -> &GameplayTag {
        &self.definition.phases.initial_phase
    }

    pub fn phase(&self, phase: &GameplayTag) -> Option<&PhaseData> {
        self.definition.phases.get(phase)
    }

    /// A phase exists if it has data or code rules.
    pub fn has_phase(&self, phase: &GameplayTag) -> bool {
        self.definition.phases.contains(phase) || self.code_rules.contains_key(phase)
    }

    pub fn rules_for<'a>(
        &'a self,
        phase: &GameplayTag,
    ) -> impl Iterator<Item = &'a TransitionRule> + use<'a> {
        let data = self
            .phase(phase)
            .map(|p| p.transitions.as_slice())
            .unwrap_or_default();
        let code = self
            .code_rules
            .get(phase)
            .map(Vec::as_slice)
            .unwrap_or_default();
        data.iter().chain(code.iter())
    }

    pub fn rule_at(&self, phase: &GameplayTag, index: usize) -> Option<&TransitionRule> {
        self.rules_for(phase).nth(index)
    }

    pub(crate) fn make_hooks(&self) -> Box<dyn ActionHooks> {
        (self.hooks)()
    }

    /// Lints the phase table together with code rules.
    pub fn validate(&self) -> Vec<TableIssue> {
        let mut issues: Vec<TableIssue> = self
            .definition
            .phases
            .validate()
            .into_iter()
            .filter(|issue| match issue {
                TableIssue::DeadEnd(phase) => !self.code_rules.contains_key(phase),
                TableIssue::MissingInitialPhase(phase) => !self.has_phase(phase),
                TableIssue::DanglingTarget { target, .. } => !self.has_phase(target),
                TableIssue::NegativeDuration { .. } => true,
            })
            .collect();
        for (phase, rules) in &self.code_rules {
            for rule in rules {
                if rule.next_phase.is_valid() && !self.has_phase(&rule.next_phase) {
                    issues.push(TableIssue::DanglingTarget {
                        phase: phase.clone(),
                        target: rule.next_phase.clone(),
                    });
                }
            }
        }
        issues
    }

    /// SHA-256 of the serialized definition, so peers can check they run
    /// identical phase tables. `None` if the definition holds custom
    /// conditions that cannot be serialized.
    #[cfg(feature = "serde")]
    pub fn fingerprint(&self) -> Option<[u8; 32]> {
        use sha2::{Digest, Sha256};

        let bytes = bincode::serialize(&self.definition).ok()?;
        Some(Sha256::digest(&bytes).into())
    }
}

impl fmt::Debug for ActionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTemplate")
            .field("name", &self.definition.name)
            .field("phases", &self.definition.phases.phases.len())
            .field("code_rules", &self.code_rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseTable;
    use crate::tag::names::phase;

    #[test]
    fn data_rules_precede_code_rules() {
        let table = PhaseTable::new().phase(
            phase::BEGIN,
            PhaseData::new().rule(TransitionRule::on_duration_end(1.0, phase::EXECUTE)),
        );
        let template = ActionTemplate::new(ActionDefinition::new("Order").with_phases(table))
            .with_rule(phase::BEGIN, TransitionRule::immediate(phase::END))
            .with_rule(phase::EXECUTE, TransitionRule::immediate(phase::END));

        let targets: Vec<_> = template
            .rules_for(&phase::BEGIN.into())
            .map(|r| r.next_phase.as_str().to_string())
            .collect();
        assert_eq!(targets, [phase::EXECUTE, phase::END]);
        assert!(template.has_phase(&phase::EXECUTE.into()));
        assert_eq!(
            template.rule_at(&phase::BEGIN.into(), 1).map(|r| r.next_phase.clone()),
            Some(phase::END.into())
        );
    }

    #[test]
    fn code_rules_satisfy_validation() {
        let table = PhaseTable::new().phase(
            phase::BEGIN,
            PhaseData::new().rule(TransitionRule::on_duration_end(1.0, phase::END)),
        );
        let bare = ActionTemplate::new(ActionDefinition::new("Lint").with_phases(table));
        assert_eq!(bare.validate().len(), 1);

        let patched = bare.with_rule(phase::END, TransitionRule::immediate(phase::BEGIN));
        assert!(patched.validate().is_empty());
    }
}
