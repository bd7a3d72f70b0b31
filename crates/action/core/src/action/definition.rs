use std::collections::BTreeMap;

use strum::{Display, EnumIter};

use crate::phase::PhaseTable;
use crate::tag::{GameplayTag, TagContainer};

/// Whether activations share one instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstancingPolicy {
    /// No per-activation state: the entry phase chain runs and the action
    /// ends in the same call. Tasks are refused.
    NonInstanced,
    /// One instance per granted spec, reused across activations.
    #[default]
    InstancedPerActor,
    /// A fresh instance for every activation.
    InstancedPerExecution,
}

/// What activates a granted action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationPolicy {
    #[default]
    OnInputTriggered,
    /// Activates on press, cancelled on release.
    WhileInputActive,
    OnSpawn,
    OnGrant,
    /// Activates on grant; the spec is removed when that activation ends.
    OnGrantAndRemove,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CooldownSpec {
    pub tag: GameplayTag,
    /// Seconds.
    pub duration: f32,
}

/// Per-level named parameters (`level -> name -> value`).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LevelTable {
    rows: BTreeMap<u32, BTreeMap<String, f32>>,
}

impl LevelTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_row<K: Into<String>>(
        mut self,
        level: u32,
        values: impl IntoIterator<Item = (K, f32)>,
    ) -> Self {
        self.rows.insert(
            level,
            values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        );
        self
    }

    pub fn row(&self, level: u32) -> Option<&BTreeMap<String, f32>> {
        self.rows.get(&level)
    }

    pub fn value(&self, level: u32, key: &str) -> Option<f32> {
        self.row(level)?.get(key).copied()
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Static description of an action, usually loaded from data.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionDefinition {
    pub name: String,
    /// Added to the owner while the action is active.
    #[cfg_attr(feature = "serde", serde(default))]
    pub identifier_tag: GameplayTag,
    #[cfg_attr(feature = "serde", serde(default))]
    pub instancing_policy: InstancingPolicy,
    #[cfg_attr(feature = "serde", serde(default))]
    pub activation_policy: ActivationPolicy,
    /// Tags describing the action, matched by cancel-by-tag requests.
    #[cfg_attr(feature = "serde", serde(default))]
    pub action_tags: TagContainer,
    #[cfg_attr(feature = "serde", serde(default))]
    pub activation_blocked_tags: TagContainer,
    #[cfg_attr(feature = "serde", serde(default))]
    pub activation_required_tags: TagContainer,
    /// Gameplay events that activate the action.
    #[cfg_attr(feature = "serde", serde(default))]
    pub event_trigger_tags: TagContainer,
    /// Task events an autonomous proxy forwards to the server instead of
    /// evaluating locally.
    #[cfg_attr(feature = "serde", serde(default))]
    pub replicated_event_tags: TagContainer,
    #[cfg_attr(feature = "serde", serde(default))]
    pub cooldown: Option<CooldownSpec>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub apply_cooldown_on_start: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub phases: PhaseTable,
    #[cfg_attr(feature = "serde", serde(default))]
    pub level_table: Option<LevelTable>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier_tag: GameplayTag::empty(),
            instancing_policy: InstancingPolicy::default(),
            activation_policy: ActivationPolicy::default(),
            action_tags: TagContainer::new(),
            activation_blocked_tags: TagContainer::new(),
            activation_required_tags: TagContainer::new(),
            event_trigger_tags: TagContainer::new(),
            replicated_event_tags: TagContainer::new(),
            cooldown: None,
            apply_cooldown_on_start: false,
            phases: PhaseTable::default(),
            level_table: None,
        }
    }

    #[must_use]
    pub fn with_phases(mut self, phases: PhaseTable) -> Self {
        self.phases = phases;
        self
    }

    #[must_use]
    pub fn with_identifier(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.identifier_tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_instancing(mut self, policy: InstancingPolicy) -> Self {
        self.instancing_policy = policy;
        self
    }

    #[must_use]
    pub fn with_activation(mut self, policy: ActivationPolicy) -> Self {
        self.activation_policy = policy;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, tag: impl Into<GameplayTag>, duration: f32) -> Self {
        self.cooldown = Some(CooldownSpec {
            tag: tag.into(),
            duration,
        });
        self
    }

    #[must_use]
    pub fn with_level_table(mut self, table: LevelTable) -> Self {
        self.level_table = Some(table);
        self
    }
}
