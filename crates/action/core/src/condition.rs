//! Guard predicates attached to transition rules.

use std::fmt;
use std::sync::Arc;

use crate::payload::{ContextPayload, keys};
use crate::tag::{GameplayTag, TagCountContainer};

/// Everything a condition may look at when a rule is evaluated.
#[derive(Clone, Copy, Debug)]
pub struct ConditionContext<'a> {
    /// Payload of the triggering signal (empty for timer signals).
    pub payload: &'a ContextPayload,
    pub owner_tags: &'a TagCountContainer,
    pub phase: &'a GameplayTag,
    pub action_name: &'a str,
}

/// Extension point for predicates the built-in variants do not cover.
pub trait PhaseCondition: Send + Sync + fmt::Debug {
    fn check(&self, ctx: &ConditionContext<'_>) -> bool;

    fn name(&self) -> &str {
        "custom"
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    /// Payload `NotifyName` equals the given name.
    NotifyNameEquals(String),
    /// Payload `PathData` holds at least this many points.
    PathHasMinPoints(usize),
    /// Owner currently has the tag (hierarchical).
    HasOwnerTag(GameplayTag),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(Arc<dyn PhaseCondition>),
}

impl Condition {
    pub fn notify_name(name: impl Into<String>) -> Self {
        Self::NotifyNameEquals(name.into())
    }

    pub fn custom(condition: impl PhaseCondition + 'static) -> Self {
        Self::Custom(Arc::new(condition))
    }

    pub fn check(&self, ctx: &ConditionContext<'_>) -> bool {
        match self {
            Self::NotifyNameEquals(name) => ctx.payload.notify_name() == Some(name.as_str()),
            Self::PathHasMinPoints(min) => ctx
                .payload
                .path(keys::PATH_DATA)
                .is_some_and(|points| points.len() >= *min),
            Self::HasOwnerTag(tag) => ctx.owner_tags.has_matching_tag(tag),
            Self::All(all) => all.iter().all(|c| c.check(ctx)),
            Self::Any(any) => any.iter().any(|c| c.check(ctx)),
            Self::Not(inner) => !inner.check(ctx),
            Self::Custom(custom) => custom.check(ctx),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::NotifyNameEquals(name) => format!("NotifyName == {name}"),
            Self::PathHasMinPoints(min) => format!("PathData >= {min}"),
            Self::HasOwnerTag(tag) => format!("OwnerHas {tag}"),
            Self::All(all) => format!("All({})", all.len()),
            Self::Any(any) => format!("Any({})", any.len()),
            Self::Not(inner) => format!("Not({})", inner.label()),
            Self::Custom(custom) => custom.name().to_string(),
        }
    }
}

/// Evaluates `conditions` in order, stopping at the first failure.
pub fn check_all(conditions: &[Condition], ctx: &ConditionContext<'_>) -> bool {
    conditions.iter().all(|c| c.check(ctx))
}
