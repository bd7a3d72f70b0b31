//! Common error infrastructure for action-core.
//!
//! Errors raised inside phase or task logic never reach the caller of a
//! signal. The engine classifies them, logs them and ends the instance when
//! the severity demands it. Only activation requests return errors directly,
//! as [`ActivationFailure`].
//!
//! # Severity mapping
//!
//! - **Fatal**: the instance cannot continue (missing avatar, undefined phase)
//!   and is ended.
//! - **Recoverable**: the signal is dropped and the action keeps running.
//! - **Validation**: a request is rejected without touching state.
//! - **Internal**: a bookkeeping inconsistency worth investigating.

use crate::handle::{ActionSpecHandle, TaskId};
use crate::tag::{GameplayTag, TagContainer};

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Recoverable error - the action keeps running.
    ///
    /// Examples: unmatched signal, stale timer
    Recoverable,

    /// Validation error - invalid request, rejected without side effects.
    ///
    /// Examples: activation blocked by tags, unknown spec handle
    Validation,

    /// Internal error - unexpected bookkeeping inconsistency.
    ///
    /// Examples: task slot vanished mid-callback
    Internal,

    /// Fatal error - the instance cannot continue and must end.
    ///
    /// Examples: missing avatar, Immediate transition cycle
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if the owning instance has to end.
    pub const fn ends_instance(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// Common trait for all action-core errors.
///
/// # Implementation Guidelines
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
/// - Error codes are stable snake_case strings used in logs and events
pub trait ClassifiedError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a stable error code for logging and telemetry.
    fn error_code(&self) -> &'static str;
}

/// Errors raised while an instance runs its phases and tasks.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionError {
    #[error("action '{action}' has no avatar")]
    MissingAvatar { action: String },

    #[error("action '{action}' has no phase '{phase}'")]
    UndefinedPhase { action: String, phase: GameplayTag },

    #[error("action '{action}' has no level data for level {level}")]
    MissingLevelData { action: String, level: u32 },

    #[error("action '{action}' could not resolve {resource}")]
    ResourceUnavailable { action: String, resource: String },

    #[error("action '{action}' re-entered phase '{phase}' within one transition chain")]
    PhaseCycle { action: String, phase: GameplayTag },

    #[error("action '{action}' exceeded the phase chain limit of {limit}")]
    PhaseChainTooDeep { action: String, limit: usize },

    #[error("action '{action}' is not instanced and cannot run tasks")]
    TasksRequireInstance { action: String },

    #[error("action '{action}' is not executing")]
    ActionNotExecuting { action: String },

    #[error("action '{action}' is already executing")]
    AlreadyExecuting { action: String },

    #[error("task {task:?} does not belong to action '{action}'")]
    TaskNotFound { action: String, task: TaskId },
}

impl ClassifiedError for ActionError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::MissingAvatar { .. }
            | Self::UndefinedPhase { .. }
            | Self::MissingLevelData { .. }
            | Self::ResourceUnavailable { .. }
            | Self::PhaseCycle { .. }
            | Self::PhaseChainTooDeep { .. } => ErrorSeverity::Fatal,
            Self::TasksRequireInstance { .. }
            | Self::ActionNotExecuting { .. }
            | Self::AlreadyExecuting { .. } => ErrorSeverity::Validation,
            Self::TaskNotFound { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingAvatar { .. } => "missing_avatar",
            Self::UndefinedPhase { .. } => "undefined_phase",
            Self::MissingLevelData { .. } => "missing_level_data",
            Self::ResourceUnavailable { .. } => "resource_unavailable",
            Self::PhaseCycle { .. } => "phase_cycle",
            Self::PhaseChainTooDeep { .. } => "phase_chain_too_deep",
            Self::TasksRequireInstance { .. } => "tasks_require_instance",
            Self::ActionNotExecuting { .. } => "action_not_executing",
            Self::AlreadyExecuting { .. } => "already_executing",
            Self::TaskNotFound { .. } => "task_not_found",
        }
    }
}

/// Reasons an activation request is refused.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationFailure {
    #[error("no granted action with handle {0:?}")]
    SpecNotFound(ActionSpecHandle),

    #[error("activation blocked by owner tags {tags}")]
    Blocked { tags: TagContainer },

    #[error("owner is missing required tags {tags}")]
    MissingRequired { tags: TagContainer },

    #[error("cannot afford activation cost")]
    InsufficientResources,

    #[error("cooldown '{tag}' is active")]
    OnCooldown { tag: GameplayTag },

    #[error("action is already active")]
    AlreadyActive,

    #[error("a predicted activation is awaiting confirmation")]
    PredictionPending,

    #[error("action system has no owner actor")]
    NoOwner,

    #[error("role {role} may not execute this action")]
    NetPolicy { role: crate::net::NetRole },

    #[error("instance refused to execute: {0}")]
    ExecuteRefused(ActionError),
}

impl ClassifiedError for ActivationFailure {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SpecNotFound(_)
            | Self::NoOwner
            | Self::NetPolicy { .. }
            | Self::ExecuteRefused(_) => ErrorSeverity::Validation,
            _ => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::SpecNotFound(_) => "spec_not_found",
            Self::Blocked { .. } => "blocked",
            Self::MissingRequired { .. } => "missing_required",
            Self::InsufficientResources => "insufficient_resources",
            Self::OnCooldown { .. } => "on_cooldown",
            Self::AlreadyActive => "already_active",
            Self::PredictionPending => "prediction_pending",
            Self::NoOwner => "no_owner",
            Self::NetPolicy { .. } => "net_policy",
            Self::ExecuteRefused(_) => "execute_refused",
        }
    }
}
