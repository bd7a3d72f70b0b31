use std::time::Duration;

use crate::error::ActivationFailure;
use crate::handle::{ActionSpecHandle, ActiveActionHandle, PredictionKey, TaskId};
use crate::payload::ContextPayload;
use crate::phase::PhaseInfo;
use crate::tag::GameplayTag;

/// Observable outcome of component work, drained by the host.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionSystemEvent {
    ActionActivated {
        action: ActiveActionHandle,
        spec: ActionSpecHandle,
        name: String,
        prediction: Option<PredictionKey>,
    },
    ActionFailed {
        spec: ActionSpecHandle,
        name: String,
        reason: ActivationFailure,
    },
    PhaseChanged {
        action: ActiveActionHandle,
        spec: ActionSpecHandle,
        name: String,
        from: Option<GameplayTag>,
        to: GameplayTag,
        info: PhaseInfo,
        at: Duration,
    },
    TaskEnded {
        action: ActiveActionHandle,
        task: TaskId,
        name: String,
        cancelled: bool,
    },
    ActionEnded {
        action: ActiveActionHandle,
        spec: ActionSpecHandle,
        name: String,
        cancelled: bool,
    },
    /// Outbound message for the remote peer.
    Replication(ReplicationMessage),
}

impl ActionSystemEvent {
    /// Active action the event concerns, if any.
    pub fn action(&self) -> Option<ActiveActionHandle> {
        match self {
            Self::ActionActivated { action, .. }
            | Self::PhaseChanged { action, .. }
            | Self::TaskEnded { action, .. }
            | Self::ActionEnded { action, .. } => Some(*action),
            Self::ActionFailed { .. } | Self::Replication(_) => None,
        }
    }

    pub fn is_replication(&self) -> bool {
        matches!(self, Self::Replication(_))
    }
}

/// Messages exchanged between an autonomous proxy and the authority.
///
/// Actions are addressed by spec handle: both peers grant specs in the same
/// order, so handles line up while active-action handles do not.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplicationMessage {
    /// Client asks the server to run a predicted activation.
    ExecuteRequest {
        spec: ActionSpecHandle,
        prediction: PredictionKey,
        payload: ContextPayload,
    },
    /// Task event the client forwards instead of evaluating.
    TaskEvent {
        spec: ActionSpecHandle,
        tag: GameplayTag,
        payload: ContextPayload,
    },
    /// Authoritative phase of an active action.
    PhaseInfo {
        spec: ActionSpecHandle,
        info: PhaseInfo,
    },
    /// Server verdict on a predicted activation.
    PredictionResult {
        spec: ActionSpecHandle,
        key: PredictionKey,
        accepted: bool,
    },
}

impl ReplicationMessage {
    pub fn spec(&self) -> ActionSpecHandle {
        match self {
            Self::ExecuteRequest { spec, .. }
            | Self::TaskEvent { spec, .. }
            | Self::PhaseInfo { spec, .. }
            | Self::PredictionResult { spec, .. } => *spec,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecuteRequest { .. } => "execute_request",
            Self::TaskEvent { .. } => "task_event",
            Self::PhaseInfo { .. } => "phase_info",
            Self::PredictionResult { .. } => "prediction_result",
        }
    }

    /// Wire encoding used between peers.
    #[cfg(feature = "serde")]
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    #[cfg(feature = "serde")]
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
