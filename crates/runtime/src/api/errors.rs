//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, actor lookup, activation, and
//! replication so clients can bubble them up with consistent context.
use std::path::PathBuf;

use action_core::{ActivationFailure, ActorId, ActionSpecHandle};
use thiserror::Error;
use tokio::sync::oneshot;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("runtime requires an action catalog before building")]
    MissingCatalog,

    #[error("actor {0} is not spawned")]
    UnknownActor(ActorId),

    #[error("actor {0} is already spawned")]
    ActorExists(ActorId),

    #[error("action '{0}' is not in the catalog")]
    UnknownAction(String),

    #[error("{spec} on {actor} has no active action")]
    NotActive {
        actor: ActorId,
        spec: ActionSpecHandle,
    },

    #[error("activation refused on {actor}")]
    Activation {
        actor: ActorId,
        #[source]
        reason: ActivationFailure,
    },

    #[error("replication message could not be encoded or decoded")]
    Codec(#[from] bincode::Error),

    #[error("replication sink rejected a message: {0}")]
    Sink(String),

    #[error("event log {path} failed")]
    EventLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("event could not be serialized")]
    Json(#[from] serde_json::Error),
}
