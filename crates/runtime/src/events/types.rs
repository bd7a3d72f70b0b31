//! Event types for different topics.

use std::time::Duration;

use action_core::{
    ActionSpecHandle, ActionSystemEvent, ActiveActionHandle, ActorId, GameplayTag,
    ReplicationMessage,
};
use serde::{Deserialize, Serialize};

/// Activation bookkeeping on one actor (activated, failed, task and action
/// endings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub actor: ActorId,
    /// Simulated time of the actor when the batch was drained.
    pub at: Duration,
    pub event: ActionSystemEvent,
}

/// A phase entered by an active action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub actor: ActorId,
    pub action: ActiveActionHandle,
    pub spec: ActionSpecHandle,
    pub name: String,
    pub from: Option<GameplayTag>,
    pub to: GameplayTag,
    pub counter: u32,
    pub at: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// A replication message leaving or entering an actor's component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationEvent {
    pub actor: ActorId,
    pub direction: Direction,
    pub message: ReplicationMessage,
}
