//! Topic-based event bus implementation.

use std::collections::HashMap;
use std::time::Duration;

use action_core::{ActionSystemEvent, ActorId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{ActionEvent, Direction, PhaseEvent, ReplicationEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Activations, failures, task and action endings
    Action,
    /// Phase transitions
    Phase,
    /// Messages exchanged with the remote peer
    Replication,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Action(ActionEvent),
    Phase(PhaseEvent),
    Replication(ReplicationEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Action(_) => Topic::Action,
            Event::Phase(_) => Topic::Phase,
            Event::Replication(_) => Topic::Replication,
        }
    }

    pub fn actor(&self) -> ActorId {
        match self {
            Event::Action(event) => event.actor,
            Event::Phase(event) => event.actor,
            Event::Replication(event) => event.actor,
        }
    }

    /// Routes one drained component event to its topic.
    pub fn from_component(actor: ActorId, at: Duration, event: ActionSystemEvent) -> Self {
        match event {
            ActionSystemEvent::PhaseChanged {
                action,
                spec,
                name,
                from,
                to,
                info,
                at,
            } => Event::Phase(PhaseEvent {
                actor,
                action,
                spec,
                name,
                from,
                to,
                counter: info.counter,
                at,
            }),
            ActionSystemEvent::Replication(message) => Event::Replication(ReplicationEvent {
                actor,
                direction: Direction::Outbound,
                message,
            }),
            event => Event::Action(ActionEvent { actor, at, event }),
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Publishing is best-effort: events sent while a
/// topic has no subscribers are dropped.
#[derive(Clone)]
pub struct EventBus {
    action: broadcast::Sender<Event>,
    phase: broadcast::Sender<Event>,
    replication: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            action: broadcast::channel(capacity).0,
            phase: broadcast::channel(capacity).0,
            replication: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Action => &self.action,
            Topic::Phase => &self.phase,
            Topic::Replication => &self.replication,
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
