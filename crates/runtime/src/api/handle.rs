//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! driving actors or streaming events from specific topics.
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use action_core::{
    ActionSpecHandle, ActiveActionHandle, ActorId, ContextPayload, GameplayTag, NetRole, Vec3,
};

use super::errors::{Result, RuntimeError};
use super::replication::ReplicationPacket;
use super::snapshot::ActorSnapshot;
use crate::events::{Event, EventBus, Topic};
use crate::workers::Command;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    /// Sends a command built around a fresh reply channel and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Spawn an actor on the ground at `location` with the runtime's net role.
    pub async fn spawn_actor(&self, actor: ActorId, location: Vec3) -> Result<()> {
        self.request(|reply| Command::SpawnActor {
            actor,
            role: None,
            location,
            reply,
        })
        .await
    }

    /// Spawn an actor with an explicit net role.
    pub async fn spawn_actor_as(&self, actor: ActorId, role: NetRole, location: Vec3) -> Result<()> {
        self.request(|reply| Command::SpawnActor {
            actor,
            role: Some(role),
            location,
            reply,
        })
        .await
    }

    /// Grant the catalog action `name` at `level`, optionally bound to an input.
    pub async fn grant_action(
        &self,
        actor: ActorId,
        name: impl Into<String>,
        level: u32,
        input: Option<GameplayTag>,
    ) -> Result<ActionSpecHandle> {
        let name = name.into();
        self.request(|reply| Command::GrantAction {
            actor,
            name,
            level,
            input,
            reply,
        })
        .await
    }

    pub async fn execute_action(
        &self,
        actor: ActorId,
        spec: ActionSpecHandle,
    ) -> Result<ActiveActionHandle> {
        self.request(|reply| Command::ExecuteAction {
            actor,
            spec,
            payload: None,
            reply,
        })
        .await
    }

    /// Execute with a trigger payload merged into the action payload.
    pub async fn execute_action_with(
        &self,
        actor: ActorId,
        spec: ActionSpecHandle,
        payload: ContextPayload,
    ) -> Result<ActiveActionHandle> {
        self.request(|reply| Command::ExecuteAction {
            actor,
            spec,
            payload: Some(payload),
            reply,
        })
        .await
    }

    pub async fn cancel_action(&self, actor: ActorId, spec: ActionSpecHandle) -> Result<()> {
        self.request(|reply| Command::CancelAction { actor, spec, reply })
            .await
    }

    pub async fn gameplay_event(
        &self,
        actor: ActorId,
        tag: impl Into<GameplayTag>,
        payload: ContextPayload,
    ) -> Result<()> {
        let tag = tag.into();
        self.request(|reply| Command::GameplayEvent {
            actor,
            tag,
            payload,
            reply,
        })
        .await
    }

    pub async fn input_pressed(&self, actor: ActorId, input: impl Into<GameplayTag>) -> Result<()> {
        let input = input.into();
        self.request(|reply| Command::Input {
            actor,
            input,
            pressed: true,
            reply,
        })
        .await
    }

    pub async fn input_released(&self, actor: ActorId, input: impl Into<GameplayTag>) -> Result<()> {
        let input = input.into();
        self.request(|reply| Command::Input {
            actor,
            input,
            pressed: false,
            reply,
        })
        .await
    }

    /// Advance simulated time by `dt`. Returns the new simulated time.
    pub async fn advance(&self, dt: Duration) -> Result<Duration> {
        self.request(|reply| Command::Advance { dt, reply }).await
    }

    /// Apply a packet produced by the remote peer's runtime.
    pub async fn receive_replication(&self, packet: ReplicationPacket) -> Result<()> {
        self.request(|reply| Command::Replicate { packet, reply })
            .await
    }

    /// Query an actor's action state (read-only snapshot)
    pub async fn snapshot(&self, actor: ActorId) -> Result<ActorSnapshot> {
        self.request(|reply| Command::Snapshot { actor, reply }).await
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Action` - Activations, failures, task and action endings
    /// - `Topic::Phase` - Phase transitions
    /// - `Topic::Replication` - Messages exchanged with the remote peer
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use action_runtime::Topic;
    ///
    /// let mut phases = handle.subscribe(Topic::Phase);
    /// while let Ok(event) = phases.recv().await {
    ///     // Handle phase transitions
    /// }
    /// ```
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    ///
    /// Returns a map of topic to receiver for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
