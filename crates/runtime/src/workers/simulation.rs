//! Simulation worker that owns every actor's [`ActionSystemComponent`].
//!
//! Receives commands from [`crate::RuntimeHandle`], advances simulated time in
//! fixed sub-steps, and publishes drained component events to the
//! [`EventBus`]. Outbound replication is encoded and handed to the configured
//! [`ReplicationSink`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use action_content::ActionCatalog;
use action_core::{
    ActionEnv, ActionSpecHandle, ActionSystemComponent, ActionSystemEvent, ActiveActionHandle,
    ActorId, ActorInfo, ContextPayload, GameplayTag, NetRole, ReplicationMessage, Vec3,
};

use crate::api::{ActorSnapshot, ReplicationPacket, ReplicationSink, Result, RuntimeError};
use crate::events::{Direction, Event, EventBus, EventLog, ReplicationEvent};
use crate::runtime::RuntimeConfig;
use crate::sim::{MontagePlayer, SimulatedBody, SimulatedEffects};

/// Commands that can be sent to the simulation worker
pub enum Command {
    /// Spawn an actor with its own action system. `role` overrides the
    /// runtime's default net role.
    SpawnActor {
        actor: ActorId,
        role: Option<NetRole>,
        location: Vec3,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Grant a catalog action to an actor.
    GrantAction {
        actor: ActorId,
        name: String,
        level: u32,
        input: Option<GameplayTag>,
        reply: oneshot::Sender<Result<ActionSpecHandle>>,
    },
    ExecuteAction {
        actor: ActorId,
        spec: ActionSpecHandle,
        payload: Option<ContextPayload>,
        reply: oneshot::Sender<Result<ActiveActionHandle>>,
    },
    /// Cancel the running activation of a spec.
    CancelAction {
        actor: ActorId,
        spec: ActionSpecHandle,
        reply: oneshot::Sender<Result<()>>,
    },
    GameplayEvent {
        actor: ActorId,
        tag: GameplayTag,
        payload: ContextPayload,
        reply: oneshot::Sender<Result<()>>,
    },
    Input {
        actor: ActorId,
        input: GameplayTag,
        pressed: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Advance simulated time; replies with the new time.
    Advance {
        dt: Duration,
        reply: oneshot::Sender<Result<Duration>>,
    },
    /// Apply a packet received from the remote peer.
    Replicate {
        packet: ReplicationPacket,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Query an actor's action state (read-only).
    Snapshot {
        actor: ActorId,
        reply: oneshot::Sender<Result<ActorSnapshot>>,
    },
}

/// Background task that processes simulation commands.
pub struct SimulationWorker {
    config: RuntimeConfig,
    catalog: ActionCatalog,
    actors: BTreeMap<ActorId, ActionSystemComponent>,
    montages: MontagePlayer,
    bodies: SimulatedBody,
    effects: SimulatedEffects,
    time: Duration,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
    sink: Arc<dyn ReplicationSink>,
    event_log: Option<EventLog>,
}

impl SimulationWorker {
    /// Creates a new simulation worker.
    pub fn new(
        config: RuntimeConfig,
        catalog: ActionCatalog,
        montages: MontagePlayer,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
        sink: Arc<dyn ReplicationSink>,
        event_log: Option<EventLog>,
    ) -> Self {
        Self {
            config,
            catalog,
            actors: BTreeMap::new(),
            montages,
            bodies: SimulatedBody::default(),
            effects: SimulatedEffects::new(),
            time: Duration::ZERO,
            command_rx,
            event_bus,
            sink,
            event_log,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        let tick = self.config.tick_interval;
        let auto_tick = self.config.auto_tick;
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = ticker.tick(), if auto_tick => {
                    self.advance(tick).await;
                }
            }
        }

        if let Some(log) = &mut self.event_log
            && let Err(err) = log.flush()
        {
            warn!(target: "runtime::worker", %err, "event log flush failed");
        }
        debug!(target: "runtime::worker", time = ?self.time, "simulation worker stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SpawnActor {
                actor,
                role,
                location,
                reply,
            } => {
                let _ = reply.send(self.spawn_actor(actor, role, location));
            }
            Command::GrantAction {
                actor,
                name,
                level,
                input,
                reply,
            } => {
                let result = self.grant_action(actor, &name, level, input);
                self.flush_events().await;
                let _ = reply.send(result);
            }
            Command::ExecuteAction {
                actor,
                spec,
                payload,
                reply,
            } => {
                let result = self.component_mut(actor).and_then(|component| {
                    component
                        .try_execute_action(spec, payload)
                        .map_err(|reason| RuntimeError::Activation { actor, reason })
                });
                self.flush_events().await;
                let _ = reply.send(result);
            }
            Command::CancelAction { actor, spec, reply } => {
                let result = self.cancel_action(actor, spec);
                self.flush_events().await;
                let _ = reply.send(result);
            }
            Command::GameplayEvent {
                actor,
                tag,
                payload,
                reply,
            } => {
                let result = self
                    .component_mut(actor)
                    .map(|component| component.handle_gameplay_event(&tag, &payload));
                self.flush_events().await;
                let _ = reply.send(result);
            }
            Command::Input {
                actor,
                input,
                pressed,
                reply,
            } => {
                let result = self.component_mut(actor).map(|component| {
                    if pressed {
                        component.input_pressed(&input);
                    } else {
                        component.input_released(&input);
                    }
                });
                self.flush_events().await;
                let _ = reply.send(result);
            }
            Command::Advance { dt, reply } => {
                self.advance(dt).await;
                let _ = reply.send(Ok(self.time));
            }
            Command::Replicate { packet, reply } => {
                let result = self.receive_packet(&packet);
                self.flush_events().await;
                let _ = reply.send(result);
            }
            Command::Snapshot { actor, reply } => {
                let result = self.actors.get(&actor).map_or(
                    Err(RuntimeError::UnknownActor(actor)),
                    |component| {
                        Ok(ActorSnapshot::capture(
                            actor,
                            component,
                            self.bodies.state(actor),
                            self.effects.records_for(actor),
                        ))
                    },
                );
                let _ = reply.send(result);
            }
        }
    }

    fn component_mut(&mut self, actor: ActorId) -> Result<&mut ActionSystemComponent> {
        self.actors
            .get_mut(&actor)
            .ok_or(RuntimeError::UnknownActor(actor))
    }

    fn spawn_actor(&mut self, actor: ActorId, role: Option<NetRole>, location: Vec3) -> Result<()> {
        if self.actors.contains_key(&actor) {
            return Err(RuntimeError::ActorExists(actor));
        }
        let role = role.unwrap_or(self.config.net_role);
        let env = ActionEnv::new(
            Box::new(self.montages.clone()),
            Box::new(self.bodies.clone()),
            Box::new(self.effects.clone()),
        );
        let mut component =
            ActionSystemComponent::new(ActorInfo::embodied(actor), role, self.config.action.clone())
                .with_env(env);
        // keep every actor on the worker clock
        component.advance(self.time);

        self.bodies.spawn(actor, location);
        self.actors.insert(actor, component);
        info!(target: "runtime::worker", %actor, %role, "actor spawned");
        Ok(())
    }

    fn grant_action(
        &mut self,
        actor: ActorId,
        name: &str,
        level: u32,
        input: Option<GameplayTag>,
    ) -> Result<ActionSpecHandle> {
        let template = self
            .catalog
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownAction(name.to_string()))?;
        let component = self.component_mut(actor)?;
        let spec = component.grant_action(template, level, input);
        debug!(target: "runtime::worker", %actor, action = name, %spec, level, "action granted");
        Ok(spec)
    }

    fn cancel_action(&mut self, actor: ActorId, spec: ActionSpecHandle) -> Result<()> {
        let component = self.component_mut(actor)?;
        let handle = component
            .active_for_spec(spec)
            .map(|entry| entry.handle)
            .ok_or(RuntimeError::NotActive { actor, spec })?;
        component.cancel_action(handle);
        Ok(())
    }

    fn receive_packet(&mut self, packet: &ReplicationPacket) -> Result<()> {
        let message = packet.decode()?;
        let actor = packet.actor;
        let component = self.component_mut(actor)?;
        debug!(target: "runtime::worker", %actor, kind = message.kind(), "replication received");
        component.handle_replication(message.clone());
        self.publish(Event::Replication(ReplicationEvent {
            actor,
            direction: Direction::Inbound,
            message,
        }));
        Ok(())
    }

    /// Advances every actor by `dt` in sub-steps of the periodic task step.
    ///
    /// Each sub-step integrates bodies, fires component timers, then delivers
    /// montage events crossed during the step.
    async fn advance(&mut self, dt: Duration) {
        let step = self.config.action.step_duration();
        let mut remaining = dt;

        while !remaining.is_zero() {
            let slice = remaining.min(step);
            remaining -= slice;
            let secs = slice.as_secs_f32();

            self.bodies.step(secs);
            for component in self.actors.values_mut() {
                component.advance(slice);
            }
            for (avatar, event) in self.montages.advance(secs) {
                if let Some(component) = self.actors.get_mut(&avatar) {
                    component.handle_animation_event(&event);
                }
            }
            self.time += slice;
            self.flush_events().await;
        }
    }

    /// Drains every component, publishing events and sending replication.
    async fn flush_events(&mut self) {
        let mut outbound = Vec::new();
        let mut published = Vec::new();

        for (&actor, component) in self.actors.iter_mut() {
            let authority = component.role().has_authority();
            let now = component.now();
            for event in component.drain_events() {
                match &event {
                    ActionSystemEvent::Replication(message) => {
                        outbound.push((actor, message.clone()));
                    }
                    ActionSystemEvent::PhaseChanged { spec, info, .. } if authority => {
                        let message = ReplicationMessage::PhaseInfo {
                            spec: *spec,
                            info: info.clone(),
                        };
                        published.push(Event::from_component(
                            actor,
                            now,
                            ActionSystemEvent::Replication(message.clone()),
                        ));
                        outbound.push((actor, message));
                    }
                    _ => {}
                }
                published.push(Event::from_component(actor, now, event));
            }
        }

        for event in published {
            self.publish(event);
        }
        let sink = Arc::clone(&self.sink);
        for (actor, message) in outbound {
            send_replication(sink.as_ref(), actor, &message).await;
        }
    }

    fn publish(&mut self, event: Event) {
        if let Some(log) = &mut self.event_log
            && let Err(err) = log.append(&event)
        {
            warn!(target: "runtime::worker", path = %log.path().display(), %err, "event log append failed");
        }
        self.event_bus.publish(event);
    }
}

async fn send_replication(sink: &dyn ReplicationSink, actor: ActorId, message: &ReplicationMessage) {
    let packet = match ReplicationPacket::encode(actor, message) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(target: "runtime::worker", %actor, kind = message.kind(), %err, "replication encode failed");
            return;
        }
    };
    if let Err(err) = sink.send(packet).await {
        warn!(target: "runtime::worker", %actor, kind = message.kind(), %err, "replication send failed");
    }
}
