//! Async host for action systems.
//!
//! This crate runs one [`action_core::ActionSystemComponent`] per actor on a
//! background worker, drives simulated time, and fans component output out to
//! subscribers and to a replication peer. Consumers embed [`Runtime`] and
//! interact with actors through [`RuntimeHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator, builder, and configuration
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides the topic-based event bus and JSON-lines event log
//! - [`sim`] provides simulated animation, movement, and effect collaborators
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod events;
pub mod runtime;
pub mod sim;

mod workers;

pub use api::{
    ActiveActionSnapshot, ActorSnapshot, ChannelReplicationSink, GrantedActionSnapshot,
    NullReplicationSink, ReplicationPacket, ReplicationSink, Result, RuntimeError, RuntimeHandle,
};
pub use events::{
    ActionEvent, Direction, Event, EventBus, EventLog, PhaseEvent, ReplicationEvent, Topic,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use sim::{
    BodyState, EffectRecord, MontageLibrary, MontagePlayer, MontageTimeline, SimulatedBody,
    SimulatedEffects,
};
