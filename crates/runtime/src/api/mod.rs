//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! other layers can stay focused on orchestration, workers, or simulation.

pub mod errors;
pub mod handle;
pub mod replication;
pub mod snapshot;

pub use errors::{Result, RuntimeError};
pub use handle::RuntimeHandle;
pub use replication::{
    ChannelReplicationSink, NullReplicationSink, ReplicationPacket, ReplicationSink,
};
pub use snapshot::{ActiveActionSnapshot, ActorSnapshot, GrantedActionSnapshot};
