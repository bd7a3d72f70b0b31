//! Topic-based event bus for runtime events.
//!
//! Component events are split by concern: activation bookkeeping goes to
//! [`Topic::Action`], phase transitions to [`Topic::Phase`], and traffic
//! between peers to [`Topic::Replication`]. Consumers subscribe only to the
//! topics they need.

mod bus;
mod log;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use log::EventLog;
pub use types::{ActionEvent, Direction, PhaseEvent, ReplicationEvent};
