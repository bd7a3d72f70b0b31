//! Worker tasks that back the runtime orchestration.
//!
//! The simulation worker owns every actor's action system and is the only
//! place simulated time advances.

mod simulation;

pub use simulation::{Command, SimulationWorker};
