//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up command/event channels,
//! and exposes a builder-based API for clients to drive actors.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use action_content::{ActionCatalog, ConfigLoader};
use action_core::{ActionSystemConfig, NetRole};

use crate::api::{NullReplicationSink, ReplicationSink, Result, RuntimeError, RuntimeHandle};
use crate::events::{EventBus, EventLog};
use crate::sim::{MontageLibrary, MontagePlayer};
use crate::workers::SimulationWorker;

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Engine tuning handed to every action system.
    pub action: ActionSystemConfig,
    /// Real-time period of automatic ticks, also the simulated step per tick.
    pub tick_interval: Duration,
    /// Advance simulated time on a timer instead of only on request.
    pub auto_tick: bool,
    /// Role given to spawned actors unless overridden.
    pub net_role: NetRole,
    pub command_buffer_size: usize,
    pub event_buffer_size: usize,
    /// JSON-lines file every published event is appended to.
    pub event_log: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            action: ActionSystemConfig::default(),
            tick_interval: Duration::from_millis(16),
            auto_tick: false,
            net_role: NetRole::Authority,
            command_buffer_size: 32,
            event_buffer_size: 256,
            event_log: None,
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ACTION_TICK_MS` - Tick interval in milliseconds (default: 16)
    /// - `ACTION_COMMAND_BUFFER` - Command queue size (default: 32)
    /// - `ACTION_EVENT_BUFFER` - Per-topic event capacity (default: 256)
    /// - `ACTION_AUTO_TICK` - Advance time on a timer (default: false)
    /// - `ACTION_NET_ROLE` - Authority, AutonomousProxy, SimulatedProxy or None (default: Authority)
    /// - `ACTION_CONFIG_PATH` - TOML file with action system tuning (default: built-in values)
    /// - `ACTION_EVENT_LOG` - JSON-lines event log path (default: disabled)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_env::<u64>("ACTION_TICK_MS") {
            config.tick_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(capacity) = read_env::<usize>("ACTION_COMMAND_BUFFER") {
            config.command_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("ACTION_EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }
        if let Some(auto_tick) = read_env_bool("ACTION_AUTO_TICK") {
            config.auto_tick = auto_tick;
        }
        if let Ok(raw) = env::var("ACTION_NET_ROLE") {
            match raw.parse::<NetRole>() {
                Ok(role) => config.net_role = role,
                Err(_) => warn!(value = %raw, "unknown ACTION_NET_ROLE, keeping {}", config.net_role),
            }
        }
        if let Ok(path) = env::var("ACTION_CONFIG_PATH") {
            match ConfigLoader::load(Path::new(&path)) {
                Ok(action) => config.action = action,
                Err(err) => warn!(%path, %err, "action config not loaded, using defaults"),
            }
        }
        if let Ok(path) = env::var("ACTION_EVENT_LOG") {
            config.event_log = Some(PathBuf::from(path));
        }

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

fn read_env_bool(key: &str) -> Option<bool> {
    parse_bool(&env::var(key).ok()?)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Main runtime hosting the simulation worker
///
/// Design: Runtime owns the worker task.
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    ///
    /// The handle can be shared across clients and async tasks.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Shutdown the runtime gracefully
    ///
    /// The worker stops once every handle clone is dropped, so callers must
    /// release their own clones first.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);

        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        Ok(())
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    catalog: Option<ActionCatalog>,
    montages: Option<MontageLibrary>,
    sink: Option<Arc<dyn ReplicationSink>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            catalog: None,
            montages: None,
            sink: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set required action catalog
    pub fn catalog(mut self, catalog: ActionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Montage timelines for the simulated animation system.
    ///
    /// Defaults to [`MontageLibrary::bundled`].
    pub fn montages(mut self, library: MontageLibrary) -> Self {
        self.montages = Some(library);
        self
    }

    /// Destination of outbound replication (default: dropped)
    pub fn replication_sink(mut self, sink: impl ReplicationSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Spawns the simulation worker and returns the running runtime.
    pub fn build(self) -> Result<Runtime> {
        let catalog = self.catalog.ok_or(RuntimeError::MissingCatalog)?;
        let event_log = self.config.event_log.as_ref().map(EventLog::open).transpose()?;
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(NullReplicationSink) as Arc<dyn ReplicationSink>);
        let montages = MontagePlayer::new(self.montages.unwrap_or_else(MontageLibrary::bundled));

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size.max(1));
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);

        info!(
            actions = catalog.len(),
            role = %self.config.net_role,
            auto_tick = self.config.auto_tick,
            tick = ?self.config.tick_interval,
            "starting action runtime"
        );

        let worker = SimulationWorker::new(
            self.config,
            catalog,
            montages,
            command_rx,
            event_bus.clone(),
            sink,
            event_log,
        );
        let sim_worker_handle = tokio::spawn(worker.run());

        Ok(Runtime {
            handle: RuntimeHandle::new(command_tx, event_bus),
            sim_worker_handle,
        })
    }
}
