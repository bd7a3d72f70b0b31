//! Scenario configuration for the simulation binary.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// What the simulation casts and for how long.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Catalog action the hero casts.
    pub action: String,
    pub level: u32,
    /// Total simulated time to run.
    pub duration: Duration,
    /// Simulated time at which the hero starts moving, if ever.
    pub move_at: Option<Duration>,
    /// Content directory (`config.toml`, `levels.ron`, `actions/*.ron`).
    /// The embedded catalog is used when unset.
    pub data_dir: Option<PathBuf>,
    pub session_id: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            action: "Cryoseism".to_string(),
            level: 1,
            duration: Duration::from_secs(4),
            move_at: None,
            data_dir: None,
            session_id: None,
        }
    }
}

impl SimConfig {
    /// Reads the scenario from the environment.
    ///
    /// - `SIM_ACTION` - Action to cast (default: Cryoseism)
    /// - `SIM_LEVEL` - Level of the granted action (default: 1)
    /// - `SIM_DURATION` - Seconds of simulated time (default: 4.0)
    /// - `SIM_MOVE_AT` - Seconds after the cast when movement starts (default: never)
    /// - `SIM_DATA_DIR` - Content directory (default: embedded content)
    /// - `SIM_SESSION_ID` - Log session name (default: timestamp)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(action) = env::var("SIM_ACTION")
            && !action.trim().is_empty()
        {
            config.action = action.trim().to_string();
        }
        if let Some(level) = read_env::<u32>("SIM_LEVEL") {
            config.level = level.max(1);
        }
        if let Some(duration) = read_env_secs("SIM_DURATION") {
            config.duration = duration;
        }
        config.move_at = read_env_secs("SIM_MOVE_AT");
        config.data_dir = env::var("SIM_DATA_DIR").ok().map(PathBuf::from);
        config.session_id = env::var("SIM_SESSION_ID").ok();

        config
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

fn read_env_secs(key: &str) -> Option<Duration> {
    parse_secs(&env::var(key).ok()?)
}

fn parse_secs(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
