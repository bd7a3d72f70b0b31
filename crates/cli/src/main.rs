//! Headless simulation of one hero casting an action.
//!
//! Loads content, drives an [`action_runtime::Runtime`] with manual time, and
//! prints every phase transition the cast goes through.
mod config;
mod logging;
mod timeline;

use std::time::Duration;

use action_content::{ActionCatalog, ContentFactory};
use action_core::tag::names::event;
use action_core::{ActorId, ContextPayload, Vec3};
use action_runtime::{Runtime, RuntimeConfig, Topic};
use anyhow::{Context, Result, anyhow};
use tracing::info;

use config::SimConfig;
use timeline::Timeline;

const HERO: ActorId = ActorId::new(1);
const FRAME: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let sim = SimConfig::from_env();
    let _guard = logging::init(sim.session_id.as_deref())?;

    let mut runtime_config = RuntimeConfig::from_env();
    runtime_config.auto_tick = false;

    let catalog = match &sim.data_dir {
        Some(dir) => {
            let factory = ContentFactory::new(dir);
            if factory.data_dir().join("config.toml").exists() {
                runtime_config.action = factory.load_config()?;
            }
            factory.load_catalog()?
        }
        None => ActionCatalog::embedded()?,
    };
    let fingerprint = catalog
        .fingerprint(&sim.action)
        .ok_or_else(|| anyhow!("Action '{}' is not in the catalog", sim.action))?;
    info!(action = %sim.action, %fingerprint, "content loaded");

    let runtime = Runtime::builder()
        .config(runtime_config)
        .catalog(catalog)
        .build()?;
    let handle = runtime.handle();
    let mut phases = handle.subscribe(Topic::Phase);
    let mut timeline = Timeline::default();

    handle.spawn_actor(HERO, Vec3::ZERO).await?;
    let spec = handle
        .grant_action(HERO, sim.action.clone(), sim.level, None)
        .await?;
    handle
        .execute_action(HERO, spec)
        .await
        .with_context(|| format!("Failed to cast {}", sim.action))?;

    let mut now = Duration::ZERO;
    let mut move_at = sim.move_at;
    while now < sim.duration {
        let mut frame = FRAME.min(sim.duration - now);
        if let Some(at) = move_at
            && at <= now + frame
        {
            frame = at.saturating_sub(now);
        }

        if !frame.is_zero() {
            now = handle.advance(frame).await?;
        }
        if let Some(at) = move_at
            && at <= now
        {
            handle
                .gameplay_event(HERO, event::MOVEMENT_STARTED, ContextPayload::default())
                .await?;
            timeline.note(now, "movement started");
            move_at = None;
        }
        timeline.collect(&mut phases);
    }

    let snapshot = handle.snapshot(HERO).await?;
    timeline.collect(&mut phases);

    println!("{} (level {}), fingerprint {}", sim.action, sim.level, fingerprint);
    for entry in timeline.sorted() {
        println!("{entry}");
    }
    match snapshot.active_named(&sim.action) {
        Some(active) => println!(
            "still active after {:.3}s in {}",
            now.as_secs_f64(),
            active.phase.as_ref().map(|p| p.as_str()).unwrap_or("-")
        ),
        None => println!("finished within {:.3}s", now.as_secs_f64()),
    }

    drop(handle);
    runtime.shutdown().await?;
    Ok(())
}
