//! Recording stand-in for the attribute and effect layer.

use std::sync::{Arc, Mutex, MutexGuard};

use action_core::{ActorId, EffectDriver, GameplayTag};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One side effect requested by an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EffectRecord {
    Effect {
        owner: ActorId,
        effect: GameplayTag,
        level: u32,
    },
    Cue {
        owner: ActorId,
        cue: GameplayTag,
    },
    Spawned {
        owner: ActorId,
        class: String,
        actor: ActorId,
    },
    Destroyed {
        actor: ActorId,
    },
}

#[derive(Debug)]
struct Ledger {
    records: Vec<EffectRecord>,
    next_actor: u32,
}

/// Accepts every cost and records effects, cues, and spawned actors.
#[derive(Clone, Debug)]
pub struct SimulatedEffects(Arc<Mutex<Ledger>>);

impl SimulatedEffects {
    /// First id handed to actors spawned by actions.
    pub const SPAWN_BASE: u32 = 10_000;

    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Ledger {
            records: Vec::new(),
            next_actor: Self::SPAWN_BASE,
        })))
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<EffectRecord> {
        self.ledger().records.clone()
    }

    /// Records caused by `owner`, including the destruction of actors it
    /// spawned.
    pub fn records_for(&self, owner: ActorId) -> Vec<EffectRecord> {
        let ledger = self.ledger();
        let mut spawned = Vec::new();
        ledger
            .records
            .iter()
            .filter(|record| match record {
                EffectRecord::Effect { owner: o, .. } | EffectRecord::Cue { owner: o, .. } => {
                    *o == owner
                }
                EffectRecord::Spawned { owner: o, actor, .. } => {
                    if *o == owner {
                        spawned.push(*actor);
                    }
                    *o == owner
                }
                EffectRecord::Destroyed { actor } => spawned.contains(actor),
            })
            .cloned()
            .collect()
    }
}

impl Default for SimulatedEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectDriver for SimulatedEffects {
    fn apply_effect_to_self(&mut self, owner: ActorId, effect: &GameplayTag, level: u32) {
        info!(%owner, %effect, level, "effect applied");
        self.ledger().records.push(EffectRecord::Effect {
            owner,
            effect: effect.clone(),
            level,
        });
    }

    fn execute_cue(&mut self, owner: ActorId, cue: &GameplayTag) {
        info!(%owner, %cue, "cue executed");
        self.ledger().records.push(EffectRecord::Cue {
            owner,
            cue: cue.clone(),
        });
    }

    fn spawn_actor(&mut self, owner: ActorId, class: &str) -> Option<ActorId> {
        let mut ledger = self.ledger();
        let actor = ActorId::new(ledger.next_actor);
        ledger.next_actor += 1;
        info!(%owner, class, %actor, "actor spawned");
        ledger.records.push(EffectRecord::Spawned {
            owner,
            class: class.to_string(),
            actor,
        });
        Some(actor)
    }

    fn destroy_actor(&mut self, actor: ActorId) {
        info!(%actor, "actor destroyed");
        self.ledger().records.push(EffectRecord::Destroyed { actor });
    }
}
