//! Phase timeline collected from the runtime event bus.

use std::fmt;
use std::time::Duration;

use action_runtime::{Event, PhaseEvent};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// One line of the printed timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Phase(PhaseEvent),
    Note { at: Duration, text: String },
}

impl Entry {
    pub fn at(&self) -> Duration {
        match self {
            Entry::Phase(phase) => phase.at,
            Entry::Note { at, .. } => *at,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8.3}s  ", self.at().as_secs_f64())?;
        match self {
            Entry::Phase(phase) => {
                let from = phase.from.as_ref().map(|tag| tag.as_str()).unwrap_or("-");
                write!(
                    f,
                    "{} #{} {} -> {}",
                    phase.name,
                    phase.counter,
                    from,
                    phase.to.as_str()
                )
            }
            Entry::Note { text, .. } => write!(f, "** {text}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<Entry>,
}

impl Timeline {
    /// Moves every pending event off `rx`. Lagged receivers skip ahead.
    pub fn collect(&mut self, rx: &mut broadcast::Receiver<Event>) {
        loop {
            match rx.try_recv() {
                Ok(Event::Phase(phase)) => self.entries.push(Entry::Phase(phase)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "timeline lagged behind the event bus");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    pub fn note(&mut self, at: Duration, text: impl Into<String>) {
        self.entries.push(Entry::Note {
            at,
            text: text.into(),
        });
    }

    /// Entries in time order. Entries at the same instant keep arrival order.
    pub fn sorted(&self) -> Vec<&Entry> {
        let mut sorted: Vec<&Entry> = self.entries.iter().collect();
        sorted.sort_by_key(|entry| entry.at());
        sorted
    }
}
