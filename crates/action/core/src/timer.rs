//! Simulated-clock timer queue.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::handle::{ActiveActionHandle, TaskId};
use crate::tag::GameplayTag;

/// Handle to a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle {
    due: Duration,
    seq: u64,
}

impl TimerHandle {
    pub fn due(&self) -> Duration {
        self.due
    }
}

/// Timers ordered by due time, ties broken by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<TimerHandle, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, target: T) -> TimerHandle {
        let handle = TimerHandle {
            due,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(handle, target);
        handle
    }

    /// Removes a timer. Returns its target if it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        self.entries.remove(&handle)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Pops the earliest timer due at or before `until`.
    pub fn pop_due(&mut self, until: Duration) -> Option<(Duration, T)> {
        let (handle, _) = self.entries.first_key_value()?;
        if handle.due > until {
            return None;
        }
        self.entries.pop_first().map(|(h, target)| (h.due, target))
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.entries.first_key_value().map(|(h, _)| h.due)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|_, target| keep(target));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Timer targets owned by the action system component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SystemTimer {
    /// Duration rule `rule` of the phase entered with `serial`.
    PhaseDuration {
        action: ActiveActionHandle,
        serial: u64,
        rule: usize,
    },
    /// Wake-up requested by a task.
    Task {
        action: ActiveActionHandle,
        task: TaskId,
    },
    /// Removes a cooldown tag.
    Cooldown { tag: GameplayTag },
}

impl SystemTimer {
    pub fn action(&self) -> Option<ActiveActionHandle> {
        match self {
            Self::PhaseDuration { action, .. } | Self::Task { action, .. } => Some(*action),
            Self::Cooldown { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_due_then_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(Duration::from_millis(300), "late");
        queue.schedule(Duration::from_millis(100), "first");
        queue.schedule(Duration::from_millis(100), "second");

        assert_eq!(queue.pop_due(Duration::from_millis(50)), None);
        assert_eq!(
            queue.pop_due(Duration::from_millis(200)),
            Some((Duration::from_millis(100), "first"))
        );
        assert_eq!(
            queue.pop_due(Duration::from_millis(200)),
            Some((Duration::from_millis(100), "second"))
        );
        assert_eq!(queue.pop_due(Duration::from_millis(200)), None);
        assert_eq!(queue.next_due(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn cancelled_timers_never_pop() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule(Duration::from_secs(1), 7);
        assert_eq!(queue.cancel(handle), Some(7));
        assert_eq!(queue.cancel(handle), None);
        assert!(queue.pop_due(Duration::from_secs(5)).is_none());
    }
}
