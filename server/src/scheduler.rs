//! Cancellable timers on the authority's session clock
//!
//! Time is the session's own clock (elapsed since start), advanced by the
//! server loop. Timers never run on their own: [`Scheduler::take_due`] hands
//! back whatever is due so it executes on the same task as every other
//! authority mutation.

use shared::EntityId;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Work the authority deferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedAction {
    Respawn { entity: EntityId },
    ReturnToLobby { match_id: u32 },
}

#[derive(Debug, Default)]
pub struct Scheduler {
    next_handle: u64,
    pending: BTreeMap<TimerHandle, (Duration, TimedAction)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` to run once the clock reaches `at`
    pub fn schedule(&mut self, at: Duration, action: TimedAction) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(handle, (at, action));
        handle
    }

    /// Cancels a timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn deadline(&self, handle: TimerHandle) -> Option<Duration> {
        self.pending.get(&handle).map(|(at, _)| *at)
    }

    /// Removes and returns every action due at `now`, earliest first
    ///
    /// Timers with equal deadlines come out in scheduling order.
    pub fn take_due(&mut self, now: Duration) -> Vec<(TimerHandle, TimedAction)> {
        let mut due: Vec<(Duration, TimerHandle, TimedAction)> = self
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(handle, (at, action))| (*at, *handle, *action))
            .collect();

        due.sort_by_key(|(at, handle, _)| (*at, *handle));

        for (_, handle, _) in &due {
            self.pending.remove(handle);
        }

        due.into_iter()
            .map(|(_, handle, action)| (handle, action))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_due_before_deadline() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_secs(4), TimedAction::Respawn { entity: 1 });

        assert!(scheduler.take_due(Duration::from_millis(3999)).is_empty());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_due_actions_fire_once_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_secs(7), TimedAction::ReturnToLobby { match_id: 1 });
        scheduler.schedule(Duration::from_secs(4), TimedAction::Respawn { entity: 2 });

        let due = scheduler.take_due(Duration::from_secs(10));
        let actions: Vec<TimedAction> = due.into_iter().map(|(_, action)| action).collect();

        assert_eq!(
            actions,
            vec![
                TimedAction::Respawn { entity: 2 },
                TimedAction::ReturnToLobby { match_id: 1 },
            ]
        );
        assert!(scheduler.take_due(Duration::from_secs(20)).is_empty());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Duration::from_secs(4), TimedAction::Respawn { entity: 1 });

        assert!(scheduler.is_pending(handle));
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.take_due(Duration::from_secs(5)).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_deadline_lookup() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Duration::from_secs(9), TimedAction::Respawn { entity: 3 });

        assert_eq!(scheduler.deadline(handle), Some(Duration::from_secs(9)));
        scheduler.cancel(handle);
        assert_eq!(scheduler.deadline(handle), None);
    }
}
