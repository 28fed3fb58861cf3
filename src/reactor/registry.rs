use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::task::TaskCore;

/// Disarm token for an armed timer. The id disambiguates timers sharing a
/// deadline so each one can be removed individually.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimerKey {
    deadline: Instant,
    id: u64,
}

#[derive(Default)]
pub(crate) struct TimerRegistry {
    timers: BTreeMap<(Instant, u64), Arc<TaskCore>>,
    next_id: u64,
}

impl TimerRegistry {
    pub fn arm(&mut self, deadline: Instant, task: Arc<TaskCore>) -> TimerKey {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert((deadline, id), task);
        TimerKey { deadline, id }
    }

    pub fn disarm(&mut self, key: TimerKey) -> bool {
        self.timers.remove(&(key.deadline, key.id)).is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|&(deadline, _)| deadline)
    }

    pub fn pop_due(&mut self, now: Instant) -> Vec<Arc<TaskCore>> {
        let pending = self.timers.split_off(&(now + Duration::from_nanos(1), 0));
        let due = mem::replace(&mut self.timers, pending);
        due.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Tier;

    fn pending_task() -> Arc<TaskCore> {
        Arc::new(TaskCore::new(Tier::Timer, None))
    }

    #[test]
    fn registry_starts_empty() {
        let registry = TimerRegistry::default();
        assert!(registry.next_deadline().is_none());
    }

    #[test]
    fn registry_arms_timer() {
        let mut registry = TimerRegistry::default();
        let deadline = Instant::now() + Duration::from_secs(1);

        registry.arm(deadline, pending_task());

        assert_eq!(registry.next_deadline(), Some(deadline));
    }

    #[test]
    fn registry_returns_earliest_deadline() {
        let mut registry = TimerRegistry::default();

        let early = Instant::now() + Duration::from_millis(100);
        let late = Instant::now() + Duration::from_secs(1);

        registry.arm(late, pending_task());
        registry.arm(early, pending_task());

        assert_eq!(registry.next_deadline(), Some(early));
    }

    #[test]
    fn registry_pops_due_tasks() {
        let mut registry = TimerRegistry::default();

        let past = Instant::now() - Duration::from_millis(100);
        registry.arm(past, pending_task());

        let due = registry.pop_due(Instant::now());

        assert_eq!(due.len(), 1);
        assert!(registry.next_deadline().is_none());
    }

    #[test]
    fn registry_keeps_future_timers() {
        let mut registry = TimerRegistry::default();

        let past = Instant::now() - Duration::from_millis(100);
        let future = Instant::now() + Duration::from_secs(10);

        registry.arm(past, pending_task());
        registry.arm(future, pending_task());

        let _ = registry.pop_due(Instant::now());

        assert_eq!(registry.next_deadline(), Some(future));
    }

    #[test]
    fn disarm_removes_the_timer() {
        let mut registry = TimerRegistry::default();
        let deadline = Instant::now() + Duration::from_secs(1);

        let key = registry.arm(deadline, pending_task());

        assert!(registry.disarm(key));
        assert!(registry.next_deadline().is_none());
        assert!(!registry.disarm(key));
    }

    #[test]
    fn disarm_leaves_other_timers_at_same_deadline() {
        let mut registry = TimerRegistry::default();
        let deadline = Instant::now() + Duration::from_secs(1);

        let first = registry.arm(deadline, pending_task());
        let _second = registry.arm(deadline, pending_task());

        assert!(registry.disarm(first));
        assert_eq!(registry.next_deadline(), Some(deadline));
    }

    #[test]
    fn disarmed_timer_is_not_popped() {
        let mut registry = TimerRegistry::default();

        let past = Instant::now() - Duration::from_millis(100);
        let key = registry.arm(past, pending_task());
        registry.disarm(key);

        assert!(registry.pop_due(Instant::now()).is_empty());
    }
}
