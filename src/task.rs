use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::task::Waker;

use futures::task::AtomicWaker;
use parking_lot::Mutex;

use crate::reactor::registry::TimerKey;

pub(crate) type Callback = Box<dyn FnOnce() + Send + 'static>;

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const COMPLETED: u8 = 2;

/// Timing class of a deferred task, selected by the sign of the requested
/// delay: negative is as-soon-as-possible, zero is the next reactor pass,
/// positive is a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tier {
    Asap,
    Soon,
    Timer,
}

impl Tier {
    pub(crate) fn for_delay(delay_ms: i64) -> Self {
        if delay_ms < 0 {
            Tier::Asap
        } else if delay_ms == 0 {
            Tier::Soon
        } else {
            Tier::Timer
        }
    }
}

/// Shared state behind every handle.
///
/// The lifecycle is a three-state machine: `PENDING` moves exactly once to
/// either `CANCELLED` or `COMPLETED` via compare-and-swap, so the two terminal
/// states can never both be observed.
pub(crate) struct TaskCore {
    tier: Tier,
    state: AtomicU8,
    referenced: AtomicBool,
    callback: Mutex<Option<Callback>>,
    timer_key: Mutex<Option<TimerKey>>,
    waker: AtomicWaker,
}

impl TaskCore {
    pub(crate) fn new(tier: Tier, callback: Option<Callback>) -> Self {
        TaskCore {
            tier,
            state: AtomicU8::new(PENDING),
            referenced: AtomicBool::new(true),
            callback: Mutex::new(callback),
            timer_key: Mutex::new(None),
            waker: AtomicWaker::new(),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == COMPLETED
    }

    fn is_pending(&self) -> bool {
        self.state.load(Ordering::SeqCst) == PENDING
    }

    /// Attempts the `PENDING -> CANCELLED` transition. Returns `false` when
    /// the task already fired or was already cancelled.
    pub(crate) fn try_cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Runs the task if it is still pending.
    ///
    /// The completion flag is set before the callback is invoked, so the
    /// callback itself observes `is_completed() == true`. Cancelled tasks are
    /// skipped here, which is the cooperative half of cancellation for tiers
    /// without a disarmable primitive.
    pub(crate) fn fire(&self) {
        if self
            .state
            .compare_exchange(PENDING, COMPLETED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Some(callback) = self.callback.lock().take() {
            callback();
        }

        self.waker.wake();
    }

    pub(crate) fn set_timer_key(&self, key: TimerKey) {
        *self.timer_key.lock() = Some(key);
    }

    pub(crate) fn take_timer_key(&self) -> Option<TimerKey> {
        self.timer_key.lock().take()
    }

    pub(crate) fn set_referenced(&self, referenced: bool) {
        self.referenced.store(referenced, Ordering::SeqCst);
    }

    /// Whether the backing primitive would keep the host alive. Terminal
    /// states report `false`; the asap tier has no keep-alive concept and
    /// reports `true` while pending.
    pub(crate) fn has_ref(&self) -> bool {
        if !self.is_pending() {
            return false;
        }

        match self.tier {
            Tier::Asap => true,
            Tier::Soon | Tier::Timer => self.referenced.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn register_waker(&self, waker: &Waker) {
        self.waker.register(waker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn counting_core(tier: Tier) -> (TaskCore, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let core = TaskCore::new(
            tier,
            Some(Box::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })),
        );
        (core, count)
    }

    #[test]
    fn tier_is_selected_by_delay_sign() {
        assert_eq!(Tier::for_delay(-123), Tier::Asap);
        assert_eq!(Tier::for_delay(-1), Tier::Asap);
        assert_eq!(Tier::for_delay(0), Tier::Soon);
        assert_eq!(Tier::for_delay(1), Tier::Timer);
        assert_eq!(Tier::for_delay(55), Tier::Timer);
    }

    #[test]
    fn core_starts_pending() {
        let (core, count) = counting_core(Tier::Timer);

        assert!(!core.is_cancelled());
        assert!(!core.is_completed());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fire_completes_and_runs_callback() {
        let (core, count) = counting_core(Tier::Timer);

        core.fire();

        assert!(core.is_completed());
        assert!(!core.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fire_is_one_shot() {
        let (core, count) = counting_core(Tier::Soon);

        core.fire();
        core.fire();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fire_after_cancel_is_suppressed() {
        let (core, count) = counting_core(Tier::Asap);

        assert!(core.try_cancel());
        core.fire();

        assert!(core.is_cancelled());
        assert!(!core.is_completed());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_fire_is_rejected() {
        let (core, _count) = counting_core(Tier::Timer);

        core.fire();

        assert!(!core.try_cancel());
        assert!(core.is_completed());
        assert!(!core.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (core, count) = counting_core(Tier::Timer);

        assert!(core.try_cancel());
        assert!(!core.try_cancel());
        assert!(!core.try_cancel());

        assert!(core.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn asap_tier_has_ref_while_pending() {
        let core = TaskCore::new(Tier::Asap, None);

        assert!(core.has_ref());
        core.set_referenced(false);
        assert!(core.has_ref());

        core.fire();
        assert!(!core.has_ref());
    }

    #[test]
    fn timer_tier_ref_can_be_toggled() {
        let core = TaskCore::new(Tier::Timer, None);

        assert!(core.has_ref());
        core.set_referenced(false);
        assert!(!core.has_ref());
        core.set_referenced(true);
        assert!(core.has_ref());
    }

    #[test]
    fn terminal_states_report_no_ref() {
        let fired = TaskCore::new(Tier::Timer, None);
        fired.fire();
        assert!(!fired.has_ref());

        let cancelled = TaskCore::new(Tier::Soon, None);
        cancelled.try_cancel();
        assert!(!cancelled.has_ref());
    }
}
