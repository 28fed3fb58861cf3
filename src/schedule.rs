use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::handle::{Deferred, Handle};
use crate::reactor::get_reactor;
use crate::task::{Callback, TaskCore, Tier};

fn schedule_task(delay_ms: i64, callback: Option<Callback>) -> Handle {
    let tier = Tier::for_delay(delay_ms);
    let core = Arc::new(TaskCore::new(tier, callback));
    let reactor = get_reactor();

    match tier {
        Tier::Asap => reactor.enqueue_asap(core.clone()),
        Tier::Soon => reactor.enqueue_soon(core.clone()),
        Tier::Timer => {
            let deadline = Instant::now() + Duration::from_millis(delay_ms as u64);
            let key = reactor.arm_timer(deadline, core.clone());
            core.set_timer_key(key);
        }
    }

    Handle::new(core)
}

/// Schedules `callback` to run once, at a tier selected by the sign of
/// `delay_ms`: negative runs as soon as possible, zero runs on the next
/// reactor pass, positive runs no earlier than `delay_ms` milliseconds from
/// now.
///
/// Never blocks; the returned [`Handle`] is the only channel back to the
/// task. The delay is not validated.
///
/// # Example
///
/// ```
/// let handle = later::schedule(5, || println!("fired"));
/// assert!(!handle.is_cancelled());
/// ```
pub fn schedule<F>(delay_ms: i64, callback: F) -> Handle
where
    F: FnOnce() + Send + 'static,
{
    schedule_task(delay_ms, Some(Box::new(callback)))
}

/// The no-callback calling convention: returns a future-shaped handle that
/// settles exactly when [`schedule`] with the same delay would have fired.
pub fn deferred(delay_ms: i64) -> Deferred {
    Deferred::new(schedule_task(delay_ms, None))
}

/// Runs `callback` as soon as possible, before any zero- or positive-delay
/// task scheduled after it in the same turn. Equivalent to `schedule(-1, _)`.
pub fn asap<F>(callback: F) -> Handle
where
    F: FnOnce() + Send + 'static,
{
    schedule(-1, callback)
}

/// Runs `callback` on the next reactor pass. Equivalent to `schedule(0, _)`.
pub fn soon<F>(callback: F) -> Handle
where
    F: FnOnce() + Send + 'static,
{
    schedule(0, callback)
}
