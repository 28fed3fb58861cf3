pub(crate) mod registry;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

use crossbeam_deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex};

use self::registry::{TimerKey, TimerRegistry};
use crate::task::TaskCore;

const REACTOR_THREAD_NAME: &str = "later-reactor";

/// The host loop every deferred task runs on: a single lazily-started thread
/// with one lane per disarmless tier and an ordered timer registry.
///
/// Each iteration drains the asap lane to empty, runs the soon batch that was
/// pending when the phase began (draining the asap lane between entries),
/// fires due timers, then parks until the next deadline or the next
/// scheduling call.
pub(crate) struct Reactor {
    asap_lane: Injector<Arc<TaskCore>>,
    soon_lane: Injector<Arc<TaskCore>>,
    timers: Mutex<TimerRegistry>,
    condvar: Condvar,
}

impl Reactor {
    fn new() -> Arc<Self> {
        Arc::new(Reactor {
            asap_lane: Injector::new(),
            soon_lane: Injector::new(),
            timers: Mutex::new(TimerRegistry::default()),
            condvar: Condvar::new(),
        })
    }

    fn run(self: Arc<Self>) {
        log::debug!("deferral reactor started");

        loop {
            self.drain_asap();
            self.run_soon_batch();
            self.fire_due_timers();
            self.park();
        }
    }

    fn drain_asap(&self) {
        loop {
            match self.asap_lane.steal() {
                Steal::Success(task) => run_task(&task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }

    /// Runs the soon entries that were pending at the start of the phase.
    /// Entries pushed while the batch runs wait for the next iteration, and
    /// asap work enqueued by a callback runs before the next soon entry.
    fn run_soon_batch(&self) {
        let mut remaining = self.soon_lane.len();

        while remaining > 0 {
            match self.soon_lane.steal() {
                Steal::Success(task) => {
                    remaining -= 1;
                    run_task(&task);
                    self.drain_asap();
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }

    fn fire_due_timers(&self) {
        let due = self.timers.lock().pop_due(Instant::now());

        for task in due {
            run_task(&task);
            self.drain_asap();
        }
    }

    /// Parks until the next timer deadline, or indefinitely when nothing is
    /// scheduled. Scheduling calls take the timer lock before notifying, so a
    /// push cannot slip between the lane check and the wait.
    fn park(&self) {
        let mut timers = self.timers.lock();

        if !self.asap_lane.is_empty() || !self.soon_lane.is_empty() {
            return;
        }

        match timers.next_deadline() {
            Some(deadline) => {
                let now = Instant::now();
                if deadline > now {
                    self.condvar.wait_for(&mut timers, deadline - now);
                }
            }
            None => {
                self.condvar.wait(&mut timers);
            }
        }
    }

    pub(crate) fn enqueue_asap(&self, task: Arc<TaskCore>) {
        self.asap_lane.push(task);
        self.wake();
    }

    pub(crate) fn enqueue_soon(&self, task: Arc<TaskCore>) {
        self.soon_lane.push(task);
        self.wake();
    }

    pub(crate) fn arm_timer(&self, deadline: Instant, task: Arc<TaskCore>) -> TimerKey {
        let key = self.timers.lock().arm(deadline, task);
        self.condvar.notify_one();
        key
    }

    pub(crate) fn disarm_timer(&self, key: TimerKey) {
        if self.timers.lock().disarm(key) {
            self.condvar.notify_one();
        }
    }

    fn wake(&self) {
        let _timers = self.timers.lock();
        self.condvar.notify_one();
    }
}

/// Top-level execution point for a deferred task. A panicking callback is
/// reported here, at the loop boundary, and the reactor keeps serving
/// subsequent tasks; nothing below this point catches.
fn run_task(task: &Arc<TaskCore>) {
    if catch_unwind(AssertUnwindSafe(|| task.fire())).is_err() {
        log::error!("deferred callback panicked");
    }
}

static GLOBAL_REACTOR: OnceLock<Arc<Reactor>> = OnceLock::new();

pub(crate) fn get_reactor() -> &'static Arc<Reactor> {
    GLOBAL_REACTOR.get_or_init(initialize_reactor)
}

fn initialize_reactor() -> Arc<Reactor> {
    let reactor = Reactor::new();
    spawn_reactor_thread(reactor.clone());
    reactor
}

fn spawn_reactor_thread(reactor: Arc<Reactor>) {
    thread::Builder::new()
        .name(REACTOR_THREAD_NAME.to_string())
        .spawn(move || reactor.run())
        .expect("failed to spawn reactor thread");
}
