use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::reactor::get_reactor;
use crate::task::TaskCore;

/// Control surface for one deferred task.
///
/// A handle is cheap to clone; clones share the same lifecycle state. The two
/// flags move monotonically and exclusively: a handle is either still pending,
/// cancelled, or completed, never cancelled and completed at once.
///
/// # Example
///
/// ```
/// let handle = later::schedule(1_000, || println!("never happens"));
///
/// handle.cancel();
///
/// assert!(handle.is_cancelled());
/// assert!(!handle.is_completed());
/// ```
pub struct Handle {
    core: Arc<TaskCore>,
}

impl Handle {
    pub(crate) fn new(core: Arc<TaskCore>) -> Self {
        Handle { core }
    }

    /// Requests cancellation. Only effective while the task is still pending:
    /// a pending task will never fire after this returns, a completed or
    /// already-cancelled task is left untouched.
    ///
    /// Returns the handle for chaining; repeated calls are no-ops.
    ///
    /// ```
    /// let handle = later::schedule(1_000, || {});
    /// handle.cancel().cancel().cancel();
    /// assert!(handle.is_cancelled());
    /// ```
    pub fn cancel(&self) -> &Self {
        if self.core.try_cancel() {
            // Timer tier carries a disarm token; pull it so the reactor never
            // wakes for a dead deadline. Other tiers skip via the state flag.
            if let Some(key) = self.core.take_timer_key() {
                get_reactor().disarm_timer(key);
            }
        }

        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    /// True only once the callback has actually been invoked.
    pub fn is_completed(&self) -> bool {
        self.core.is_completed()
    }

    /// Whether the backing primitive would keep the host alive. Reads `false`
    /// once the task is cancelled or completed. The asap tier has no
    /// keep-alive concept and reads `true` while pending.
    pub fn has_ref(&self) -> bool {
        self.core.has_ref()
    }

    /// Marks the task as keeping the host alive again after [`unref`].
    /// Returns the handle for chaining.
    ///
    /// The trailing underscore avoids the `ref` keyword.
    ///
    /// [`unref`]: Handle::unref
    pub fn ref_(&self) -> &Self {
        self.core.set_referenced(true);
        self
    }

    /// Marks the task as not keeping the host alive. Returns the handle for
    /// chaining.
    pub fn unref(&self) -> &Self {
        self.core.set_referenced(false);
        self
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Handle {
            core: self.core.clone(),
        }
    }
}

/// Future-shaped handle returned by [`deferred`](crate::deferred).
///
/// Settles with `()` exactly when the equivalent callback-style task would
/// have fired, and carries the full [`Handle`] surface. A cancelled
/// `Deferred` never settles.
///
/// # Example
///
/// ```
/// let mut pause = later::deferred(10);
/// assert!(!pause.is_completed());
///
/// futures::executor::block_on(&mut pause);
///
/// assert!(pause.is_completed());
/// ```
pub struct Deferred {
    handle: Handle,
}

impl Deferred {
    pub(crate) fn new(handle: Handle) -> Self {
        Deferred { handle }
    }

    /// Clones out the plain handle, e.g. to cancel from elsewhere while the
    /// future is being awaited.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// See [`Handle::cancel`]. A cancelled `Deferred` stays pending forever.
    pub fn cancel(&self) -> &Self {
        self.handle.cancel();
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    pub fn is_completed(&self) -> bool {
        self.handle.is_completed()
    }

    pub fn has_ref(&self) -> bool {
        self.handle.has_ref()
    }

    pub fn ref_(&self) -> &Self {
        self.handle.ref_();
        self
    }

    pub fn unref(&self) -> &Self {
        self.handle.unref();
        self
    }
}

impl Future for Deferred {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.handle.core.is_completed() {
            return Poll::Ready(());
        }

        self.handle.core.register_waker(cx.waker());

        if self.handle.core.is_completed() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
