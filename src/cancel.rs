//! Cancellation handles for in-flight computations.
//!
//! Every asynchronous operation in this crate hands back a [`Cancel`]: a
//! shared, idempotent handle that stops the pending work it is linked to.
//! Cancellation is explicit resource management: nothing is canceled for
//! you on drop. Callers retain the handle and invoke it when they want the
//! operation stopped.
//!
//! A handle stays valid across an entire run of a computation: as execution
//! suspends on successive asynchronous steps, the runtime re-links the same
//! handle to whichever step is currently in flight. Once the run settles,
//! the handle is disarmed and canceling it becomes a no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// An idempotent cancellation handle.
///
/// Calling [`Cancel::cancel`] more than once is safe: the underlying action
/// runs at most once, and a cancel that arrives after the linked operation
/// has already settled does nothing.
///
/// `Cancel` is `Clone`; all clones share the same state, so canceling any
/// clone cancels them all.
///
/// # Example
///
/// ```
/// use eddy::Cancel;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let calls = Rc::new(Cell::new(0));
/// let counter = calls.clone();
/// let cancel = Cancel::new(move || counter.set(counter.get() + 1));
///
/// cancel.cancel();
/// cancel.cancel();
/// assert_eq!(calls.get(), 1);
/// ```
#[derive(Clone)]
pub struct Cancel {
    inner: Rc<Inner>,
}

struct Inner {
    canceled: Cell<bool>,
    settled: Cell<bool>,
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Cancel {
    /// A handle linked to nothing. Canceling it is a no-op.
    pub fn noop() -> Self {
        let cancel = Cancel::pending();
        cancel.inner.settled.set(true);
        cancel
    }

    /// A handle that runs `action` the first time it is canceled.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        let cancel = Cancel::pending();
        *cancel.inner.action.borrow_mut() = Some(Box::new(action));
        cancel
    }

    /// A live handle with no action linked yet. The runtime links and
    /// re-links actions as execution crosses suspension points.
    pub(crate) fn pending() -> Self {
        Cancel {
            inner: Rc::new(Inner {
                canceled: Cell::new(false),
                settled: Cell::new(false),
                action: RefCell::new(None),
            }),
        }
    }

    /// Stop the linked operation. Idempotent; a no-op after settlement.
    pub fn cancel(&self) {
        if self.inner.canceled.get() || self.inner.settled.get() {
            return;
        }
        self.inner.canceled.set(true);
        // Take the action out before running it so a reentrant cancel
        // observes the handle as already canceled.
        let action = self.inner.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Whether this handle has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.get()
    }

    /// Whether the linked operation completed before any cancel arrived.
    pub fn is_settled(&self) -> bool {
        self.inner.settled.get()
    }

    /// Point this handle at a new in-flight operation.
    ///
    /// If the handle was already canceled, the new operation is canceled
    /// immediately instead.
    pub(crate) fn relink(&self, current: Cancel) {
        if self.inner.settled.get() {
            return;
        }
        if self.inner.canceled.get() {
            current.cancel();
            return;
        }
        *self.inner.action.borrow_mut() = Some(Box::new(move || current.cancel()));
    }

    /// Mark the linked operation as completed; later cancels are no-ops.
    pub(crate) fn disarm(&self) {
        if self.inner.canceled.get() {
            return;
        }
        self.inner.settled.set(true);
        self.inner.action.borrow_mut().take();
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("canceled", &self.inner.canceled.get())
            .field("settled", &self.inner.settled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_runs_action_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let cancel = Cancel::new(move || counter.set(counter.get() + 1));

        cancel.cancel();
        cancel.cancel();
        cancel.cancel();

        assert_eq!(calls.get(), 1);
        assert!(cancel.is_canceled());
    }

    #[test]
    fn cancel_after_disarm_is_noop() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let cancel = Cancel::new(move || counter.set(counter.get() + 1));

        cancel.disarm();
        cancel.cancel();

        assert_eq!(calls.get(), 0);
        assert!(!cancel.is_canceled());
        assert!(cancel.is_settled());
    }

    #[test]
    fn clones_share_state() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let cancel = Cancel::new(move || counter.set(counter.get() + 1));
        let other = cancel.clone();

        other.cancel();

        assert_eq!(calls.get(), 1);
        assert!(cancel.is_canceled());
    }

    #[test]
    fn relink_replaces_the_linked_action() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let counter = first.clone();
        let handle = Cancel::new(move || counter.set(counter.get() + 1));

        let counter = second.clone();
        handle.relink(Cancel::new(move || counter.set(counter.get() + 1)));
        handle.cancel();

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn relink_after_cancel_cancels_immediately() {
        let calls = Rc::new(Cell::new(0));
        let handle = Cancel::pending();
        handle.cancel();

        let counter = calls.clone();
        handle.relink(Cancel::new(move || counter.set(counter.get() + 1)));

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn noop_is_settled() {
        let cancel = Cancel::noop();
        cancel.cancel();
        assert!(cancel.is_settled());
        assert!(!cancel.is_canceled());
    }
}
