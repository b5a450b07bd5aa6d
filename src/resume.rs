//! The deferred-or-immediate result carrier.
//!
//! A [`Resume`] is the value an effect step hands back to the runtime: either
//! the result is available right now ([`Resume::Now`]), or it arrives later
//! through a continuation ([`Resume::Later`]). The distinction is what lets
//! the trampoline stay on its synchronous fast path for as long as possible
//! and only suspend when an effect genuinely has nothing to give yet.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::cancel::Cancel;

/// A one-shot callback receiving the resolved value of a [`Resume::Later`].
pub type Continuation<A> = Box<dyn FnOnce(A)>;

/// A value of type `A`, either available now or delivered later through a
/// continuation, with a cancellation handle for the in-flight case.
///
/// Producers of `Later` must uphold two rules:
/// - the continuation is invoked at most once (the `FnOnce` signature
///   makes a second invocation unrepresentable);
/// - after the returned [`Cancel`] fires, the continuation never fires.
pub enum Resume<A> {
    /// The value is already available; no suspension needed.
    Now(A),
    /// The value will be delivered by invoking the continuation. The
    /// producer returns a handle that stops the pending work.
    Later(Box<dyn FnOnce(Continuation<A>) -> Cancel>),
}

impl<A: 'static> Resume<A> {
    /// An immediately available value.
    pub fn now(value: A) -> Self {
        Resume::Now(value)
    }

    /// Wrap an asynchronous producer.
    ///
    /// The producer receives the continuation and returns a handle that
    /// stops the pending work. The continuation is `FnOnce`, so resolving
    /// more than once is ruled out at the type level.
    pub fn later(run: impl FnOnce(Continuation<A>) -> Cancel + 'static) -> Self {
        Resume::Later(Box::new(run))
    }

    /// Apply a function to the resolved value.
    pub fn map<B: 'static>(self, f: impl FnOnce(A) -> B + 'static) -> Resume<B> {
        match self {
            Resume::Now(value) => Resume::Now(f(value)),
            Resume::Later(run) => Resume::Later(Box::new(move |k: Continuation<B>| {
                run(Box::new(move |value| k(f(value))))
            })),
        }
    }

    /// Monadic chain: once this resolves, run `f` and forward its result.
    ///
    /// Cancellation composes across both stages: canceling the returned
    /// handle stops whichever stage is currently in flight.
    pub fn and_then<B: 'static>(self, f: impl FnOnce(A) -> Resume<B> + 'static) -> Resume<B> {
        match self {
            Resume::Now(value) => f(value),
            Resume::Later(run) => Resume::Later(Box::new(move |k: Continuation<B>| {
                let handle = Cancel::pending();
                let fired = Rc::new(Cell::new(false));

                let inner_handle = handle.clone();
                let inner_fired = fired.clone();
                let first = run(Box::new(move |value| {
                    inner_fired.set(true);
                    if inner_handle.is_canceled() {
                        return;
                    }
                    let second = run_resume(f(value), k);
                    inner_handle.relink(second);
                }));

                // The first stage may have resolved synchronously, in which
                // case the handle already points at the second stage.
                if !fired.get() {
                    handle.relink(first);
                }
                handle
            })),
        }
    }
}

/// Dispatch a [`Resume`]: invoke `k` synchronously for `Now`, or start the
/// asynchronous producer for `Later`.
pub fn run_resume<A: 'static>(resume: Resume<A>, k: Continuation<A>) -> Cancel {
    match resume {
        Resume::Now(value) => {
            k(value);
            Cancel::noop()
        }
        Resume::Later(run) => run(k),
    }
}

impl<A> fmt::Debug for Resume<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resume::Now(_) => f.write_str("Resume::Now"),
            Resume::Later(_) => f.write_str("Resume::Later"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn capture<A: 'static>() -> (Rc<RefCell<Option<A>>>, Continuation<A>) {
        let slot = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        (slot, Box::new(move |value| *inner.borrow_mut() = Some(value)))
    }

    #[test]
    fn now_resolves_synchronously() {
        let (slot, k) = capture::<i32>();
        let cancel = run_resume(Resume::now(7), k);
        assert_eq!(*slot.borrow(), Some(7));
        assert!(cancel.is_settled());
    }

    #[test]
    fn later_resolves_through_continuation() {
        let (slot, k) = capture::<i32>();
        let resume = Resume::later(|k: Continuation<i32>| {
            k(41);
            Cancel::noop()
        });
        run_resume(resume, k);
        assert_eq!(*slot.borrow(), Some(41));
    }

    #[test]
    fn map_transforms_now_and_later() {
        let (slot, k) = capture::<i32>();
        run_resume(Resume::now(20).map(|n| n * 2), k);
        assert_eq!(*slot.borrow(), Some(40));

        let (slot, k) = capture::<i32>();
        let resume = Resume::later(|k: Continuation<i32>| {
            k(21);
            Cancel::noop()
        });
        run_resume(resume.map(|n| n * 2), k);
        assert_eq!(*slot.borrow(), Some(42));
    }

    #[test]
    fn and_then_chains_stages() {
        let (slot, k) = capture::<i32>();
        let resume = Resume::later(|k: Continuation<i32>| {
            k(10);
            Cancel::noop()
        });
        run_resume(resume.and_then(|n| Resume::now(n + 5)), k);
        assert_eq!(*slot.borrow(), Some(15));
    }

    #[test]
    fn and_then_cancel_stops_the_pending_stage() {
        let canceled = Rc::new(Cell::new(false));
        let flag = canceled.clone();
        let resume = Resume::<i32>::later(move |_k| {
            let flag = flag.clone();
            Cancel::new(move || flag.set(true))
        });

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let cancel = run_resume(
            resume.and_then(Resume::now),
            Box::new(move |_| counter.set(counter.get() + 1)),
        );

        cancel.cancel();
        assert!(canceled.get());
        assert_eq!(calls.get(), 0);
    }
}
