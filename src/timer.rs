//! The delay capability and deadline racing.
//!
//! The runtime schedules nothing itself: [`delay`] requires a [`Delay`]
//! capability from the environment, and whatever implements it (a virtual
//! clock in tests, a tokio timer under the `async` feature) owns the
//! actual scheduling and supplies the [`Cancel`](crate::Cancel) that clears
//! a pending timer.

use std::time::Duration;

use crate::constructors::{fail, op};
use crate::error::FxError;
use crate::fx::Fx;
use crate::parallel::race;
use crate::resume::Resume;

/// The capability to wait.
///
/// Implementations resolve the returned [`Resume`] after `duration` has
/// elapsed, and must hand back a cancel that clears the pending timer so a
/// canceled wait never resumes.
pub trait Delay {
    /// Wait for `duration`, cancelably.
    fn delay(&self, duration: Duration) -> Resume<()>;
}

/// Wait for `duration` using the environment's [`Delay`] capability.
pub fn delay<C: Delay + 'static>(duration: Duration) -> Fx<C, ()> {
    op(move |env: &C| env.delay(duration))
}

/// Impose a deadline on a computation.
///
/// Implemented as a race between the computation and the elapsing deadline.
/// If the deadline wins, the computation's in-flight work is canceled and
/// the result is a failure for which [`FxError::is_timeout`] holds. If the
/// computation wins, the pending deadline timer is cleared.
///
/// # Example
///
/// ```rust,ignore
/// let fx = timeout(Duration::from_millis(100), fetch_user(id));
/// ```
pub fn timeout<C: Delay + 'static, A: 'static>(duration: Duration, fx: Fx<C, A>) -> Fx<C, A> {
    race(
        fx,
        delay(duration).and_then(move |_| fail(FxError::timeout(duration))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::pure;
    use crate::run::run_fx;
    use crate::testing::VirtualTimer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn capture<A: 'static>() -> (
        Rc<RefCell<Option<Result<A, FxError>>>>,
        impl FnOnce(Result<A, FxError>) + 'static,
    ) {
        let slot = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        (slot, move |r| *inner.borrow_mut() = Some(r))
    }

    #[test]
    fn delay_resolves_when_the_clock_advances() {
        let timer = VirtualTimer::new();
        let fx = delay::<VirtualTimer>(Duration::from_millis(50)).map(|_| "done");

        let (slot, k) = capture();
        run_fx(&fx, timer.clone(), k);

        assert!(slot.borrow().is_none());
        timer.advance(Duration::from_millis(49));
        assert!(slot.borrow().is_none());
        timer.advance(Duration::from_millis(1));
        assert_eq!(*slot.borrow(), Some(Ok("done")));
    }

    #[test]
    fn timeout_passes_through_a_fast_result() {
        let timer = VirtualTimer::new();
        let fx = timeout(
            Duration::from_millis(100),
            delay::<VirtualTimer>(Duration::from_millis(10)).and_then(|_| pure(7)),
        );

        let (slot, k) = capture();
        run_fx(&fx, timer.clone(), k);

        timer.advance(Duration::from_millis(10));
        assert_eq!(*slot.borrow(), Some(Ok(7)));
        // The deadline timer was cleared when the computation won.
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn timeout_fails_and_cancels_the_slow_computation() {
        let timer = VirtualTimer::new();
        let fx = timeout(
            Duration::from_millis(100),
            delay::<VirtualTimer>(Duration::from_millis(1000)).and_then(|_| pure(7)),
        );

        let (slot, k) = capture();
        run_fx(&fx, timer.clone(), k);

        timer.advance(Duration::from_millis(100));
        let result = slot.borrow_mut().take().expect("deadline fired");
        assert!(result.unwrap_err().is_timeout());
        // The slow computation's pending timer was canceled.
        assert_eq!(timer.pending(), 0);
    }
}
