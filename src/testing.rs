//! Deterministic test utilities.
//!
//! [`VirtualTimer`] implements the [`Delay`] capability against a manual
//! clock: nothing fires until the test calls [`VirtualTimer::advance`], and
//! due timers fire in deadline order on the caller's stack. This makes
//! timeouts, races, and out-of-order completion exactly reproducible.
//!
//! [`run_now`] drives a computation that is expected to complete without
//! suspending, for tests of the synchronous path.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::cancel::Cancel;
use crate::error::FxError;
use crate::fx::Fx;
use crate::resume::{Continuation, Resume};
use crate::run::run_fx;
use crate::timer::Delay;

/// A [`Delay`] implementation over a manual clock.
///
/// Clones share the clock, so the same timer can serve as the environment
/// of a run and as the test's handle for advancing time.
///
/// # Example
///
/// ```
/// use eddy::testing::VirtualTimer;
/// use eddy::timer::delay;
/// use eddy::run_fx;
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// let timer = VirtualTimer::new();
/// let fx = delay::<VirtualTimer>(Duration::from_millis(10)).map(|_| 1);
///
/// let fired = Rc::new(Cell::new(0));
/// let slot = fired.clone();
/// let _cancel = run_fx(&fx, timer.clone(), move |r| slot.set(r.unwrap_or(0)));
///
/// timer.advance(Duration::from_millis(10));
/// assert_eq!(fired.get(), 1);
/// ```
#[derive(Clone)]
pub struct VirtualTimer {
    inner: Rc<RefCell<TimerInner>>,
}

struct TimerInner {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Continuation<()>>,
}

impl VirtualTimer {
    /// A timer starting at time zero with nothing scheduled.
    pub fn new() -> Self {
        VirtualTimer {
            inner: Rc::new(RefCell::new(TimerInner {
                now: Duration::ZERO,
                next_id: 0,
                queue: BTreeMap::new(),
            })),
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Advance the clock, firing every timer whose deadline is reached, in
    /// deadline order.
    ///
    /// Continuations run on the caller's stack and may schedule further
    /// timers; newly scheduled timers that fall within the advance window
    /// fire in the same call.
    pub fn advance(&self, by: Duration) {
        let target = self.inner.borrow().now + by;
        loop {
            let due = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.keys().next().copied() {
                    Some(key) if key.0 <= target => {
                        inner.now = key.0;
                        inner.queue.remove(&key)
                    }
                    _ => {
                        inner.now = target;
                        None
                    }
                }
            };
            match due {
                Some(resume) => resume(()),
                None => break,
            }
        }
    }
}

impl Default for VirtualTimer {
    fn default() -> Self {
        VirtualTimer::new()
    }
}

impl fmt::Debug for VirtualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("VirtualTimer")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .finish()
    }
}

impl Delay for VirtualTimer {
    fn delay(&self, duration: Duration) -> Resume<()> {
        let inner = self.inner.clone();
        Resume::later(move |k| {
            let key = {
                let mut timer = inner.borrow_mut();
                let deadline = timer.now + duration;
                let id = timer.next_id;
                timer.next_id += 1;
                timer.queue.insert((deadline, id), k);
                (deadline, id)
            };
            Cancel::new(move || {
                inner.borrow_mut().queue.remove(&key);
            })
        })
    }
}

/// Drive a computation that must complete without suspending.
///
/// # Panics
///
/// Panics if the computation suspends on an asynchronous step. Use
/// [`run_fx`] with a real continuation for those.
pub fn run_now<C: 'static, A: 'static>(fx: &Fx<C, A>, env: C) -> Result<A, FxError> {
    let slot = Rc::new(RefCell::new(None));
    let inner = slot.clone();
    let _cancel = run_fx(fx, env, move |result| *inner.borrow_mut() = Some(result));
    let result = slot
        .borrow_mut()
        .take()
        .expect("computation suspended; run_now is for synchronous computations");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::pure;
    use crate::timer::delay;
    use std::cell::Cell;

    #[test]
    fn advance_fires_in_deadline_order() {
        let timer = VirtualTimer::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, ms) in [("b", 20u64), ("a", 10), ("c", 30)] {
            let order = order.clone();
            let fx = delay::<VirtualTimer>(Duration::from_millis(ms))
                .map(move |_| order.borrow_mut().push(label));
            let _cancel = run_fx(&fx, timer.clone(), |_| {});
        }

        timer.advance(Duration::from_millis(30));
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        assert_eq!(timer.now(), Duration::from_millis(30));
    }

    #[test]
    fn advance_fires_timers_scheduled_mid_advance() {
        let timer = VirtualTimer::new();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        let fx = delay::<VirtualTimer>(Duration::from_millis(10))
            .and_then(|_| delay(Duration::from_millis(10)))
            .map(move |_| flag.set(true));
        let _cancel = run_fx(&fx, timer.clone(), |_| {});

        timer.advance(Duration::from_millis(20));
        assert!(fired.get());
    }

    #[test]
    fn canceled_timers_never_fire() {
        let timer = VirtualTimer::new();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        let fx = delay::<VirtualTimer>(Duration::from_millis(10)).map(move |_| flag.set(true));
        let cancel = run_fx(&fx, timer.clone(), |_| {});

        cancel.cancel();
        assert_eq!(timer.pending(), 0);
        timer.advance(Duration::from_millis(20));
        assert!(!fired.get());
    }

    #[test]
    fn run_now_completes_synchronous_computations() {
        let fx: Fx<(), i32> = pure(3).map(|n| n + 1);
        assert_eq!(run_now(&fx, ()), Ok(4));
    }

    #[test]
    #[should_panic(expected = "computation suspended")]
    fn run_now_panics_on_suspension() {
        let timer = VirtualTimer::new();
        let fx = delay::<VirtualTimer>(Duration::from_millis(1));
        let _ = run_now(&fx, timer);
    }
}
