//! Fan-out/fan-in combinators.
//!
//! "Concurrent" here means cooperatively interleaved: children register
//! callbacks with whatever asynchronous sources their effects use, and the
//! single-threaded host delivers those callbacks one at a time. The
//! combinators' job is bookkeeping: start order, settlement, result
//! placement, and composing the children's cancellation handles into one.
//!
//! - [`zip`] / [`zip3`] / [`zip_all`]: run everything, keep every result,
//!   results land in input order regardless of completion order.
//! - [`race`] / [`race_all`]: first settlement wins, losers are canceled
//!   synchronously with the winner's settlement.
//!
//! Both families settle at most once, and a failing child settles the whole
//! aggregate with that failure (canceling the rest).

use std::cell::RefCell;
use std::rc::Rc;

use crate::cancel::Cancel;
use crate::fx::{downcast, Fx, Node, Step, Value};
use crate::resume::{Continuation, Resume};
use crate::run::run_node;

/// Run two computations concurrently against the shared environment and
/// pair their results in input order.
///
/// The aggregate settles when both children have; canceling it cancels
/// whichever children are still running. If either child fails, the other
/// is canceled and the failure becomes the aggregate's result.
pub fn zip<C: 'static, A: 'static, B: 'static>(fa: Fx<C, A>, fb: Fx<C, B>) -> Fx<C, (A, B)> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        let fa = fa.clone();
        let fb = fb.clone();
        let env = env.clone();
        Resume::later(move |k: Continuation<Step>| start_zip(fa, fb, env, k))
    }))))
}

/// [`zip`] for three computations, producing a flat tuple.
pub fn zip3<C: 'static, A: 'static, B: 'static, D: 'static>(
    fa: Fx<C, A>,
    fb: Fx<C, B>,
    fc: Fx<C, D>,
) -> Fx<C, (A, B, D)> {
    zip(zip(fa, fb), fc).map(|((a, b), c)| (a, b, c))
}

/// Run a homogeneous list of computations concurrently, collecting results
/// in input order.
///
/// An empty list resolves immediately to an empty `Vec`.
pub fn zip_all<C: 'static, A: 'static>(fxs: Vec<Fx<C, A>>) -> Fx<C, Vec<A>> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        let fxs = fxs.clone();
        let env = env.clone();
        Resume::later(move |k: Continuation<Step>| start_zip_all(fxs, env, k))
    }))))
}

/// Race two computations: the first to settle, with a value or a failure,
/// becomes the result, and the loser is canceled before the result
/// surfaces.
pub fn race<C: 'static, A: 'static>(fa: Fx<C, A>, fb: Fx<C, A>) -> Fx<C, A> {
    race_all(vec![fa, fb])
}

/// Race a list of computations.
///
/// An empty race never settles: the returned computation suspends forever
/// (its cancel handle still works). Callers who cannot rule out an empty
/// list should check before racing.
pub fn race_all<C: 'static, A: 'static>(fxs: Vec<Fx<C, A>>) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        let fxs = fxs.clone();
        let env = env.clone();
        Resume::later(move |k: Continuation<Step>| start_race(fxs, env, k))
    }))))
}

struct ZipState<A, B> {
    left: Option<A>,
    right: Option<B>,
    settled: bool,
    k: Option<Continuation<Step>>,
    cancel_left: Cancel,
    cancel_right: Cancel,
}

fn start_zip<C: 'static, A: 'static, B: 'static>(
    fa: Fx<C, A>,
    fb: Fx<C, B>,
    env: Rc<C>,
    k: Continuation<Step>,
) -> Cancel {
    let state = Rc::new(RefCell::new(ZipState::<A, B> {
        left: None,
        right: None,
        settled: false,
        k: Some(k),
        cancel_left: Cancel::noop(),
        cancel_right: Cancel::noop(),
    }));

    let shared = state.clone();
    let cancel_left = run_node(
        fa.node.clone(),
        env.clone(),
        Box::new(move |step| {
            let mut st = shared.borrow_mut();
            if st.settled {
                return;
            }
            match step {
                Ok(value) => {
                    st.left = Some(downcast::<A>(value));
                    if st.right.is_some() {
                        finish_zip(st);
                    }
                }
                Err(error) => {
                    st.settled = true;
                    let k = st.k.take().expect("zip settled twice");
                    let other = st.cancel_right.clone();
                    drop(st);
                    other.cancel();
                    k(Err(error));
                }
            }
        }),
    );

    {
        let mut st = state.borrow_mut();
        if !st.settled {
            st.cancel_left = cancel_left;
        }
    }

    if !state.borrow().settled {
        let shared = state.clone();
        let cancel_right = run_node(
            fb.node.clone(),
            env,
            Box::new(move |step| {
                let mut st = shared.borrow_mut();
                if st.settled {
                    return;
                }
                match step {
                    Ok(value) => {
                        st.right = Some(downcast::<B>(value));
                        if st.left.is_some() {
                            finish_zip(st);
                        }
                    }
                    Err(error) => {
                        st.settled = true;
                        let k = st.k.take().expect("zip settled twice");
                        let other = st.cancel_left.clone();
                        drop(st);
                        other.cancel();
                        k(Err(error));
                    }
                }
            }),
        );
        let mut st = state.borrow_mut();
        if !st.settled {
            st.cancel_right = cancel_right;
        }
    }

    let shared = state.clone();
    Cancel::new(move || {
        let (left, right) = {
            let st = shared.borrow();
            (st.cancel_left.clone(), st.cancel_right.clone())
        };
        left.cancel();
        right.cancel();
    })
}

fn finish_zip<A: 'static, B: 'static>(mut st: std::cell::RefMut<'_, ZipState<A, B>>) {
    st.settled = true;
    let k = st.k.take().expect("zip settled twice");
    let a = st.left.take().expect("zip left result present");
    let b = st.right.take().expect("zip right result present");
    drop(st);
    k(Ok(Box::new((a, b)) as Value));
}

struct ZipAllState<A> {
    results: Vec<Option<A>>,
    remaining: usize,
    settled: bool,
    k: Option<Continuation<Step>>,
    cancels: Vec<Cancel>,
}

fn start_zip_all<C: 'static, A: 'static>(
    fxs: Vec<Fx<C, A>>,
    env: Rc<C>,
    k: Continuation<Step>,
) -> Cancel {
    if fxs.is_empty() {
        k(Ok(Box::new(Vec::<A>::new()) as Value));
        return Cancel::noop();
    }

    let count = fxs.len();
    let state = Rc::new(RefCell::new(ZipAllState::<A> {
        results: (0..count).map(|_| None).collect(),
        remaining: count,
        settled: false,
        k: Some(k),
        cancels: vec![Cancel::noop(); count],
    }));

    for (index, fx) in fxs.into_iter().enumerate() {
        if state.borrow().settled {
            break;
        }
        let shared = state.clone();
        let cancel = run_node(
            fx.node.clone(),
            env.clone(),
            Box::new(move |step| {
                let mut st = shared.borrow_mut();
                if st.settled {
                    return;
                }
                match step {
                    Ok(value) => {
                        st.results[index] = Some(downcast::<A>(value));
                        st.remaining -= 1;
                        if st.remaining == 0 {
                            st.settled = true;
                            let k = st.k.take().expect("zip_all settled twice");
                            let results: Vec<A> = st
                                .results
                                .iter_mut()
                                .map(|slot| slot.take().expect("zip_all result present"))
                                .collect();
                            drop(st);
                            k(Ok(Box::new(results) as Value));
                        }
                    }
                    Err(error) => {
                        st.settled = true;
                        let k = st.k.take().expect("zip_all settled twice");
                        let cancels = st.cancels.clone();
                        drop(st);
                        for cancel in cancels {
                            cancel.cancel();
                        }
                        k(Err(error));
                    }
                }
            }),
        );
        let mut st = state.borrow_mut();
        if !st.settled {
            st.cancels[index] = cancel;
        }
    }

    let shared = state.clone();
    Cancel::new(move || {
        let cancels = shared.borrow().cancels.clone();
        for cancel in cancels {
            cancel.cancel();
        }
    })
}

struct RaceState {
    settled: bool,
    k: Option<Continuation<Step>>,
    cancels: Vec<Cancel>,
}

fn start_race<C: 'static, A: 'static>(
    fxs: Vec<Fx<C, A>>,
    env: Rc<C>,
    k: Continuation<Step>,
) -> Cancel {
    let count = fxs.len();
    let state = Rc::new(RefCell::new(RaceState {
        settled: false,
        k: Some(k),
        cancels: vec![Cancel::noop(); count],
    }));

    for (index, fx) in fxs.into_iter().enumerate() {
        if state.borrow().settled {
            break;
        }
        let shared = state.clone();
        let cancel = run_node(
            fx.node.clone(),
            env.clone(),
            Box::new(move |step| {
                let mut st = shared.borrow_mut();
                if st.settled {
                    return;
                }
                st.settled = true;
                let k = st.k.take().expect("race settled twice");
                let losers = st.cancels.clone();
                drop(st);
                // Losers are canceled before the winner's result surfaces,
                // so there is no observable half-canceled window.
                for loser in losers {
                    loser.cancel();
                }
                k(step);
            }),
        );
        let mut st = state.borrow_mut();
        if !st.settled {
            st.cancels[index] = cancel;
        }
    }

    let shared = state.clone();
    Cancel::new(move || {
        let cancels = shared.borrow().cancels.clone();
        for cancel in cancels {
            cancel.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::{fail, pure};
    use crate::error::FxError;
    use crate::testing::run_now;

    #[test]
    fn zip_pairs_synchronous_results() {
        let fx: Fx<(), (i32, &str)> = zip(pure(1), pure("two"));
        assert_eq!(run_now(&fx, ()), Ok((1, "two")));
    }

    #[test]
    fn zip3_flattens() {
        let fx: Fx<(), (i32, i32, i32)> = zip3(pure(1), pure(2), pure(3));
        assert_eq!(run_now(&fx, ()), Ok((1, 2, 3)));
    }

    #[test]
    fn zip_all_collects_in_order() {
        let fx: Fx<(), Vec<i32>> = zip_all(vec![pure(1), pure(2), pure(3)]);
        assert_eq!(run_now(&fx, ()), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn zip_all_of_nothing_is_an_empty_vec() {
        let fx: Fx<(), Vec<i32>> = zip_all(Vec::new());
        assert_eq!(run_now(&fx, ()), Ok(Vec::new()));
    }

    #[test]
    fn zip_propagates_the_first_failure() {
        let fx: Fx<(), (i32, i32)> = zip(fail::<(), i32>(FxError::new("left")), pure(2));
        assert_eq!(run_now(&fx, ()), Err(FxError::new("left")));
    }

    #[test]
    fn race_of_synchronous_children_takes_the_first() {
        let fx: Fx<(), i32> = race(pure(1), pure(2));
        assert_eq!(run_now(&fx, ()), Ok(1));
    }

    #[test]
    fn race_surfaces_an_early_failure() {
        let fx: Fx<(), i32> = race(fail::<(), i32>(FxError::new("boom")), pure(2));
        assert_eq!(run_now(&fx, ()), Err(FxError::new("boom")));
    }
}
