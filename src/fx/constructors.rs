//! Constructor functions for creating computations.
//!
//! These are the leaves everything else composes from: immediate values,
//! single effect steps over the environment, deferred synchronous work,
//! callback-based asynchronous tasks, and environment access.

use std::rc::Rc;

use crate::cancel::Cancel;
use crate::error::FxError;
use crate::fx::{Fx, Node, Step, Value};
use crate::resume::{Continuation, Resume};

/// A computation that immediately produces `value`, requiring nothing from
/// the environment.
///
/// `A: Clone` because the same `Fx` may be started many times and each run
/// gets its own copy.
///
/// # Example
///
/// ```
/// use eddy::{pure, testing::run_now};
///
/// let fx: eddy::Fx<(), i32> = pure(42);
/// assert_eq!(run_now(&fx, ()), Ok(42));
/// ```
pub fn pure<C: 'static, A: Clone + 'static>(value: A) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Pure(Rc::new(move || {
        Ok(Box::new(value.clone()) as Value)
    }))))
}

/// A computation that short-circuits with `error`.
///
/// Polymorphic in its result type: a failure never produces a value, so it
/// slots into any position in a chain.
pub fn fail<C: 'static, A: 'static>(error: FxError) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Pure(Rc::new(move || Err(error.clone())))))
}

/// A single effect step: invoke a capability on the environment and resume
/// with its result.
///
/// # Example
///
/// ```rust,ignore
/// struct Console { /* ... */ }
/// impl Console {
///     fn read_line(&self) -> Resume<String> { /* ... */ }
/// }
///
/// let fx: Fx<Console, String> = op(|c: &Console| c.read_line());
/// ```
pub fn op<C: 'static, A: 'static>(f: impl Fn(&C) -> Resume<A> + 'static) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        f(env.as_ref()).map(|a| Ok(Box::new(a) as Value))
    }))))
}

/// A single effect step that may fail.
pub fn try_op<C: 'static, A: 'static>(
    f: impl Fn(&C) -> Resume<Result<A, FxError>> + 'static,
) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        f(env.as_ref()).map(|r| r.map(|a| Box::new(a) as Value))
    }))))
}

/// Defer a synchronous effect until the computation runs.
///
/// Distinguishes lazy effectful work from an already-known value: the
/// closure runs once per run, not at construction time.
pub fn from_fn<C: 'static, A: 'static>(
    f: impl Fn(&C) -> Result<A, FxError> + 'static,
) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        Resume::Now(f(env.as_ref()).map(|a| Box::new(a) as Value))
    }))))
}

/// Lift an already-computed result into a computation.
pub fn from_result<C: 'static, A: Clone + 'static>(result: Result<A, FxError>) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Pure(Rc::new(move || {
        result.clone().map(|a| Box::new(a) as Value)
    }))))
}

/// Lift a callback-based asynchronous task into a computation.
///
/// `task` is started once per run; it receives the continuation to resolve
/// and returns the [`Cancel`] that stops the pending work.
///
/// # Example
///
/// ```rust,ignore
/// let fx: Fx<(), Reply> = from_async(|k| {
///     let request = client.send(move |reply| k(reply));
///     Cancel::new(move || request.abort())
/// });
/// ```
pub fn from_async<C: 'static, A: 'static>(
    task: impl Fn(Continuation<A>) -> Cancel + 'static,
) -> Fx<C, A> {
    let task = Rc::new(task);
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |_env: &Rc<C>| {
        let task = task.clone();
        Resume::later(move |k: Continuation<Step>| {
            task(Box::new(move |a| k(Ok(Box::new(a) as Value))))
        })
    }))))
}

/// Build the computation afresh on every run.
///
/// This is the restartable-laziness primitive: `f` plays the role of a
/// generator function, producing an independent computation per start. It is
/// also the escape hatch for recursion:
///
/// ```
/// use eddy::{defer, pure, testing::run_now, Fx};
///
/// fn countdown(n: i64) -> Fx<(), i64> {
///     if n <= 0 {
///         pure(0)
///     } else {
///         defer(move || countdown(n - 1)).map(move |rest| rest + n)
///     }
/// }
///
/// assert_eq!(run_now(&countdown(100), ()), Ok(5050));
/// ```
pub fn defer<C: 'static, A: 'static>(f: impl Fn() -> Fx<C, A> + 'static) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::AndThen(
        Rc::new(Node::Pure(Rc::new(|| Ok(Box::new(()) as Value)))),
        Rc::new(move |_| f().node.clone()),
    )))
}

/// Request the ambient environment itself as a value.
pub fn ask<C: Clone + 'static>() -> Fx<C, C> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(|env: &Rc<C>| {
        Resume::Now(Ok(Box::new(env.as_ref().clone()) as Value))
    }))))
}

/// Project a value out of the ambient environment.
///
/// # Example
///
/// ```
/// use eddy::{asks, testing::run_now};
///
/// #[derive(Clone)]
/// struct Config {
///     retries: u32,
/// }
///
/// let fx = asks(|c: &Config| c.retries * 2);
/// assert_eq!(run_now(&fx, Config { retries: 3 }), Ok(6));
/// ```
pub fn asks<C: 'static, A: 'static>(f: impl Fn(&C) -> A + 'static) -> Fx<C, A> {
    Fx::from_node(Rc::new(Node::Effect(Rc::new(move |env: &Rc<C>| {
        Resume::Now(Ok(Box::new(f(env.as_ref())) as Value))
    }))))
}
