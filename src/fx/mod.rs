//! The effect computation value.
//!
//! An [`Fx<C, A>`] describes a computation that, given an environment of
//! capabilities `C`, eventually produces an `A` or fails with an
//! [`FxError`]. It is a plain immutable value: building one performs no
//! work, and running one never mutates it. Because every node in the
//! description is a reusable closure rather than a live iterator, the same
//! `Fx` can be started any number of times and each run gets fresh,
//! independent execution state.
//!
//! Composition is by value: [`Fx::and_then`] sequences dependent steps with
//! ordinary pure code in the closures between them, [`Fx::catch_all`]
//! intercepts the failure channel, and [`Fx::embed`] adapts a computation to
//! a differently-shaped environment. The [`crate::run_fx`] driver executes
//! the description with a constant-depth call stack no matter how many
//! synchronous steps are chained.

pub mod constructors;

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use crate::error::FxError;
use crate::resume::{Continuation, Resume};
use crate::run::run_node;

/// Type-erased intermediate value threaded between steps.
pub(crate) type Value = Box<dyn Any>;

/// What a single step resolves to: a value, or a failure headed for the
/// nearest enclosing handler.
pub(crate) type Step = Result<Value, FxError>;

/// The defunctionalized description the driver walks.
///
/// Closures are `Fn`, not `FnOnce`: a node may be visited once per run, any
/// number of runs.
pub(crate) enum Node<C> {
    /// Produce a value (or failure) without touching the environment.
    Pure(Rc<dyn Fn() -> Step>),
    /// A single effect step over the environment.
    Effect(Rc<dyn Fn(&Rc<C>) -> Resume<Step>>),
    /// Sequence: run the inner node, then feed its value to the
    /// continuation to obtain the next node.
    AndThen(Rc<Node<C>>, Rc<dyn Fn(Value) -> Rc<Node<C>>>),
    /// Intercept failures from the inner node with a handler.
    Catch(Rc<Node<C>>, Rc<dyn Fn(FxError) -> Rc<Node<C>>>),
}

/// A node holding an already-computed step. Created fresh during a run and
/// driven exactly once, so the single-shot cell never observes a second take.
pub(crate) fn done_node<C>(step: Step) -> Rc<Node<C>> {
    let cell = std::cell::RefCell::new(Some(step));
    Rc::new(Node::Pure(Rc::new(move || {
        cell.borrow_mut()
            .take()
            .expect("single-shot step already consumed")
    })))
}

/// Recover a typed value from the erased step protocol. The driver only
/// ever pairs a value with the continuation that produced its type, so a
/// mismatch is an internal invariant violation, not a user error.
pub(crate) fn downcast<A: 'static>(value: Value) -> A {
    *value
        .downcast::<A>()
        .expect("effect step resolved to a value of an unexpected type")
}

// Deep left-nested chains are the whole point of this crate, and a naive
// recursive drop of a 10k-node chain would overflow the stack that the
// driver so carefully keeps flat. Steal children into an explicit stack
// and release them iteratively instead.
impl<C> Drop for Node<C> {
    fn drop(&mut self) {
        let mut stack: Vec<Rc<Node<C>>> = Vec::new();
        steal_child(self, &mut stack);
        while let Some(child) = stack.pop() {
            if let Ok(mut node) = Rc::try_unwrap(child) {
                steal_child(&mut node, &mut stack);
            }
        }
    }
}

fn steal_child<C>(node: &mut Node<C>, stack: &mut Vec<Rc<Node<C>>>) {
    if let Node::AndThen(inner, _) | Node::Catch(inner, _) = node {
        let leaf: Rc<Node<C>> = Rc::new(Node::Pure(Rc::new(|| {
            Err(FxError::new("detached node driven after drop"))
        })));
        stack.push(mem::replace(inner, leaf));
    }
}

/// A suspendable, resumable, cancelable computation.
///
/// `Fx<C, A>` needs an environment `C` to run and produces an `A` (or an
/// [`FxError`] through the failure channel). Values are immutable and cheap
/// to clone; cloning shares the description, never execution state.
///
/// # Example
///
/// ```
/// use eddy::{pure, run_fx};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let fx: eddy::Fx<(), i32> = pure(20).and_then(|n| pure(n + 22));
///
/// let out = Rc::new(Cell::new(0));
/// let slot = out.clone();
/// let _cancel = run_fx(&fx, (), move |r| slot.set(r.unwrap_or(-1)));
/// assert_eq!(out.get(), 42);
/// ```
pub struct Fx<C, A> {
    pub(crate) node: Rc<Node<C>>,
    marker: PhantomData<fn() -> A>,
}

impl<C, A> Clone for Fx<C, A> {
    fn clone(&self) -> Self {
        Fx {
            node: self.node.clone(),
            marker: PhantomData,
        }
    }
}

impl<C, A> fmt::Debug for Fx<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fx")
    }
}

impl<C: 'static, A: 'static> Fx<C, A> {
    pub(crate) fn from_node(node: Rc<Node<C>>) -> Self {
        Fx {
            node,
            marker: PhantomData,
        }
    }

    /// Apply a pure function to the result.
    pub fn map<B: 'static>(self, f: impl Fn(A) -> B + 'static) -> Fx<C, B> {
        Fx::from_node(Rc::new(Node::AndThen(
            self.node.clone(),
            Rc::new(move |value| done_node(Ok(Box::new(f(downcast::<A>(value)))))),
        )))
    }

    /// Sequence a dependent computation after this one.
    ///
    /// This is the composition backbone: any amount of pure code may run
    /// inside `f` before it returns the next `Fx`. Chains of any length
    /// execute in constant call-stack depth.
    pub fn and_then<B: 'static>(self, f: impl Fn(A) -> Fx<C, B> + 'static) -> Fx<C, B> {
        Fx::from_node(Rc::new(Node::AndThen(
            self.node.clone(),
            Rc::new(move |value| f(downcast::<A>(value)).node.clone()),
        )))
    }

    /// Transform a failure without recovering from it.
    pub fn map_err(self, f: impl Fn(FxError) -> FxError + 'static) -> Fx<C, A> {
        self.catch_all(move |e| constructors::fail(f(e)))
    }

    /// Add context to any failure escaping this computation.
    pub fn context(self, message: impl Into<String>) -> Fx<C, A> {
        let message = message.into();
        self.map_err(move |e| e.context(message.clone()))
    }

    /// Intercept the failure channel.
    ///
    /// When any step of this computation fails, the steps between the
    /// failure point and this handler are discarded unrun, and the handler's
    /// computation takes over as the result.
    pub fn catch_all(self, handler: impl Fn(FxError) -> Fx<C, A> + 'static) -> Fx<C, A> {
        Fx::from_node(Rc::new(Node::Catch(
            self.node.clone(),
            Rc::new(move |e| handler(e).node.clone()),
        )))
    }

    /// Reify the failure channel into the result.
    ///
    /// The returned computation always succeeds, with `Err` carrying what
    /// would otherwise have short-circuited.
    pub fn attempt(self) -> Fx<C, Result<A, FxError>> {
        self.map(Ok)
            .catch_all(|e| constructors::from_fn(move |_| Ok(Err(e.clone()))))
    }

    /// Adapt this computation to an environment of a different shape.
    ///
    /// `f` builds the environment this computation requires out of the one
    /// the caller has. The inner run shares the adapted environment and
    /// links its cancellation into the outer run.
    pub fn embed<C0: 'static>(self, f: impl Fn(&C0) -> C + 'static) -> Fx<C0, A> {
        let node = self.node.clone();
        Fx::from_node(Rc::new(Node::Effect(Rc::new(move |outer: &Rc<C0>| {
            let env = Rc::new(f(outer.as_ref()));
            let node = node.clone();
            Resume::later(move |k: Continuation<Step>| run_node(node, env, k))
        }))))
    }
}
