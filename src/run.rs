//! The driving loop.
//!
//! [`run_fx`] walks a computation's node tree with an explicit frame stack,
//! resolving synchronous steps in place and suspending on asynchronous ones.
//! The walk is an iterative loop, so a run chews through any number of
//! synchronous steps with constant call-stack depth; only an asynchronous
//! resumption re-enters the loop, and that happens on a fresh call stack.
//!
//! Each run owns its state (current node, frame stack, cancel handle); the
//! computation value itself is never mutated, which is what makes restarting
//! the same `Fx` safe.

use std::cell::Cell;
use std::rc::Rc;

use crate::cancel::Cancel;
use crate::error::FxError;
use crate::fx::{downcast, Fx, Node, Step, Value};
use crate::resume::Resume;

/// Pending work on the unwind path: either a value continuation or a
/// failure handler. Handlers are skipped on success; continuations are
/// discarded on failure.
enum Frame<C> {
    Then(Rc<dyn Fn(Value) -> Rc<Node<C>>>),
    Catch(Rc<dyn Fn(FxError) -> Rc<Node<C>>>),
}

/// Run a computation against an environment.
///
/// `k` receives the final result exactly once: the domain value on
/// success, or the failure if the channel was never caught. The returned
/// [`Cancel`] stops whichever asynchronous step is in flight; after it
/// fires, `k` is never invoked.
///
/// Synchronous computations complete before `run_fx` returns, in which case
/// the returned handle is already settled.
pub fn run_fx<C: 'static, A: 'static>(
    fx: &Fx<C, A>,
    env: C,
    k: impl FnOnce(Result<A, FxError>) + 'static,
) -> Cancel {
    run_fx_shared(fx, Rc::new(env), k)
}

/// Like [`run_fx`], but sharing an environment across runs.
pub fn run_fx_shared<C: 'static, A: 'static>(
    fx: &Fx<C, A>,
    env: Rc<C>,
    k: impl FnOnce(Result<A, FxError>) + 'static,
) -> Cancel {
    run_node(
        fx.node.clone(),
        env,
        Box::new(move |step| k(step.map(downcast::<A>))),
    )
}

/// Crate-internal entry point: drive a node tree and deliver the erased
/// step result. Composite effects use this to start children.
pub(crate) fn run_node<C: 'static>(
    node: Rc<Node<C>>,
    env: Rc<C>,
    k: Box<dyn FnOnce(Step)>,
) -> Cancel {
    let handle = Cancel::pending();
    drive(node, Vec::new(), env, handle.clone(), k);
    handle
}

/// The trampoline proper. Iterative on the synchronous path; on suspension
/// it parks the frame stack in the resumption continuation and returns.
fn drive<C: 'static>(
    node: Rc<Node<C>>,
    mut frames: Vec<Frame<C>>,
    env: Rc<C>,
    handle: Cancel,
    k: Box<dyn FnOnce(Step)>,
) {
    let mut node = node;
    loop {
        let current = node;
        let step = match &*current {
            Node::AndThen(inner, f) => {
                frames.push(Frame::Then(f.clone()));
                node = inner.clone();
                continue;
            }
            Node::Catch(inner, handler) => {
                frames.push(Frame::Catch(handler.clone()));
                node = inner.clone();
                continue;
            }
            Node::Pure(thunk) => thunk(),
            Node::Effect(effect) => match effect(&env) {
                Resume::Now(step) => step,
                Resume::Later(run) => {
                    let fired = Rc::new(Cell::new(false));
                    let fired_inner = fired.clone();
                    let resume_env = env.clone();
                    let resume_handle = handle.clone();
                    let cancel = run(Box::new(move |step| {
                        fired_inner.set(true);
                        // A continuation racing in after cancellation is
                        // dropped on the floor, per the Cancel contract.
                        if resume_handle.is_canceled() {
                            return;
                        }
                        settle(step, frames, resume_env, resume_handle, k);
                    }));
                    // If the producer resolved synchronously, the handle
                    // already points past this step; don't clobber it.
                    if !fired.get() {
                        handle.relink(cancel);
                    }
                    return;
                }
            },
        };

        match unwind(step, &mut frames) {
            Unwound::Next(next) => node = next,
            Unwound::Done(result) => {
                handle.disarm();
                k(result);
                return;
            }
        }
    }
}

/// Re-enter the loop after an asynchronous step resolves.
fn settle<C: 'static>(
    step: Step,
    mut frames: Vec<Frame<C>>,
    env: Rc<C>,
    handle: Cancel,
    k: Box<dyn FnOnce(Step)>,
) {
    match unwind(step, &mut frames) {
        Unwound::Next(node) => drive(node, frames, env, handle, k),
        Unwound::Done(result) => {
            handle.disarm();
            k(result);
        }
    }
}

enum Unwound<C> {
    Next(Rc<Node<C>>),
    Done(Step),
}

/// Feed a resolved step back into the pending frames.
///
/// Success pops to the nearest value continuation; failure pops to the
/// nearest handler, discarding the continuations in between so no code
/// after a failure point ever runs.
fn unwind<C>(step: Step, frames: &mut Vec<Frame<C>>) -> Unwound<C> {
    match step {
        Ok(value) => {
            while let Some(frame) = frames.pop() {
                match frame {
                    Frame::Then(f) => return Unwound::Next(f(value)),
                    Frame::Catch(_) => {}
                }
            }
            Unwound::Done(Ok(value))
        }
        Err(error) => {
            while let Some(frame) = frames.pop() {
                if let Frame::Catch(handler) = frame {
                    return Unwound::Next(handler(error));
                }
            }
            Unwound::Done(Err(error))
        }
    }
}
