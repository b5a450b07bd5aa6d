//! # Eddy
//!
//! A small runtime for suspendable, resumable, cancelable computations.
//!
//! ## Philosophy
//!
//! An [`Fx<C, A>`] is a first-class description of an effectful computation:
//! it needs an environment of capabilities `C` and eventually produces an
//! `A`. Descriptions are immutable values: building one does nothing, and
//! the same value can be started any number of times, each run fully
//! independent. The [`run_fx`] trampoline drives a run with a constant-depth
//! call stack, staying synchronous for as long as each step's [`Resume`] is
//! immediate and suspending only when a value genuinely arrives later.
//! Every suspension is cancelable through one stable [`Cancel`] handle.
//!
//! The runtime schedules nothing and spawns nothing: "concurrency"
//! ([`zip`], [`race`], [`timeout`]) is cooperative interleaving of
//! callbacks delivered by the host.
//!
//! ## Quick Example
//!
//! ```
//! use eddy::{pure, run_fx, zip};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let sum: eddy::Fx<(), i32> = pure(40).and_then(|n| pure(n + 2));
//! let pair = zip(sum, pure("ready"));
//!
//! let out = Rc::new(Cell::new(None));
//! let slot = out.clone();
//! let _cancel = run_fx(&pair, (), move |r| slot.set(r.ok()));
//!
//! assert_eq!(out.get(), Some((42, "ready")));
//! ```
//!
//! ## Failure
//!
//! Domain failure is a value channel, not an unwind: [`fail`] raises an
//! [`FxError`] that short-circuits past intervening steps to the nearest
//! [`Fx::catch_all`], or to the top-level continuation if uncaught. Host
//! panics are never swallowed.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cancel;
pub mod capability;
pub mod compat;
pub mod error;
pub mod fx;
pub mod parallel;
pub mod resume;
pub mod run;
pub mod testing;
pub mod timer;
#[cfg(feature = "tracing")]
mod traced;

// Re-exports
pub use cancel::Cancel;
pub use capability::{cap, CapSet};
pub use error::FxError;
pub use fx::constructors;
pub use fx::constructors::{
    ask, asks, defer, fail, from_async, from_fn, from_result, op, pure, try_op,
};
pub use fx::Fx;
pub use parallel::{race, race_all, zip, zip3, zip_all};
pub use resume::{run_resume, Continuation, Resume};
pub use run::{run_fx, run_fx_shared};
pub use timer::{delay, timeout, Delay};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancel::Cancel;
    pub use crate::capability::{cap, CapSet};
    pub use crate::compat::execute;
    pub use crate::error::FxError;
    pub use crate::fx::constructors::{
        ask, asks, defer, fail, from_async, from_fn, from_result, op, pure, try_op,
    };
    pub use crate::fx::Fx;
    pub use crate::parallel::{race, race_all, zip, zip3, zip_all};
    pub use crate::resume::{run_resume, Continuation, Resume};
    pub use crate::run::{run_fx, run_fx_shared};
    pub use crate::timer::{delay, timeout, Delay};
}
