//! Tracing instrumentation for computations (requires the `tracing`
//! feature).

use crate::constructors::{fail, from_fn};
use crate::fx::Fx;

impl<C: 'static, A: 'static> Fx<C, A> {
    /// Emit `tracing` debug events around this computation: one when a run
    /// starts, one when it completes, one when it fails.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let fx = fetch_user(id).traced("fetch_user");
    /// ```
    pub fn traced(self, label: &'static str) -> Fx<C, A> {
        from_fn(move |_: &C| {
            tracing::debug!(target: "eddy", label, "starting");
            Ok(())
        })
        .and_then(move |()| self.clone())
        .map(move |value| {
            tracing::debug!(target: "eddy", label, "completed");
            value
        })
        .catch_all(move |error| {
            tracing::debug!(target: "eddy", label, error = %error, "failed");
            fail(error)
        })
    }
}
