//! Bridges to future-based hosts.
//!
//! The runtime itself is callback-driven, but consumers often live in async
//! Rust. [`execute`] exposes a run as a `Future`; with the `async` feature,
//! [`TokioTimer`] supplies the [`Delay`] capability from tokio's clock so
//! computations can suspend on real time inside a
//! [`tokio::task::LocalSet`].

use futures::channel::oneshot;

use crate::error::FxError;
use crate::fx::Fx;
use crate::run::run_fx;

#[cfg(feature = "async")]
use {
    crate::cancel::Cancel,
    crate::resume::Resume,
    crate::timer::Delay,
    std::time::Duration,
};

/// Run a computation and await its result.
///
/// The returned future resolves when the run settles. If the run is
/// canceled out from under it, the future resolves to a failure for which
/// [`FxError::is_canceled`] holds.
///
/// The run's asynchronous steps must be driven by the surrounding executor
/// (e.g. [`TokioTimer`] timers on a `LocalSet`); a computation whose
/// effects are all synchronous resolves immediately on any executor.
pub async fn execute<C: 'static, A: 'static>(fx: &Fx<C, A>, env: C) -> Result<A, FxError> {
    let (tx, rx) = oneshot::channel();
    let _cancel = run_fx(fx, env, move |result| {
        let _ = tx.send(result);
    });
    rx.await.unwrap_or_else(|_| Err(FxError::canceled()))
}

/// A [`Delay`] capability backed by tokio's timer.
///
/// Spawns the wait as a local task, so runs using it must execute inside a
/// [`tokio::task::LocalSet`]. Canceling a pending delay aborts the task.
#[cfg(feature = "async")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTimer;

#[cfg(feature = "async")]
impl Delay for TokioTimer {
    fn delay(&self, duration: Duration) -> Resume<()> {
        Resume::later(move |k| {
            let task = tokio::task::spawn_local(async move {
                tokio::time::sleep(duration).await;
                k(());
            });
            Cancel::new(move || task.abort())
        })
    }
}
