//! The failure channel's error type.
//!
//! Domain failures travel through computations as values: [`crate::fail`]
//! raises an [`FxError`], [`Fx::catch_all`](crate::Fx::catch_all) intercepts
//! it, and an uncaught failure reaches the top-level continuation as the
//! `Err` arm of the final result. Host-level panics are deliberately not
//! captured; only this explicit channel is "soft".

use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// The error carried by the short-circuiting failure channel.
///
/// `FxError` is cheap to clone (the optional source is reference-counted)
/// and accumulates context as it propagates:
///
/// ```
/// use eddy::FxError;
///
/// let err = FxError::new("connection refused").context("loading config");
/// assert_eq!(err.to_string(), "loading config: connection refused");
/// ```
#[derive(Clone)]
pub struct FxError {
    kind: Kind,
    message: String,
    context: Vec<String>,
    source: Option<Rc<dyn Error>>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    Failure,
    Timeout,
    Canceled,
}

impl FxError {
    /// A domain failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        FxError {
            kind: Kind::Failure,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// A failure wrapping an underlying error as its source.
    pub fn wrap(message: impl Into<String>, source: impl Error + 'static) -> Self {
        FxError {
            kind: Kind::Failure,
            message: message.into(),
            context: Vec::new(),
            source: Some(Rc::new(source)),
        }
    }

    /// The failure produced when a deadline elapses before a computation
    /// settles.
    pub fn timeout(after: Duration) -> Self {
        FxError {
            kind: Kind::Timeout,
            message: format!("timeout: {}ms", after.as_millis()),
            context: Vec::new(),
            source: None,
        }
    }

    /// The failure reported when a run is canceled before completing.
    pub fn canceled() -> Self {
        FxError {
            kind: Kind::Canceled,
            message: "computation canceled".to_string(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Add a layer of context; the most recent layer prints first.
    pub fn context(mut self, message: impl Into<String>) -> Self {
        self.context.push(message.into());
        self
    }

    /// The original message, without context layers.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Context layers, innermost first.
    pub fn context_trail(&self) -> &[String] {
        &self.context
    }

    /// Whether this failure came from an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        self.kind == Kind::Timeout
    }

    /// Whether this failure reports a canceled run.
    pub fn is_canceled(&self) -> bool {
        self.kind == Kind::Canceled
    }
}

impl fmt::Display for FxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for layer in self.context.iter().rev() {
            write!(f, "{layer}: ")?;
        }
        f.write_str(&self.message)
    }
}

impl fmt::Debug for FxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FxError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

impl Error for FxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref()
    }
}

/// Equality ignores the source; two failures are equal when their kind,
/// message, and context trail match. This keeps assertions in tests direct.
impl PartialEq for FxError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.message == other.message
            && self.context == other.context
    }
}

impl Eq for FxError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prints_context_outermost_last() {
        let err = FxError::new("boom")
            .context("step two")
            .context("step one");
        assert_eq!(err.to_string(), "step one: step two: boom");
    }

    #[test]
    fn timeout_carries_the_deadline() {
        let err = FxError::timeout(Duration::from_millis(100));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "timeout: 100ms");
    }

    #[test]
    fn wrap_exposes_the_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "refused");
        let err = FxError::wrap("connect failed", io);
        assert!(err.source().is_some());
        assert_eq!(err.message(), "connect failed");
    }

    #[test]
    fn equality_ignores_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "refused");
        let a = FxError::wrap("connect failed", io);
        let b = FxError::new("connect failed");
        assert_eq!(a, b);
    }
}
