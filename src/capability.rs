//! The dynamic capability record.
//!
//! Typed environments (any `C` you hand to [`crate::run_fx`]) cover the
//! common case, but progressive capability satisfaction ("here is part of
//! what this computation needs, the rest comes from whoever runs it")
//! wants an environment that can be merged. [`CapSet`] is that environment:
//! a clonable record of capability objects keyed by type, with shallow
//! last-writer-wins merging.
//!
//! Capabilities are looked up by the type they were registered under, which
//! is usually a trait object:
//!
//! ```rust,ignore
//! let env = CapSet::new()
//!     .with::<dyn Delay>(Rc::new(timer))
//!     .with_value(Config { retries: 3 });
//!
//! let fx = cap::<Config>().map(|cfg| cfg.retries);
//! ```
//!
//! Presence is checked at lookup time, not construction time: driving a
//! step that asks for an unregistered capability panics with the capability
//! name. Requirements are treated as satisfied by construction; a missing
//! one is a wiring bug, not a recoverable error.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::fx::{Fx, Node, Step};
use crate::resume::{Continuation, Resume};
use crate::run::run_node;
use crate::timer::Delay;

/// A record of capability implementations, keyed by registration type.
///
/// Cloning is shallow: the contained capability objects are shared by
/// reference, matching the read-mostly, single-threaded sharing model of
/// concurrent children.
#[derive(Clone, Default)]
pub struct CapSet {
    entries: HashMap<TypeId, Rc<dyn Any>>,
}

impl CapSet {
    /// An empty record.
    pub fn new() -> Self {
        CapSet::default()
    }

    /// Register a capability under type `T`, replacing any previous entry.
    ///
    /// `T` may be unsized, so trait objects register naturally:
    /// `set.with::<dyn Delay>(Rc::new(timer))`.
    pub fn with<T: ?Sized + 'static>(mut self, value: Rc<T>) -> Self {
        self.entries.insert(TypeId::of::<T>(), Rc::new(value));
        self
    }

    /// Register a plain value under its own type.
    pub fn with_value<T: 'static>(self, value: T) -> Self {
        self.with(Rc::new(value))
    }

    /// Look up the capability registered under `T`.
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Rc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Rc<T>>())
            .cloned()
    }

    /// Look up the capability registered under `T`, panicking with the
    /// capability's name if it was never supplied.
    pub fn expect<T: ?Sized + 'static>(&self) -> Rc<T> {
        self.get::<T>()
            .unwrap_or_else(|| panic!("missing capability: {}", std::any::type_name::<T>()))
    }

    /// Whether a capability is registered under `T`.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Shallow merge: entries from `over` win on key collision.
    pub fn merged(&self, over: &CapSet) -> CapSet {
        let mut entries = self.entries.clone();
        for (key, value) in &over.entries {
            entries.insert(*key, value.clone());
        }
        CapSet { entries }
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no capabilities are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CapSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapSet")
            .field("capabilities", &self.entries.len())
            .finish()
    }
}

/// A record containing a timer delegates [`Delay`] to it, so `delay` and
/// `timeout` run unchanged against a `CapSet` environment.
impl Delay for CapSet {
    fn delay(&self, duration: Duration) -> Resume<()> {
        self.expect::<dyn Delay>().delay(duration)
    }
}

/// Pull one capability out of the ambient record.
///
/// Panics when driven against a record missing `T` (see module docs).
pub fn cap<T: ?Sized + 'static>() -> Fx<CapSet, Rc<T>> {
    crate::fx::constructors::asks(|set: &CapSet| set.expect::<T>())
}

impl<A: 'static> Fx<CapSet, A> {
    /// Satisfy some or all of this computation's required capabilities.
    ///
    /// When the returned computation is driven, `partial` is merged over
    /// the ambient record (supplied capabilities win on collision) and
    /// the original computation runs against the merged record.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// // `fetch` needs an HttpClient; bake one in, leave the rest ambient.
    /// let wired = fetch.using(CapSet::new().with::<dyn HttpClient>(client));
    /// ```
    pub fn using(self, partial: CapSet) -> Fx<CapSet, A> {
        let node = self.node.clone();
        Fx::from_node(Rc::new(Node::Effect(Rc::new(move |ambient: &Rc<CapSet>| {
            let merged = Rc::new(ambient.merged(&partial));
            let node = node.clone();
            Resume::later(move |k: Continuation<Step>| run_node(node, merged, k))
        }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::pure;
    use crate::testing::run_now;

    #[test]
    fn with_value_and_get_round_trip() {
        #[derive(Debug, PartialEq)]
        struct Config {
            retries: u32,
        }

        let set = CapSet::new().with_value(Config { retries: 3 });
        assert_eq!(set.get::<Config>().map(|c| c.retries), Some(3));
        assert!(set.get::<String>().is_none());
    }

    #[test]
    fn merged_prefers_the_overlay() {
        let base = CapSet::new().with_value(1i64).with_value("base");
        let over = CapSet::new().with_value(2i64);

        let merged = base.merged(&over);
        assert_eq!(merged.expect::<i64>().as_ref(), &2);
        assert_eq!(merged.expect::<&str>().as_ref(), &"base");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn using_supplied_capability_wins_over_ambient() {
        let fx = cap::<i64>().map(|v| *v);
        let wired = fx.using(CapSet::new().with_value(1i64));

        let ambient = CapSet::new().with_value(999i64).with_value("b");
        assert_eq!(run_now(&wired, ambient), Ok(1));
    }

    #[test]
    fn using_leaves_unsatisfied_capabilities_ambient() {
        let fx = cap::<i64>().and_then(|n| cap::<&str>().map(move |s| format!("{}{}", s, n)));
        let wired = fx.using(CapSet::new().with_value(1i64));

        let ambient = CapSet::new().with_value(999i64).with_value("b");
        assert_eq!(run_now(&wired, ambient), Ok("b1".to_string()));
    }

    #[test]
    fn trait_object_capabilities_register_and_resolve() {
        trait Greeter {
            fn greet(&self) -> String;
        }
        struct English;
        impl Greeter for English {
            fn greet(&self) -> String {
                "hello".to_string()
            }
        }

        let set = CapSet::new().with::<dyn Greeter>(Rc::new(English));
        assert_eq!(set.expect::<dyn Greeter>().greet(), "hello");
    }

    #[test]
    #[should_panic(expected = "missing capability")]
    fn expect_panics_on_missing_capability() {
        let fx = cap::<i64>().map(|v| *v);
        let _ = run_now(&fx, CapSet::new());
    }

    #[test]
    fn pure_needs_nothing_from_the_record() {
        let fx: Fx<CapSet, i32> = pure(5);
        assert_eq!(run_now(&fx, CapSet::new()), Ok(5));
    }
}
