//! Per-document evaluation events.
//!
//! The engine reports what it did to each document (fields it materialized,
//! the match outcome, the size of a projection) as [`Event`]s. Events are
//! logged at TRACE under [`DEV_TARGET`] and, while a [`Capture`] is alive on
//! the current thread, collected for inspection. Nothing is formatted when
//! neither is listening.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

/// Log target of [`devtrace!`](crate::devtrace) events.
pub const DEV_TARGET: &str = "docsearch::dev";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<Event>>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A consumable lazy value was replaced by its concrete form. `path`
    /// names the field from the document root; a selection step shows as
    /// `<op>` and positions inside it are relative to the selection.
    Materialized { path: String },
    Matched { terms: usize, matched: bool },
    Projected { keys: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Materialized { path } => write!(f, "materialized {path}"),
            Self::Matched { terms, matched } => write!(f, "match over {terms} term(s): {matched}"),
            Self::Projected { keys } => write!(f, "projected to {keys} key(s)"),
        }
    }
}

/// Collects the events of the current thread until dropped.
#[must_use = "events are only collected while the capture is alive"]
pub struct Capture {
    // bound to the thread whose events it owns
    _thread: PhantomData<*const ()>,
}

impl Capture {
    /// Starts collecting, discarding anything an earlier capture left.
    pub fn start() -> Self {
        CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
        Self { _thread: PhantomData }
    }

    /// Takes the events collected so far.
    #[must_use]
    pub fn take(&self) -> Vec<Event> {
        CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }

    /// Paths of the `Materialized` events collected so far, without taking
    /// them.
    #[must_use]
    pub fn materialized(&self) -> Vec<String> {
        CAPTURED.with(|c| {
            c.borrow()
                .iter()
                .flatten()
                .filter_map(|e| match e {
                    Event::Materialized { path } => Some(path.clone()),
                    _ => None,
                })
                .collect()
        })
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURED.with(|c| *c.borrow_mut() = None);
    }
}

/// Whether an event emitted now would be seen by anyone.
#[must_use]
pub fn enabled() -> bool {
    CAPTURED.with(|c| c.borrow().is_some()) || log::log_enabled!(target: DEV_TARGET, log::Level::Trace)
}

#[doc(hidden)]
pub fn emit(event: Event) {
    log::trace!(target: DEV_TARGET, "{event}");
    CAPTURED.with(|c| {
        if let Some(events) = c.borrow_mut().as_mut() {
            events.push(event);
        }
    });
}

/// Emits an [`Event`]. The expression is only evaluated when a capture is
/// active or TRACE is enabled for [`DEV_TARGET`].
#[macro_export]
macro_rules! devtrace {
    ($event:expr) => {
        if $crate::utils::devlog::enabled() {
            $crate::utils::devlog::emit($event);
        }
    };
}
