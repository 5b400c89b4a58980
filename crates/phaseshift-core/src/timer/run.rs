//! Run identity and callback dispatch bookkeeping shared by the engines.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);
static NEXT_ENGINE: AtomicU64 = AtomicU64::new(1);

/// Identifies one Start-to-Stop/Reset/completion lifecycle of an engine.
///
/// Ids are unique for the lifetime of the process, so an id handed out for
/// one run can never be confused with a later run of any engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RUN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

pub(crate) fn next_engine_id() -> u64 {
    NEXT_ENGINE.fetch_add(1, Ordering::Relaxed)
}

thread_local! {
    /// Engines whose tick callback is executing on this thread.
    static DISPATCHING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as running a tick callback of one engine.
///
/// Lets `stop`/`reset` called from inside that callback skip waiting for
/// the dispatch gate the thread already holds.
pub(crate) struct DispatchScope {
    engine: u64,
}

impl DispatchScope {
    pub(crate) fn enter(engine: u64) -> Self {
        DISPATCHING.with(|active| active.borrow_mut().push(engine));
        Self { engine }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|e| *e == self.engine) {
                active.remove(pos);
            }
        });
    }
}

pub(crate) fn is_dispatching(engine: u64) -> bool {
    DISPATCHING.with(|active| active.borrow().contains(&engine))
}

/// Runs a caller-supplied callback, containing any panic it raises.
///
/// A panicking callback is reported through `tracing` at error level and
/// otherwise ignored.
pub(crate) fn isolate<F: FnOnce()>(callback: &'static str, f: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(callback, %message, "callback panicked");
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// Guarded state is only mutated in short sections that never call out,
/// so it is consistent even after a poisoning panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique_and_increasing() {
        let a = RunId::next();
        let b = RunId::next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn dispatch_scope_is_scoped_per_engine() {
        assert!(!is_dispatching(9_999));
        {
            let _outer = DispatchScope::enter(9_999);
            assert!(is_dispatching(9_999));
            {
                let _inner = DispatchScope::enter(10_000);
                assert!(is_dispatching(9_999));
                assert!(is_dispatching(10_000));
            }
            assert!(!is_dispatching(10_000));
        }
        assert!(!is_dispatching(9_999));
    }

    #[test]
    fn isolate_contains_panics() {
        isolate("test", || panic!("boom"));
        let mut ran = false;
        isolate("test", || ran = true);
        assert!(ran);
    }

    #[test]
    fn lock_recovers_from_poison() {
        let mutex = std::sync::Arc::new(Mutex::new(1));
        let poisoner = std::sync::Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*lock(&mutex), 1);
    }
}
