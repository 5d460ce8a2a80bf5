//! Per-thread call log, allocation counter, pending error and fault switches.
//!
//! Everything here is thread-local so tests running in parallel never see
//! each other's activity.

use std::cell::{Cell, RefCell};

thread_local! {
    static CALLS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    static ALLOCATIONS: Cell<i64> = const { Cell::new(0) };
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
    static FAIL_NEXT_STREAM: Cell<bool> = const { Cell::new(false) };
}

/// Snapshot of the entry points called on this thread since the last reset.
#[derive(Debug, Clone, Default)]
pub struct NativeCalls {
    calls: Vec<&'static str>,
}

impl NativeCalls {
    /// Number of calls to `name`.
    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| **c == name).count()
    }

    /// Number of calls to any entry point.
    pub fn total(&self) -> usize {
        self.calls.len()
    }

    pub fn names(&self) -> &[&'static str] {
        &self.calls
    }
}

pub(crate) fn record(name: &'static str) {
    CALLS.with(|c| c.borrow_mut().push(name));
}

/// Forget every call recorded on this thread.
pub fn reset_native_calls() {
    CALLS.with(|c| c.borrow_mut().clear());
}

/// Calls recorded on this thread since the last [`reset_native_calls`].
pub fn native_calls() -> NativeCalls {
    NativeCalls {
        calls: CALLS.with(|c| c.borrow().clone()),
    }
}

/// Engine-owned buffers handed out on this thread and not yet freed.
pub fn outstanding_allocations() -> i64 {
    ALLOCATIONS.with(Cell::get)
}

pub(crate) fn allocated() {
    ALLOCATIONS.with(|a| a.set(a.get() + 1));
}

pub(crate) fn freed() {
    ALLOCATIONS.with(|a| a.set(a.get() - 1));
}

/// Make the next `c2pa_create_stream` on this thread return null.
pub fn fail_next_stream_creation() {
    FAIL_NEXT_STREAM.with(|f| f.set(true));
}

pub(crate) fn take_stream_failure() -> bool {
    FAIL_NEXT_STREAM.with(|f| f.replace(false))
}

/// Leave `"<Kind> <message>"` behind for `c2pa_error`.
pub(crate) fn set_error(kind: &str, message: impl std::fmt::Display) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(format!("{kind} {message}")));
}

pub(crate) fn take_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}
