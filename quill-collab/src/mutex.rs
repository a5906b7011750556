//! Single-slot reentrancy guard.
//!
//! Applying a remote change to the editor fires the editor's own change
//! event on the same call stack, and writing a local change to the shared
//! document fires the document's observer the same way. Both handlers run
//! inside one guard, so the echo lands in the fallback instead of being
//! translated back to where it came from.
//!
//! ```text
//! guard.run(|| {
//!     // runs
//!     guard.run(|| { /* skipped: already held */ });
//! });
//! ```
//!
//! One guard per binding; independent bindings never block each other.

use std::cell::Cell;

/// Boolean exclusion flag with scoped acquisition.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    held: Cell<bool>,
    suppressed: Cell<u64>,
}

/// Clears the flag when dropped, including during unwinding.
struct Held<'a>(&'a Cell<bool>);

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `primary` unless the guard is already held on this stack.
    /// Returns `None` when the call was suppressed.
    pub fn run<R>(&self, primary: impl FnOnce() -> R) -> Option<R> {
        self.run_or(|| Some(primary()), || None)
    }

    /// Run `primary` if the guard is free, `fallback` otherwise.
    pub fn run_or<R>(&self, primary: impl FnOnce() -> R, fallback: impl FnOnce() -> R) -> R {
        if self.held.get() {
            self.suppressed.set(self.suppressed.get() + 1);
            log::trace!("reentrant call suppressed ({} so far)", self.suppressed.get());
            return fallback();
        }
        self.held.set(true);
        let _held = Held(&self.held);
        primary()
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }

    /// How many calls took the fallback path.
    pub fn suppressed(&self) -> u64 {
        self.suppressed.get()
    }
}
