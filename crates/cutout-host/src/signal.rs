//! Set-once completion signal carrying a result slot.
//!
//! The waiting node and the callback threads meet here. A producer writes
//! into the slot with [`CompletionSignal::publish`] and then fires the
//! signal with [`CompletionSignal::resolve`]; the waiter wakes and reads
//! the slot with [`CompletionSignal::take`]. Slot and resolution share one
//! mutex, so a waiter that observes the resolution also observes every
//! write made before it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The user applied a selection; results were published.
    Applied,
    /// The user applied an outline that was rejected (too few points).
    Rejected,
    /// The user cancelled.
    Cancelled,
    /// The handler failed while producing results.
    Failed,
    /// The session was purged before completing.
    Expired,
}

impl Resolution {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// Result of [`CompletionSignal::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal fired before the deadline.
    Completed(Resolution),
    /// The deadline passed first.
    TimedOut,
}

#[derive(Debug, Default)]
struct State<T> {
    resolution: Option<Resolution>,
    value: T,
}

/// One-shot signal plus the value it guards.
#[derive(Debug, Default)]
pub struct CompletionSignal<T> {
    state: Mutex<State<T>>,
    fired: Condvar,
}

impl<T: Default> CompletionSignal<T> {
    /// Unfired signal with an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fired: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A panicking producer must not strand the waiter.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write into the slot.
    ///
    /// Returns `false` without calling `write` once the signal has fired,
    /// so late producers cannot change what the waiter reads.
    pub fn publish(&self, write: impl FnOnce(&mut T)) -> bool {
        let mut state = self.lock();
        if state.resolution.is_some() {
            return false;
        }
        write(&mut state.value);
        true
    }

    /// Fire the signal. Only the first call has any effect.
    ///
    /// Returns `true` if this call fired it.
    pub fn resolve(&self, resolution: Resolution) -> bool {
        let mut state = self.lock();
        if state.resolution.is_some() {
            return false;
        }
        state.resolution = Some(resolution);
        drop(state);
        self.fired.notify_all();
        true
    }

    /// How the signal fired, if it has.
    #[must_use]
    pub fn resolution(&self) -> Option<Resolution> {
        self.lock().resolution
    }

    /// Block until the signal fires or `timeout` elapses.
    ///
    /// Returns immediately if the signal already fired.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let state = self.lock();
        let (state, _) = self
            .fired
            .wait_timeout_while(state, timeout, |s| s.resolution.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        state
            .resolution
            .map_or(WaitOutcome::TimedOut, WaitOutcome::Completed)
    }

    /// Move the slot out, leaving the default behind.
    pub fn take(&self) -> T {
        std::mem::take(&mut self.lock().value)
    }
}
