//! Ctrl-C bookkeeping between the handler installed in `main` and the flows.
//!
//! While a child command runs it owns SIGINT and nothing is recorded. Outside
//! of that, a Ctrl-C is left pending for the next check; a second one before
//! anything consumed the first asks for the process to exit.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct InterruptState {
    pending: AtomicBool,
    child_running: AtomicBool,
}

impl InterruptState {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            child_running: AtomicBool::new(false),
        }
    }

    /// Returns true when the process should exit.
    pub fn record(&self) -> bool {
        if self.child_running.load(Ordering::SeqCst) {
            return false;
        }
        self.pending.swap(true, Ordering::SeqCst)
    }

    /// Clears the pending flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    pub fn child(&self) -> ChildGuard<'_> {
        self.child_running.store(true, Ordering::SeqCst);
        ChildGuard { state: self }
    }
}

impl Default for InterruptState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChildGuard<'a> {
    state: &'a InterruptState,
}

impl Drop for ChildGuard<'_> {
    fn drop(&mut self) {
        self.state.child_running.store(false, Ordering::SeqCst);
    }
}

pub static INTERRUPTS: InterruptState = InterruptState::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_interrupt_asks_to_exit() {
        let state = InterruptState::new();
        assert!(!state.record());
        assert!(state.record());
        assert!(state.take());
        assert!(!state.take());
    }

    #[test]
    fn consumed_interrupt_starts_over() {
        let state = InterruptState::new();
        state.record();
        assert!(state.take());
        assert!(!state.record());
    }

    #[test]
    fn child_owns_interrupts() {
        let state = InterruptState::new();
        {
            let _child = state.child();
            assert!(!state.record());
            assert!(!state.record());
        }
        assert!(!state.take());
        assert!(!state.record());
        assert!(state.take());
    }
}
