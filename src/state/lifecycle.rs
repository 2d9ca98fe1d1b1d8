//! Server lifecycle state machine.
//!
//! `Created → (start) → Running → (shutdown) → Draining → Stopped`.
//!
//! Intake accepts notifications in `Created` and `Running`; once `Draining`
//! is entered no new work is accepted, the in-flight merge finishes, and the
//! remaining queue is discarded. Transitions are atomic so producers, the
//! merge worker, and control callers can consult the state without locking.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Constructed, merge worker not yet running.
    Created = 0,
    /// Accepting notifications, merge worker active.
    Running = 1,
    /// Shutdown requested; in-flight merge finishing, no new intake.
    Draining = 2,
    /// Fully stopped.
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Created,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }
}

/// Atomic lifecycle state shared between threads.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a lifecycle in the `Created` state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Created as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether intake may accept new notifications.
    pub fn accepts_notifications(&self) -> bool {
        matches!(
            self.state(),
            LifecycleState::Created | LifecycleState::Running
        )
    }

    /// Whether the merge worker should keep draining the queue.
    pub fn accepts_work(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Transition `Created → Running`. Returns false if already past `Created`.
    pub fn start(&self) -> bool {
        self.transition(LifecycleState::Created, LifecycleState::Running)
    }

    /// Begin draining. Returns false if not currently `Running`.
    pub fn begin_draining(&self) -> bool {
        self.transition(LifecycleState::Running, LifecycleState::Draining)
    }

    /// Mark the server stopped, from any state.
    pub fn stop(&self) {
        self.state
            .store(LifecycleState::Stopped as u8, Ordering::Release);
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Created);
        assert!(lifecycle.accepts_notifications());
        assert!(!lifecycle.accepts_work());
    }

    #[test]
    fn test_start_transition() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.start());
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert!(lifecycle.accepts_work());

        // Second start is refused.
        assert!(!lifecycle.start());
        assert_eq!(lifecycle.state(), LifecycleState::Running);
    }

    #[test]
    fn test_draining_rejects_intake() {
        let lifecycle = Lifecycle::new();
        lifecycle.start();
        assert!(lifecycle.begin_draining());

        assert_eq!(lifecycle.state(), LifecycleState::Draining);
        assert!(!lifecycle.accepts_notifications());
        assert!(!lifecycle.accepts_work());
    }

    #[test]
    fn test_stop_from_any_state() {
        let lifecycle = Lifecycle::new();
        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);

        // Stop is terminal and idempotent.
        assert!(!lifecycle.start());
        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }
}
