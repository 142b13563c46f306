// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debounced content-resize notifications.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug)]
struct State {
    quiet: Duration,
    deadline: Option<Duration>,
    suspended: u32,
}

/// Collects resize notifications and reports when a quiet period has passed.
#[derive(Debug)]
pub struct ResizeDebouncer {
    state: Rc<RefCell<State>>,
}

/// Cloneable sender given to whatever observes content size changes.
#[derive(Clone, Debug)]
pub struct ResizeHandle {
    state: Rc<RefCell<State>>,
}

/// Notifications are ignored while this is alive.
#[derive(Debug)]
pub struct SuspendGuard {
    state: Rc<RefCell<State>>,
}

impl ResizeDebouncer {
    /// A debouncer that fires `quiet` after the last notification.
    pub fn new(quiet: Duration) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                quiet,
                deadline: None,
                suspended: 0,
            })),
        }
    }

    /// A sender for notifications.
    pub fn handle(&self) -> ResizeHandle {
        ResizeHandle {
            state: self.state.clone(),
        }
    }

    /// Changes the quiet period for later notifications.
    pub fn set_quiet(&self, quiet: Duration) {
        self.state.borrow_mut().quiet = quiet;
    }

    /// Ignores notifications until the guard is dropped.
    pub fn suspend(&self) -> SuspendGuard {
        self.state.borrow_mut().suspended += 1;
        SuspendGuard {
            state: self.state.clone(),
        }
    }

    /// Returns `true` once the quiet period after the last notification has passed, and
    /// resets.
    pub fn poll(&self, now: Duration) -> bool {
        let mut state = self.state.borrow_mut();
        match state.deadline {
            Some(deadline) if now >= deadline => {
                state.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drops any pending notification.
    pub fn cancel(&self) {
        self.state.borrow_mut().deadline = None;
    }
}

impl ResizeHandle {
    /// Records a size change at `now`. Returns `false` if it was ignored.
    pub fn notify(&self, now: Duration) -> bool {
        let mut state = self.state.borrow_mut();
        if state.suspended > 0 {
            tracing::debug!("resize notification ignored during incremental render");
            return false;
        }
        state.deadline = Some(now + state.quiet);
        true
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.suspended = state.suspended.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn fires_after_quiet_period() {
        let debouncer = ResizeDebouncer::new(100 * MS);
        let handle = debouncer.handle();
        assert!(handle.notify(Duration::ZERO));
        assert!(handle.notify(50 * MS));
        assert!(!debouncer.poll(120 * MS), "the second notification restarted the wait");
        assert!(debouncer.poll(150 * MS));
        assert!(!debouncer.poll(200 * MS), "fires once");
    }

    #[test]
    fn suspended_notifications_are_dropped() {
        let debouncer = ResizeDebouncer::new(10 * MS);
        let handle = debouncer.handle();
        {
            let _guard = debouncer.suspend();
            assert!(!handle.notify(Duration::ZERO));
        }
        assert!(!debouncer.poll(100 * MS));
        assert!(handle.notify(100 * MS));
        debouncer.cancel();
        assert!(!debouncer.poll(200 * MS));
    }
}
