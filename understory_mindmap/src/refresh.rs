// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A registry that asks every subscribed mind map to render again.
//!
//! Whoever composes several instances owns one [`RefreshHook`] and passes it to each
//! instance; [`RefreshHook::refresh_all`] then reaches all of them. Nothing is global.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
struct Registry {
    next: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Shared publish/subscribe registry. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct RefreshHook {
    inner: Rc<RefCell<Registry>>,
}

impl fmt::Debug for RefreshHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHook")
            .field("listeners", &self.len())
            .finish()
    }
}

impl RefreshHook {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` until the returned [`Subscription`] is dropped or disposed.
    pub fn tap(&self, listener: impl Fn() + 'static) -> Subscription {
        let mut registry = self.inner.borrow_mut();
        let id = registry.next;
        registry.next += 1;
        registry.listeners.push((id, Rc::new(listener)));
        Subscription {
            registry: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Calls every listener once.
    ///
    /// Listeners may subscribe or unsubscribe while being called; changes apply to the
    /// next call.
    pub fn refresh_all(&self) {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps a listener registered. Unsubscribes on drop.
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.registry.strong_count() > 0))
            .finish()
    }
}

impl Subscription {
    /// Position of this subscription among all taps of its hook, from 0.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unsubscribes now.
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn refresh_reaches_live_subscribers_only() {
        let hook = RefreshHook::new();
        let hits = Rc::new(Cell::new(0));
        let a = {
            let hits = hits.clone();
            hook.tap(move || hits.set(hits.get() + 1))
        };
        let b = {
            let hits = hits.clone();
            hook.tap(move || hits.set(hits.get() + 10))
        };
        assert_eq!(hook.len(), 2);
        hook.refresh_all();
        assert_eq!(hits.get(), 11);

        a.dispose();
        hook.refresh_all();
        assert_eq!(hits.get(), 21);

        drop(b);
        assert!(hook.is_empty());
        hook.refresh_all();
        assert_eq!(hits.get(), 21);
    }

    #[test]
    fn subscription_outlives_registry() {
        let hook = RefreshHook::new();
        let sub = hook.tap(|| {});
        drop(hook);
        drop(sub);
    }
}
