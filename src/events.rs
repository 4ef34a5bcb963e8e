// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Event dispatch to registered listeners.
//!
//! A [`Broadcaster`] delivers each event synchronously to its listeners in
//! registration order. A panicking listener is logged and skipped; the rest
//! still see the event.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

/// Handle returned by [`Broadcaster::subscribe`].
///
/// Pass it back to [`Broadcaster::unsubscribe`] on the same broadcaster to
/// stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    channel_id: u64,
    listener_id: u64,
}

/// Multi-listener event channel.
pub struct Broadcaster<T> {
    name: &'static str,
    channel_id: u64,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            channel_id: self.channel_id,
            registry: self.registry.clone(),
        }
    }
}

impl<T> Broadcaster<T> {
    /// Create an empty channel. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            channel_id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Register a listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let listener_id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(listener_id, Arc::new(listener));
        debug!(channel = self.name, listener_id, "Listener subscribed");

        Subscription {
            channel_id: self.channel_id,
            listener_id,
        }
    }

    /// Remove a listener. Returns false if the handle is stale or belongs to
    /// another channel.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        if subscription.channel_id != self.channel_id {
            return false;
        }
        let removed = self
            .registry
            .lock()
            .listeners
            .remove(&subscription.listener_id)
            .is_some();
        if removed {
            debug!(
                channel = self.name,
                listener_id = subscription.listener_id,
                "Listener unsubscribed"
            );
        }
        removed
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    /// Deliver `event` to every listener.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may subscribe or unsubscribe from inside a callback.
    pub fn emit(&self, event: &T) {
        let listeners: Vec<(u64, Listener<T>)> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();

        for (listener_id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(channel = self.name, listener_id, "Listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_in_registration_order() {
        let channel = Broadcaster::<u32>::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            channel.subscribe(move |v: &u32| seen.lock().push(format!("{}{}", tag, v)));
        }

        channel.emit(&1);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_unsubscribe_with_same_handle() {
        let channel = Broadcaster::<u32>::new("test");
        let hits = Arc::new(Mutex::new(0));

        let counter = hits.clone();
        let sub = channel.subscribe(move |_| *counter.lock() += 1);
        channel.emit(&0);

        assert!(channel.unsubscribe(&sub));
        assert!(!channel.unsubscribe(&sub));
        channel.emit(&0);

        assert_eq!(*hits.lock(), 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let first = Broadcaster::<u32>::new("first");
        let second = Broadcaster::<u32>::new("second");

        let sub = first.subscribe(|_| {});
        second.subscribe(|_| {});

        assert!(!second.unsubscribe(&sub));
        assert_eq!(second.listener_count(), 1);
        assert!(first.unsubscribe(&sub));
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let channel = Broadcaster::<u32>::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let before = seen.clone();
        channel.subscribe(move |v: &u32| before.lock().push(*v));
        channel.subscribe(|_| panic!("listener failure"));
        let after = seen.clone();
        channel.subscribe(move |v: &u32| after.lock().push(*v * 10));

        channel.emit(&3);
        channel.emit(&4);

        assert_eq!(*seen.lock(), vec![3, 30, 4, 40]);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let channel = Broadcaster::<u32>::new("test");
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(Mutex::new(0));

        let inner_channel = channel.clone();
        let inner_slot = slot.clone();
        let counter = hits.clone();
        let sub = channel.subscribe(move |_| {
            *counter.lock() += 1;
            if let Some(sub) = inner_slot.lock().take() {
                inner_channel.unsubscribe(&sub);
            }
        });
        *slot.lock() = Some(sub);

        channel.emit(&0);
        channel.emit(&0);
        assert_eq!(*hits.lock(), 1);
    }
}
