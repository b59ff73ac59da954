//! Observable state shared between the synchronizer and its consumers.
//!
//! Each mutable entity (tag set, registration profile, inbox contents)
//! exposes its state through an [`Observable`]: a current snapshot plus a
//! stream of change notifications. Notifications always carry the full
//! replaced value, never a delta, and a subscriber that only wakes up
//! occasionally simply sees the latest value. Dropping a [`Watcher`]
//! unsubscribes it.

use tokio::sync::watch;

/// A piece of state with a readable current value and change subscriptions.
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    /// Creates the observable with its initial value.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Observable { tx }
    }

    /// Returns a clone of the current value.
    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replaces the current value and wakes every subscriber.
    pub fn publish(&self, value: T) {
        // send_replace delivers even when no watcher is currently subscribed
        self.tx.send_replace(value);
    }

    /// Mutates the current value in place and wakes every subscriber.
    pub fn update(&self, mutate: impl FnOnce(&mut T)) {
        self.tx.send_modify(mutate);
    }

    /// Registers a new subscriber positioned at the current value.
    pub fn subscribe(&self) -> Watcher<T> {
        Watcher {
            rx: self.tx.subscribe(),
        }
    }
}

/// A subscription handle to an [`Observable`].
#[derive(Clone)]
pub struct Watcher<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Watcher<T> {
    /// Returns a clone of the latest published value without waiting.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for the next change and returns the new value.
    ///
    /// Returns `None` once the observable itself has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().clone()),
            Err(_) => None,
        }
    }
}
