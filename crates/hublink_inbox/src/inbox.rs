//! The notification inbox.
//!
//! An append-ordered, newest-first list of received messages, held purely
//! in memory and reset on process restart. Observers are notified with the
//! full updated sequence on every change, never a delta; the UI renders
//! whatever list it was last handed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use hublink_common::observe::{Observable, Watcher};

use crate::message::{NotificationMessage, ReceiptId, ReceivedNotification};

/// Shared, observable list of received notifications.
pub struct NotificationInbox {
    entries: Mutex<Vec<Arc<ReceivedNotification>>>,
    contents: Observable<Vec<Arc<ReceivedNotification>>>,
    next_receipt: AtomicU64,
}

impl NotificationInbox {
    pub fn new() -> Self {
        NotificationInbox {
            entries: Mutex::new(Vec::new()),
            contents: Observable::new(Vec::new()),
            next_receipt: AtomicU64::new(1),
        }
    }

    /// Accepts a delivered message, prepends it (newest first) and notifies
    /// observers with the whole updated sequence.
    pub fn receive(&self, message: NotificationMessage) -> Arc<ReceivedNotification> {
        let receipt = ReceiptId(self.next_receipt.fetch_add(1, Ordering::Relaxed));
        let received = Arc::new(ReceivedNotification { receipt, message });
        let snapshot = {
            let mut entries = self.entries.lock().expect("inbox lock poisoned");
            entries.insert(0, received.clone());
            entries.clone()
        };
        debug!(receipt = receipt.0, count = snapshot.len(), "notification received");
        self.contents.publish(snapshot);
        received
    }

    /// Empties the inbox. Observers get exactly one notification carrying
    /// the empty sequence.
    pub fn clear(&self) {
        {
            let mut entries = self.entries.lock().expect("inbox lock poisoned");
            entries.clear();
        }
        self.contents.publish(Vec::new());
    }

    /// Resolves a previously received message by its identity. Content
    /// equality plays no part: duplicate deliveries have distinct receipts.
    pub fn find(&self, receipt: ReceiptId) -> Option<Arc<ReceivedNotification>> {
        self.entries
            .lock()
            .expect("inbox lock poisoned")
            .iter()
            .find(|entry| entry.receipt == receipt)
            .cloned()
    }

    /// The current sequence, newest first.
    pub fn snapshot(&self) -> Vec<Arc<ReceivedNotification>> {
        self.contents.snapshot()
    }

    /// Subscribes to sequence changes.
    pub fn subscribe(&self) -> Watcher<Vec<Arc<ReceivedNotification>>> {
        self.contents.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("inbox lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NotificationInbox {
    fn default() -> Self {
        Self::new()
    }
}
