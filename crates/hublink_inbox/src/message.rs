//! Received notification messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A push notification as delivered by the transport.
///
/// Immutable once received. `title` and `body` may be empty for data-only
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// The primary text associated with the notification.
    #[serde(default)]
    pub title: String,

    /// The secondary text associated with the notification.
    #[serde(default)]
    pub body: String,

    /// Key/value pairs sent with the notification.
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// Identity of a received message within the inbox.
///
/// Assigned at receive time and monotonically increasing. Two deliveries
/// with identical content get distinct receipts; lookup is by identity,
/// never by content equality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ReceiptId(pub u64);

/// A message together with its inbox identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedNotification {
    pub receipt: ReceiptId,
    pub message: NotificationMessage,
}
