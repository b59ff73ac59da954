//! Notification inbox for Hublink
//!
//! An in-memory, observable list of the push notifications this device has
//! received. Messages are delivered by the transport's receive callback,
//! displayed newest first, and looked up by receipt identity for detail
//! views. Nothing is persisted; a restart empties the inbox.

pub mod inbox;
pub mod message;

pub use inbox::NotificationInbox;
pub use message::{NotificationMessage, ReceiptId, ReceivedNotification};
