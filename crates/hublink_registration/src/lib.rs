//! Registration state synchronization for Hublink
//!
//! This crate keeps a device's local view of its registration (tags,
//! enabled flag, installation identity, templates) consistent with the
//! remote registration hub. All mutation funnels through a single worker
//! task; consumers observe state through snapshots and change
//! subscriptions.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hublink_registration::{Synchronizer, DynRegistrationService, DynPushChannelSource};
//!
//! async fn wire_up(service: DynRegistrationService, push: DynPushChannelSource) {
//!     let handle = Synchronizer::builder(service, push).spawn();
//!     let _ = handle.register().await;
//!     let _tags = handle.add_tag("Country_CH").await;
//! }
//! ```

pub mod enrich;
pub mod profile;
pub mod sync;

#[cfg(test)]
mod sync_test;

pub use enrich::{derive_device_tags, DevicePropertyEnricher, InstallationEnricher, TagEnricher};
pub use profile::{ProfileSnapshot, RegistrationProfile, RegistrationState, SyncPhase};
pub use sync::{
    DynPushChannelSource, DynRegistrationService, RegistrationHandle, SyncError, Synchronizer,
    SynchronizerBuilder,
};
