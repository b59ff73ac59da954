//! Registration hub integration for Hublink
//!
//! This crate provides the REST client a device uses to keep its
//! installation record synchronized with the remote registration hub.
//!
//! # Features
//!
//! - Portal-format connection string parsing
//! - Shared-access-signature authorization per request
//! - Installation upsert, JSON-patch updates and canonical reads
//!   (api-version 2020-06)
//! - Injectable retry policy for transport and 5xx failures
//! - A `RegistrationService` implementation for the synchronizer

pub mod client;
pub mod connection;
pub mod installation;
pub mod retry;
pub mod sas;
pub mod service;

// Re-export the client and its service adapter for the agent's wiring
pub use client::{HubClient, HubError};
pub use connection::ConnectionString;
pub use retry::{FixedDelay, NoRetry, RetryPolicy};
pub use service::HubRegistrationService;
