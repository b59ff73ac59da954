//! Registration service implementation backed by the hub REST API.
//!
//! This module adapts [`HubClient`] to the `RegistrationService` trait so
//! the synchronizer can be handed the real hub or a fake interchangeably.

use std::sync::Arc;

use hublink_common::models::{Installation, Tag};
use hublink_common::services::{BoxFuture, BoxedError, RegistrationService};

use crate::client::{HubClient, HubError};
use crate::installation::{InstallationRecord, PatchOperation};

fn boxed(err: HubError) -> BoxedError {
    BoxedError(Box::new(err))
}

/// `RegistrationService` implementation talking to a real hub.
pub struct HubRegistrationService {
    client: Arc<HubClient>,
}

impl HubRegistrationService {
    pub fn new(client: Arc<HubClient>) -> Self {
        Self { client }
    }
}

impl RegistrationService for HubRegistrationService {
    type Error = BoxedError;

    fn put_installation(
        &self,
        installation: &Installation,
    ) -> BoxFuture<'_, Installation, Self::Error> {
        let record = InstallationRecord::from_domain(installation);
        let client = self.client.clone();
        Box::pin(async move {
            let record = record.map_err(boxed)?;
            let stored = client.put_installation(&record).await.map_err(boxed)?;
            stored.into_domain().map_err(boxed)
        })
    }

    fn push_installation_id(
        &self,
        installation: &Installation,
    ) -> BoxFuture<'_, (), Self::Error> {
        // The hub has no id-only endpoint; pushing the canonical id is an
        // upsert of the record under that id, response body ignored.
        let record = InstallationRecord::from_domain(installation);
        let client = self.client.clone();
        Box::pin(async move {
            let record = record.map_err(boxed)?;
            client.put_installation(&record).await.map_err(boxed)?;
            Ok(())
        })
    }

    fn add_tag(&self, installation_id: &str, tag: &Tag) -> BoxFuture<'_, Vec<Tag>, Self::Error> {
        let installation_id = installation_id.to_string();
        let operation = PatchOperation::add_tag(tag);
        let client = self.client.clone();
        Box::pin(async move {
            let stored = client
                .patch_installation(&installation_id, &[operation])
                .await
                .map_err(boxed)?;
            stored.canonical_tags().map_err(boxed)
        })
    }

    fn remove_tag(
        &self,
        installation_id: &str,
        tag: &Tag,
    ) -> BoxFuture<'_, Vec<Tag>, Self::Error> {
        let installation_id = installation_id.to_string();
        let operation = PatchOperation::remove_tag(tag);
        let client = self.client.clone();
        Box::pin(async move {
            let stored = client
                .patch_installation(&installation_id, &[operation])
                .await
                .map_err(boxed)?;
            stored.canonical_tags().map_err(boxed)
        })
    }

    fn set_enabled(
        &self,
        installation_id: &str,
        enabled: bool,
    ) -> BoxFuture<'_, bool, Self::Error> {
        let installation_id = installation_id.to_string();
        let operation = PatchOperation::set_enabled(enabled);
        let client = self.client.clone();
        Box::pin(async move {
            let stored = client
                .patch_installation(&installation_id, &[operation])
                .await
                .map_err(boxed)?;
            // The hub's answer is authoritative, not the requested value.
            Ok(stored.enabled)
        })
    }

    fn get_installation(
        &self,
        installation_id: &str,
    ) -> BoxFuture<'_, Installation, Self::Error> {
        let installation_id = installation_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let stored = client
                .get_installation(&installation_id)
                .await
                .map_err(boxed)?;
            stored.into_domain().map_err(boxed)
        })
    }
}
