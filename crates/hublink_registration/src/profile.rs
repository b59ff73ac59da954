//! The registration profile and its state machines.
//!
//! A profile owns the device's local [`Installation`] record together with
//! two pieces of bookkeeping: where the device is in its registration
//! lifecycle, and what happened to the most recent speculative mutation.
//! Both are published to observers as part of every snapshot, which is what
//! makes the "service is authoritative" rule visible from the outside.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use hublink_common::models::{Installation, InstallationTemplate, PushChannel, Tag};

/// Lifecycle of a device registration.
///
/// `Unregistered -> Registering -> Registered -> Synced`. A failure while
/// registering falls back to `Unregistered`, leaving the profile free to
/// retry. Token rotation re-enters `Registered` from `Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// No push channel has been obtained yet.
    Unregistered,
    /// Waiting for the platform push layer to hand out a channel.
    Registering,
    /// A push channel exists but the hub has not confirmed the record.
    Registered,
    /// The hub holds the current record under the canonical installation id.
    Synced,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Unregistered => "unregistered",
            RegistrationState::Registering => "registering",
            RegistrationState::Registered => "registered",
            RegistrationState::Synced => "synced",
        }
    }
}

/// Outcome of the most recent speculative mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No mutation in flight.
    Idle,
    /// A request has been issued; local state still shows last-known-good.
    Pending,
    /// The service confirmed; local state was replaced by its response.
    Committed,
    /// The service failed; local state was left untouched.
    RolledBack,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Pending => "pending",
            SyncPhase::Committed => "committed",
            SyncPhase::RolledBack => "rolled_back",
        }
    }
}

/// Point-in-time view of a profile, published to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSnapshot {
    pub installation_id: Option<String>,
    pub push_channel: Option<PushChannel>,
    pub enabled: bool,
    pub state: RegistrationState,
    pub phase: SyncPhase,
    pub templates: BTreeMap<String, InstallationTemplate>,
    pub expiration: Option<DateTime<Utc>>,
}

/// The client session's registration record plus lifecycle bookkeeping.
///
/// Owned exclusively by the synchronizer worker; everything else sees it
/// through [`ProfileSnapshot`]s.
#[derive(Debug)]
pub struct RegistrationProfile {
    installation: Installation,
    state: RegistrationState,
    phase: SyncPhase,
}

impl RegistrationProfile {
    pub fn new(installation_id: Option<String>) -> Self {
        let mut installation = Installation::new();
        installation.installation_id = installation_id;
        RegistrationProfile {
            installation,
            state: RegistrationState::Unregistered,
            phase: SyncPhase::Idle,
        }
    }

    pub fn installation(&self) -> &Installation {
        &self.installation
    }

    pub fn installation_id(&self) -> Option<&str> {
        self.installation.installation_id.as_deref()
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Enters `Registering`. Valid from any state: a fresh cycle may be
    /// started to rotate the token or to retry after a failure.
    pub fn begin_registration(&mut self) {
        self.state = RegistrationState::Registering;
    }

    /// A failure during `Registering` leaves the device unregistered so the
    /// cycle can be retried.
    pub fn registration_failed(&mut self) {
        self.state = RegistrationState::Unregistered;
    }

    /// Stores the channel the platform handed out and enters `Registered`.
    /// Re-fires on token rotation.
    pub fn channel_obtained(&mut self, channel: PushChannel) {
        self.installation.push_channel = Some(channel);
        self.state = RegistrationState::Registered;
    }

    /// Marks the hub as holding the current record under the canonical id.
    /// Only meaningful once a push channel exists; earlier saves (e.g. a
    /// template registered before the first cycle) leave the state alone.
    pub fn mark_synced(&mut self) {
        if matches!(
            self.state,
            RegistrationState::Registered | RegistrationState::Synced
        ) {
            self.state = RegistrationState::Synced;
        }
    }

    pub fn assign_installation_id(&mut self, installation_id: String) {
        self.installation.installation_id = Some(installation_id);
    }

    pub fn begin_mutation(&mut self) {
        self.phase = SyncPhase::Pending;
    }

    pub fn commit(&mut self) {
        self.phase = SyncPhase::Committed;
    }

    pub fn roll_back(&mut self) {
        self.phase = SyncPhase::RolledBack;
    }

    /// Stores the enabled value the service settled on.
    pub fn enabled_confirmed(&mut self, enabled: bool) {
        self.installation.enabled = enabled;
    }

    /// Replaces the tag set with the service's canonical list.
    pub fn apply_canonical_tags(&mut self, canonical: Vec<Tag>) {
        self.installation.tags.replace_with(canonical);
    }

    /// Replaces the whole record with the state the service confirmed.
    pub fn reconcile(&mut self, canonical: Installation) {
        self.installation = canonical;
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.installation.tags.to_vec()
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            installation_id: self.installation.installation_id.clone(),
            push_channel: self.installation.push_channel.clone(),
            enabled: self.installation.enabled,
            state: self.state,
            phase: self.phase,
            templates: self.installation.templates.clone(),
            expiration: self.installation.expiration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_cycle_walks_through_synced() {
        let mut profile = RegistrationProfile::new(None);
        assert_eq!(profile.state(), RegistrationState::Unregistered);

        profile.begin_registration();
        assert_eq!(profile.state(), RegistrationState::Registering);

        profile.channel_obtained(PushChannel("token-1".to_string()));
        assert_eq!(profile.state(), RegistrationState::Registered);

        profile.mark_synced();
        assert_eq!(profile.state(), RegistrationState::Synced);
    }

    #[test]
    fn failure_while_registering_permits_retry() {
        let mut profile = RegistrationProfile::new(None);
        profile.begin_registration();
        profile.registration_failed();
        assert_eq!(profile.state(), RegistrationState::Unregistered);

        // The next cycle starts cleanly.
        profile.begin_registration();
        assert_eq!(profile.state(), RegistrationState::Registering);
    }

    #[test]
    fn token_rotation_refires_registered() {
        let mut profile = RegistrationProfile::new(Some("device-1".to_string()));
        profile.begin_registration();
        profile.channel_obtained(PushChannel("token-1".to_string()));
        profile.mark_synced();

        profile.channel_obtained(PushChannel("token-2".to_string()));
        assert_eq!(profile.state(), RegistrationState::Registered);
        assert_eq!(
            profile.snapshot().push_channel,
            Some(PushChannel("token-2".to_string()))
        );
    }

    #[test]
    fn reconcile_replaces_the_record_wholesale() {
        let mut profile = RegistrationProfile::new(Some("device-1".to_string()));
        profile.apply_canonical_tags(vec![Tag::new("stale").unwrap()]);

        let mut canonical = Installation::new();
        canonical.installation_id = Some("device-1".to_string());
        canonical.tags.insert(Tag::new("confirmed").unwrap());
        profile.reconcile(canonical);

        assert_eq!(profile.tags(), vec![Tag::new("confirmed").unwrap()]);
    }

    #[test]
    fn mutation_phase_tracks_outcomes() {
        let mut profile = RegistrationProfile::new(None);
        assert_eq!(profile.phase(), SyncPhase::Idle);
        profile.begin_mutation();
        assert_eq!(profile.phase(), SyncPhase::Pending);
        profile.roll_back();
        assert_eq!(profile.phase(), SyncPhase::RolledBack);
        profile.begin_mutation();
        profile.commit();
        assert_eq!(profile.phase(), SyncPhase::Committed);
    }
}
