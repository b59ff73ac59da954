//! The registration state synchronizer.
//!
//! All mutable registration state lives on a single worker task. UI-facing
//! callers hold a cloneable [`RegistrationHandle`] and send commands over a
//! mailbox; the worker performs the remote call for each command, applies
//! the service's canonical response, and publishes fresh snapshots to the
//! observables. Because the worker finishes one command before taking the
//! next, two in-flight mutations can never race: requests are serialized
//! FIFO and every response overwrites local state with whatever the service
//! confirmed.
//!
//! Failure semantics: tag validation fails locally before a command is ever
//! queued; remote failures are returned to the caller and leave local state
//! at last-known-good.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use hublink_common::models::{Installation, InstallationTemplate, InvalidTagError, Tag, TagSet};
use hublink_common::observe::Observable;
use hublink_common::services::{BoxedError, PushChannelSource, RegistrationService};

use crate::enrich::InstallationEnricher;
use crate::profile::{ProfileSnapshot, RegistrationProfile};

/// The registration service as the synchronizer consumes it.
pub type DynRegistrationService = Arc<dyn RegistrationService<Error = BoxedError>>;

/// The platform push layer as the synchronizer consumes it.
pub type DynPushChannelSource = Arc<dyn PushChannelSource<Error = BoxedError>>;

const COMMAND_BUFFER: usize = 32;

/// Errors surfaced by synchronizer operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The tag failed local validation; no remote call was made.
    #[error(transparent)]
    InvalidTag(#[from] InvalidTagError),

    /// The platform push layer failed to produce a channel.
    #[error("platform push registration failed: {0}")]
    ChannelRegistration(#[source] BoxedError),

    /// The registration service reported a failure; local state is
    /// unchanged.
    #[error("registration service error: {0}")]
    Remote(#[source] BoxedError),

    /// The operation needs an installation id, and none has been assigned.
    #[error("no installation has been registered with the hub yet")]
    NotRegistered,

    /// The worker task has shut down.
    #[error("the synchronizer is no longer running")]
    Stopped,
}

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
    Register {
        reply: Reply<ProfileSnapshot>,
    },
    AddTag {
        tag: Tag,
        reply: Reply<Vec<Tag>>,
    },
    RemoveTag {
        tag: Tag,
        reply: Reply<Vec<Tag>>,
    },
    SetEnabled {
        enabled: bool,
        reply: Reply<bool>,
    },
    SetInstallationId {
        installation_id: String,
        reply: Reply<ProfileSnapshot>,
    },
    SetTemplate {
        name: String,
        template: InstallationTemplate,
        reply: Reply<ProfileSnapshot>,
    },
    RemoveTemplate {
        name: String,
        reply: Reply<ProfileSnapshot>,
    },
    Reinstall {
        reply: Reply<ProfileSnapshot>,
    },
    Rehydrate {
        reply: Reply<ProfileSnapshot>,
    },
}

/// Observable state shared between the worker and every handle.
struct SharedState {
    tags: Observable<TagSet>,
    profile: Observable<ProfileSnapshot>,
}

/// Builder for a [`Synchronizer`] worker.
pub struct SynchronizerBuilder {
    service: DynRegistrationService,
    channel_source: DynPushChannelSource,
    enrichers: Vec<Box<dyn InstallationEnricher>>,
    installation_id: Option<String>,
}

impl SynchronizerBuilder {
    /// Adds an enricher applied to every record before it is saved.
    pub fn enrich_with(mut self, enricher: impl InstallationEnricher + 'static) -> Self {
        self.enrichers.push(Box::new(enricher));
        self
    }

    /// Seeds a previously assigned installation id instead of minting one
    /// on first registration.
    pub fn installation_id(mut self, installation_id: impl Into<String>) -> Self {
        self.installation_id = Some(installation_id.into());
        self
    }

    /// Starts the worker task and returns a handle to it.
    pub fn spawn(self) -> RegistrationHandle {
        let (commands, mailbox) = mpsc::channel(COMMAND_BUFFER);
        let profile = RegistrationProfile::new(self.installation_id);
        let shared = Arc::new(SharedState {
            tags: Observable::new(TagSet::new()),
            profile: Observable::new(profile.snapshot()),
        });
        let worker = Worker {
            service: self.service,
            channel_source: self.channel_source,
            enrichers: self.enrichers,
            profile,
            shared: shared.clone(),
            last_saved: None,
        };
        tokio::spawn(worker.run(mailbox));
        RegistrationHandle { commands, shared }
    }
}

/// Entry point for building the synchronizer.
pub struct Synchronizer;

impl Synchronizer {
    pub fn builder(
        service: DynRegistrationService,
        channel_source: DynPushChannelSource,
    ) -> SynchronizerBuilder {
        SynchronizerBuilder {
            service,
            channel_source,
            enrichers: Vec::new(),
            installation_id: None,
        }
    }
}

/// Cloneable handle to the synchronizer worker.
///
/// Mutators suspend the caller until the worker has finished the remote
/// round-trip; accessors read the latest published snapshot without
/// touching the worker.
#[derive(Clone)]
pub struct RegistrationHandle {
    commands: mpsc::Sender<Command>,
    shared: Arc<SharedState>,
}

impl RegistrationHandle {
    /// The observable tag set, mirroring the last confirmed canonical list.
    pub fn tags(&self) -> &Observable<TagSet> {
        &self.shared.tags
    }

    /// The observable registration profile.
    pub fn profile(&self) -> &Observable<ProfileSnapshot> {
        &self.shared.profile
    }

    /// Runs a registration cycle: obtain a push channel from the platform,
    /// then save the record with the hub.
    pub async fn register(&self) -> Result<ProfileSnapshot, SyncError> {
        self.request(|reply| Command::Register { reply }).await
    }

    /// Validates and adds a tag. Validation failures are synchronous and
    /// local; on success the returned list is the service's canonical one.
    pub async fn add_tag(&self, tag: &str) -> Result<Vec<Tag>, SyncError> {
        let tag = Tag::new(tag)?;
        self.request(|reply| Command::AddTag { tag, reply }).await
    }

    /// Removes a tag, returning the service's canonical list.
    pub async fn remove_tag(&self, tag: &str) -> Result<Vec<Tag>, SyncError> {
        let tag = Tag::new(tag)?;
        self.request(|reply| Command::RemoveTag { tag, reply }).await
    }

    /// Requests an enabled-flag change; the stored and returned value is
    /// whatever the service settled on.
    pub async fn set_enabled(&self, enabled: bool) -> Result<bool, SyncError> {
        self.request(|reply| Command::SetEnabled { enabled, reply })
            .await
    }

    /// Pushes `installation_id` to the service as this device's canonical
    /// identifier, then stores it locally.
    pub async fn set_installation_id(
        &self,
        installation_id: impl Into<String>,
    ) -> Result<ProfileSnapshot, SyncError> {
        let installation_id = installation_id.into();
        self.request(|reply| Command::SetInstallationId {
            installation_id,
            reply,
        })
        .await
    }

    /// Registers or replaces a notification template.
    pub async fn set_template(
        &self,
        name: impl Into<String>,
        template: InstallationTemplate,
    ) -> Result<ProfileSnapshot, SyncError> {
        let name = name.into();
        self.request(|reply| Command::SetTemplate {
            name,
            template,
            reply,
        })
        .await
    }

    /// Removes a notification template.
    pub async fn remove_template(
        &self,
        name: impl Into<String>,
    ) -> Result<ProfileSnapshot, SyncError> {
        let name = name.into();
        self.request(|reply| Command::RemoveTemplate { name, reply })
            .await
    }

    /// Re-saves the current record with the hub. Saves whose payload is
    /// identical to the last confirmed one are skipped locally.
    pub async fn reinstall(&self) -> Result<ProfileSnapshot, SyncError> {
        self.request(|reply| Command::Reinstall { reply }).await
    }

    /// Reads the canonical record back from the hub and reconciles local
    /// state with it.
    pub async fn rehydrate(&self) -> Result<ProfileSnapshot, SyncError> {
        self.request(|reply| Command::Rehydrate { reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SyncError::Stopped)?;
        response.await.map_err(|_| SyncError::Stopped)?
    }
}

struct Worker {
    service: DynRegistrationService,
    channel_source: DynPushChannelSource,
    enrichers: Vec<Box<dyn InstallationEnricher>>,
    profile: RegistrationProfile,
    shared: Arc<SharedState>,
    /// Identity of the last save the hub confirmed, for coalescing
    /// identical saves without a remote call.
    last_saved: Option<Installation>,
}

/// The fields that make two saves "the same request". The hub assigns the
/// expiration, so it is excluded from the comparison.
fn save_identity(installation: &Installation) -> Installation {
    let mut identity = installation.clone();
    identity.expiration = None;
    identity
}

impl Worker {
    async fn run(mut self, mut mailbox: mpsc::Receiver<Command>) {
        // One command at a time: this loop is the serialization point for
        // all state mutation.
        while let Some(command) = mailbox.recv().await {
            self.handle(command).await;
        }
        debug!("synchronizer mailbox closed, worker exiting");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Register { reply } => {
                let _ = reply.send(self.register().await);
            }
            Command::AddTag { tag, reply } => {
                let _ = reply.send(self.add_tag(tag).await);
            }
            Command::RemoveTag { tag, reply } => {
                let _ = reply.send(self.remove_tag(tag).await);
            }
            Command::SetEnabled { enabled, reply } => {
                let _ = reply.send(self.set_enabled(enabled).await);
            }
            Command::SetInstallationId {
                installation_id,
                reply,
            } => {
                let _ = reply.send(self.set_installation_id(installation_id).await);
            }
            Command::SetTemplate {
                name,
                template,
                reply,
            } => {
                let _ = reply.send(self.set_template(name, Some(template)).await);
            }
            Command::RemoveTemplate { name, reply } => {
                let _ = reply.send(self.set_template(name, None).await);
            }
            Command::Reinstall { reply } => {
                let _ = reply.send(self.reinstall().await);
            }
            Command::Rehydrate { reply } => {
                let _ = reply.send(self.rehydrate().await);
            }
        }
    }

    fn publish(&self) {
        let tags = self.profile.installation().tags.clone();
        if self.shared.tags.snapshot() != tags {
            self.shared.tags.publish(tags);
        }
        self.shared.profile.publish(self.profile.snapshot());
    }

    fn require_installation_id(&self) -> Result<String, SyncError> {
        self.profile
            .installation_id()
            .map(str::to_string)
            .ok_or(SyncError::NotRegistered)
    }

    async fn register(&mut self) -> Result<ProfileSnapshot, SyncError> {
        if self.profile.installation_id().is_none() {
            let installation_id = Uuid::new_v4().to_string();
            info!(%installation_id, "minted installation id on first launch");
            self.profile.assign_installation_id(installation_id);
        }

        self.profile.begin_registration();
        self.publish();

        match self.channel_source.register_channel().await {
            Ok(channel) => {
                debug!("platform push layer produced a channel");
                self.profile.channel_obtained(channel);
                self.publish();
            }
            Err(err) => {
                warn!("push channel registration failed: {err}");
                self.profile.registration_failed();
                self.publish();
                return Err(SyncError::ChannelRegistration(err));
            }
        }

        self.save(self.profile.installation().clone()).await?;
        Ok(self.profile.snapshot())
    }

    async fn add_tag(&mut self, tag: Tag) -> Result<Vec<Tag>, SyncError> {
        let installation_id = self.require_installation_id()?;
        self.profile.begin_mutation();
        self.publish();
        match self.service.add_tag(&installation_id, &tag).await {
            Ok(canonical) => {
                self.profile.apply_canonical_tags(canonical.clone());
                self.profile.commit();
                self.publish();
                Ok(canonical)
            }
            Err(err) => {
                self.profile.roll_back();
                self.publish();
                Err(SyncError::Remote(err))
            }
        }
    }

    async fn remove_tag(&mut self, tag: Tag) -> Result<Vec<Tag>, SyncError> {
        let installation_id = self.require_installation_id()?;
        self.profile.begin_mutation();
        self.publish();
        match self.service.remove_tag(&installation_id, &tag).await {
            Ok(canonical) => {
                self.profile.apply_canonical_tags(canonical.clone());
                self.profile.commit();
                self.publish();
                Ok(canonical)
            }
            Err(err) => {
                self.profile.roll_back();
                self.publish();
                Err(SyncError::Remote(err))
            }
        }
    }

    async fn set_enabled(&mut self, enabled: bool) -> Result<bool, SyncError> {
        let installation_id = self.require_installation_id()?;
        self.profile.begin_mutation();
        self.publish();
        match self.service.set_enabled(&installation_id, enabled).await {
            Ok(authoritative) => {
                if authoritative != enabled {
                    info!(requested = enabled, authoritative, "service overrode enabled flag");
                }
                self.profile.enabled_confirmed(authoritative);
                self.profile.commit();
                self.publish();
                Ok(authoritative)
            }
            Err(err) => {
                self.profile.roll_back();
                self.publish();
                Err(SyncError::Remote(err))
            }
        }
    }

    async fn set_installation_id(
        &mut self,
        installation_id: String,
    ) -> Result<ProfileSnapshot, SyncError> {
        let mut desired = self.profile.installation().clone();
        desired.installation_id = Some(installation_id.clone());

        self.profile.begin_mutation();
        self.publish();
        match self.service.push_installation_id(&desired).await {
            Ok(()) => {
                self.profile.assign_installation_id(installation_id);
                // The record now lives under a different id; the next save
                // must not be coalesced away.
                self.last_saved = None;
                self.profile.commit();
                self.publish();
                Ok(self.profile.snapshot())
            }
            Err(err) => {
                self.profile.roll_back();
                self.publish();
                Err(SyncError::Remote(err))
            }
        }
    }

    async fn set_template(
        &mut self,
        name: String,
        template: Option<InstallationTemplate>,
    ) -> Result<ProfileSnapshot, SyncError> {
        self.require_installation_id()?;
        let mut desired = self.profile.installation().clone();
        match template {
            Some(template) => {
                desired.templates.insert(name, template);
            }
            None => {
                desired.templates.remove(&name);
            }
        }
        self.save(desired).await?;
        Ok(self.profile.snapshot())
    }

    async fn reinstall(&mut self) -> Result<ProfileSnapshot, SyncError> {
        self.require_installation_id()?;
        self.save(self.profile.installation().clone()).await?;
        Ok(self.profile.snapshot())
    }

    async fn rehydrate(&mut self) -> Result<ProfileSnapshot, SyncError> {
        let installation_id = self.require_installation_id()?;
        self.profile.begin_mutation();
        self.publish();
        match self.service.get_installation(&installation_id).await {
            Ok(canonical) => {
                self.last_saved = Some(save_identity(&canonical));
                self.profile.reconcile(canonical);
                self.profile.commit();
                self.publish();
                Ok(self.profile.snapshot())
            }
            Err(err) => {
                self.profile.roll_back();
                self.publish();
                Err(SyncError::Remote(err))
            }
        }
    }

    /// Enriches and saves `desired`, reconciling local state from the
    /// canonical response. A save whose identity equals the last confirmed
    /// one is answered locally without a remote call.
    async fn save(&mut self, mut desired: Installation) -> Result<(), SyncError> {
        for enricher in &self.enrichers {
            enricher.enrich(&mut desired);
        }

        let identity = save_identity(&desired);
        if self.last_saved.as_ref() == Some(&identity) {
            debug!("skipping save: record identical to last confirmed save");
            // The hub already holds this exact record.
            self.profile.mark_synced();
            self.publish();
            return Ok(());
        }

        self.profile.begin_mutation();
        self.publish();
        match self.service.put_installation(&desired).await {
            Ok(canonical) => {
                self.last_saved = Some(identity);
                self.profile.reconcile(canonical);
                self.profile.mark_synced();
                self.profile.commit();
                self.publish();
                Ok(())
            }
            Err(err) => {
                self.profile.roll_back();
                self.publish();
                Err(SyncError::Remote(err))
            }
        }
    }
}
