use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use hublink_common::models::{Installation, InstallationTemplate, PushChannel, Tag};
use hublink_common::services::{BoxFuture, BoxedError, PushChannelSource, RegistrationService};

use crate::profile::{RegistrationState, SyncPhase};
use crate::sync::{SyncError, Synchronizer};
use crate::TagEnricher;

#[derive(Error, Debug)]
#[error("hub unavailable")]
struct FakeHubError;

fn fake_err() -> BoxedError {
    BoxedError(Box::new(FakeHubError))
}

/// In-memory stand-in for the remote hub. Tracks every call, can be told
/// to fail, to delay, or to override the enabled flag it confirms.
#[derive(Default)]
struct FakeHub {
    calls: Mutex<Vec<&'static str>>,
    stored: Mutex<Option<Installation>>,
    tags: Mutex<Vec<Tag>>,
    enabled_override: Mutex<Option<bool>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
}

impl FakeHub {
    fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|name| **name == op)
            .count()
    }

    fn remote_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn enter(&self, op: &'static str) -> Result<(), BoxedError> {
        self.calls.lock().unwrap().push(op);
        let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(current, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            self.exit();
            return Err(fake_err());
        }
        Ok(())
    }

    fn exit(&self) {
        self.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RegistrationService for FakeHub {
    type Error = BoxedError;

    fn put_installation(
        &self,
        installation: &Installation,
    ) -> BoxFuture<'_, Installation, Self::Error> {
        let desired = installation.clone();
        Box::pin(async move {
            self.enter("put_installation").await?;
            let mut canonical = desired;
            canonical.expiration = Some(Utc::now() + chrono::Duration::days(90));
            *self.tags.lock().unwrap() = canonical.tags.to_vec();
            *self.stored.lock().unwrap() = Some(canonical.clone());
            self.exit();
            Ok(canonical)
        })
    }

    fn push_installation_id(
        &self,
        installation: &Installation,
    ) -> BoxFuture<'_, (), Self::Error> {
        let desired = installation.clone();
        Box::pin(async move {
            self.enter("push_installation_id").await?;
            *self.stored.lock().unwrap() = Some(desired);
            self.exit();
            Ok(())
        })
    }

    fn add_tag(&self, _installation_id: &str, tag: &Tag) -> BoxFuture<'_, Vec<Tag>, Self::Error> {
        let tag = tag.clone();
        Box::pin(async move {
            self.enter("add_tag").await?;
            let mut tags = self.tags.lock().unwrap();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
            let canonical = tags.clone();
            drop(tags);
            self.exit();
            Ok(canonical)
        })
    }

    fn remove_tag(
        &self,
        _installation_id: &str,
        tag: &Tag,
    ) -> BoxFuture<'_, Vec<Tag>, Self::Error> {
        let tag = tag.clone();
        Box::pin(async move {
            self.enter("remove_tag").await?;
            let mut tags = self.tags.lock().unwrap();
            tags.retain(|existing| *existing != tag);
            let canonical = tags.clone();
            drop(tags);
            self.exit();
            Ok(canonical)
        })
    }

    fn set_enabled(
        &self,
        _installation_id: &str,
        enabled: bool,
    ) -> BoxFuture<'_, bool, Self::Error> {
        Box::pin(async move {
            self.enter("set_enabled").await?;
            let authoritative = self.enabled_override.lock().unwrap().unwrap_or(enabled);
            self.exit();
            Ok(authoritative)
        })
    }

    fn get_installation(&self, _installation_id: &str) -> BoxFuture<'_, Installation, Self::Error> {
        Box::pin(async move {
            self.enter("get_installation").await?;
            let stored = self.stored.lock().unwrap().clone();
            self.exit();
            stored.ok_or_else(fake_err)
        })
    }
}

#[derive(Default)]
struct FakeChannelSource {
    fail: AtomicBool,
    counter: AtomicUsize,
}

impl PushChannelSource for FakeChannelSource {
    type Error = BoxedError;

    fn register_channel(&self) -> BoxFuture<'_, PushChannel, Self::Error> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(fake_err());
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(PushChannel(format!("channel-{n}")))
        })
    }
}

fn spawn_default(hub: Arc<FakeHub>) -> crate::sync::RegistrationHandle {
    Synchronizer::builder(hub, Arc::new(FakeChannelSource::default())).spawn()
}

#[tokio::test]
async fn valid_add_issues_one_remote_call_and_mirrors_canonical_list() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    // The hub already knows a tag this client never added.
    hub.tags
        .lock()
        .unwrap()
        .push(Tag::new("preexisting").unwrap());

    let canonical = handle.add_tag("a").await.unwrap();
    assert_eq!(hub.call_count("add_tag"), 1);
    assert_eq!(
        canonical,
        vec![Tag::new("preexisting").unwrap(), Tag::new("a").unwrap()]
    );

    // Local state is the canonical list, not the locally added string.
    let tags = handle.tags().snapshot();
    assert!(tags.contains(&Tag::new("preexisting").unwrap()));
    assert!(tags.contains(&Tag::new("a").unwrap()));
    assert_eq!(tags.len(), 2);
}

#[tokio::test]
async fn invalid_tag_is_rejected_without_any_network_call() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();
    let calls_after_register = hub.remote_calls();

    let err = handle.add_tag("bad tag!").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidTag(_)));
    assert_eq!(hub.remote_calls(), calls_after_register);
    assert!(handle.tags().snapshot().is_empty());
}

#[tokio::test]
async fn underscore_tags_validate_while_punctuated_ones_do_not() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    assert!(handle.add_tag("a").await.is_ok());
    assert!(handle.add_tag("a_b").await.is_ok());
    let calls_before = hub.remote_calls();
    assert!(matches!(
        handle.add_tag("bad tag!").await,
        Err(SyncError::InvalidTag(_))
    ));
    assert_eq!(hub.remote_calls(), calls_before);
}

#[tokio::test]
async fn remove_never_leaves_the_tag_behind() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    handle.add_tag("sports").await.unwrap();
    let canonical = handle.remove_tag("sports").await.unwrap();
    assert!(!canonical.contains(&Tag::new("sports").unwrap()));
    assert!(!handle
        .tags()
        .snapshot()
        .contains(&Tag::new("sports").unwrap()));
}

#[tokio::test]
async fn service_is_authoritative_for_the_enabled_flag() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    // The service refuses to enable despite the request.
    *hub.enabled_override.lock().unwrap() = Some(false);
    let enabled = handle.set_enabled(true).await.unwrap();
    assert!(!enabled);
    assert!(!handle.profile().snapshot().enabled);
}

#[tokio::test]
async fn remote_failure_leaves_last_known_good_state() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();
    handle.add_tag("kept").await.unwrap();

    hub.fail.store(true, Ordering::SeqCst);
    let err = handle.add_tag("lost").await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));

    let tags = handle.tags().snapshot();
    assert!(tags.contains(&Tag::new("kept").unwrap()));
    assert!(!tags.contains(&Tag::new("lost").unwrap()));
    assert_eq!(handle.profile().snapshot().phase, SyncPhase::RolledBack);

    // The action is recoverable by retrying.
    hub.fail.store(false, Ordering::SeqCst);
    assert!(handle.add_tag("lost").await.is_ok());
}

#[tokio::test]
async fn failed_channel_registration_returns_to_unregistered() {
    let hub = Arc::new(FakeHub::default());
    let source = Arc::new(FakeChannelSource::default());
    source.fail.store(true, Ordering::SeqCst);
    let handle = Synchronizer::builder(hub.clone(), source.clone()).spawn();

    let err = handle.register().await.unwrap_err();
    assert!(matches!(err, SyncError::ChannelRegistration(_)));
    let profile = handle.profile().snapshot();
    assert_eq!(profile.state, RegistrationState::Unregistered);
    assert!(profile.push_channel.is_none());
    assert_eq!(hub.call_count("put_installation"), 0);

    // Retry succeeds once the platform cooperates.
    source.fail.store(false, Ordering::SeqCst);
    let profile = handle.register().await.unwrap();
    assert_eq!(profile.state, RegistrationState::Synced);
    assert!(profile.push_channel.is_some());
}

#[tokio::test]
async fn registration_mints_a_stable_installation_id() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());

    let first = handle.register().await.unwrap();
    let minted = first.installation_id.expect("id minted on first launch");

    // A second cycle (token rotation) keeps the identity.
    let second = handle.register().await.unwrap();
    assert_eq!(second.installation_id.as_deref(), Some(minted.as_str()));
}

#[tokio::test]
async fn operations_before_registration_are_rejected() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());

    let err = handle.add_tag("early").await.unwrap_err();
    assert!(matches!(err, SyncError::NotRegistered));
    assert_eq!(hub.remote_calls(), 0);
}

#[tokio::test]
async fn identical_saves_are_coalesced_without_a_remote_call() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();
    assert_eq!(hub.call_count("put_installation"), 1);

    // Nothing changed; the save is answered locally.
    handle.reinstall().await.unwrap();
    assert_eq!(hub.call_count("put_installation"), 1);

    // A real change goes out.
    handle
        .set_template(
            "greeting",
            InstallationTemplate {
                body: "{\"title\":\"$(title)\"}".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hub.call_count("put_installation"), 2);
    assert!(handle
        .profile()
        .snapshot()
        .templates
        .contains_key("greeting"));
}

#[tokio::test]
async fn concurrent_mutations_are_serialized_fifo() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();
    *hub.delay.lock().unwrap() = Some(Duration::from_millis(25));

    let h1 = handle.clone();
    let h2 = handle.clone();
    let first = tokio::spawn(async move { h1.add_tag("first").await });
    let second = tokio::spawn(async move { h2.add_tag("second").await });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    // The worker never had two hub calls in flight at once.
    assert_eq!(hub.max_inflight.load(Ordering::SeqCst), 1);
    let tags = handle.tags().snapshot();
    assert!(tags.contains(&Tag::new("first").unwrap()));
    assert!(tags.contains(&Tag::new("second").unwrap()));
}

#[tokio::test]
async fn pending_phase_is_observable_while_a_mutation_is_in_flight() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();
    *hub.delay.lock().unwrap() = Some(Duration::from_millis(100));

    let worker_handle = handle.clone();
    let task = tokio::spawn(async move { worker_handle.add_tag("slow").await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.profile().snapshot().phase, SyncPhase::Pending);

    task.await.unwrap().unwrap();
    assert_eq!(handle.profile().snapshot().phase, SyncPhase::Committed);
}

#[tokio::test]
async fn set_installation_id_pushes_then_stores_locally() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    let profile = handle.set_installation_id("custom-device-id").await.unwrap();
    assert_eq!(profile.installation_id.as_deref(), Some("custom-device-id"));
    assert_eq!(hub.call_count("push_installation_id"), 1);

    // Failure keeps the old identity.
    hub.fail.store(true, Ordering::SeqCst);
    let err = handle.set_installation_id("rejected-id").await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(_)));
    assert_eq!(
        handle.profile().snapshot().installation_id.as_deref(),
        Some("custom-device-id")
    );
}

#[tokio::test]
async fn rehydrate_reconciles_from_the_hub() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    // Another session added a tag behind this client's back.
    if let Some(stored) = hub.stored.lock().unwrap().as_mut() {
        stored.tags.insert(Tag::new("from_elsewhere").unwrap());
    }

    handle.rehydrate().await.unwrap();
    assert!(handle
        .tags()
        .snapshot()
        .contains(&Tag::new("from_elsewhere").unwrap()));
}

#[tokio::test]
async fn enrichers_tags_survive_canonical_reconciliation() {
    let hub = Arc::new(FakeHub::default());
    let tags = [Tag::new("pinned").unwrap()].into_iter().collect();
    let handle = Synchronizer::builder(hub.clone(), Arc::new(FakeChannelSource::default()))
        .enrich_with(TagEnricher::new(tags))
        .spawn();

    handle.register().await.unwrap();
    assert!(handle
        .tags()
        .snapshot()
        .contains(&Tag::new("pinned").unwrap()));
}

#[tokio::test]
async fn tag_watchers_receive_whole_snapshots() {
    let hub = Arc::new(FakeHub::default());
    let handle = spawn_default(hub.clone());
    handle.register().await.unwrap();

    let mut watcher = handle.tags().subscribe();
    handle.add_tag("observed").await.unwrap();
    let published = watcher.changed().await.expect("observable still alive");
    assert!(published.contains(&Tag::new("observed").unwrap()));
}
