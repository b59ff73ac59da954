//! Data structures shared across the Hublink crates.
//!
//! The types here describe a device registration the way the remote hub sees
//! it: an installation record carrying the push channel, a set of targeting
//! tags, and any notification templates registered for the device.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Platform identifier reported to the hub for this device family.
pub const DEFAULT_PLATFORM: &str = "fcmv1";

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_@#.:-]{1,120}$").expect("tag pattern compiles"));

/// Error returned when a string does not qualify as a tag.
///
/// Validation is local and synchronous; a string that fails it never
/// reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid tag '{tag}': tags are 1-120 characters drawn from letters, digits and _ @ # . : -")]
pub struct InvalidTagError {
    /// The rejected input.
    pub tag: String,
}

/// A validated targeting label attached to an installation.
///
/// Tags are case-sensitive and unique within an installation. The accepted
/// alphabet is letters, digits and `_ @ # . : -`, between 1 and 120
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Validates `value` and wraps it as a [`Tag`].
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidTagError> {
        let value = value.into();
        if TAG_PATTERN.is_match(&value) {
            Ok(Tag(value))
        } else {
            Err(InvalidTagError { tag: value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = InvalidTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::new(s)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Tag::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A deduplicated, order-insensitive collection of [`Tag`]s.
///
/// The instance attached to an installation always mirrors the tag list the
/// remote registry last confirmed; local edits are speculative and are
/// replaced wholesale by the canonical list when a response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: BTreeSet<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    /// Inserts a tag locally. Returns whether the tag was new.
    pub fn insert(&mut self, tag: Tag) -> bool {
        self.tags.insert(tag)
    }

    /// Removes a tag locally. Returns whether it was present.
    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.tags.remove(tag)
    }

    /// Replaces the whole set with the service's canonical list.
    pub fn replace_with(&mut self, canonical: impl IntoIterator<Item = Tag>) {
        self.tags = canonical.into_iter().collect();
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn to_vec(&self) -> Vec<Tag> {
        self.tags.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagSet {
            tags: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = std::collections::btree_set::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// The opaque token the push transport uses to address this device.
///
/// Produced by the platform push layer; Hublink never inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushChannel(pub String);

impl PushChannel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PushChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A predefined notification body and headers the hub can render on behalf
/// of this device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallationTemplate {
    /// The template payload, with placeholders resolved by the hub.
    pub body: String,

    /// Headers delivered alongside the rendered payload.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Tags scoping which broadcasts select this template.
    #[serde(default)]
    pub tags: TagSet,
}

/// A device's registration record with the hub.
///
/// This is both the payload of an upsert and the canonical state the hub
/// returns. Local copies are speculative; the hub's response is ground
/// truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Unique identifier for this registration record, minted on first
    /// launch and stable across token rotations.
    pub installation_id: Option<String>,

    /// The device's push channel. Absent until the platform push layer has
    /// completed its own registration.
    pub push_channel: Option<PushChannel>,

    /// Platform identifier for the push transport in use.
    pub platform: String,

    /// Whether this device currently accepts broadcasts.
    pub enabled: bool,

    /// Targeting tags attached to this installation.
    pub tags: TagSet,

    /// Notification templates registered for this installation, by name.
    pub templates: BTreeMap<String, InstallationTemplate>,

    /// The moment this record stops being valid, as assigned by the hub.
    pub expiration: Option<DateTime<Utc>>,
}

impl Installation {
    pub fn new() -> Self {
        Installation {
            installation_id: None,
            push_channel: None,
            platform: DEFAULT_PLATFORM.to_string(),
            enabled: true,
            tags: TagSet::new(),
            templates: BTreeMap::new(),
            expiration: None,
        }
    }
}

impl Default for Installation {
    fn default() -> Self {
        Self::new()
    }
}
