//! Wire representation of installation records.
//!
//! The hub REST API (api-version 2020-06) exchanges installations as
//! camelCase JSON. These DTOs convert to and from the domain
//! [`Installation`] model, validating canonical tags on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use hublink_common::models::{Installation, InstallationTemplate, PushChannel, Tag};

use crate::client::HubError;

fn default_enabled() -> bool {
    true
}

/// An installation as the hub serializes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    pub installation_id: String,

    pub platform: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_channel: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, TemplateRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// A notification template as the hub serializes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub body: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl InstallationRecord {
    /// Builds the wire record for an upsert. The installation must already
    /// carry an installation id.
    pub fn from_domain(installation: &Installation) -> Result<Self, HubError> {
        let installation_id = installation
            .installation_id
            .clone()
            .ok_or(HubError::MissingInstallationId)?;

        Ok(InstallationRecord {
            installation_id,
            platform: installation.platform.clone(),
            push_channel: installation
                .push_channel
                .as_ref()
                .map(|channel| channel.as_str().to_string()),
            enabled: installation.enabled,
            tags: installation.tags.iter().map(|t| t.to_string()).collect(),
            templates: installation
                .templates
                .iter()
                .map(|(name, template)| (name.clone(), TemplateRecord::from_domain(template)))
                .collect(),
            expiration_time: installation.expiration,
        })
    }

    /// Converts a canonical hub response into the domain model.
    pub fn into_domain(self) -> Result<Installation, HubError> {
        Ok(Installation {
            installation_id: Some(self.installation_id),
            push_channel: self.push_channel.map(PushChannel),
            platform: self.platform,
            enabled: self.enabled,
            tags: parse_tags(self.tags)?,
            templates: self
                .templates
                .into_iter()
                .map(|(name, template)| Ok((name, template.into_domain()?)))
                .collect::<Result<_, HubError>>()?,
            expiration: self.expiration_time,
        })
    }

    /// The canonical tag list from a hub response.
    pub fn canonical_tags(&self) -> Result<Vec<Tag>, HubError> {
        self.tags
            .iter()
            .map(|raw| {
                Tag::new(raw.clone()).map_err(|err| HubError::ResponseError(err.to_string()))
            })
            .collect()
    }
}

impl TemplateRecord {
    fn from_domain(template: &InstallationTemplate) -> Self {
        TemplateRecord {
            body: template.body.clone(),
            headers: template.headers.clone(),
            tags: template.tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn into_domain(self) -> Result<InstallationTemplate, HubError> {
        Ok(InstallationTemplate {
            body: self.body,
            headers: self.headers,
            tags: parse_tags(self.tags)?,
        })
    }
}

fn parse_tags<C: FromIterator<Tag>>(raw: Vec<String>) -> Result<C, HubError> {
    raw.into_iter()
        .map(|tag| Tag::new(tag).map_err(|err| HubError::ResponseError(err.to_string())))
        .collect()
}

/// One operation of a JSON-patch request against an installation.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOperation {
    pub op: &'static str,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl PatchOperation {
    pub fn add_tag(tag: &Tag) -> Self {
        PatchOperation {
            op: "add",
            path: "/tags".to_string(),
            value: Some(serde_json::Value::String(tag.to_string())),
        }
    }

    pub fn remove_tag(tag: &Tag) -> Self {
        PatchOperation {
            op: "remove",
            path: format!("/tags/{}", tag),
            value: None,
        }
    }

    pub fn set_enabled(enabled: bool) -> Self {
        PatchOperation {
            op: "replace",
            path: "/enabled".to_string(),
            value: Some(serde_json::Value::Bool(enabled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hublink_common::models::TagSet;

    #[test]
    fn upsert_requires_an_installation_id() {
        let installation = Installation::new();
        assert!(matches!(
            InstallationRecord::from_domain(&installation),
            Err(HubError::MissingInstallationId)
        ));
    }

    #[test]
    fn round_trips_through_the_wire_shape() {
        let mut installation = Installation::new();
        installation.installation_id = Some("device-1".to_string());
        installation.push_channel = Some(PushChannel("token-xyz".to_string()));
        installation.tags = [Tag::new("sports").unwrap(), Tag::new("news").unwrap()]
            .into_iter()
            .collect::<TagSet>();
        installation.templates.insert(
            "greeting".to_string(),
            InstallationTemplate {
                body: "{\"title\":\"$(title)\"}".to_string(),
                ..Default::default()
            },
        );

        let record = InstallationRecord::from_domain(&installation).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["installationId"], "device-1");
        assert_eq!(json["pushChannel"], "token-xyz");

        let back = record.into_domain().unwrap();
        assert_eq!(back, installation);
    }

    #[test]
    fn invalid_canonical_tags_are_a_response_error() {
        let record = InstallationRecord {
            installation_id: "device-1".to_string(),
            platform: "fcmv1".to_string(),
            push_channel: None,
            enabled: true,
            tags: vec!["not a tag".to_string()],
            templates: BTreeMap::new(),
            expiration_time: None,
        };
        assert!(matches!(
            record.into_domain(),
            Err(HubError::ResponseError(_))
        ));
    }

    #[test]
    fn patch_operations_serialize_in_json_patch_shape() {
        let add = serde_json::to_value(PatchOperation::add_tag(&Tag::new("a_b").unwrap())).unwrap();
        assert_eq!(add["op"], "add");
        assert_eq!(add["path"], "/tags");
        assert_eq!(add["value"], "a_b");

        let remove =
            serde_json::to_value(PatchOperation::remove_tag(&Tag::new("a_b").unwrap())).unwrap();
        assert_eq!(remove["path"], "/tags/a_b");
        assert!(remove.get("value").is_none());
    }
}
