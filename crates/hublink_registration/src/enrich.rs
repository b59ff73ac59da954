//! Installation enrichers.
//!
//! Before every upsert the synchronizer runs the registration record
//! through a chain of enrichers, each contributing metadata the device
//! wants attached to its record. Enrichment is additive and idempotent:
//! running a chain twice yields the same record.

use std::sync::Arc;
use tracing::warn;

use hublink_common::models::{Installation, Tag, TagSet};
use hublink_common::services::{DeviceProperties, UnsupportedPlatformFeature};

/// Contributes metadata to an installation record before it is saved.
pub trait InstallationEnricher: Send + Sync {
    fn enrich(&self, installation: &mut Installation);
}

/// Applies a fixed set of tags to every installation it sees.
pub struct TagEnricher {
    tags: TagSet,
}

impl TagEnricher {
    pub fn new(tags: TagSet) -> Self {
        TagEnricher { tags }
    }
}

impl InstallationEnricher for TagEnricher {
    fn enrich(&self, installation: &mut Installation) {
        for tag in &self.tags {
            installation.tags.insert(tag.clone());
        }
    }
}

/// Derives the normalized device-targeting tags for `properties`.
///
/// Tag shapes are normalized so a broadcast can address, say, every device
/// in a country regardless of platform: `Country_CH`, `Language_de-CH`,
/// `MobileCarrier_Sunrise`, `Oem_Fairphone`, `ScreenSize_1080X2340`.
/// Returns the tags that could be formed alongside the features the
/// platform reported as unavailable; those are surfaced, never retried.
/// A property value the tag alphabet cannot represent is skipped with a
/// warning, since it must not reach the network.
pub fn derive_device_tags(
    properties: &dyn DeviceProperties,
) -> (Vec<Tag>, Vec<UnsupportedPlatformFeature>) {
    let candidates = [
        properties.country().map(|c| format!("Country_{c}")),
        properties.language().map(|l| format!("Language_{l}")),
        properties.carrier().map(|c| format!("MobileCarrier_{c}")),
        properties.manufacturer().map(|m| format!("Oem_{m}")),
        properties
            .screen_size()
            .map(|(w, h)| format!("ScreenSize_{w}X{h}")),
    ];

    let mut tags = Vec::new();
    let mut unsupported = Vec::new();
    for candidate in candidates {
        match candidate {
            Ok(raw) => match Tag::new(&raw) {
                Ok(tag) => tags.push(tag),
                Err(err) => warn!("skipping device tag: {err}"),
            },
            Err(err) => {
                warn!("device property unavailable: {err}");
                unsupported.push(err);
            }
        }
    }
    (tags, unsupported)
}

/// Applies the derived device-targeting tags to every installation.
pub struct DevicePropertyEnricher {
    properties: Arc<dyn DeviceProperties>,
}

impl DevicePropertyEnricher {
    pub fn new(properties: Arc<dyn DeviceProperties>) -> Self {
        DevicePropertyEnricher { properties }
    }
}

impl InstallationEnricher for DevicePropertyEnricher {
    fn enrich(&self, installation: &mut Installation) {
        let (tags, _unsupported) = derive_device_tags(self.properties.as_ref());
        for tag in tags {
            installation.tags.insert(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hublink_common::services::StaticDeviceProperties;

    #[test]
    fn tag_enricher_adds_its_tags() {
        let enricher = TagEnricher::new(
            [Tag::new("pinned").unwrap()].into_iter().collect::<TagSet>(),
        );
        let mut installation = Installation::new();
        enricher.enrich(&mut installation);
        assert!(installation.tags.contains(&Tag::new("pinned").unwrap()));
    }

    #[test]
    fn device_properties_become_normalized_tags() {
        let properties = StaticDeviceProperties {
            country: Some("CH".to_string()),
            language: Some("de-CH".to_string()),
            manufacturer: Some("Fairphone".to_string()),
            screen_size: Some((1080, 2340)),
            ..Default::default()
        };
        let enricher = DevicePropertyEnricher::new(Arc::new(properties));
        let mut installation = Installation::new();
        enricher.enrich(&mut installation);

        for expected in [
            "Country_CH",
            "Language_de-CH",
            "Oem_Fairphone",
            "ScreenSize_1080X2340",
        ] {
            assert!(
                installation.tags.contains(&Tag::new(expected).unwrap()),
                "missing {expected}"
            );
        }
        // Carrier was unsupported and is simply absent.
        assert_eq!(installation.tags.len(), 4);
    }

    #[test]
    fn unrepresentable_property_values_are_skipped() {
        let properties = StaticDeviceProperties {
            carrier: Some("Sunrise UPC".to_string()),
            ..Default::default()
        };
        let enricher = DevicePropertyEnricher::new(Arc::new(properties));
        let mut installation = Installation::new();
        enricher.enrich(&mut installation);
        assert!(installation.tags.is_empty());
    }

    #[test]
    fn unavailable_features_are_reported_not_retried() {
        let properties = StaticDeviceProperties {
            country: Some("CH".to_string()),
            ..Default::default()
        };
        let (tags, unsupported) = derive_device_tags(&properties);
        assert_eq!(tags, vec![Tag::new("Country_CH").unwrap()]);
        let features: Vec<&str> = unsupported
            .iter()
            .map(|err| err.feature.as_str())
            .collect();
        assert_eq!(
            features,
            vec!["language", "carrier", "manufacturer", "screen_size"]
        );
    }

    #[test]
    fn enrichment_is_idempotent() {
        let enricher = TagEnricher::new(
            [Tag::new("pinned").unwrap()].into_iter().collect::<TagSet>(),
        );
        let mut installation = Installation::new();
        enricher.enrich(&mut installation);
        enricher.enrich(&mut installation);
        assert_eq!(installation.tags.len(), 1);
    }
}
