//! Service abstractions for external collaborators.
//!
//! This module provides trait definitions for the external services Hublink
//! talks to: the remote registration hub, the platform push layer, and the
//! OS-level device property lookup. These traits allow for dependency
//! injection and easier testing by decoupling the synchronizer from specific
//! implementations.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{Installation, PushChannel, Tag};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// A trait for the remote registration hub.
///
/// Every mutation returns the state the hub now considers canonical; callers
/// are expected to overwrite their local view with it rather than trust what
/// they sent.
pub trait RegistrationService: Send + Sync {
    /// Error type returned by registration operations.
    type Error: StdError + Send + Sync + 'static;

    /// Create or overwrite the installation record, returning the record as
    /// the hub stored it.
    fn put_installation(
        &self,
        installation: &Installation,
    ) -> BoxFuture<'_, Installation, Self::Error>;

    /// Push the installation's id to the hub as the canonical identifier
    /// for this device's registration. The record must already carry the id
    /// being pushed.
    fn push_installation_id(&self, installation: &Installation)
        -> BoxFuture<'_, (), Self::Error>;

    /// Attach a tag to the installation, returning the canonical tag list.
    fn add_tag(&self, installation_id: &str, tag: &Tag) -> BoxFuture<'_, Vec<Tag>, Self::Error>;

    /// Detach a tag from the installation, returning the canonical tag list.
    fn remove_tag(&self, installation_id: &str, tag: &Tag)
        -> BoxFuture<'_, Vec<Tag>, Self::Error>;

    /// Request a change to the enabled flag. The returned value is the
    /// state the hub settled on, which may differ from the request.
    fn set_enabled(&self, installation_id: &str, enabled: bool)
        -> BoxFuture<'_, bool, Self::Error>;

    /// Fetch the current canonical installation record.
    fn get_installation(&self, installation_id: &str)
        -> BoxFuture<'_, Installation, Self::Error>;
}

/// A trait for the platform push layer.
///
/// The platform owns push-channel registration; Hublink only consumes the
/// resulting token. Real implementations wrap an OS SDK, test
/// implementations hand back a fixed channel.
pub trait PushChannelSource: Send + Sync {
    /// Error type returned by the platform push layer.
    type Error: StdError + Send + Sync + 'static;

    /// Obtain the push channel for this device, registering with the
    /// platform if necessary. Re-invoked on token rotation.
    fn register_channel(&self) -> BoxFuture<'_, PushChannel, Self::Error>;
}

/// A requested device property is unavailable on the current platform or OS
/// version. Surfaced to the caller, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("device property '{feature}' is not available on this platform")]
pub struct UnsupportedPlatformFeature {
    /// Name of the property that could not be resolved.
    pub feature: String,
}

impl UnsupportedPlatformFeature {
    pub fn new(feature: impl Into<String>) -> Self {
        UnsupportedPlatformFeature {
            feature: feature.into(),
        }
    }
}

/// OS-level device property lookup, used to derive targeting metadata.
///
/// Implementations are platform bindings and out of scope here; the agent
/// and tests use [`StaticDeviceProperties`].
pub trait DeviceProperties: Send + Sync {
    /// ISO country code of the device locale.
    fn country(&self) -> Result<String, UnsupportedPlatformFeature>;

    /// BCP-47 language tag of the device locale.
    fn language(&self) -> Result<String, UnsupportedPlatformFeature>;

    /// Name of the mobile network operator, if any.
    fn carrier(&self) -> Result<String, UnsupportedPlatformFeature>;

    /// Device manufacturer.
    fn manufacturer(&self) -> Result<String, UnsupportedPlatformFeature>;

    /// Un-rotated screen resolution in pixels.
    fn screen_size(&self) -> Result<(u32, u32), UnsupportedPlatformFeature>;
}

/// A [`DeviceProperties`] implementation backed by fixed values.
///
/// Any property left as `None` is reported as unsupported, which is exactly
/// how an absent platform capability surfaces.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceProperties {
    pub country: Option<String>,
    pub language: Option<String>,
    pub carrier: Option<String>,
    pub manufacturer: Option<String>,
    pub screen_size: Option<(u32, u32)>,
}

impl StaticDeviceProperties {
    fn require<T: Clone>(
        value: &Option<T>,
        feature: &str,
    ) -> Result<T, UnsupportedPlatformFeature> {
        value
            .clone()
            .ok_or_else(|| UnsupportedPlatformFeature::new(feature))
    }
}

impl DeviceProperties for StaticDeviceProperties {
    fn country(&self) -> Result<String, UnsupportedPlatformFeature> {
        Self::require(&self.country, "country")
    }

    fn language(&self) -> Result<String, UnsupportedPlatformFeature> {
        Self::require(&self.language, "language")
    }

    fn carrier(&self) -> Result<String, UnsupportedPlatformFeature> {
        Self::require(&self.carrier, "carrier")
    }

    fn manufacturer(&self) -> Result<String, UnsupportedPlatformFeature> {
        Self::require(&self.manufacturer, "manufacturer")
    }

    fn screen_size(&self) -> Result<(u32, u32), UnsupportedPlatformFeature> {
        Self::require(&self.screen_size, "screen_size")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_properties_report_missing_values_as_unsupported() {
        let props = StaticDeviceProperties {
            country: Some("CH".to_string()),
            ..Default::default()
        };
        assert_eq!(props.country().unwrap(), "CH");
        let err = props.carrier().unwrap_err();
        assert_eq!(err.feature, "carrier");
    }
}
