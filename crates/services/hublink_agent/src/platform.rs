//! Stand-ins for the platform push layer.
//!
//! On a phone the OS SDK hands out the push channel. The agent has no OS
//! push layer, so it serves a fixed channel: either one configured under
//! `device.push_channel`, or a synthetic one minted at startup.

use tracing::warn;
use uuid::Uuid;

use hublink_common::models::PushChannel;
use hublink_common::services::{BoxFuture, BoxedError, PushChannelSource};

/// A [`PushChannelSource`] that always returns the same channel.
pub struct FixedChannelSource {
    channel: PushChannel,
}

impl FixedChannelSource {
    pub fn new(channel: PushChannel) -> Self {
        FixedChannelSource { channel }
    }

    /// Uses the configured channel, or mints a synthetic one so the agent
    /// can register even without real transport credentials.
    pub fn from_config(configured: Option<String>) -> Self {
        let channel = match configured {
            Some(channel) => PushChannel(channel),
            None => {
                let synthetic = format!("synthetic-{}", Uuid::new_v4());
                warn!(
                    channel = %synthetic,
                    "no device.push_channel configured; using a synthetic channel"
                );
                PushChannel(synthetic)
            }
        };
        FixedChannelSource::new(channel)
    }
}

impl PushChannelSource for FixedChannelSource {
    type Error = BoxedError;

    fn register_channel(&self) -> BoxFuture<'_, PushChannel, Self::Error> {
        let channel = self.channel.clone();
        Box::pin(async move { Ok(channel) })
    }
}
