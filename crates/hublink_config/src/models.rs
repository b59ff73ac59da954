use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Hub Config ---
// Holds the coordinates of the remote registration hub. The connection
// string carries the shared access key; keep it out of checked-in files and
// supply it via HUBLINK__HUB__CONNECTION_STRING.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HubConfig {
    /// Name of the hub this device registers with.
    pub hub_name: String,

    /// Portal-format connection string:
    /// `Endpoint=sb://…;SharedAccessKeyName=…;SharedAccessKey=…`
    pub connection_string: String,

    /// REST api-version requested on every call.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "2020-06".to_string()
}

// --- Sync Config ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SyncConfig {
    /// Retry settings for hub calls. Absent means no retries.
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Maximum number of additional attempts after the first failure.
    pub max_retries: u32,

    /// Fixed delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

// --- Device Config ---
// Fixed device properties the agent reports in place of a real OS lookup.
// Absent fields are surfaced as unsupported platform features.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DeviceConfig {
    /// Push channel handed out by the platform transport. When absent the
    /// agent mints a synthetic one at startup.
    pub push_channel: Option<String>,

    pub country: Option<String>,
    pub language: Option<String>,
    pub carrier: Option<String>,
    pub manufacturer: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    // Hub config is mandatory; nothing works without the remote registry
    pub hub: HubConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub device: DeviceConfig,
}
