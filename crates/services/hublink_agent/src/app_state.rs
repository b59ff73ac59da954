use std::sync::Arc;

use hublink_common::services::DeviceProperties;
use hublink_config::AppConfig;
use hublink_inbox::NotificationInbox;
use hublink_registration::RegistrationHandle;

/// Application state that is shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration loaded at startup.
    #[allow(dead_code)]
    pub config: Arc<AppConfig>,

    /// Handle to the registration synchronizer worker.
    pub registration: RegistrationHandle,

    /// The in-memory notification inbox fed by the delivery callback.
    pub inbox: Arc<NotificationInbox>,

    /// Device property lookup shared with the synchronizer's enricher.
    pub device_properties: Arc<dyn DeviceProperties>,
}
