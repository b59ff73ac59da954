use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::app_state::AppState;
use crate::handlers::{
    add_tag_handler, clear_notifications_handler, device_tags_handler, get_installation_handler,
    get_notification_handler, list_notifications_handler, receive_notification_handler,
    refresh_installation_handler, register_handler, remove_tag_handler, remove_template_handler,
    set_enabled_handler, set_installation_id_handler, set_template_handler,
};

/// Create the agent's routes
///
/// Installation, tag and template mutations flow through the registration
/// synchronizer; the notification endpoints read and feed the inbox.
pub fn routes(state: Arc<AppState>) -> Router {
    info!("agent routes initialized");

    Router::new()
        .route("/installation", get(get_installation_handler))
        .route("/installation/refresh", post(refresh_installation_handler))
        .route("/installation-id", put(set_installation_id_handler))
        .route("/register", post(register_handler))
        .route("/enabled", put(set_enabled_handler))
        .route("/tags", post(add_tag_handler))
        .route("/tags/{tag}", delete(remove_tag_handler))
        .route("/device-tags", get(device_tags_handler))
        .route(
            "/templates/{name}",
            put(set_template_handler).delete(remove_template_handler),
        )
        .route(
            "/notifications",
            get(list_notifications_handler)
                .post(receive_notification_handler)
                .delete(clear_notifications_handler),
        )
        .route("/notifications/{receipt}", get(get_notification_handler))
        .with_state(state)
}
