#![allow(dead_code)]
use utoipa::OpenApi;

use crate::handlers;

/// OpenAPI documentation for the agent's endpoints.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hublink Agent API",
        version = "0.1.0",
        description = "Device-side registration state and notification inbox"
    ),
    paths(
        handlers::get_installation_handler,
        handlers::register_handler,
        handlers::refresh_installation_handler,
        handlers::set_installation_id_handler,
        handlers::add_tag_handler,
        handlers::remove_tag_handler,
        handlers::device_tags_handler,
        handlers::set_enabled_handler,
        handlers::set_template_handler,
        handlers::remove_template_handler,
        handlers::list_notifications_handler,
        handlers::get_notification_handler,
        handlers::clear_notifications_handler,
        handlers::receive_notification_handler,
    ),
    components(schemas(
        handlers::InstallationResponse,
        handlers::InstallationMutationResponse,
        handlers::AddTagRequest,
        handlers::TagListResponse,
        handlers::DeviceTagsResponse,
        handlers::SetEnabledRequest,
        handlers::EnabledResponse,
        handlers::SetInstallationIdRequest,
        handlers::TemplateRequest,
        handlers::NotificationView,
        handlers::NotificationRequest,
        handlers::ReceiveResponse,
    )),
    tags(
        (name = "Installation", description = "Registration state"),
        (name = "Tags", description = "Targeting tags"),
        (name = "Templates", description = "Notification templates"),
        (name = "Notifications", description = "The received-message inbox")
    )
)]
pub struct AgentApiDoc;
