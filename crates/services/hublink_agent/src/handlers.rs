//! HTTP handlers for the device agent.
//!
//! These endpoints stand in for the UI layer of a device application:
//! they mutate tags, the enabled flag and the installation identity through
//! the synchronizer, accept delivered notifications into the inbox, and
//! expose the current state for display.
//!
//! Validation failures answer 400 without a remote call having been made;
//! remote failures answer 502 with local state untouched.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info};

use hublink_common::error::not_found;
use hublink_common::http::IntoHttpResponse;
use hublink_common::models::{InstallationTemplate, Tag, TagSet};
use hublink_common::HublinkError;
use hublink_inbox::{NotificationMessage, ReceiptId, ReceivedNotification};
use hublink_registration::{derive_device_tags, ProfileSnapshot, SyncError};

use crate::app_state::AppState;

/// Current registration state as shown to the UI.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InstallationResponse {
    /// The canonical installation identifier, once assigned.
    pub installation_id: Option<String>,

    /// The device's push channel, once the platform handed one out.
    pub push_channel: Option<String>,

    /// Whether the device currently accepts broadcasts.
    pub enabled: bool,

    /// Registration lifecycle: unregistered, registering, registered, synced.
    pub state: String,

    /// Outcome of the latest mutation: idle, pending, committed, rolled_back.
    pub phase: String,

    /// The last tag list the hub confirmed.
    pub tags: Vec<String>,

    /// Names of the templates registered for this device.
    pub templates: Vec<String>,
}

impl InstallationResponse {
    fn from_parts(profile: ProfileSnapshot, tags: TagSet) -> Self {
        InstallationResponse {
            installation_id: profile.installation_id,
            push_channel: profile.push_channel.map(|channel| channel.0),
            enabled: profile.enabled,
            state: profile.state.as_str().to_string(),
            phase: profile.phase.as_str().to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            templates: profile.templates.keys().cloned().collect(),
        }
    }
}

/// Request body for adding a tag
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AddTagRequest {
    /// The tag to attach to this installation
    pub tag: String,
}

/// Response body for tag mutations
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TagListResponse {
    /// Whether the mutation was confirmed by the hub
    pub success: bool,

    /// The canonical tag list as confirmed by the hub
    pub tags: Vec<String>,

    /// Error message if the mutation failed
    pub error: Option<String>,
}

/// Request body for toggling the enabled flag
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Response body for the enabled toggle
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnabledResponse {
    pub success: bool,

    /// The enabled state the hub settled on, which may differ from the
    /// requested value
    pub enabled: Option<bool>,

    pub error: Option<String>,
}

/// Request body for replacing the installation identifier
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetInstallationIdRequest {
    pub installation_id: String,
}

/// Response wrapping an installation snapshot
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InstallationMutationResponse {
    pub success: bool,
    pub installation: Option<InstallationResponse>,
    pub error: Option<String>,
}

/// Request body for registering a notification template
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TemplateRequest {
    /// The template payload
    pub body: String,

    /// Headers delivered alongside the rendered payload
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Tags scoping which broadcasts select this template
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A received notification as shown to the UI
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationView {
    /// Inbox identity of this delivery
    pub receipt: u64,

    pub title: String,

    pub body: String,

    pub data: HashMap<String, String>,
}

impl NotificationView {
    fn from_received(received: &ReceivedNotification) -> Self {
        NotificationView {
            receipt: received.receipt.0,
            title: received.message.title.clone(),
            body: received.message.body.clone(),
            data: received.message.data.clone(),
        }
    }
}

/// Response body for the delivery callback
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReceiveResponse {
    pub success: bool,

    /// Identity assigned to the stored message
    pub receipt: u64,
}

fn sync_error_status(err: &SyncError) -> StatusCode {
    match err {
        SyncError::InvalidTag(_) => StatusCode::BAD_REQUEST,
        SyncError::ChannelRegistration(_) | SyncError::Remote(_) => StatusCode::BAD_GATEWAY,
        SyncError::NotRegistered => StatusCode::CONFLICT,
        SyncError::Stopped => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn installation_result(
    state: &AppState,
    result: Result<ProfileSnapshot, SyncError>,
) -> Response {
    match result {
        Ok(profile) => Json(InstallationMutationResponse {
            success: true,
            installation: Some(InstallationResponse::from_parts(
                profile,
                state.registration.tags().snapshot(),
            )),
            error: None,
        })
        .into_response(),
        Err(err) => {
            error!("installation mutation failed: {err}");
            (
                sync_error_status(&err),
                Json(InstallationMutationResponse {
                    success: false,
                    installation: None,
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

fn tag_result(result: Result<Vec<Tag>, SyncError>) -> Response {
    match result {
        Ok(canonical) => Json(TagListResponse {
            success: true,
            tags: canonical.iter().map(|tag| tag.to_string()).collect(),
            error: None,
        })
        .into_response(),
        Err(err) => {
            error!("tag mutation failed: {err}");
            (
                sync_error_status(&err),
                Json(TagListResponse {
                    success: false,
                    tags: Vec::new(),
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Handler returning the current installation snapshot
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/installation",
    responses(
        (status = 200, description = "Current installation state", body = InstallationResponse)
    ),
    tag = "Installation"
))]
pub async fn get_installation_handler(State(state): State<Arc<AppState>>) -> Response {
    let profile = state.registration.profile().snapshot();
    let tags = state.registration.tags().snapshot();
    Json(InstallationResponse::from_parts(profile, tags)).into_response()
}

/// Handler running a registration cycle with the platform and the hub
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/register",
    responses(
        (status = 200, description = "Registration completed", body = InstallationMutationResponse),
        (status = 502, description = "Platform or hub failure")
    ),
    tag = "Installation"
))]
pub async fn register_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("running registration cycle");
    installation_result(&state, state.registration.register().await)
}

/// Handler reconciling local state from the hub's canonical record
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/installation/refresh",
    responses(
        (status = 200, description = "State reconciled", body = InstallationMutationResponse),
        (status = 502, description = "Hub failure")
    ),
    tag = "Installation"
))]
pub async fn refresh_installation_handler(State(state): State<Arc<AppState>>) -> Response {
    installation_result(&state, state.registration.rehydrate().await)
}

/// Handler replacing the canonical installation identifier
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/installation-id",
    request_body = SetInstallationIdRequest,
    responses(
        (status = 200, description = "Identifier pushed and stored", body = InstallationMutationResponse),
        (status = 502, description = "Hub failure")
    ),
    tag = "Installation"
))]
pub async fn set_installation_id_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetInstallationIdRequest>,
) -> Response {
    info!(installation_id = %payload.installation_id, "replacing installation id");
    installation_result(
        &state,
        state
            .registration
            .set_installation_id(payload.installation_id)
            .await,
    )
}

/// Device-targeting tags derivable on this device
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceTagsResponse {
    /// Tags derived from the available device properties
    pub tags: Vec<String>,

    /// Properties this platform could not provide
    pub unsupported: Vec<String>,
}

/// Handler listing the targeting tags derivable from device properties
///
/// Properties the platform cannot provide are reported in `unsupported`
/// rather than retried.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/device-tags",
    responses(
        (status = 200, description = "Derivable device-targeting tags", body = DeviceTagsResponse)
    ),
    tag = "Tags"
))]
pub async fn device_tags_handler(State(state): State<Arc<AppState>>) -> Response {
    let (tags, unsupported) = derive_device_tags(state.device_properties.as_ref());
    Json(DeviceTagsResponse {
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        unsupported: unsupported.into_iter().map(|err| err.feature).collect(),
    })
    .into_response()
}

/// Handler for adding a tag to this installation
///
/// The tag is validated locally first; a malformed tag never reaches the
/// hub. On success the response carries the canonical tag list.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/tags",
    request_body = AddTagRequest,
    responses(
        (status = 200, description = "Tag added", body = TagListResponse),
        (status = 400, description = "Tag failed validation"),
        (status = 502, description = "Hub failure")
    ),
    tag = "Tags"
))]
pub async fn add_tag_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddTagRequest>,
) -> Response {
    debug!(tag = %payload.tag, "adding tag");
    tag_result(state.registration.add_tag(&payload.tag).await)
}

/// Handler for removing a tag from this installation
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/tags/{tag}",
    params(("tag" = String, Path, description = "The tag to remove")),
    responses(
        (status = 200, description = "Tag removed", body = TagListResponse),
        (status = 502, description = "Hub failure")
    ),
    tag = "Tags"
))]
pub async fn remove_tag_handler(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Response {
    debug!(%tag, "removing tag");
    tag_result(state.registration.remove_tag(&tag).await)
}

/// Handler toggling whether this device accepts broadcasts
///
/// The stored and returned value is whatever the hub settled on, which may
/// differ from the request.
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/enabled",
    request_body = SetEnabledRequest,
    responses(
        (status = 200, description = "Authoritative enabled state", body = EnabledResponse),
        (status = 502, description = "Hub failure")
    ),
    tag = "Installation"
))]
pub async fn set_enabled_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetEnabledRequest>,
) -> Response {
    match state.registration.set_enabled(payload.enabled).await {
        Ok(authoritative) => Json(EnabledResponse {
            success: true,
            enabled: Some(authoritative),
            error: None,
        })
        .into_response(),
        Err(err) => {
            error!("enabled toggle failed: {err}");
            (
                sync_error_status(&err),
                Json(EnabledResponse {
                    success: false,
                    enabled: None,
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Handler registering or replacing a notification template
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/templates/{name}",
    params(("name" = String, Path, description = "Template name")),
    request_body = TemplateRequest,
    responses(
        (status = 200, description = "Template stored", body = InstallationMutationResponse),
        (status = 400, description = "A template tag failed validation"),
        (status = 502, description = "Hub failure")
    ),
    tag = "Templates"
))]
pub async fn set_template_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<TemplateRequest>,
) -> Response {
    let mut tags = TagSet::new();
    for raw in &payload.tags {
        match Tag::new(raw.clone()) {
            Ok(tag) => {
                tags.insert(tag);
            }
            Err(err) => return HublinkError::from(err).into_http_response(),
        }
    }
    let template = InstallationTemplate {
        body: payload.body,
        headers: payload.headers,
        tags,
    };
    installation_result(&state, state.registration.set_template(name, template).await)
}

/// Handler removing a notification template
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/templates/{name}",
    params(("name" = String, Path, description = "Template name")),
    responses(
        (status = 200, description = "Template removed", body = InstallationMutationResponse),
        (status = 502, description = "Hub failure")
    ),
    tag = "Templates"
))]
pub async fn remove_template_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    installation_result(&state, state.registration.remove_template(name).await)
}

/// Handler listing received notifications, newest first
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Received notifications, newest first", body = [NotificationView])
    ),
    tag = "Notifications"
))]
pub async fn list_notifications_handler(State(state): State<Arc<AppState>>) -> Response {
    let views: Vec<NotificationView> = state
        .inbox
        .snapshot()
        .iter()
        .map(|received| NotificationView::from_received(received))
        .collect();
    Json(views).into_response()
}

/// Handler resolving one notification for a detail view
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/notifications/{receipt}",
    params(("receipt" = u64, Path, description = "Receipt identity of the delivery")),
    responses(
        (status = 200, description = "The notification", body = NotificationView),
        (status = 404, description = "No such receipt")
    ),
    tag = "Notifications"
))]
pub async fn get_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(receipt): Path<u64>,
) -> Response {
    match state.inbox.find(ReceiptId(receipt)) {
        Some(received) => Json(NotificationView::from_received(&received)).into_response(),
        None => not_found(format!("no notification with receipt {receipt}")).into_http_response(),
    }
}

/// Handler emptying the inbox
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/notifications",
    responses((status = 204, description = "Inbox cleared")),
    tag = "Notifications"
))]
pub async fn clear_notifications_handler(State(state): State<Arc<AppState>>) -> Response {
    state.inbox.clear();
    StatusCode::NO_CONTENT.into_response()
}

/// Delivery callback invoked by the transport when a push arrives
#[axum::debug_handler]
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/notifications",
    request_body = NotificationRequest,
    responses(
        (status = 200, description = "Message stored", body = ReceiveResponse)
    ),
    tag = "Notifications"
))]
pub async fn receive_notification_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NotificationRequest>,
) -> Response {
    let received = state.inbox.receive(NotificationMessage {
        title: payload.title,
        body: payload.body,
        data: payload.data,
    });
    info!(receipt = received.receipt.0, "notification delivered");
    Json(ReceiveResponse {
        success: true,
        receipt: received.receipt.0,
    })
    .into_response()
}

/// Request body of the delivery callback
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationRequest {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub data: HashMap<String, String>,
}
