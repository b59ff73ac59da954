// File: services/hublink_agent/src/main.rs
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use hublink_common::logging;
use hublink_common::services::{DeviceProperties, StaticDeviceProperties};
use hublink_config::load_config;
use hublink_hub::{FixedDelay, HubClient, HubRegistrationService};
use hublink_inbox::NotificationInbox;
use hublink_registration::{
    DevicePropertyEnricher, DynPushChannelSource, DynRegistrationService, Synchronizer,
};

mod app_state;
#[cfg(feature = "openapi")]
mod doc;
mod handlers;
mod platform;
mod routes;

use app_state::AppState;
use platform::FixedChannelSource;

#[tokio::main]
async fn main() {
    logging::init();

    let config = Arc::new(load_config().expect("Failed to load config"));

    // Hub client, with retries if the config asks for them
    let mut hub_client = HubClient::new(&config.hub).expect("Failed to create hub client");
    if let Some(retry) = &config.sync.retry {
        hub_client = hub_client.with_retry_policy(Arc::new(FixedDelay::from_config(retry)));
    }
    let service: DynRegistrationService =
        Arc::new(HubRegistrationService::new(Arc::new(hub_client)));

    // The platform push layer, stubbed with a fixed channel
    let channel_source: DynPushChannelSource = Arc::new(FixedChannelSource::from_config(
        config.device.push_channel.clone(),
    ));

    // Fixed device properties standing in for the OS lookup
    let device_properties: Arc<dyn DeviceProperties> = Arc::new(StaticDeviceProperties {
        country: config.device.country.clone(),
        language: config.device.language.clone(),
        carrier: config.device.carrier.clone(),
        manufacturer: config.device.manufacturer.clone(),
        screen_size: config
            .device
            .screen_width
            .zip(config.device.screen_height),
    });

    let registration = Synchronizer::builder(service, channel_source)
        .enrich_with(DevicePropertyEnricher::new(device_properties.clone()))
        .spawn();

    // Register at startup; a failure here is recoverable via POST /register
    let _ = logging::log_result(
        registration.register().await,
        "device registered with hub",
        "initial registration failed",
    );

    let inbox = Arc::new(NotificationInbox::new());

    let state = Arc::new(AppState {
        config: config.clone(),
        registration,
        inbox,
        device_properties,
    });

    let api_router = routes::routes(state);

    #[allow(unused_mut)] // mutable only with the openapi feature
    let mut app = Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http());

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use doc::AgentApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        println!("📖 Adding Swagger UI at /api/docs");
        let swagger_ui =
            SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", AgentApiDoc::openapi());
        app = app.merge(swagger_ui);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    println!("Starting agent at http://{}", addr);
    println!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
