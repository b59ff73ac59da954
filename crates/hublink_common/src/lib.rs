// Declare modules within this crate
pub mod error; // Error handling
pub mod http; // HTTP utilities
pub mod logging; // Logging utilities
pub mod models; // Shared data structures
pub mod observe; // Observable state primitive
pub mod services; // External service abstractions

// Re-export error types and utilities for easier access
pub use error::{
    config_error, conflict, internal_error, not_found, remote_service_error, validation_error,
    HttpStatusCode, HublinkError,
};

// Re-export HTTP utilities for easier access
pub use http::{handle_json_result, map_json_error, IntoHttpResponse};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_error, log_result};

// Re-export the core models and observer primitive
pub use models::{Installation, InstallationTemplate, InvalidTagError, PushChannel, Tag, TagSet};
pub use observe::{Observable, Watcher};
