use std::fmt;
use thiserror::Error;

use crate::models::InvalidTagError;
use crate::services::UnsupportedPlatformFeature;

/// The base error type for all Hublink errors.
///
/// This enum provides a common set of error variants that can be used across all crates.
/// Each crate can extend this by implementing From<SpecificError> for HublinkError.
#[derive(Error, Debug)]
pub enum HublinkError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred while talking to the remote registration hub
    #[error("Remote service error: {service_name} - {message}")]
    RemoteServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a conflict (e.g., registration not yet established)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// A requested device property is unavailable on the current platform
    #[error("Unsupported platform feature: {0}")]
    UnsupportedFeatureError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
///
/// This trait can be implemented by error types to provide a consistent way
/// to convert errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for HublinkError {
    fn status_code(&self) -> u16 {
        match self {
            HublinkError::HttpError(_) => 500,
            HublinkError::ParseError(_) => 400,
            HublinkError::ConfigError(_) => 500,
            HublinkError::AuthError(_) => 401,
            HublinkError::ValidationError(_) => 400,
            HublinkError::RemoteServiceError { .. } => 502,
            HublinkError::NotFoundError(_) => 404,
            HublinkError::ConflictError(_) => 409,
            HublinkError::UnsupportedFeatureError(_) => 501,
            HublinkError::InternalError(_) => 500,
        }
    }
}

// Common error conversions
impl From<reqwest::Error> for HublinkError {
    fn from(err: reqwest::Error) -> Self {
        HublinkError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for HublinkError {
    fn from(err: serde_json::Error) -> Self {
        HublinkError::ParseError(err.to_string())
    }
}

impl From<InvalidTagError> for HublinkError {
    fn from(err: InvalidTagError) -> Self {
        HublinkError::ValidationError(err.to_string())
    }
}

impl From<UnsupportedPlatformFeature> for HublinkError {
    fn from(err: UnsupportedPlatformFeature) -> Self {
        HublinkError::UnsupportedFeatureError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> HublinkError {
    HublinkError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> HublinkError {
    HublinkError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> HublinkError {
    HublinkError::NotFoundError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> HublinkError {
    HublinkError::ConflictError(message.to_string())
}

pub fn remote_service_error<T: fmt::Display>(service_name: &str, message: T) -> HublinkError {
    HublinkError::RemoteServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> HublinkError {
    HublinkError::InternalError(message.to_string())
}
