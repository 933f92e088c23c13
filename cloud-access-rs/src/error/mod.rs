//! Error handling for the access layer
//!
//! This module provides the domain error taxonomy that:
//! - Binds every error kind to one stable code and one HTTP-style status
//! - Carries structured details suitable for surfacing at an API boundary
//! - Serializes to the `{"error": {code, message, details}}` envelope
//! - Provides convenient Result type alias

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::ConfigError;

pub mod mapping;
pub use mapping::{Fallback, FailureKind, ProviderError};

/// Result type for access layer operations
pub type Result<T> = std::result::Result<T, DomainError>;

/// Structured error details keyed by identifier name
pub type Details = Map<String, Value>;

/// Fixed enumeration of domain error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Client errors (4xx)
    InvalidRequest,
    AuthenticationFailed,
    AuthorizationFailed,
    ResourceNotFound,
    RateLimited,
    InvalidAudioFormat,
    SessionNotFound,
    VoiceProfileNotFound,

    // Server errors (5xx)
    Internal,
    ServiceUnavailable,
    TranscriptionFailed,
    TranslationFailed,
    VoiceCloningFailed,
    StorageError,
    ExternalServiceError,
}

impl ErrorKind {
    /// Every kind, client errors first
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::InvalidRequest,
        ErrorKind::AuthenticationFailed,
        ErrorKind::AuthorizationFailed,
        ErrorKind::ResourceNotFound,
        ErrorKind::RateLimited,
        ErrorKind::InvalidAudioFormat,
        ErrorKind::SessionNotFound,
        ErrorKind::VoiceProfileNotFound,
        ErrorKind::Internal,
        ErrorKind::ServiceUnavailable,
        ErrorKind::TranscriptionFailed,
        ErrorKind::TranslationFailed,
        ErrorKind::VoiceCloningFailed,
        ErrorKind::StorageError,
        ErrorKind::ExternalServiceError,
    ];

    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorKind::AuthorizationFailed => "AUTHORIZATION_FAILED",
            ErrorKind::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorKind::RateLimited => "RATE_LIMIT_EXCEEDED",
            ErrorKind::InvalidAudioFormat => "INVALID_AUDIO_FORMAT",
            ErrorKind::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorKind::VoiceProfileNotFound => "VOICE_PROFILE_NOT_FOUND",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::TranscriptionFailed => "TRANSCRIPTION_FAILED",
            ErrorKind::TranslationFailed => "TRANSLATION_FAILED",
            ErrorKind::VoiceCloningFailed => "VOICE_CLONING_FAILED",
            ErrorKind::StorageError => "STORAGE_ERROR",
            ErrorKind::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// HTTP-style status bound to this kind
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidRequest | ErrorKind::InvalidAudioFormat => 400,
            ErrorKind::AuthenticationFailed => 401,
            ErrorKind::AuthorizationFailed => 403,
            ErrorKind::ResourceNotFound
            | ErrorKind::SessionNotFound
            | ErrorKind::VoiceProfileNotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::Internal
            | ErrorKind::TranscriptionFailed
            | ErrorKind::TranslationFailed
            | ErrorKind::VoiceCloningFailed
            | ErrorKind::StorageError => 500,
            ErrorKind::ExternalServiceError => 502,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(self) -> bool {
        self.http_status() < 500
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Main error type for the access layer
///
/// Immutable once constructed: the builder-style `with_detail` consumes the
/// value and returns a new one.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    details: Details,
}

impl DomainError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>, details: Option<Details>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: details.unwrap_or_default(),
        }
    }

    /// Create a request validation error
    pub fn validation(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message, details)
    }

    /// Create an authentication error
    pub fn authentication(message: Option<&str>) -> Self {
        Self::new(
            ErrorKind::AuthenticationFailed,
            message.unwrap_or("Authentication failed"),
            None,
        )
    }

    /// Create an authorization error
    pub fn authorization(message: Option<&str>) -> Self {
        Self::new(
            ErrorKind::AuthorizationFailed,
            message.unwrap_or("Insufficient permissions"),
            None,
        )
    }

    /// Create a not found error for a typed resource
    pub fn resource_not_found(resource_type: &str, resource_id: &str) -> Self {
        let mut details = Details::new();
        details.insert("resource_type".to_string(), json!(resource_type));
        details.insert("resource_id".to_string(), json!(resource_id));

        Self::new(
            ErrorKind::ResourceNotFound,
            format!("{} not found: {}", resource_type, resource_id),
            Some(details),
        )
    }

    /// Create a rate limit error; `retry_after` is in seconds
    pub fn rate_limited(retry_after: u64) -> Self {
        let mut details = Details::new();
        details.insert("retry_after".to_string(), json!(retry_after));

        Self::new(ErrorKind::RateLimited, "Rate limit exceeded", Some(details))
    }

    /// Create a service unavailable error
    pub fn service_unavailable(service: &str, message: Option<&str>) -> Self {
        let mut details = Details::new();
        details.insert("service".to_string(), json!(service));

        Self::new(
            ErrorKind::ServiceUnavailable,
            message.unwrap_or("Service temporarily unavailable"),
            Some(details),
        )
    }

    /// Create a transcription error
    pub fn transcription(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::TranscriptionFailed, message, details)
    }

    /// Create a translation error
    pub fn translation(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::TranslationFailed, message, details)
    }

    /// Create a voice cloning or synthesis error
    pub fn voice_cloning(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::VoiceCloningFailed, message, details)
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::StorageError, message, details)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::Internal, message, details)
    }

    /// Create an external service error
    pub fn external_service(message: impl Into<String>, details: Option<Details>) -> Self {
        Self::new(ErrorKind::ExternalServiceError, message, details)
    }

    /// Add a single detail and return the new error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    /// Look up one detail value
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// The wire envelope consumed by API-layer collaborators
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::from(self)
    }

    /// Convert the error to the `{"error": {code, message, details}}` shape
    pub fn to_dict(&self) -> Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.message,
                "details": Value::Object(self.details.clone()),
            }
        })
    }
}

/// Serialized error body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Details,
}

impl From<&DomainError> for ErrorEnvelope {
    fn from(err: &DomainError) -> Self {
        Self {
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
            },
        }
    }
}

/// Configuration failures surface as internal errors
impl From<ConfigError> for DomainError {
    fn from(err: ConfigError) -> Self {
        DomainError::internal(format!("Configuration error: {}", err), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_distinct_code() {
        let mut codes: Vec<&str> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_client_and_server_classes() {
        assert!(ErrorKind::RateLimited.is_client_error());
        assert!(ErrorKind::ResourceNotFound.is_client_error());
        assert!(!ErrorKind::StorageError.is_client_error());
        assert!(!ErrorKind::ServiceUnavailable.is_client_error());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let value = serde_json::to_value(ErrorKind::VoiceCloningFailed).unwrap();
        assert_eq!(value, json!("voice_cloning_failed"));
    }
}
