//! Error mapping for provider failures
//!
//! This module classifies provider-specific failure signals (error codes,
//! HTTP statuses, transport errors) into a small set of failure kinds and
//! translates terminal failures into [`DomainError`]s.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use super::{DomainError, ErrorKind};
use crate::util::{ceil_secs, sanitize_for_logging, truncate_string};

/// Longest provider message kept in error details
const MAX_PROVIDER_MESSAGE_LEN: usize = 512;

/// Retry-after reported for throttling failures without a provider hint
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection refused, reset or DNS failure
    Connection,
    /// The provider's own request timeout elapsed
    Timeout,
    /// Throttling or provisioned capacity exceeded
    Throttling,
    /// Provider-side fault (5xx)
    ServiceFault,
    /// Generic client error without a more specific classification
    Client,
    /// Table, object, parameter or stream does not exist
    NotFound,
    /// Caller lacks permission
    AccessDenied,
    /// Credentials missing, invalid or expired
    Authentication,
    /// Request rejected as malformed
    Validation,
}

impl FailureKind {
    /// Kinds that may succeed if the call is repeated
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Connection
                | FailureKind::Timeout
                | FailureKind::Throttling
                | FailureKind::ServiceFault
                | FailureKind::Client
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::Throttling => "throttling",
            FailureKind::ServiceFault => "service_fault",
            FailureKind::Client => "client",
            FailureKind::NotFound => "not_found",
            FailureKind::AccessDenied => "access_denied",
            FailureKind::Authentication => "authentication",
            FailureKind::Validation => "validation",
        };
        f.write_str(name)
    }
}

/// A failure reported by a remote service or its transport
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} failure: {message}")]
pub struct ProviderError {
    kind: FailureKind,
    code: Option<String>,
    message: String,
    retry_after: Option<Duration>,
}

impl ProviderError {
    /// Create a provider error with an explicit classification
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a provider error from a provider error code
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            kind: classify_code(&code),
            code: Some(code),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a provider error from an HTTP status and response body
    ///
    /// A JSON body carrying a `code` (or `__type`) field is classified by that
    /// code; otherwise the status decides.
    pub fn from_status(status: u16, body: &str) -> Self {
        if let Ok(json) = serde_json::from_str::<Value>(body) {
            let code = json
                .get("code")
                .or_else(|| json.get("__type"))
                .and_then(|c| c.as_str());
            let message = json
                .get("message")
                .or_else(|| json.get("error"))
                .and_then(|m| m.as_str())
                .unwrap_or(body);

            if let Some(code) = code {
                let mut err = Self::from_code(code, format!("HTTP {}: {}", status, message));
                // An unknown code falls back to the status
                if err.kind == FailureKind::Client {
                    err.kind = classify_status(status);
                }
                return err;
            }

            return Self::new(classify_status(status), format!("HTTP {}: {}", status, message));
        }

        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate_string(body, 100))
        };

        Self::new(classify_status(status), message)
    }

    /// Shorthand for a connection failure
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, message)
    }

    /// Shorthand for a throttling failure
    pub fn throttling(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Throttling, message)
    }

    /// Shorthand for a not found failure
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NotFound,
            code: Some(code.into()),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a provider error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a provider retry-after hint
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FailureKind::NotFound
    }

    /// Provider message with credential-looking substrings removed
    pub fn redacted_message(&self) -> String {
        truncate_string(&sanitize_for_logging(&self.message), MAX_PROVIDER_MESSAGE_LEN)
    }
}

/// Classify a provider error code
pub fn classify_code(code: &str) -> FailureKind {
    match code {
        "ResourceNotFoundException"
        | "NoSuchKey"
        | "NoSuchBucket"
        | "NotFound"
        | "NotFoundException"
        | "ParameterNotFound"
        | "ParameterVersionNotFound" => FailureKind::NotFound,

        "ThrottlingException"
        | "Throttling"
        | "ThrottledException"
        | "ProvisionedThroughputExceededException"
        | "RequestLimitExceeded"
        | "TooManyRequestsException"
        | "LimitExceededException"
        | "SlowDown" => FailureKind::Throttling,

        "AccessDenied" | "AccessDeniedException" | "Forbidden" => FailureKind::AccessDenied,

        "UnrecognizedClientException"
        | "InvalidClientTokenId"
        | "ExpiredToken"
        | "ExpiredTokenException"
        | "InvalidSignatureException"
        | "MissingAuthenticationToken" => FailureKind::Authentication,

        "ValidationException"
        | "InvalidParameterException"
        | "InvalidParameterValue"
        | "InvalidArgument"
        | "SerializationException" => FailureKind::Validation,

        "InternalServerError"
        | "InternalFailure"
        | "InternalError"
        | "ServiceUnavailable"
        | "ServiceUnavailableException" => FailureKind::ServiceFault,

        "RequestTimeout" | "RequestTimeoutException" => FailureKind::Timeout,

        _ => FailureKind::Client,
    }
}

/// Classify an HTTP status code
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        400 => FailureKind::Validation,
        401 => FailureKind::Authentication,
        403 => FailureKind::AccessDenied,
        404 => FailureKind::NotFound,
        408 => FailureKind::Timeout,
        429 => FailureKind::Throttling,
        500..=599 => FailureKind::ServiceFault,
        _ => FailureKind::Client,
    }
}

/// How unmatched provider failures are reported at a call site
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// Generic internal error
    Internal(String),
    /// Storage error with an operation-specific message
    Storage(String),
    /// The named service is unavailable
    ServiceUnavailable { service: String, message: String },
}

impl Fallback {
    pub fn internal(message: impl Into<String>) -> Self {
        Fallback::Internal(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Fallback::Storage(message.into())
    }

    pub fn service_unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Fallback::ServiceUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    fn to_error(&self) -> DomainError {
        match self {
            Fallback::Internal(message) => DomainError::internal(message.clone(), None),
            Fallback::Storage(message) => DomainError::storage(message.clone(), None),
            Fallback::ServiceUnavailable { service, message } => {
                DomainError::service_unavailable(service, Some(message))
            }
        }
    }

    /// The domain kind unmatched failures become
    pub fn kind(&self) -> ErrorKind {
        match self {
            Fallback::Internal(_) => ErrorKind::Internal,
            Fallback::Storage(_) => ErrorKind::StorageError,
            Fallback::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
        }
    }
}

/// Translate a terminal provider failure into a domain error
///
/// Total over [`FailureKind`]: not found, permission, credential, validation
/// and throttling failures have fixed kinds; everything else takes the call
/// site's fallback. Provider context is appended to the details.
pub fn translate(
    error: &ProviderError,
    resource_type: &str,
    resource_id: &str,
    fallback: &Fallback,
) -> DomainError {
    let domain = match error.kind {
        FailureKind::NotFound => DomainError::resource_not_found(resource_type, resource_id),
        FailureKind::AccessDenied => DomainError::authorization(None),
        FailureKind::Authentication => DomainError::authentication(None),
        FailureKind::Validation => DomainError::validation(
            format!("Invalid request for {} {}", resource_type, resource_id),
            None,
        ),
        FailureKind::Throttling => {
            let retry_after = error
                .retry_after
                .map(|d| ceil_secs(d).max(1))
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            DomainError::rate_limited(retry_after)
        }
        FailureKind::Connection
        | FailureKind::Timeout
        | FailureKind::ServiceFault
        | FailureKind::Client => fallback.to_error(),
    };

    let domain = domain
        .with_detail("provider_message", error.redacted_message())
        .with_detail("failure", error.kind.to_string());

    match error.code() {
        Some(code) => domain.with_detail("provider_code", code),
        None => domain,
    }
}

/// Convert reqwest errors to ProviderError
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProviderError::new(classify_status(status.as_u16()), err.to_string());
        }

        if err.is_timeout() {
            ProviderError::new(FailureKind::Timeout, format!("Request timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            ProviderError::connection(format!("Connection error: {}", err))
        } else if err.is_decode() {
            ProviderError::new(
                FailureKind::ServiceFault,
                format!("Response decode error: {}", err),
            )
        } else {
            ProviderError::new(FailureKind::Client, format!("HTTP client error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_code() {
        assert_eq!(classify_code("ResourceNotFoundException"), FailureKind::NotFound);
        assert_eq!(classify_code("NoSuchKey"), FailureKind::NotFound);
        assert_eq!(
            classify_code("ProvisionedThroughputExceededException"),
            FailureKind::Throttling
        );
        assert_eq!(classify_code("AccessDeniedException"), FailureKind::AccessDenied);
        assert_eq!(classify_code("SomethingNew"), FailureKind::Client);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(404), FailureKind::NotFound);
        assert_eq!(classify_status(429), FailureKind::Throttling);
        assert_eq!(classify_status(503), FailureKind::ServiceFault);
        assert_eq!(classify_status(418), FailureKind::Client);
    }

    #[test]
    fn test_from_status_prefers_body_code() {
        let err = ProviderError::from_status(
            400,
            r#"{"code": "ThrottlingException", "message": "Rate exceeded"}"#,
        );
        assert_eq!(err.kind(), FailureKind::Throttling);
        assert_eq!(err.code(), Some("ThrottlingException"));
        assert!(err.message().contains("Rate exceeded"));

        let err = ProviderError::from_status(404, r#"{"code": "Whatever"}"#);
        assert_eq!(err.kind(), FailureKind::NotFound);

        let err = ProviderError::from_status(503, r#"{"code": "Overloaded", "message": "busy"}"#);
        assert_eq!(err.kind(), FailureKind::ServiceFault);
        assert_eq!(err.code(), Some("Overloaded"));

        let err = ProviderError::from_status(418, r#"{"code": "Teapot"}"#);
        assert_eq!(err.kind(), FailureKind::Client);

        let err = ProviderError::from_status(502, "");
        assert_eq!(err.kind(), FailureKind::ServiceFault);
        assert_eq!(err.message(), "HTTP 502");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(FailureKind::Connection.is_transient());
        assert!(FailureKind::Client.is_transient());
        assert!(!FailureKind::NotFound.is_transient());
        assert!(!FailureKind::Validation.is_transient());
    }
}
