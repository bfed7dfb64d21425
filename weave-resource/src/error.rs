//! Error taxonomy shared by all provider resources

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors surfaced by provider resources.
///
/// Providers map their native failures onto this taxonomy so the runtime can
/// treat equivalent conditions uniformly (e.g. `NotFound` on delete is an
/// idempotent no-op). There is no local recovery: every variant propagates to
/// the invoking runtime.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Config failed validation before any call was made
    #[error("invalid config: {0}")]
    Validation(String),

    /// An immutable field changed between configs
    #[error("cannot change `{0}`; delete and recreate the resource")]
    Immutable(&'static str),

    /// A `$ref` placeholder reached a resource without being resolved
    #[error("unresolved reference `{0}`; the runtime resolves references before invocation")]
    UnresolvedReference(String),

    /// A dependency handle was used before the runtime resolved it
    #[error("dependency `{0}` has not been resolved")]
    UnresolvedDependency(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Authenticated but not allowed
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Remote resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote resource already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Provider returned an error that has no closer mapping
    #[error("provider error {code}: {message}")]
    Api { code: String, message: String },

    /// Network or connection error
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// A polled remote operation did not settle in time
    #[error("timed out waiting for {what} after {secs} seconds")]
    WaitTimeout { what: String, secs: u64 },

    /// Remote resource entered a state the operation cannot proceed from
    #[error("unexpected remote state: {0}")]
    State(String),

    /// Response could not be parsed
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Service temporarily unavailable
    #[error("service temporarily unavailable: {0}")]
    Unavailable(String),
}

impl ResourceError {
    /// Generic status-code mapping used by provider clients after
    /// provider-specific error bodies failed to parse.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            body.to_string()
        };

        match status {
            StatusCode::UNAUTHORIZED => ResourceError::Authentication(message),
            StatusCode::FORBIDDEN => ResourceError::PermissionDenied(message),
            StatusCode::NOT_FOUND => ResourceError::NotFound(message),
            StatusCode::CONFLICT => ResourceError::AlreadyExists(message),
            StatusCode::TOO_MANY_REQUESTS => ResourceError::RateLimit {
                message,
                retry_after_secs: None,
            },
            StatusCode::BAD_REQUEST => ResourceError::Validation(message),
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => ResourceError::Unavailable(message),
            _ => ResourceError::Api {
                code: status.to_string(),
                message,
            },
        }
    }

    /// True for conditions that idempotent delete paths swallow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound(_))
    }

    /// True for conditions that idempotent create paths swallow.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ResourceError::AlreadyExists(_))
    }
}

impl From<reqwest::Error> for ResourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ResourceError::Timeout(30)
        } else if err.is_connect() {
            ResourceError::Network(format!("connection failed: {}", err))
        } else if err.is_status() {
            match err.status() {
                Some(status) => ResourceError::from_status(status, &err.to_string()),
                None => ResourceError::Network(err.to_string()),
            }
        } else if err.is_decode() {
            ResourceError::Parse(err.to_string())
        } else {
            ResourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        ResourceError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_common_codes() {
        assert!(matches!(
            ResourceError::from_status(StatusCode::UNAUTHORIZED, "bad key"),
            ResourceError::Authentication(_)
        ));
        assert!(matches!(
            ResourceError::from_status(StatusCode::NOT_FOUND, ""),
            ResourceError::NotFound(_)
        ));
        assert!(matches!(
            ResourceError::from_status(StatusCode::CONFLICT, "exists"),
            ResourceError::AlreadyExists(_)
        ));
        assert!(matches!(
            ResourceError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ResourceError::RateLimit { .. }
        ));
        assert!(matches!(
            ResourceError::from_status(StatusCode::BAD_GATEWAY, ""),
            ResourceError::Unavailable(_)
        ));
    }

    #[test]
    fn idempotency_predicates() {
        assert!(ResourceError::NotFound("x".into()).is_not_found());
        assert!(!ResourceError::NotFound("x".into()).is_already_exists());
        assert!(ResourceError::AlreadyExists("x".into()).is_already_exists());
    }
}
