use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors raised by the CallRail client.
#[derive(Debug, Clone, PartialEq)]
pub enum CallRailError {
    /// Missing or invalid client settings (API key, account id, base URL).
    Configuration(String),
    /// CallRail answered with a non-2xx status.
    Api {
        /// HTTP status returned by CallRail.
        status: u16,
        /// The vendor's `message` field, or the status text when absent.
        message: String,
    },
    /// Transport-level failure (DNS, connect, timeout, reset).
    Network(String),
    /// The response body did not match the expected shape.
    Decode(String),
    /// A call or tracker id that cannot name a single resource.
    InvalidId(String),
}

impl fmt::Display for CallRailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallRailError::Configuration(msg) => write!(f, "CallRail configuration error: {}", msg),
            CallRailError::Api { message, .. } => write!(f, "CallRail API Error: {}", message),
            CallRailError::Network(msg) => write!(f, "CallRail request failed: {}", msg),
            CallRailError::Decode(msg) => {
                write!(f, "Failed to parse CallRail response: {}", msg)
            }
            CallRailError::InvalidId(id) => write!(f, "Invalid CallRail resource id: '{}'", id),
        }
    }
}

impl std::error::Error for CallRailError {}

impl CallRailError {
    /// HTTP status reported by CallRail, if this is an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CallRailError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Application-specific error types for the reporting service.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Error interacting with CallRail.
    ExternalApiError(String),
    /// CallRail refused the request because the account is over its quota.
    RateLimited(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Upstream and internal failures are logged here and reported to the
    /// caller with a generic message.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::RateLimited(msg) => {
                tracing::warn!("CallRail rate limit hit: {}", msg);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate limit exceeded, try again later".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.as_ref().clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CallRailError> for AppError {
    fn from(err: CallRailError) -> Self {
        match err {
            CallRailError::Api { status: 404, message } => AppError::NotFound(message),
            CallRailError::Api { status: 429, message } => AppError::RateLimited(message),
            CallRailError::Configuration(msg) => AppError::InternalError(msg),
            err @ CallRailError::InvalidId(_) => AppError::BadRequest(err.to_string()),
            other => AppError::ExternalApiError(other.to_string()),
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_uses_vendor_message() {
        let err = CallRailError::Api {
            status: 404,
            message: "Call not found".to_string(),
        };
        assert_eq!(err.to_string(), "CallRail API Error: Call not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_vendor_status_maps_to_app_error() {
        let not_found: AppError = CallRailError::Api {
            status: 404,
            message: "Call not found".to_string(),
        }
        .into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let limited: AppError = CallRailError::Api {
            status: 429,
            message: "Too Many Requests".to_string(),
        }
        .into();
        assert!(matches!(limited, AppError::RateLimited(_)));

        let network: AppError = CallRailError::Network("connection reset".to_string()).into();
        assert!(matches!(network, AppError::ExternalApiError(_)));

        let bad_id: AppError = CallRailError::InvalidId("../../OTHER/calls".to_string()).into();
        assert!(matches!(bad_id, AppError::BadRequest(_)));
        assert_eq!(bad_id.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_context_wraps_source() {
        let result: Result<(), CallRailError> =
            Err(CallRailError::Network("timed out".to_string()));
        let err = result.context("Fetching source report").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fetching source report: External API error: CallRail request failed: timed out"
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
