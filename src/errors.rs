use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Application-specific error types.
///
/// Adapter and per-contact failures are always recovered by the orchestrator;
/// only `Configuration` is fatal, and only at startup.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Upstream throttled us. Carries the hint the upstream gave, if any.
    RateLimited {
        /// Source that reported the throttling.
        source: String,
        /// How long to wait before trying again.
        retry_after: Duration,
    },
    /// Credentials rejected by the upstream.
    Authentication(String),
    /// Generic upstream failure (5xx, malformed body, quota exhausted).
    Provider(String),
    /// An adapter call exceeded its timeout.
    Timeout(String),
    /// Malformed raw input.
    Validation(String),
    /// Missing or invalid settings.
    Configuration(String),
    /// Request body rejected by a handler.
    BadRequest(String),
    Internal(String),
    /// Wraps another error with what was being attempted.
    WithContext {
        source: Box<AppError>,
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.root(), AppError::RateLimited { .. })
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.root(), AppError::Authentication(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), AppError::Timeout(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::RateLimited {
                source,
                retry_after,
            } => write!(
                f,
                "Rate limited by {} (retry after {}s)",
                source,
                retry_after.as_secs()
            ),
            AppError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            AppError::Provider(msg) => write!(f, "Provider error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Upstream failures become 502/504. Internal details never leak.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::RateLimited { .. } => {
                tracing::warn!("{}", self);
                (StatusCode::TOO_MANY_REQUESTS, self.to_string())
            }
            AppError::Authentication(msg) => {
                tracing::warn!("Upstream authentication failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream authentication failed".to_string(),
                )
            }
            AppError::Provider(msg) => {
                tracing::error!("Provider error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::Timeout(msg) => {
                tracing::error!("Timeout: {}", msg);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "External service timed out".to_string(),
                )
            }
            AppError::Validation(msg) | AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Configuration(msg) | AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Provider(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Provider(format!("Malformed payload: {}", err))
    }
}

/// `anyhow::Context`-style wrapping that keeps the error an [`AppError`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Like `context`, but the message is only built on error.
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::Internal(e.to_string()))
            .context(context)
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::Internal(e.to_string()))
            .with_context(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_context_chain() {
        let err: Result<(), AppError> = Err(AppError::Authentication("bad key".into()));
        let err = err
            .context("clearbit lookup")
            .with_context(|| "enriching bob@example.com".to_string())
            .unwrap_err();

        assert!(err.is_authentication());
        assert!(!err.is_rate_limited());
        assert!(!err.is_timeout());
        assert_eq!(
            err.to_string(),
            "enriching bob@example.com: clearbit lookup: Authentication failed: bad key"
        );
    }

    #[test]
    fn test_rate_limited_display() {
        let err = AppError::RateLimited {
            source: "clearbit".into(),
            retry_after: Duration::from_secs(3600),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.to_string(), "Rate limited by clearbit (retry after 3600s)");
    }

    #[test]
    fn test_timeout_survives_context() {
        let err: Result<(), AppError> = Err(AppError::Timeout("pdl request".into()));
        let err = err.context("people data labs lookup").unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_status_mapping() {
        let resp = AppError::BadRequest("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Provider("boom".into())
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let wrapped = AppError::WithContext {
            source: Box::new(AppError::Validation("missing email".into())),
            context: "merge".into(),
        };
        assert_eq!(wrapped.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
