use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqflow_core::{ErrorKind, TrackerError};

// ---------------------------------------------------------------------------
// Internal sentinel for 401 Unauthorized
// ---------------------------------------------------------------------------

/// Carries "no usable identity on the request" through the `anyhow::Error`
/// chain. The core never sees such requests.
#[derive(Debug)]
struct Unauthenticated(String);

impl std::fmt::Display for Unauthenticated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Unauthenticated {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Every body is
/// `{"error": <message>, "kind": <kind>}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self(Unauthenticated(msg.into()).into())
    }

    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(TrackerError::Validation(msg.into()).into())
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(u) = self.0.downcast_ref::<Unauthenticated>() {
            let body = serde_json::json!({
                "error": u.0.clone(),
                "kind": ErrorKind::Authorization,
            });
            return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
        }

        let kind = self
            .0
            .downcast_ref::<TrackerError>()
            .map(TrackerError::kind)
            .unwrap_or(ErrorKind::Internal);
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!("{:#}", self.0);
        }

        let body = serde_json::json!({ "error": self.0.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
