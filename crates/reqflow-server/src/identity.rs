use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use reqflow_core::directory::ActorContext;
use reqflow_core::types::Ntid;
use reqflow_core::TrackerError;

use crate::error::AppError;
use crate::state::AppState;

pub const NTID_HEADER: &str = "X-User-NTID";

/// The caller, resolved from the `X-User-NTID` header against the directory.
///
/// The header is trusted as-is; authentication happens upstream.
pub struct Actor(pub ActorContext);

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(NTID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::unauthenticated(format!("missing {NTID_HEADER} header")))?;

        let ntid = Ntid::new(raw)
            .map_err(|_| AppError::unauthenticated(format!("invalid {NTID_HEADER} header")))?;

        match state.tracker.actor(&ntid) {
            Ok(actor) => Ok(Actor(actor)),
            Err(TrackerError::UserNotFound(_)) => Err(AppError::unauthenticated(format!(
                "unknown user '{ntid}'"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
