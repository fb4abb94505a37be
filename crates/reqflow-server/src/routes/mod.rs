pub mod comments;
pub mod health;
pub mod requests;
pub mod stats;

use axum::extract::{FromRequest, Request};
use axum::Json;
use reqflow_core::types::TicketId;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `Json<T>` whose rejection is reported in the API's own error body.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
        }
    }
}

pub(crate) fn ticket_id(raw: &str) -> Result<TicketId, AppError> {
    Ok(raw.parse::<TicketId>()?)
}

/// Parse an optional query value with the type's `FromStr`.
pub(crate) fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = reqflow_core::TrackerError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<T>)
        .transpose()
        .map_err(AppError::from)
}
