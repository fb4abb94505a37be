use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use reqflow_core::comment::Comment;
use serde::Deserialize;

use super::{ticket_id, JsonBody};
use crate::error::AppError;
use crate::identity::Actor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddCommentBody {
    #[serde(alias = "body")]
    pub text: String,
}

/// GET /api/requests/{id}/comments: the thread in insertion order.
pub async fn list_comments(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let id = ticket_id(&id)?;
    let comments = app.run(move |t| t.list_comments(&actor, id)).await?;
    Ok(Json(comments))
}

/// POST /api/requests/{id}/comments
pub async fn add_comment(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AddCommentBody>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let id = ticket_id(&id)?;
    let comment = app.run(move |t| t.add_comment(&actor, id, &body.text)).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
