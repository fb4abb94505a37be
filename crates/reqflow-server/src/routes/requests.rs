use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use reqflow_core::eta::{EtaRevision, TicketTimers};
use reqflow_core::ticket::{NewTicket, Ticket, TicketEdit};
use reqflow_core::tracker::ListFilter;
use reqflow_core::types::{Ntid, TicketStatus};
use serde::Deserialize;

use super::{parse_opt, ticket_id, JsonBody};
use crate::error::AppError;
use crate::identity::Actor;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub request_type: Option<String>,
    pub account_id: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<ListFilter, AppError> {
        Ok(ListFilter {
            status: parse_opt(self.status.as_deref())?,
            priority: parse_opt(self.priority.as_deref())?,
            request_type: parse_opt(self.request_type.as_deref())?,
            account_id: parse_opt(self.account_id.as_deref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    #[serde(alias = "assignedTo")]
    pub assignee: String,
    pub eta: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EtaBody {
    pub eta: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /api/requests: create a ticket owned by the caller.
pub async fn create_request(
    State(app): State<AppState>,
    Actor(actor): Actor,
    JsonBody(body): JsonBody<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let ticket = app.run(move |t| t.create_ticket(&actor, body)).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /api/requests: tickets visible to the caller, newest first.
pub async fn list_requests(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let filter = query.into_filter()?;
    let tickets = app.run(move |t| t.list_tickets(&actor, &filter)).await?;
    Ok(Json(tickets))
}

/// GET /api/requests/{id}
pub async fn get_request(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, AppError> {
    let id = ticket_id(&id)?;
    let ticket = app.run(move |t| t.get_ticket(&actor, id)).await?;
    Ok(Json(ticket))
}

/// PUT /api/requests/{id}: edit title, description, type or priority.
pub async fn edit_request(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(edit): JsonBody<TicketEdit>,
) -> Result<Json<Ticket>, AppError> {
    let id = ticket_id(&id)?;
    let ticket = app.run(move |t| t.edit_ticket(&actor, id, edit)).await?;
    Ok(Json(ticket))
}

/// DELETE /api/requests/{id}: removes the ticket with its comments and ETA history.
pub async fn delete_request(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = ticket_id(&id)?;
    app.run(move |t| t.delete_ticket(&actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/requests/{id}/assign
pub async fn assign_request(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AssignBody>,
) -> Result<Json<Ticket>, AppError> {
    let id = ticket_id(&id)?;
    let assignee = Ntid::new(&body.assignee)?;
    let ticket = app
        .run(move |t| t.assign_ticket(&actor, id, &assignee, body.eta))
        .await?;
    Ok(Json(ticket))
}

/// PUT /api/requests/{id}/status
pub async fn update_status(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Ticket>, AppError> {
    let id = ticket_id(&id)?;
    let status: TicketStatus = body.status.parse()?;
    let ticket = app
        .run(move |t| t.update_status(&actor, id, status, body.comment.as_deref()))
        .await?;
    Ok(Json(ticket))
}

/// PUT /api/requests/{id}/eta: revise the ETA; always records a history
/// entry and a comment.
pub async fn update_eta(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<EtaBody>,
) -> Result<Json<Ticket>, AppError> {
    let id = ticket_id(&id)?;
    let ticket = app
        .run(move |t| {
            t.update_eta(&actor, id, body.eta, &body.reason, body.comment.as_deref())
        })
        .await?;
    Ok(Json(ticket))
}

/// GET /api/requests/{id}/eta-history
pub async fn eta_history(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Vec<EtaRevision>>, AppError> {
    let id = ticket_id(&id)?;
    let revisions = app.run(move |t| t.list_eta_revisions(&actor, id)).await?;
    Ok(Json(revisions))
}

/// GET /api/requests/{id}/timers
pub async fn timers(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<TicketTimers>, AppError> {
    let id = ticket_id(&id)?;
    let timers = app.run(move |t| t.timers(&actor, id)).await?;
    Ok(Json(timers))
}
