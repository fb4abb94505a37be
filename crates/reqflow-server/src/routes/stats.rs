use axum::extract::{Path, Query, State};
use axum::Json;
use reqflow_core::eta::EtaAlert;
use reqflow_core::stats::{AccountStats, DashboardStats, StatFilter, UserTicketStats};
use reqflow_core::ticket::Ticket;
use reqflow_core::types::{AccountId, Ntid};
use serde::Deserialize;

use super::parse_opt;
use crate::error::AppError;
use crate::identity::Actor;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatTicketsQuery {
    pub filter: Option<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsQuery {
    pub threshold_minutes: Option<u32>,
}

/// GET /api/requests/account-statistics
pub async fn account_statistics(
    State(app): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<Vec<AccountStats>>, AppError> {
    let rows = app.run(move |t| t.account_statistics(&actor)).await?;
    Ok(Json(rows))
}

/// GET /api/requests/stats: counters for the caller's dashboard.
pub async fn dashboard_statistics(
    State(app): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = app.run(move |t| t.dashboard_statistics(&actor)).await?;
    Ok(Json(stats))
}

/// GET /api/requests/user-statistics
pub async fn user_statistics_all(
    State(app): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<Vec<UserTicketStats>>, AppError> {
    let rows = app.run(move |t| t.user_statistics_all(&actor)).await?;
    Ok(Json(rows))
}

/// GET /api/requests/user-statistics-by-account/{accountId}
pub async fn user_statistics(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(account): Path<String>,
) -> Result<Json<Vec<UserTicketStats>>, AppError> {
    let account: AccountId = account.parse()?;
    let rows = app.run(move |t| t.user_statistics(&actor, account)).await?;
    Ok(Json(rows))
}

/// GET /api/requests/user-statistics-by-account/{accountId}/tickets
///
/// Without `filter` every ticket of the account is returned. With `assignee`
/// the user-scoped counter meanings apply.
pub async fn statistic_tickets(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Path(account): Path<String>,
    Query(query): Query<StatTicketsQuery>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let account: AccountId = account.parse()?;
    let filter = parse_opt::<StatFilter>(query.filter.as_deref())?.unwrap_or(StatFilter::Total);
    let assignee = parse_opt::<Ntid>(query.assignee.as_deref())?;
    let tickets = app
        .run(move |t| t.statistic_tickets(&actor, account, assignee.as_ref(), filter))
        .await?;
    Ok(Json(tickets))
}

/// GET /api/requests/eta-alerts
pub async fn eta_alerts(
    State(app): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<EtaAlert>>, AppError> {
    let alerts = app
        .run(move |t| t.eta_alerts(&actor, query.threshold_minutes))
        .await?;
    Ok(Json(alerts))
}
