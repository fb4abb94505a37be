//! ETA audit trail and ETA timers.

use crate::comment::{Comment, EtaChange};
use crate::error::{Result, TrackerError};
use crate::ticket::Ticket;
use crate::types::{AccountId, Ntid, TicketId, TicketStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one ETA change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaRevision {
    pub id: Uuid,
    pub ticket_id: TicketId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_eta: Option<DateTime<Utc>>,
    pub new_eta: DateTime<Utc>,
    pub reason: String,
    pub revised_by: Ntid,
    pub revised_at: DateTime<Utc>,
    pub comment_id: Uuid,
}

fn fmt_eta(eta: DateTime<Utc>) -> String {
    eta.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn default_eta_comment(
    previous: Option<DateTime<Utc>>,
    new_eta: DateTime<Utc>,
    reason: &str,
) -> String {
    match previous {
        Some(prev) => format!(
            "ETA changed from {} to {}. Reason: {reason}",
            fmt_eta(prev),
            fmt_eta(new_eta)
        ),
        None => format!("ETA set to {}. Reason: {reason}", fmt_eta(new_eta)),
    }
}

/// Moves `ticket.eta` to `new_eta` and returns the audit entry together with
/// the ETA-change comment it links to. Both must be committed with the ticket.
pub fn revise_eta(
    ticket: &mut Ticket,
    revised_by: &Ntid,
    new_eta: DateTime<Utc>,
    reason: &str,
    comment_text: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(EtaRevision, Comment)> {
    let invalid = |reason: &str| TrackerError::InvalidTransition {
        from: ticket.status.to_string(),
        to: "eta revision".to_string(),
        reason: reason.to_string(),
    };
    if ticket.status == TicketStatus::Open {
        return Err(invalid("ticket must be assigned before its eta can change"));
    }
    if ticket.status.is_terminal() {
        return Err(invalid("ticket is closed"));
    }

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(TrackerError::validation("a reason is required to change the eta"));
    }
    if new_eta < ticket.created_at {
        return Err(TrackerError::validation(
            "eta cannot be earlier than the ticket's creation time",
        ));
    }
    if ticket.eta == Some(new_eta) {
        return Err(TrackerError::validation("new eta equals the current eta"));
    }

    let previous = ticket.eta;
    let body = match comment_text.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => text.to_string(),
        None => default_eta_comment(previous, new_eta, reason),
    };
    let comment = Comment::new_eta_change(
        ticket.id,
        revised_by.clone(),
        &body,
        EtaChange {
            previous_eta: previous,
            new_eta,
            reason: reason.to_string(),
        },
        now,
    )?;
    let revision = EtaRevision {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        previous_eta: previous,
        new_eta,
        reason: reason.to_string(),
        revised_by: revised_by.clone(),
        revised_at: now,
        comment_id: comment.id,
    };

    ticket.eta = Some(new_eta);
    ticket.updated_at = now;
    Ok((revision, comment))
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Time spent waiting for an assignee. Still running while the ticket is OPEN.
pub fn time_in_open_queue(ticket: &Ticket, now: DateTime<Utc>) -> Duration {
    ticket.assigned_at.unwrap_or(now) - ticket.created_at
}

/// Time since assignment, frozen at the last update once the ticket closes.
pub fn time_in_developer_queue(ticket: &Ticket, now: DateTime<Utc>) -> Option<Duration> {
    let assigned_at = ticket.assigned_at?;
    let end = if ticket.status.is_terminal() {
        ticket.updated_at
    } else {
        now
    };
    Some(end - assigned_at)
}

/// Negative once the ETA has passed.
pub fn time_until_eta(ticket: &Ticket, now: DateTime<Utc>) -> Option<Duration> {
    ticket.eta.map(|eta| eta - now)
}

pub fn is_eta_approaching(ticket: &Ticket, now: DateTime<Utc>, threshold_minutes: u32) -> bool {
    if ticket.status.is_terminal() {
        return false;
    }
    match time_until_eta(ticket, now) {
        Some(left) => {
            let minutes = left.num_minutes();
            minutes > 0 && minutes <= i64::from(threshold_minutes)
        }
        None => false,
    }
}

pub fn is_eta_exceeded(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    !ticket.status.is_terminal() && ticket.eta.is_some_and(|eta| eta < now)
}

/// Snapshot of every timer for one ticket, in whole minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketTimers {
    pub ticket_id: TicketId,
    pub open_queue_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_queue_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_until_eta: Option<i64>,
    pub eta_approaching: bool,
    pub eta_exceeded: bool,
}

impl TicketTimers {
    pub fn compute(ticket: &Ticket, now: DateTime<Utc>, threshold_minutes: u32) -> Self {
        Self {
            ticket_id: ticket.id,
            open_queue_minutes: time_in_open_queue(ticket, now).num_minutes(),
            developer_queue_minutes: time_in_developer_queue(ticket, now).map(|d| d.num_minutes()),
            minutes_until_eta: time_until_eta(ticket, now).map(|d| d.num_minutes()),
            eta_approaching: is_eta_approaching(ticket, now, threshold_minutes),
            eta_exceeded: is_eta_exceeded(ticket, now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Approaching,
    Exceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaAlert {
    pub ticket_id: TicketId,
    pub title: String,
    pub account_id: AccountId,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Ntid>,
    pub eta: DateTime<Utc>,
    pub minutes_until_eta: i64,
    pub kind: AlertKind,
}

/// Open work that is close to or past its ETA, soonest deadline first.
pub fn eta_alerts<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
    now: DateTime<Utc>,
    threshold_minutes: u32,
) -> Vec<EtaAlert> {
    let mut alerts: Vec<EtaAlert> = tickets
        .into_iter()
        .filter_map(|t| {
            let eta = t.eta?;
            let kind = if is_eta_exceeded(t, now) {
                AlertKind::Exceeded
            } else if is_eta_approaching(t, now, threshold_minutes) {
                AlertKind::Approaching
            } else {
                return None;
            };
            Some(EtaAlert {
                ticket_id: t.id,
                title: t.title.clone(),
                account_id: t.account_id,
                status: t.status,
                assigned_to: t.assigned_to.clone(),
                eta,
                minutes_until_eta: (eta - now).num_minutes(),
                kind,
            })
        })
        .collect();
    alerts.sort_by_key(|a| (a.eta, a.ticket_id));
    alerts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
