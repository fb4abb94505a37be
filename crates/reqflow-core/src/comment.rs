use crate::error::{Result, TrackerError};
use crate::types::{Ntid, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_BODY_LEN: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_eta: Option<DateTime<Utc>>,
    pub new_eta: DateTime<Utc>,
    pub reason: String,
}

/// An entry in a ticket's append-only thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: TicketId,
    pub author: Ntid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_change: Option<EtaChange>,
}

impl Comment {
    pub fn new_remark(
        ticket_id: TicketId,
        author: Ntid,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            ticket_id,
            author,
            body: validate_body(body)?,
            created_at: now,
            eta_change: None,
        })
    }

    pub fn new_eta_change(
        ticket_id: TicketId,
        author: Ntid,
        body: &str,
        change: EtaChange,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if change.reason.trim().is_empty() {
            return Err(TrackerError::validation("eta change reason must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            ticket_id,
            author,
            body: validate_body(body)?,
            created_at: now,
            eta_change: Some(EtaChange {
                reason: change.reason.trim().to_string(),
                ..change
            }),
        })
    }

    pub fn is_eta_change(&self) -> bool {
        self.eta_change.is_some()
    }
}

fn validate_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TrackerError::validation("comment text must not be empty"));
    }
    if body.len() > MAX_BODY_LEN {
        return Err(TrackerError::validation(format!(
            "comment is longer than {MAX_BODY_LEN} bytes"
        )));
    }
    Ok(body.to_string())
}
