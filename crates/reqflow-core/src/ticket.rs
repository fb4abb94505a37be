use crate::error::{Result, TrackerError};
use crate::types::{AccountId, Ntid, Priority, RequestType, TicketId, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_TITLE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub request_type: RequestType,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_by: Ntid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Ntid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<Ntid>,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, bumped by the store on every commit.
    #[serde(default)]
    pub version: u64,
}

impl Ticket {
    /// A fresh OPEN ticket. The store assigns `id` and `version` on insert.
    pub fn new(input: NewTicket, created_by: Ntid, now: DateTime<Utc>) -> Result<Self> {
        let input = input.normalized()?;
        Ok(Self {
            id: TicketId(0),
            title: input.title,
            description: input.description,
            request_type: input.request_type,
            priority: input.priority,
            status: TicketStatus::Open,
            created_by,
            assigned_to: None,
            assigned_by: None,
            account_id: input.account_id,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            eta: None,
            version: 0,
        })
    }

    pub fn is_assignee(&self, ntid: &Ntid) -> bool {
        self.assigned_to.as_ref() == Some(ntid)
    }

    pub fn is_creator(&self, ntid: &Ntid) -> bool {
        &self.created_by == ntid
    }
}

// ---------------------------------------------------------------------------
// NewTicket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub request_type: RequestType,
    pub priority: Priority,
    pub account_id: AccountId,
}

impl NewTicket {
    fn normalized(self) -> Result<Self> {
        Ok(Self {
            title: validate_title(&self.title)?,
            description: normalize_description(self.description),
            ..self
        })
    }
}

// ---------------------------------------------------------------------------
// TicketEdit
// ---------------------------------------------------------------------------

/// Field-level edit of a ticket's descriptive data. `None` leaves a field
/// untouched; an empty description clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub request_type: Option<RequestType>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl TicketEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.request_type.is_none()
            && self.priority.is_none()
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TrackerError::validation("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(TrackerError::validation(format!(
            "title is longer than {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

pub(crate) fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
