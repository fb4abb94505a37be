//! Ticket state machine.
//!
//! ```text
//! OPEN --assign--> ASSIGNED --> IN_PROGRESS <--> ON_HOLD <--> DELAYED
//!                     \______________|______________|___________|
//!                                    v                          v
//!                                COMPLETED                  CANCELLED (cancel)
//! ```
//!
//! Every method validates the whole transition before it touches a field, so
//! a rejected call leaves the ticket exactly as it was.

use crate::error::{Result, TrackerError};
use crate::ticket::{normalize_description, validate_title, Ticket, TicketEdit};
use crate::types::{Ntid, TicketStatus};
use chrono::{DateTime, Utc};

impl TicketStatus {
    /// Targets reachable through a plain status update.
    pub fn allowed_targets(self) -> &'static [TicketStatus] {
        use TicketStatus::*;
        match self {
            Assigned => &[InProgress, OnHold, Completed, Delayed],
            InProgress => &[OnHold, Completed, Delayed],
            OnHold => &[InProgress, Completed, Delayed],
            Delayed => &[InProgress, OnHold, Completed],
            Open | Completed | Cancelled => &[],
        }
    }

    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            TicketStatus::Assigned
                | TicketStatus::InProgress
                | TicketStatus::OnHold
                | TicketStatus::Delayed
        )
    }
}

impl Ticket {
    fn invalid(&self, to: impl ToString, reason: impl Into<String>) -> TrackerError {
        TrackerError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    pub fn can_transition_to(&self, target: TicketStatus) -> Result<()> {
        if self.status == TicketStatus::Open {
            return Err(self.invalid(target, "ticket must be assigned first"));
        }
        if self.status.is_terminal() {
            return Err(self.invalid(target, "ticket is closed"));
        }
        if target == TicketStatus::Cancelled {
            return Err(self.invalid(target, "cancellation must go through cancel"));
        }
        if !self.status.allowed_targets().contains(&target) {
            return Err(self.invalid(target, "not a permitted status change"));
        }
        Ok(())
    }

    pub fn transition(&mut self, target: TicketStatus, now: DateTime<Utc>) -> Result<()> {
        self.can_transition_to(target)?;
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// OPEN -> ASSIGNED. Any other starting status is an invalid move; a
    /// caller that lost a race is told so by `Tracker::apply`.
    pub fn assign(
        &mut self,
        assignee: Ntid,
        assigner: Ntid,
        eta: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match self.status {
            TicketStatus::Open => {}
            s if s.is_terminal() => {
                return Err(self.invalid(TicketStatus::Assigned, "ticket is closed"));
            }
            _ => {
                return Err(self.invalid(
                    TicketStatus::Assigned,
                    format!(
                        "ticket is already assigned to {}",
                        self.assigned_to
                            .as_ref()
                            .map(Ntid::as_str)
                            .unwrap_or("nobody")
                    ),
                ));
            }
        }
        if eta < self.created_at {
            return Err(TrackerError::validation(format!(
                "eta {} is earlier than the ticket's creation time {}",
                eta.to_rfc3339(),
                self.created_at.to_rfc3339()
            )));
        }

        self.status = TicketStatus::Assigned;
        self.assigned_to = Some(assignee);
        self.assigned_by = Some(assigner);
        self.assigned_at = Some(now);
        self.eta = Some(eta);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == TicketStatus::Open {
            return Err(self.invalid(
                TicketStatus::Cancelled,
                "unassigned tickets are deleted, not cancelled",
            ));
        }
        if !self.status.is_cancellable() {
            return Err(self.invalid(TicketStatus::Cancelled, "ticket is closed"));
        }
        self.status = TicketStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    pub fn edit(&mut self, edit: TicketEdit, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.invalid(self.status, "closed tickets cannot be edited"));
        }
        if edit.is_empty() {
            return Err(TrackerError::validation("nothing to edit"));
        }
        let title = edit.title.as_deref().map(validate_title).transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = edit.description {
            self.description = normalize_description(Some(description));
        }
        if let Some(request_type) = edit.request_type {
            self.request_type = request_type;
        }
        if let Some(priority) = edit.priority {
            self.priority = priority;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Describes the first breach of the assignment invariant, if any.
    pub fn invariant_violation(&self) -> Option<String> {
        let open = self.status == TicketStatus::Open;
        if open != self.assigned_to.is_none() {
            return Some(format!(
                "status {} disagrees with assignee {:?}",
                self.status, self.assigned_to
            ));
        }
        if self.assigned_to.is_none() != self.assigned_at.is_none() {
            return Some("assignee and assignment time disagree".to_string());
        }
        if !open && self.status != TicketStatus::Cancelled && self.eta.is_none() {
            return Some(format!("{} ticket has no eta", self.status));
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
