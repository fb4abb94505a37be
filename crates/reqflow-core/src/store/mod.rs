//! Durable storage for tickets, their comment threads and ETA audit entries.
//!
//! Every ticket carries a `version`. Writers read a ticket, change a copy and
//! hand it back through [`RequestStore::commit`] together with the version
//! they read; the store applies the write only if the stored version still
//! matches, otherwise the caller lost a race and gets `Conflict`.

mod db;
mod memory;

pub use db::RedbStore;
pub use memory::MemoryStore;

use crate::comment::Comment;
use crate::error::{Result, TrackerError};
use crate::eta::EtaRevision;
use crate::ticket::Ticket;
use crate::types::TicketId;

/// One atomic write: the ticket plus whatever audit rows belong with it.
#[derive(Debug, Clone)]
pub struct TicketChange {
    pub ticket: Ticket,
    pub expected_version: u64,
    pub comment: Option<Comment>,
    pub revision: Option<EtaRevision>,
}

impl TicketChange {
    pub fn new(ticket: Ticket, expected_version: u64) -> Self {
        Self {
            ticket,
            expected_version,
            comment: None,
            revision: None,
        }
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comment = Some(comment);
        self
    }

    pub fn with_revision(mut self, revision: EtaRevision) -> Self {
        self.revision = Some(revision);
        self
    }
}

pub trait RequestStore: Send + Sync {
    /// Stores a new ticket under the next sequential id with version 1.
    fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket>;

    fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>>;

    fn list_tickets(&self) -> Result<Vec<Ticket>>;

    /// Compare-and-swap on `Ticket::version`. Returns the stored ticket.
    fn commit(&self, change: TicketChange) -> Result<Ticket>;

    /// Removes the ticket with its comments and revisions.
    fn delete_ticket(&self, id: TicketId, expected_version: u64) -> Result<()>;

    /// Adds a remark to a ticket's thread without touching the ticket. The
    /// write is refused with `Conflict` unless the ticket is still at
    /// `expected_version`, so a remark never lands on state the caller has
    /// not seen.
    fn append_comment(&self, comment: &Comment, expected_version: u64) -> Result<()>;

    /// Oldest first.
    fn list_comments(&self, id: TicketId) -> Result<Vec<Comment>>;

    /// Oldest first.
    fn list_revisions(&self, id: TicketId) -> Result<Vec<EtaRevision>>;
}

pub(crate) fn version_conflict(id: TicketId, expected: u64, found: u64) -> TrackerError {
    TrackerError::Conflict(format!(
        "ticket {id} was modified concurrently (expected version {expected}, found {found})"
    ))
}

pub(crate) fn check_change(change: &TicketChange) -> Result<()> {
    let id = change.ticket.id;
    if let Some(c) = &change.comment {
        if c.ticket_id != id {
            return Err(TrackerError::validation(format!(
                "comment belongs to ticket {}, not {id}",
                c.ticket_id
            )));
        }
    }
    if let Some(r) = &change.revision {
        if r.ticket_id != id {
            return Err(TrackerError::validation(format!(
                "eta revision belongs to ticket {}, not {id}",
                r.ticket_id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared contract tests, run against every implementation
// ---------------------------------------------------------------------------
