use super::{check_change, version_conflict, RequestStore, TicketChange};
use crate::comment::Comment;
use crate::error::{Result, TrackerError};
use crate::eta::EtaRevision;
use crate::ticket::Ticket;
use crate::types::TicketId;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    tickets: BTreeMap<TicketId, Ticket>,
    comments: BTreeMap<TicketId, Vec<Comment>>,
    revisions: BTreeMap<TicketId, Vec<EtaRevision>>,
}

/// Process-local store. One mutex guards all tables, so every call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| TrackerError::store("memory store lock poisoned"))
    }
}

impl RequestStore for MemoryStore {
    fn insert_ticket(&self, mut ticket: Ticket) -> Result<Ticket> {
        let mut tables = self.lock()?;
        tables.next_id += 1;
        ticket.id = TicketId(tables.next_id);
        ticket.version = 1;
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.lock()?.tickets.get(&id).cloned())
    }

    fn list_tickets(&self) -> Result<Vec<Ticket>> {
        Ok(self.lock()?.tickets.values().cloned().collect())
    }

    fn commit(&self, change: TicketChange) -> Result<Ticket> {
        check_change(&change)?;
        let mut tables = self.lock()?;
        let id = change.ticket.id;
        let current = tables
            .tickets
            .get(&id)
            .ok_or(TrackerError::TicketNotFound(id))?
            .version;
        if current != change.expected_version {
            return Err(version_conflict(id, change.expected_version, current));
        }

        let mut ticket = change.ticket;
        ticket.version = current + 1;
        tables.tickets.insert(id, ticket.clone());
        if let Some(comment) = change.comment {
            tables.comments.entry(id).or_default().push(comment);
        }
        if let Some(revision) = change.revision {
            tables.revisions.entry(id).or_default().push(revision);
        }
        Ok(ticket)
    }

    fn delete_ticket(&self, id: TicketId, expected_version: u64) -> Result<()> {
        let mut tables = self.lock()?;
        let current = tables
            .tickets
            .get(&id)
            .ok_or(TrackerError::TicketNotFound(id))?
            .version;
        if current != expected_version {
            return Err(version_conflict(id, expected_version, current));
        }
        tables.tickets.remove(&id);
        tables.comments.remove(&id);
        tables.revisions.remove(&id);
        Ok(())
    }

    fn append_comment(&self, comment: &Comment, expected_version: u64) -> Result<()> {
        let mut tables = self.lock()?;
        let id = comment.ticket_id;
        let current = tables
            .tickets
            .get(&id)
            .ok_or(TrackerError::TicketNotFound(id))?
            .version;
        if current != expected_version {
            return Err(version_conflict(id, expected_version, current));
        }
        tables
            .comments
            .entry(comment.ticket_id)
            .or_default()
            .push(comment.clone());
        Ok(())
    }

    fn list_comments(&self, id: TicketId) -> Result<Vec<Comment>> {
        Ok(self.lock()?.comments.get(&id).cloned().unwrap_or_default())
    }

    fn list_revisions(&self, id: TicketId) -> Result<Vec<EtaRevision>> {
        Ok(self.lock()?.revisions.get(&id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn memory_store_contract() {
        contract::run_all(|| Box::new(MemoryStore::new()));
    }
}
