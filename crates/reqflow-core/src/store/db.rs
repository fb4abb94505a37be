//! redb-backed [`RequestStore`].
//!
//! # Table design
//!
//! ```text
//! tickets    u64 ticket id                          -> JSON Ticket
//! comments   [ ticket_id: u64 BE | seq: u64 BE ]    -> JSON Comment
//! revisions  [ ticket_id: u64 BE | seq: u64 BE ]    -> JSON EtaRevision
//! meta       &str counter name                      -> u64
//! ```
//!
//! The ticket id occupies the high bytes of the thread keys, so one range scan
//! over `[id | 0] .. [id+1 | 0]` yields a ticket's thread in insertion order.
//! redb runs one write transaction at a time; the version check and all writes
//! of a [`TicketChange`] happen inside a single transaction.

use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition, WriteTransaction};

use super::{check_change, version_conflict, RequestStore, TicketChange};
use crate::comment::Comment;
use crate::error::{Result, TrackerError};
use crate::eta::EtaRevision;
use crate::ticket::Ticket;
use crate::types::TicketId;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type ThreadTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

const TICKETS: TableDefinition<u64, &[u8]> = TableDefinition::new("tickets");
const COMMENTS: ThreadTable = TableDefinition::new("comments");
const REVISIONS: ThreadTable = TableDefinition::new("revisions");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_TICKET: &str = "next_ticket_id";
const NEXT_COMMENT: &str = "next_comment_seq";
const NEXT_REVISION: &str = "next_revision_seq";

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn thread_key(id: TicketId, seq: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&id.0.to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Half-open key range covering every entry of one ticket's thread.
fn thread_bounds(id: TicketId) -> ([u8; 16], [u8; 16]) {
    let lo = thread_key(id, 0);
    let mut hi = [0xffu8; 16];
    if let Some(next) = id.0.checked_add(1) {
        hi = thread_key(TicketId(next), 0);
    }
    (lo, hi)
}

fn next_seq(meta: &mut Table<'_, &'static str, u64>, name: &str) -> Result<u64> {
    let current = meta
        .get(name)
        .map_err(TrackerError::store)?
        .map(|g| g.value())
        .unwrap_or(0);
    let next = current + 1;
    meta.insert(name, next).map_err(TrackerError::store)?;
    Ok(next)
}

fn append_json(
    wt: &WriteTransaction,
    table: ThreadTable,
    counter: &str,
    id: TicketId,
    bytes: &[u8],
) -> Result<()> {
    let seq = {
        let mut meta = wt.open_table(META).map_err(TrackerError::store)?;
        next_seq(&mut meta, counter)?
    };
    let mut t = wt.open_table(table).map_err(TrackerError::store)?;
    let key = thread_key(id, seq);
    t.insert(key.as_slice(), bytes).map_err(TrackerError::store)?;
    Ok(())
}

fn clear_thread(wt: &WriteTransaction, table: ThreadTable, id: TicketId) -> Result<usize> {
    let (lo, hi) = thread_bounds(id);
    let mut t = wt.open_table(table).map_err(TrackerError::store)?;
    let mut keys = Vec::new();
    for entry in t
        .range(lo.as_slice()..hi.as_slice())
        .map_err(TrackerError::store)?
    {
        let (k, _) = entry.map_err(TrackerError::store)?;
        keys.push(k.value().to_vec());
    }
    for k in &keys {
        t.remove(k.as_slice()).map_err(TrackerError::store)?;
    }
    Ok(keys.len())
}

/// Version of the stored ticket, or `TicketNotFound`.
fn stored_version(wt: &WriteTransaction, id: TicketId) -> Result<u64> {
    let t = wt.open_table(TICKETS).map_err(TrackerError::store)?;
    let guard = t
        .get(id.0)
        .map_err(TrackerError::store)?
        .ok_or(TrackerError::TicketNotFound(id))?;
    let stored: Ticket = serde_json::from_slice(guard.value())?;
    Ok(stored.version)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(TrackerError::store)?;
        let wt = db.begin_write().map_err(TrackerError::store)?;
        wt.open_table(TICKETS).map_err(TrackerError::store)?;
        wt.open_table(COMMENTS).map_err(TrackerError::store)?;
        wt.open_table(REVISIONS).map_err(TrackerError::store)?;
        wt.open_table(META).map_err(TrackerError::store)?;
        wt.commit().map_err(TrackerError::store)?;
        tracing::debug!(path = %path.display(), "opened ticket store");
        Ok(Self { db })
    }

    fn read_thread<T: serde::de::DeserializeOwned>(
        &self,
        table: ThreadTable,
        id: TicketId,
    ) -> Result<Vec<T>> {
        let (lo, hi) = thread_bounds(id);
        let rt = self.db.begin_read().map_err(TrackerError::store)?;
        let t = rt.open_table(table).map_err(TrackerError::store)?;
        let mut out = Vec::new();
        for entry in t
            .range(lo.as_slice()..hi.as_slice())
            .map_err(TrackerError::store)?
        {
            let (_, v) = entry.map_err(TrackerError::store)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }
}

impl RequestStore for RedbStore {
    fn insert_ticket(&self, mut ticket: Ticket) -> Result<Ticket> {
        let wt = self.db.begin_write().map_err(TrackerError::store)?;
        {
            let mut meta = wt.open_table(META).map_err(TrackerError::store)?;
            ticket.id = TicketId(next_seq(&mut meta, NEXT_TICKET)?);
        }
        ticket.version = 1;
        let value = serde_json::to_vec(&ticket)?;
        {
            let mut t = wt.open_table(TICKETS).map_err(TrackerError::store)?;
            t.insert(ticket.id.0, value.as_slice())
                .map_err(TrackerError::store)?;
        }
        wt.commit().map_err(TrackerError::store)?;
        Ok(ticket)
    }

    fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        let rt = self.db.begin_read().map_err(TrackerError::store)?;
        let t = rt.open_table(TICKETS).map_err(TrackerError::store)?;
        match t.get(id.0).map_err(TrackerError::store)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let rt = self.db.begin_read().map_err(TrackerError::store)?;
        let t = rt.open_table(TICKETS).map_err(TrackerError::store)?;
        let mut out = Vec::new();
        for entry in t.iter().map_err(TrackerError::store)? {
            let (_, v) = entry.map_err(TrackerError::store)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    fn commit(&self, change: TicketChange) -> Result<Ticket> {
        check_change(&change)?;
        let id = change.ticket.id;
        let wt = self.db.begin_write().map_err(TrackerError::store)?;

        let current = stored_version(&wt, id)?;
        if current != change.expected_version {
            // Dropping the transaction aborts it.
            return Err(version_conflict(id, change.expected_version, current));
        }

        let mut ticket = change.ticket;
        ticket.version = current + 1;
        let value = serde_json::to_vec(&ticket)?;
        {
            let mut t = wt.open_table(TICKETS).map_err(TrackerError::store)?;
            t.insert(id.0, value.as_slice()).map_err(TrackerError::store)?;
        }
        if let Some(comment) = &change.comment {
            append_json(&wt, COMMENTS, NEXT_COMMENT, id, &serde_json::to_vec(comment)?)?;
        }
        if let Some(revision) = &change.revision {
            append_json(&wt, REVISIONS, NEXT_REVISION, id, &serde_json::to_vec(revision)?)?;
        }
        wt.commit().map_err(TrackerError::store)?;
        Ok(ticket)
    }

    fn delete_ticket(&self, id: TicketId, expected_version: u64) -> Result<()> {
        let wt = self.db.begin_write().map_err(TrackerError::store)?;
        let current = stored_version(&wt, id)?;
        if current != expected_version {
            return Err(version_conflict(id, expected_version, current));
        }
        {
            let mut t = wt.open_table(TICKETS).map_err(TrackerError::store)?;
            t.remove(id.0).map_err(TrackerError::store)?;
        }
        let comments = clear_thread(&wt, COMMENTS, id)?;
        let revisions = clear_thread(&wt, REVISIONS, id)?;
        wt.commit().map_err(TrackerError::store)?;
        tracing::debug!(ticket = %id, comments, revisions, "deleted ticket thread");
        Ok(())
    }

    fn append_comment(&self, comment: &Comment, expected_version: u64) -> Result<()> {
        let wt = self.db.begin_write().map_err(TrackerError::store)?;
        let current = stored_version(&wt, comment.ticket_id)?;
        if current != expected_version {
            return Err(version_conflict(comment.ticket_id, expected_version, current));
        }
        append_json(
            &wt,
            COMMENTS,
            NEXT_COMMENT,
            comment.ticket_id,
            &serde_json::to_vec(comment)?,
        )?;
        wt.commit().map_err(TrackerError::store)?;
        Ok(())
    }

    fn list_comments(&self, id: TicketId) -> Result<Vec<Comment>> {
        self.read_thread(COMMENTS, id)
    }

    fn list_revisions(&self, id: TicketId) -> Result<Vec<EtaRevision>> {
        self.read_thread(REVISIONS, id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
