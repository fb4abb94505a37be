//! The tracker service: every operation the transports expose.
//!
//! Each mutating call follows the same path: load the ticket, ask the policy,
//! apply the change to a copy, then commit that copy against the version that
//! was loaded. A lost race is retried once against fresh state; a second loss
//! is handed back to the caller as `Conflict`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::comment::Comment;
use crate::config::Config;
use crate::directory::{resolve_actor, Account, ActorContext, Directory, YamlDirectory};
use crate::error::{Result, TrackerError};
use crate::eta::{self, EtaAlert, EtaRevision, TicketTimers};
use crate::policy::{authorize, visible_in_listing, Action};
use crate::stats::{self, AccountStats, DashboardStats, StatFilter, UserTicketStats};
use crate::store::{RedbStore, RequestStore, TicketChange};
use crate::ticket::{NewTicket, Ticket, TicketEdit};
use crate::types::{AccountId, Ntid, Priority, RequestType, TicketId, TicketStatus};

// ---------------------------------------------------------------------------
// Settings / filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub allow_terminal_comments: bool,
    pub eta_threshold_minutes: u32,
    /// Budget for one operation. Once spent, the operation gives up with
    /// `StoreUnavailable` instead of starting its store write.
    pub store_timeout: Option<Duration>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            allow_terminal_comments: false,
            eta_threshold_minutes: 30,
            store_timeout: None,
        }
    }
}

impl From<&Config> for TrackerSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            allow_terminal_comments: cfg.lifecycle.allow_terminal_comments,
            eta_threshold_minutes: cfg.alerts.eta_threshold_minutes,
            store_timeout: Some(cfg.store.timeout()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub request_type: Option<RequestType>,
    pub account_id: Option<AccountId>,
}

impl ListFilter {
    /// A status of ASSIGNED selects every ticket that has an assignee,
    /// whatever it has moved on to since.
    fn matches(&self, t: &Ticket) -> bool {
        self.status.map_or(true, |s| match s {
            TicketStatus::Assigned => t.assigned_to.is_some(),
            s => s == t.status,
        })
            && self.priority.map_or(true, |p| p == t.priority)
            && self.request_type.map_or(true, |r| r == t.request_type)
            && self.account_id.map_or(true, |a| a == t.account_id)
    }
}

/// Rows written alongside a ticket in the same commit.
#[derive(Default)]
struct Effects {
    comment: Option<Comment>,
    revision: Option<EtaRevision>,
}

/// The instant after which an operation may no longer start a store write.
struct Deadline(Option<Instant>);

impl Deadline {
    fn check(&self, id: Option<TicketId>) -> Result<()> {
        match self.0 {
            Some(at) if Instant::now() > at => {
                warn!(ticket = ?id, "store time budget spent before write");
                Err(TrackerError::StoreUnavailable(
                    "store call timed out; nothing was written".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

fn newest_first(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

pub struct Tracker {
    store: Arc<dyn RequestStore>,
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
}

impl Tracker {
    pub fn new(store: Arc<dyn RequestStore>, directory: Arc<dyn Directory>) -> Self {
        Self {
            store,
            directory,
            clock: Arc::new(SystemClock),
            settings: TrackerSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Opens the project at `root`: config, redb store and YAML directory.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let store = RedbStore::open(&config.store_path(root))?;
        let directory = YamlDirectory::load(root)?;
        Ok(Self::new(Arc::new(store), Arc::new(directory)).with_settings((&config).into()))
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    pub fn actor(&self, ntid: &Ntid) -> Result<ActorContext> {
        resolve_actor(self.directory.as_ref(), ntid)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check(&self, actor: &ActorContext, action: &Action, ticket: Option<&Ticket>) -> Result<()> {
        authorize(actor, action, ticket)
            .into_result(action)
            .inspect_err(|e| {
                warn!(actor = %actor.ntid, ticket = ?ticket.map(|t| t.id), "{e}");
            })
    }

    fn deadline(&self) -> Deadline {
        Deadline(
            self.settings
                .store_timeout
                .and_then(|t| Instant::now().checked_add(t)),
        )
    }

    fn load(&self, id: TicketId) -> Result<Ticket> {
        self.store
            .get_ticket(id)?
            .ok_or(TrackerError::TicketNotFound(id))
    }

    fn apply<F>(&self, actor: &ActorContext, id: TicketId, action: Action, mut change: F) -> Result<Ticket>
    where
        F: FnMut(&mut Ticket, DateTime<Utc>) -> Result<Effects>,
    {
        let deadline = self.deadline();
        let mut retried = false;
        loop {
            let current = self.load(id)?;
            self.check(actor, &action, Some(&current))?;

            let mut next = current.clone();
            let effects = match change(&mut next, self.clock.now()) {
                // The move was valid against the state this caller raced on.
                Err(TrackerError::InvalidTransition { from, reason, .. }) if retried => {
                    let e = TrackerError::Conflict(format!(
                        "ticket {id} changed concurrently (now {from}: {reason})"
                    ));
                    warn!(ticket = %id, actor = %actor.ntid, "{e}");
                    return Err(e);
                }
                other => other?,
            };
            let mut commit = TicketChange::new(next, current.version);
            commit.comment = effects.comment;
            commit.revision = effects.revision;

            deadline.check(Some(id))?;
            match self.store.commit(commit) {
                Err(TrackerError::Conflict(msg)) if !retried => {
                    warn!(ticket = %id, actor = %actor.ntid, "{msg}; retrying against fresh state");
                    retried = true;
                }
                Err(e) => {
                    if matches!(e, TrackerError::Conflict(_)) {
                        warn!(ticket = %id, actor = %actor.ntid, "{e}");
                    }
                    return Err(e);
                }
                Ok(stored) => return Ok(stored),
            }
        }
    }

    /// Loads a ticket the actor is allowed to read.
    fn readable(&self, actor: &ActorContext, id: TicketId) -> Result<Ticket> {
        let ticket = self.load(id)?;
        self.check(actor, &Action::ViewTicket, Some(&ticket))?;
        Ok(ticket)
    }

    fn known_account(&self, id: AccountId) -> Result<Account> {
        self.directory
            .account(id)?
            .ok_or(TrackerError::AccountNotFound(id))
    }

    // -----------------------------------------------------------------------
    // Tickets
    // -----------------------------------------------------------------------

    pub fn create_ticket(&self, actor: &ActorContext, input: NewTicket) -> Result<Ticket> {
        let deadline = self.deadline();
        self.check(actor, &Action::CreateTicket, None)?;
        let account = self.known_account(input.account_id)?;
        if !account.active {
            return Err(TrackerError::validation(format!(
                "account '{}' is inactive",
                account.name
            )));
        }
        let ticket = Ticket::new(input, actor.ntid.clone(), self.clock.now())?;
        deadline.check(None)?;
        let stored = self.store.insert_ticket(ticket)?;
        info!(ticket = %stored.id, actor = %actor.ntid, account = %stored.account_id, "created ticket");
        Ok(stored)
    }

    /// Tickets visible to the actor, newest first.
    pub fn list_tickets(&self, actor: &ActorContext, filter: &ListFilter) -> Result<Vec<Ticket>> {
        self.check(actor, &Action::ListTickets, None)?;
        let mut tickets: Vec<Ticket> = self
            .store
            .list_tickets()?
            .into_iter()
            .filter(|t| visible_in_listing(actor, t) && filter.matches(t))
            .collect();
        newest_first(&mut tickets);
        debug!(actor = %actor.ntid, count = tickets.len(), "listed tickets");
        Ok(tickets)
    }

    pub fn get_ticket(&self, actor: &ActorContext, id: TicketId) -> Result<Ticket> {
        self.readable(actor, id)
    }

    pub fn edit_ticket(&self, actor: &ActorContext, id: TicketId, edit: TicketEdit) -> Result<Ticket> {
        let stored = self.apply(actor, id, Action::EditTicket, |t, now| {
            t.edit(edit.clone(), now)?;
            Ok(Effects::default())
        })?;
        info!(ticket = %id, actor = %actor.ntid, "edited ticket");
        Ok(stored)
    }

    pub fn assign_ticket(
        &self,
        actor: &ActorContext,
        id: TicketId,
        assignee: &Ntid,
        eta: DateTime<Utc>,
    ) -> Result<Ticket> {
        let stored = self.apply(actor, id, Action::AssignTicket, |t, now| {
            let user = self
                .directory
                .user(assignee)?
                .ok_or_else(|| TrackerError::UserNotFound(assignee.to_string()))?;
            if !user.active {
                return Err(TrackerError::validation(format!(
                    "user {assignee} is inactive and cannot be assigned"
                )));
            }
            t.assign(user.ntid, actor.ntid.clone(), eta, now)?;
            Ok(Effects::default())
        })?;
        info!(ticket = %id, actor = %actor.ntid, assignee = %assignee, eta = %eta, "assigned ticket");
        Ok(stored)
    }

    /// Moves a ticket along the status table. A target of CANCELLED is a
    /// cancellation and follows the cancel rules.
    pub fn update_status(
        &self,
        actor: &ActorContext,
        id: TicketId,
        status: TicketStatus,
        comment: Option<&str>,
    ) -> Result<Ticket> {
        let cancelling = status == TicketStatus::Cancelled;
        let action = if cancelling {
            Action::CancelTicket
        } else {
            Action::UpdateStatus
        };
        let stored = self.apply(actor, id, action, |t, now| {
            if cancelling {
                t.cancel(now)?;
            } else {
                t.transition(status, now)?;
            }
            let comment = comment
                .filter(|c| !c.trim().is_empty())
                .map(|c| Comment::new_remark(t.id, actor.ntid.clone(), c, now))
                .transpose()?;
            Ok(Effects {
                comment,
                revision: None,
            })
        })?;
        info!(ticket = %id, actor = %actor.ntid, status = %stored.status, "updated status");
        Ok(stored)
    }

    pub fn cancel_ticket(
        &self,
        actor: &ActorContext,
        id: TicketId,
        comment: Option<&str>,
    ) -> Result<Ticket> {
        self.update_status(actor, id, TicketStatus::Cancelled, comment)
    }

    pub fn update_eta(
        &self,
        actor: &ActorContext,
        id: TicketId,
        new_eta: DateTime<Utc>,
        reason: &str,
        comment_text: Option<&str>,
    ) -> Result<Ticket> {
        let stored = self.apply(actor, id, Action::UpdateEta, |t, now| {
            let (revision, comment) =
                eta::revise_eta(t, &actor.ntid, new_eta, reason, comment_text, now)?;
            Ok(Effects {
                comment: Some(comment),
                revision: Some(revision),
            })
        })?;
        info!(ticket = %id, actor = %actor.ntid, eta = %new_eta, "revised eta");
        Ok(stored)
    }

    pub fn delete_ticket(&self, actor: &ActorContext, id: TicketId) -> Result<()> {
        let deadline = self.deadline();
        let mut retried = false;
        loop {
            let current = self.load(id)?;
            self.check(actor, &Action::DeleteTicket, Some(&current))?;
            deadline.check(Some(id))?;
            match self.store.delete_ticket(id, current.version) {
                Err(TrackerError::Conflict(msg)) if !retried => {
                    warn!(ticket = %id, actor = %actor.ntid, "{msg}; retrying against fresh state");
                    retried = true;
                }
                Err(e) => return Err(e),
                Ok(()) => {
                    info!(ticket = %id, actor = %actor.ntid, "deleted ticket");
                    return Ok(());
                }
            }
        }
    }

    pub fn timers(&self, actor: &ActorContext, id: TicketId) -> Result<TicketTimers> {
        let ticket = self.readable(actor, id)?;
        Ok(TicketTimers::compute(
            &ticket,
            self.clock.now(),
            self.settings.eta_threshold_minutes,
        ))
    }

    // -----------------------------------------------------------------------
    // Comments / ETA history
    // -----------------------------------------------------------------------

    /// Appends a remark. The store only accepts it while the ticket is still
    /// at the version the status check saw, so a ticket closed in between
    /// sends the call round again.
    pub fn add_comment(&self, actor: &ActorContext, id: TicketId, text: &str) -> Result<Comment> {
        let deadline = self.deadline();
        let mut retried = false;
        loop {
            let ticket = self.load(id)?;
            self.check(actor, &Action::AddComment, Some(&ticket))?;
            if ticket.status.is_terminal() && !self.settings.allow_terminal_comments {
                return Err(TrackerError::InvalidTransition {
                    from: ticket.status.to_string(),
                    to: "comment".to_string(),
                    reason: "ticket is closed".to_string(),
                });
            }
            let comment = Comment::new_remark(id, actor.ntid.clone(), text, self.clock.now())?;
            deadline.check(Some(id))?;
            match self.store.append_comment(&comment, ticket.version) {
                Err(TrackerError::Conflict(msg)) if !retried => {
                    debug!(ticket = %id, actor = %actor.ntid, "{msg}; rechecking before comment");
                    retried = true;
                }
                Err(e) => return Err(e),
                Ok(()) => {
                    info!(ticket = %id, actor = %actor.ntid, "added comment");
                    return Ok(comment);
                }
            }
        }
    }

    pub fn list_comments(&self, actor: &ActorContext, id: TicketId) -> Result<Vec<Comment>> {
        self.readable(actor, id)?;
        self.store.list_comments(id)
    }

    pub fn list_eta_revisions(&self, actor: &ActorContext, id: TicketId) -> Result<Vec<EtaRevision>> {
        self.readable(actor, id)?;
        self.store.list_revisions(id)
    }

    // -----------------------------------------------------------------------
    // Statistics / alerts
    // -----------------------------------------------------------------------

    pub fn account_statistics(&self, actor: &ActorContext) -> Result<Vec<AccountStats>> {
        self.check(actor, &Action::ViewStatistics, None)?;
        let accounts = self.directory.accounts()?;
        let tickets = self.store.list_tickets()?;
        Ok(stats::account_statistics(&accounts, &tickets, self.clock.now()))
    }

    pub fn user_statistics(
        &self,
        actor: &ActorContext,
        account_id: AccountId,
    ) -> Result<Vec<UserTicketStats>> {
        self.check(actor, &Action::ViewStatistics, None)?;
        self.known_account(account_id)?;
        let users = self.directory.users()?;
        let tickets = self.store.list_tickets()?;
        Ok(stats::user_statistics(account_id, &users, &tickets, self.clock.now()))
    }

    /// Per-assignee counters over every account.
    pub fn user_statistics_all(&self, actor: &ActorContext) -> Result<Vec<UserTicketStats>> {
        self.check(actor, &Action::ViewStatistics, None)?;
        let users = self.directory.users()?;
        let tickets = self.store.list_tickets()?;
        Ok(stats::user_statistics_all(&users, &tickets, self.clock.now()))
    }

    /// Landing-page counters scoped by the caller's role.
    pub fn dashboard_statistics(&self, actor: &ActorContext) -> Result<DashboardStats> {
        self.check(actor, &Action::ViewStatistics, None)?;
        let tickets = self.store.list_tickets()?;
        Ok(stats::dashboard_statistics(actor, &tickets, self.clock.now()))
    }

    /// The tickets behind one statistics counter, newest first.
    pub fn statistic_tickets(
        &self,
        actor: &ActorContext,
        account_id: AccountId,
        assignee: Option<&Ntid>,
        filter: StatFilter,
    ) -> Result<Vec<Ticket>> {
        self.check(actor, &Action::ViewStatistics, None)?;
        self.known_account(account_id)?;
        let tickets = self.store.list_tickets()?;
        let mut matched =
            stats::filter_tickets(account_id, assignee, filter, &tickets, self.clock.now());
        newest_first(&mut matched);
        Ok(matched)
    }

    /// Visible tickets approaching or past their ETA.
    pub fn eta_alerts(&self, actor: &ActorContext, threshold_minutes: Option<u32>) -> Result<Vec<EtaAlert>> {
        self.check(actor, &Action::ListTickets, None)?;
        let tickets = self.store.list_tickets()?;
        let threshold = threshold_minutes.unwrap_or(self.settings.eta_threshold_minutes);
        Ok(eta::eta_alerts(
            tickets.iter().filter(|t| visible_in_listing(actor, t)),
            self.clock.now(),
            threshold,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
