//! Account- and user-level counters, recomputed from the live ticket set.
//!
//! Every counter is produced by counting [`StatFilter::matches`], and the
//! drill-down lists use the same predicate, so a count and the list behind it
//! cannot disagree.

use crate::directory::{Account, ActorContext, User};
use crate::error::TrackerError;
use crate::ticket::Ticket;
use crate::types::{AccountId, Ntid, Role, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Completed after its deadline, or still open past it.
pub fn crossed_eta(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    let Some(eta) = ticket.eta else {
        return false;
    };
    match ticket.status {
        TicketStatus::Completed => ticket.updated_at > eta,
        TicketStatus::Cancelled => false,
        _ => eta < now,
    }
}

/// Account and user statistics disagree on what "pending" means, so every
/// predicate is evaluated within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Account,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatFilter {
    Total,
    Resolved,
    Pending,
    OnHold,
    Unresolved,
    CrossedEta,
    Open,
}

impl StatFilter {
    pub fn matches(self, scope: Scope, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        use TicketStatus::*;
        match self {
            StatFilter::Total => true,
            StatFilter::Resolved => ticket.status == Completed,
            StatFilter::Pending => match scope {
                Scope::Account => ticket.status == InProgress,
                Scope::User => matches!(ticket.status, Assigned | InProgress),
            },
            StatFilter::OnHold => ticket.status == OnHold,
            StatFilter::Unresolved => ticket.status != Completed,
            StatFilter::CrossedEta => crossed_eta(ticket, now),
            StatFilter::Open => ticket.status == Open,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatFilter::Total => "total",
            StatFilter::Resolved => "resolved",
            StatFilter::Pending => "pending",
            StatFilter::OnHold => "onHold",
            StatFilter::Unresolved => "unresolved",
            StatFilter::CrossedEta => "crossedEta",
            StatFilter::Open => "open",
        }
    }
}

impl fmt::Display for StatFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatFilter {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "total" => Ok(StatFilter::Total),
            "resolved" => Ok(StatFilter::Resolved),
            "pending" => Ok(StatFilter::Pending),
            "onhold" => Ok(StatFilter::OnHold),
            "unresolved" => Ok(StatFilter::Unresolved),
            "crossedeta" => Ok(StatFilter::CrossedEta),
            "open" => Ok(StatFilter::Open),
            _ => Err(TrackerError::Validation(format!("unknown filter '{s}'"))),
        }
    }
}

fn count<'a>(
    filter: StatFilter,
    scope: Scope,
    tickets: impl IntoIterator<Item = &'a Ticket>,
    now: DateTime<Utc>,
) -> u64 {
    tickets
        .into_iter()
        .filter(|t| filter.matches(scope, t, now))
        .count() as u64
}

// ---------------------------------------------------------------------------
// Account statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub account_id: AccountId,
    pub account_name: String,
    pub open_tickets: u64,
    pub total_tickets: u64,
    pub resolved_tickets: u64,
    pub pending_tickets: u64,
    pub on_hold_tickets: u64,
    pub crossed_eta_tickets: u64,
}

impl AccountStats {
    pub fn compute(account: &Account, tickets: &[&Ticket], now: DateTime<Utc>) -> Self {
        let c = |f: StatFilter| count(f, Scope::Account, tickets.iter().copied(), now);
        Self {
            account_id: account.id,
            account_name: account.name.clone(),
            open_tickets: c(StatFilter::Open),
            total_tickets: c(StatFilter::Total),
            resolved_tickets: c(StatFilter::Resolved),
            pending_tickets: c(StatFilter::Pending),
            on_hold_tickets: c(StatFilter::OnHold),
            crossed_eta_tickets: c(StatFilter::CrossedEta),
        }
    }
}

/// One row per account, ordered by account id.
pub fn account_statistics(
    accounts: &[Account],
    tickets: &[Ticket],
    now: DateTime<Utc>,
) -> Vec<AccountStats> {
    let mut by_account: BTreeMap<AccountId, Vec<&Ticket>> = BTreeMap::new();
    for t in tickets {
        by_account.entry(t.account_id).or_default().push(t);
    }
    let mut accounts: Vec<&Account> = accounts.iter().collect();
    accounts.sort_by_key(|a| a.id);
    accounts
        .into_iter()
        .map(|a| {
            let owned = by_account.get(&a.id).map(Vec::as_slice).unwrap_or(&[]);
            AccountStats::compute(a, owned, now)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// User statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTicketStats {
    pub ntid: Ntid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub total_tickets: u64,
    pub resolved_tickets: u64,
    pub pending_tickets: u64,
    pub on_hold_tickets: u64,
    pub unresolved_tickets: u64,
    pub crossed_eta_tickets: u64,
}

/// Per-assignee counters for the tickets of one account. Covers every user
/// of the account (zero rows included) and any outside assignee, by ntid.
pub fn user_statistics(
    account_id: AccountId,
    users: &[User],
    tickets: &[Ticket],
    now: DateTime<Utc>,
) -> Vec<UserTicketStats> {
    user_rows(
        users,
        users.iter().filter(|u| u.account_id == account_id),
        tickets.iter().filter(|t| t.account_id == account_id),
        now,
    )
}

/// Per-assignee counters across every account: one row per directory user
/// and per outside assignee.
pub fn user_statistics_all(users: &[User], tickets: &[Ticket], now: DateTime<Utc>) -> Vec<UserTicketStats> {
    user_rows(users, users.iter(), tickets.iter(), now)
}

fn user_rows<'a>(
    users: &[User],
    listed: impl Iterator<Item = &'a User>,
    tickets: impl Iterator<Item = &'a Ticket>,
    now: DateTime<Utc>,
) -> Vec<UserTicketStats> {
    let mut assigned: BTreeMap<Ntid, Vec<&Ticket>> = BTreeMap::new();
    for user in listed {
        assigned.entry(user.ntid.clone()).or_default();
    }
    for t in tickets {
        if let Some(assignee) = &t.assigned_to {
            assigned.entry(assignee.clone()).or_default().push(t);
        }
    }

    assigned
        .into_iter()
        .map(|(ntid, owned)| {
            let user = users.iter().find(|u| u.ntid == ntid);
            let c = |f: StatFilter| count(f, Scope::User, owned.iter().copied(), now);
            let total = c(StatFilter::Total);
            let resolved = c(StatFilter::Resolved);
            UserTicketStats {
                email: user.map(|u| u.email.clone()),
                role: user.map(|u| u.role),
                total_tickets: total,
                resolved_tickets: resolved,
                pending_tickets: c(StatFilter::Pending),
                on_hold_tickets: c(StatFilter::OnHold),
                unresolved_tickets: total - resolved,
                crossed_eta_tickets: c(StatFilter::CrossedEta),
                ntid,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Headline counters for the caller's landing page. Which fields are present
/// depends on the caller's role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_me: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_requests: Option<u64>,
}

impl DashboardStats {
    fn status_counts<'a>(
        role: Role,
        tickets: impl Iterator<Item = &'a Ticket> + Clone,
        now: DateTime<Utc>,
    ) -> Self {
        let c = |f: StatFilter| count(f, Scope::Account, tickets.clone(), now);
        Self {
            role: Some(role),
            total_requests: Some(c(StatFilter::Total)),
            open_requests: Some(c(StatFilter::Open)),
            assigned_requests: Some(
                tickets
                    .clone()
                    .filter(|t| t.status == TicketStatus::Assigned)
                    .count() as u64,
            ),
            in_progress_requests: Some(c(StatFilter::Pending)),
            completed_requests: Some(c(StatFilter::Resolved)),
            ..Self::default()
        }
    }
}

/// Admins count everything, scrum masters their overseen accounts, managers
/// their own account. Developers get the number of tickets assigned to them
/// and users the number they raised.
pub fn dashboard_statistics(actor: &ActorContext, tickets: &[Ticket], now: DateTime<Utc>) -> DashboardStats {
    match actor.role {
        Role::Admin => DashboardStats::status_counts(actor.role, tickets.iter(), now),
        Role::ScrumMaster => DashboardStats::status_counts(
            actor.role,
            tickets.iter().filter(|t| actor.oversees(t.account_id)),
            now,
        ),
        Role::Manager => DashboardStats::status_counts(
            actor.role,
            tickets.iter().filter(|t| t.account_id == actor.account_id),
            now,
        ),
        Role::Developer => DashboardStats {
            role: Some(actor.role),
            assigned_to_me: Some(tickets.iter().filter(|t| t.is_assignee(&actor.ntid)).count() as u64),
            ..DashboardStats::default()
        },
        Role::User => DashboardStats {
            role: Some(actor.role),
            my_requests: Some(tickets.iter().filter(|t| t.is_creator(&actor.ntid)).count() as u64),
            ..DashboardStats::default()
        },
    }
}

/// The tickets behind a counter. With `assignee` set the user scope applies,
/// otherwise the account scope.
pub fn filter_tickets(
    account_id: AccountId,
    assignee: Option<&Ntid>,
    filter: StatFilter,
    tickets: &[Ticket],
    now: DateTime<Utc>,
) -> Vec<Ticket> {
    let scope = if assignee.is_some() {
        Scope::User
    } else {
        Scope::Account
    };
    tickets
        .iter()
        .filter(|t| t.account_id == account_id)
        .filter(|t| assignee.map_or(true, |a| t.is_assignee(a)))
        .filter(|t| filter.matches(scope, t, now))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::NewTicket;
    use crate::types::{Priority, RequestType, TicketId};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn ntid(s: &str) -> Ntid {
        Ntid::new(s).unwrap()
    }

    fn make(id: u64, account: u64, status: TicketStatus, assignee: &str, eta: DateTime<Utc>) -> Ticket {
        let created = now() - Duration::days(30);
        let mut t = Ticket::new(
            NewTicket {
                title: format!("ticket {id}"),
                description: None,
                request_type: RequestType::Other,
                priority: Priority::Medium,
                account_id: AccountId(account),
            },
            ntid("alice"),
            created,
        )
        .unwrap();
        t.id = TicketId(id);
        if status != TicketStatus::Open {
            t.assign(ntid(assignee), ntid("sam"), eta, created).unwrap();
            t.status = status;
            t.updated_at = eta - Duration::hours(1);
        }
        t
    }

    fn account(id: u64, name: &str) -> Account {
        Account {
            id: AccountId(id),
            name: name.to_string(),
            active: true,
        }
    }

    #[test]
    fn crossed_eta_cases() {
        let yesterday = now() - Duration::days(1);
        let overdue = make(1, 1, TicketStatus::InProgress, "jdoe", yesterday);
        assert!(crossed_eta(&overdue, now()));

        let mut on_time = make(2, 1, TicketStatus::Completed, "jdoe", yesterday);
        on_time.updated_at = yesterday - Duration::hours(2);
        assert!(!crossed_eta(&on_time, now()));

        let mut late = make(3, 1, TicketStatus::Completed, "jdoe", yesterday);
        late.updated_at = yesterday + Duration::hours(2);
        assert!(crossed_eta(&late, now()));

        let mut cancelled = make(4, 1, TicketStatus::Cancelled, "jdoe", yesterday);
        cancelled.updated_at = now();
        assert!(!crossed_eta(&cancelled, now()));

        let open = make(5, 1, TicketStatus::Open, "", now());
        assert!(!crossed_eta(&open, now()));
    }

    #[test]
    fn account_statistics_for_ten_tickets() {
        let future = now() + Duration::days(5);
        let past = now() - Duration::days(1);
        let mut tickets = Vec::new();
        let mut id = 0;
        let mut push = |status, eta| {
            id += 1;
            tickets.push(make(id, 1, status, "jdoe", eta));
        };
        for _ in 0..4 {
            push(TicketStatus::Completed, future);
        }
        push(TicketStatus::OnHold, past);
        push(TicketStatus::OnHold, future);
        push(TicketStatus::InProgress, future);
        for _ in 0..3 {
            push(TicketStatus::Open, future);
        }

        let stats = account_statistics(&[account(2, "Empty"), account(1, "Payments")], &tickets, now());
        assert_eq!(stats.len(), 2);
        let a = &stats[0];
        assert_eq!(a.account_name, "Payments");
        assert_eq!(a.total_tickets, 10);
        assert_eq!(a.resolved_tickets, 4);
        assert_eq!(a.on_hold_tickets, 2);
        assert_eq!(a.pending_tickets, 1);
        assert_eq!(a.crossed_eta_tickets, 1);
        assert_eq!(a.open_tickets, 3);
        assert_eq!(stats[1].total_tickets, 0);
    }

    #[test]
    fn user_pending_includes_assigned() {
        let future = now() + Duration::days(5);
        let tickets = vec![
            make(1, 1, TicketStatus::Assigned, "jdoe", future),
            make(2, 1, TicketStatus::InProgress, "jdoe", future),
            make(3, 1, TicketStatus::Completed, "jdoe", future),
            make(4, 1, TicketStatus::OnHold, "contractor", now() - Duration::days(2)),
            make(5, 2, TicketStatus::InProgress, "jdoe", future),
        ];
        let users = vec![
            User {
                ntid: ntid("jdoe"),
                email: "jdoe@example.com".into(),
                role: Role::Developer,
                account_id: AccountId(1),
                handled_accounts: vec![],
                active: true,
            },
            User {
                ntid: ntid("idle"),
                email: "idle@example.com".into(),
                role: Role::Developer,
                account_id: AccountId(1),
                handled_accounts: vec![],
                active: true,
            },
        ];
        let rows = user_statistics(AccountId(1), &users, &tickets, now());
        let names: Vec<_> = rows.iter().map(|r| r.ntid.as_str()).collect();
        assert_eq!(names, vec!["contractor", "idle", "jdoe"]);

        let jdoe = &rows[2];
        assert_eq!(jdoe.total_tickets, 3);
        assert_eq!(jdoe.pending_tickets, 2);
        assert_eq!(jdoe.resolved_tickets, 1);
        assert_eq!(jdoe.unresolved_tickets, 2);
        assert_eq!(jdoe.role, Some(Role::Developer));

        assert_eq!(rows[0].crossed_eta_tickets, 1);
        assert_eq!(rows[0].email, None);
        assert_eq!(rows[1].total_tickets, 0);

        let account_pending = filter_tickets(AccountId(1), None, StatFilter::Pending, &tickets, now());
        assert_eq!(account_pending.len(), 1);
    }

    #[test]
    fn filtered_lists_agree_with_counts() {
        let future = now() + Duration::days(5);
        let tickets = vec![
            make(1, 1, TicketStatus::Assigned, "jdoe", future),
            make(2, 1, TicketStatus::Delayed, "jdoe", now() - Duration::hours(3)),
            make(3, 1, TicketStatus::Completed, "jdoe", future),
        ];
        let rows = user_statistics(AccountId(1), &[], &tickets, now());
        let jdoe = ntid("jdoe");
        for (filter, expected) in [
            (StatFilter::Total, rows[0].total_tickets),
            (StatFilter::Resolved, rows[0].resolved_tickets),
            (StatFilter::Pending, rows[0].pending_tickets),
            (StatFilter::OnHold, rows[0].on_hold_tickets),
            (StatFilter::Unresolved, rows[0].unresolved_tickets),
            (StatFilter::CrossedEta, rows[0].crossed_eta_tickets),
        ] {
            let listed = filter_tickets(AccountId(1), Some(&jdoe), filter, &tickets, now());
            assert_eq!(listed.len() as u64, expected, "{filter}");
        }
    }

    #[test]
    fn all_user_statistics_span_accounts() {
        let future = now() + Duration::days(5);
        let tickets = vec![
            make(1, 1, TicketStatus::InProgress, "jdoe", future),
            make(2, 2, TicketStatus::Completed, "jdoe", future),
            make(3, 2, TicketStatus::OnHold, "kim", future),
        ];
        let users = vec![User {
            ntid: ntid("idle"),
            email: "idle@example.com".into(),
            role: Role::User,
            account_id: AccountId(3),
            handled_accounts: vec![],
            active: true,
        }];
        let rows = user_statistics_all(&users, &tickets, now());
        let names: Vec<_> = rows.iter().map(|r| r.ntid.as_str()).collect();
        assert_eq!(names, vec!["idle", "jdoe", "kim"]);
        assert_eq!(rows[1].total_tickets, 2);
        assert_eq!(rows[1].resolved_tickets, 1);
        assert_eq!(rows[1].pending_tickets, 1);
        assert_eq!(rows[2].on_hold_tickets, 1);
        assert_eq!(rows[0].total_tickets, 0);
        assert_eq!(user_statistics(AccountId(1), &users, &tickets, now()).len(), 1);
    }

    #[test]
    fn dashboard_depends_on_role() {
        let future = now() + Duration::days(5);
        let tickets = vec![
            make(1, 1, TicketStatus::Open, "", future),
            make(2, 1, TicketStatus::Assigned, "jdoe", future),
            make(3, 2, TicketStatus::InProgress, "jdoe", future),
            make(4, 2, TicketStatus::Completed, "kim", future),
            make(5, 3, TicketStatus::Assigned, "kim", future),
        ];
        let actor = |name: &str, role: Role, account: u64, handled: Vec<u64>| {
            ActorContext::from_user(&User {
                ntid: ntid(name),
                email: format!("{name}@example.com"),
                role,
                account_id: AccountId(account),
                handled_accounts: handled.into_iter().map(AccountId).collect(),
                active: true,
            })
        };

        let admin = dashboard_statistics(&actor("root", Role::Admin, 1, vec![]), &tickets, now());
        assert_eq!(admin.total_requests, Some(5));
        assert_eq!(admin.open_requests, Some(1));
        assert_eq!(admin.assigned_requests, Some(2));
        assert_eq!(admin.in_progress_requests, Some(1));
        assert_eq!(admin.completed_requests, Some(1));
        assert_eq!(admin.assigned_to_me, None);

        let sm = dashboard_statistics(&actor("sam", Role::ScrumMaster, 1, vec![1, 2]), &tickets, now());
        assert_eq!(sm.total_requests, Some(4));
        assert_eq!(sm.assigned_requests, Some(1));
        assert_eq!(sm.completed_requests, Some(1));

        let dev = dashboard_statistics(&actor("jdoe", Role::Developer, 1, vec![]), &tickets, now());
        assert_eq!(dev.assigned_to_me, Some(2));
        assert_eq!(dev.total_requests, None);

        let user = dashboard_statistics(&actor("alice", Role::User, 1, vec![]), &tickets, now());
        assert_eq!(user.my_requests, Some(5));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"role": "USER", "myRequests": 5}));
    }

    #[test]
    fn filter_parses_wire_names() {
        assert_eq!("onHold".parse::<StatFilter>().unwrap(), StatFilter::OnHold);
        assert_eq!("crossed_eta".parse::<StatFilter>().unwrap(), StatFilter::CrossedEta);
        assert!("weird".parse::<StatFilter>().is_err());
    }
}
