use super::Session;
use crate::output::{fmt_time, print_json, print_table};
use clap::Subcommand;
use reqflow_core::stats::{DashboardStats, StatFilter};
use reqflow_core::types::{AccountId, Ntid};
use std::path::Path;

#[derive(Subcommand)]
pub enum StatsSubcommand {
    /// Counters for your dashboard, scoped by your role
    Dashboard,
    /// Ticket counters for every account
    Accounts,
    /// Per-assignee counters for one account, or across all accounts
    Users { account: Option<String> },
    /// The tickets behind one counter
    Tickets {
        account: String,
        /// total, resolved, pending, on-hold, unresolved, crossed-eta or open
        #[arg(long, default_value = "total")]
        filter: String,
        /// Restrict to one assignee (switches to per-user counter meanings)
        #[arg(long)]
        assignee: Option<String>,
    },
}

pub fn run(
    root: &Path,
    as_user: Option<&str>,
    subcmd: StatsSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::open(root, as_user)?;
    match subcmd {
        StatsSubcommand::Dashboard => dashboard(&session, json),
        StatsSubcommand::Accounts => accounts(&session, json),
        StatsSubcommand::Users { account } => {
            let account: Option<AccountId> = account.as_deref().map(str::parse).transpose()?;
            users(&session, account, json)
        }
        StatsSubcommand::Tickets {
            account,
            filter,
            assignee,
        } => {
            let assignee = assignee.as_deref().map(|a| Ntid::new(a)).transpose()?;
            tickets(&session, account.parse()?, filter.parse()?, assignee.as_ref(), json)
        }
    }
}

fn dashboard(session: &Session, json: bool) -> anyhow::Result<()> {
    let stats = session.tracker.dashboard_statistics(&session.actor)?;
    if json {
        return print_json(&stats);
    }
    let DashboardStats {
        role: _,
        total_requests,
        open_requests,
        assigned_requests,
        in_progress_requests,
        completed_requests,
        assigned_to_me,
        my_requests,
    } = stats;
    let rows = [
        ("Total", total_requests),
        ("Open", open_requests),
        ("Assigned", assigned_requests),
        ("In progress", in_progress_requests),
        ("Completed", completed_requests),
        ("Assigned to me", assigned_to_me),
        ("My requests", my_requests),
    ]
    .into_iter()
    .filter_map(|(label, n)| n.map(|n| vec![label.to_string(), n.to_string()]))
    .collect();
    print_table(&["COUNTER", "TICKETS"], rows);
    Ok(())
}

fn accounts(session: &Session, json: bool) -> anyhow::Result<()> {
    let rows = session.tracker.account_statistics(&session.actor)?;
    if json {
        return print_json(&rows);
    }
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.account_id.to_string(),
                r.account_name.clone(),
                r.total_tickets.to_string(),
                r.open_tickets.to_string(),
                r.pending_tickets.to_string(),
                r.on_hold_tickets.to_string(),
                r.resolved_tickets.to_string(),
                r.crossed_eta_tickets.to_string(),
            ]
        })
        .collect();
    print_table(
        &["ID", "ACCOUNT", "TOTAL", "OPEN", "PENDING", "ON HOLD", "RESOLVED", "CROSSED ETA"],
        table,
    );
    Ok(())
}

fn users(session: &Session, account: Option<AccountId>, json: bool) -> anyhow::Result<()> {
    let rows = match account {
        Some(account) => session.tracker.user_statistics(&session.actor, account)?,
        None => session.tracker.user_statistics_all(&session.actor)?,
    };
    if json {
        return print_json(&rows);
    }
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.ntid.to_string(),
                r.role.map(|role| role.to_string()).unwrap_or_else(|| "-".into()),
                r.total_tickets.to_string(),
                r.pending_tickets.to_string(),
                r.on_hold_tickets.to_string(),
                r.resolved_tickets.to_string(),
                r.unresolved_tickets.to_string(),
                r.crossed_eta_tickets.to_string(),
            ]
        })
        .collect();
    print_table(
        &["NTID", "ROLE", "TOTAL", "PENDING", "ON HOLD", "RESOLVED", "UNRESOLVED", "CROSSED ETA"],
        table,
    );
    Ok(())
}

fn tickets(
    session: &Session,
    account: AccountId,
    filter: StatFilter,
    assignee: Option<&Ntid>,
    json: bool,
) -> anyhow::Result<()> {
    let tickets = session
        .tracker
        .statistic_tickets(&session.actor, account, assignee, filter)?;
    if json {
        return print_json(&tickets);
    }
    if tickets.is_empty() {
        println!("No {filter} tickets for account {account}.");
        return Ok(());
    }
    let rows = tickets
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.status.to_string(),
                t.assigned_to
                    .as_ref()
                    .map(Ntid::to_string)
                    .unwrap_or_else(|| "-".to_string()),
                fmt_time(t.eta),
                t.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "ASSIGNEE", "ETA", "TITLE"], rows);
    Ok(())
}
