use super::{parse_eta, Session};
use crate::output::{fmt_minutes, fmt_time, print_json, print_table};
use clap::Subcommand;
use reqflow_core::ticket::{NewTicket, Ticket, TicketEdit};
use reqflow_core::tracker::ListFilter;
use reqflow_core::types::{AccountId, Ntid, Priority, RequestType, TicketId, TicketStatus};
use std::path::Path;

#[derive(Subcommand)]
pub enum TicketSubcommand {
    /// File a new ticket
    Create {
        #[arg(long)]
        title: String,
        /// TOOL_ENHANCEMENT, ADHOC, BUG_FIX, FEATURE_REQUEST or OTHER
        #[arg(long = "type", value_name = "TYPE")]
        request_type: String,
        /// LOW, MEDIUM, HIGH or URGENT
        #[arg(long)]
        priority: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List tickets visible to the acting user, newest first
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long = "type", value_name = "TYPE")]
        request_type: Option<String>,
        #[arg(long)]
        account: Option<String>,
    },
    /// Show one ticket
    Show { id: String },
    /// Change title, description, type or priority
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Pass an empty string to clear the description
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type", value_name = "TYPE")]
        request_type: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Assign an OPEN ticket to a developer with an ETA
    Assign {
        id: String,
        assignee: String,
        /// RFC 3339 or 'YYYY-MM-DD HH:MM' (UTC)
        #[arg(long)]
        eta: String,
    },
    /// Move a ticket to another status
    Status {
        id: String,
        status: String,
        /// Optional remark recorded on the ticket thread
        #[arg(long)]
        comment: Option<String>,
    },
    /// Revise the ETA of an assigned ticket
    Eta {
        id: String,
        eta: String,
        #[arg(long)]
        reason: String,
        /// Comment text to record instead of the generated one
        #[arg(long)]
        comment: Option<String>,
    },
    /// Cancel an assigned ticket
    Cancel {
        id: String,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Delete a ticket with its comments and ETA history
    Delete { id: String },
    /// Show queue times and ETA state
    Timers { id: String },
    /// Show the ETA revision history
    History { id: String },
}

pub fn run(
    root: &Path,
    as_user: Option<&str>,
    subcmd: TicketSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::open(root, as_user)?;
    match subcmd {
        TicketSubcommand::Create {
            title,
            request_type,
            priority,
            account,
            description,
        } => {
            let input = NewTicket {
                title,
                description,
                request_type: request_type.parse()?,
                priority: priority.parse()?,
                account_id: account.parse()?,
            };
            let ticket = session.tracker.create_ticket(&session.actor, input)?;
            report(&ticket, "Created", json)
        }
        TicketSubcommand::List {
            status,
            priority,
            request_type,
            account,
        } => {
            let filter = ListFilter {
                status: status.as_deref().map(str::parse::<TicketStatus>).transpose()?,
                priority: priority.as_deref().map(str::parse::<Priority>).transpose()?,
                request_type: request_type
                    .as_deref()
                    .map(str::parse::<RequestType>)
                    .transpose()?,
                account_id: account.as_deref().map(str::parse::<AccountId>).transpose()?,
            };
            list(&session, &filter, json)
        }
        TicketSubcommand::Show { id } => {
            let ticket = session.tracker.get_ticket(&session.actor, id.parse()?)?;
            show(&ticket, json)
        }
        TicketSubcommand::Edit {
            id,
            title,
            description,
            request_type,
            priority,
        } => {
            let edit = TicketEdit {
                title,
                description,
                request_type: request_type.as_deref().map(str::parse).transpose()?,
                priority: priority.as_deref().map(str::parse).transpose()?,
            };
            if edit.is_empty() {
                anyhow::bail!("nothing to edit: pass --title, --description, --type or --priority");
            }
            let ticket = session.tracker.edit_ticket(&session.actor, id.parse()?, edit)?;
            report(&ticket, "Updated", json)
        }
        TicketSubcommand::Assign { id, assignee, eta } => {
            let ticket = session.tracker.assign_ticket(
                &session.actor,
                id.parse()?,
                &Ntid::new(&assignee)?,
                parse_eta(&eta)?,
            )?;
            report(&ticket, "Assigned", json)
        }
        TicketSubcommand::Status { id, status, comment } => {
            let ticket = session.tracker.update_status(
                &session.actor,
                id.parse()?,
                status.parse()?,
                comment.as_deref(),
            )?;
            report(&ticket, "Updated", json)
        }
        TicketSubcommand::Eta {
            id,
            eta,
            reason,
            comment,
        } => {
            let ticket = session.tracker.update_eta(
                &session.actor,
                id.parse()?,
                parse_eta(&eta)?,
                &reason,
                comment.as_deref(),
            )?;
            report(&ticket, "Revised ETA of", json)
        }
        TicketSubcommand::Cancel { id, comment } => {
            let ticket =
                session
                    .tracker
                    .cancel_ticket(&session.actor, id.parse()?, comment.as_deref())?;
            report(&ticket, "Cancelled", json)
        }
        TicketSubcommand::Delete { id } => {
            let id: TicketId = id.parse()?;
            session.tracker.delete_ticket(&session.actor, id)?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))
            } else {
                println!("Deleted ticket {id}");
                Ok(())
            }
        }
        TicketSubcommand::Timers { id } => timers(&session, id.parse()?, json),
        TicketSubcommand::History { id } => history(&session, id.parse()?, json),
    }
}

fn report(ticket: &Ticket, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(ticket);
    }
    println!("{verb} ticket {} [{}]: {}", ticket.id, ticket.status, ticket.title);
    Ok(())
}

fn list(session: &Session, filter: &ListFilter, json: bool) -> anyhow::Result<()> {
    let tickets = session.tracker.list_tickets(&session.actor, filter)?;
    if json {
        return print_json(&tickets);
    }
    if tickets.is_empty() {
        println!("No tickets.");
        return Ok(());
    }
    let rows = tickets
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.status.to_string(),
                t.priority.to_string(),
                t.request_type.to_string(),
                t.account_id.to_string(),
                t.assigned_to
                    .as_ref()
                    .map(Ntid::to_string)
                    .unwrap_or_else(|| "-".to_string()),
                fmt_time(t.eta),
                t.title.clone(),
            ]
        })
        .collect();
    print_table(
        &["ID", "STATUS", "PRIORITY", "TYPE", "ACCOUNT", "ASSIGNEE", "ETA", "TITLE"],
        rows,
    );
    Ok(())
}

fn show(t: &Ticket, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(t);
    }
    println!("{} {}", t.id, t.title);
    println!("  status:    {}", t.status);
    println!("  type:      {}", t.request_type);
    println!("  priority:  {}", t.priority);
    println!("  account:   {}", t.account_id);
    println!("  creator:   {}", t.created_by);
    if let Some(assignee) = &t.assigned_to {
        let by = t
            .assigned_by
            .as_ref()
            .map(|b| format!(" (by {b})"))
            .unwrap_or_default();
        println!("  assignee:  {assignee}{by}");
        println!("  assigned:  {}", fmt_time(t.assigned_at));
    }
    println!("  eta:       {}", fmt_time(t.eta));
    println!("  created:   {}", fmt_time(Some(t.created_at)));
    println!("  updated:   {}", fmt_time(Some(t.updated_at)));
    if let Some(desc) = &t.description {
        println!();
        println!("{desc}");
    }
    Ok(())
}

fn timers(session: &Session, id: TicketId, json: bool) -> anyhow::Result<()> {
    let timers = session.tracker.timers(&session.actor, id)?;
    if json {
        return print_json(&timers);
    }
    println!("Ticket {}", timers.ticket_id);
    println!("  open queue:       {}", fmt_minutes(timers.open_queue_minutes));
    if let Some(m) = timers.developer_queue_minutes {
        println!("  developer queue:  {}", fmt_minutes(m));
    }
    if let Some(m) = timers.minutes_until_eta {
        let state = if timers.eta_exceeded {
            " (exceeded)"
        } else if timers.eta_approaching {
            " (approaching)"
        } else {
            ""
        };
        println!("  until eta:        {}{state}", fmt_minutes(m));
    }
    Ok(())
}

fn history(session: &Session, id: TicketId, json: bool) -> anyhow::Result<()> {
    let revisions = session.tracker.list_eta_revisions(&session.actor, id)?;
    if json {
        return print_json(&revisions);
    }
    if revisions.is_empty() {
        println!("No ETA revisions for ticket {id}.");
        return Ok(());
    }
    let rows = revisions
        .iter()
        .map(|r| {
            vec![
                fmt_time(Some(r.revised_at)),
                r.revised_by.to_string(),
                fmt_time(r.previous_eta),
                fmt_time(Some(r.new_eta)),
                r.reason.clone(),
            ]
        })
        .collect();
    print_table(&["WHEN", "BY", "FROM", "TO", "REASON"], rows);
    Ok(())
}
