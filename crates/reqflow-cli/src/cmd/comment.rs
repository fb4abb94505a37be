use super::Session;
use crate::output::{fmt_time, print_json};
use clap::Subcommand;
use reqflow_core::types::TicketId;
use std::path::Path;

#[derive(Subcommand)]
pub enum CommentSubcommand {
    /// Add a comment to a ticket
    Add { id: String, text: String },
    /// List a ticket's comments, oldest first
    List { id: String },
}

pub fn run(
    root: &Path,
    as_user: Option<&str>,
    subcmd: CommentSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::open(root, as_user)?;
    match subcmd {
        CommentSubcommand::Add { id, text } => add(&session, id.parse()?, &text, json),
        CommentSubcommand::List { id } => list(&session, id.parse()?, json),
    }
}

fn add(session: &Session, id: TicketId, text: &str, json: bool) -> anyhow::Result<()> {
    let comment = session.tracker.add_comment(&session.actor, id, text)?;
    if json {
        return print_json(&comment);
    }
    println!("Added comment to ticket {id}");
    Ok(())
}

fn list(session: &Session, id: TicketId, json: bool) -> anyhow::Result<()> {
    let comments = session.tracker.list_comments(&session.actor, id)?;
    if json {
        return print_json(&comments);
    }
    if comments.is_empty() {
        println!("No comments for ticket {id}.");
        return Ok(());
    }
    for c in &comments {
        let tag = if c.is_eta_change() { " [eta]" } else { "" };
        println!("{} {}{tag}", fmt_time(Some(c.created_at)), c.author);
        for line in c.body.lines() {
            println!("    {line}");
        }
    }
    Ok(())
}
