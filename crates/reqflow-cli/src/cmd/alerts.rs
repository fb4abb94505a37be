use super::Session;
use crate::output::{fmt_minutes, fmt_time, print_json, print_table};
use reqflow_core::eta::AlertKind;
use std::path::Path;

pub fn run(
    root: &Path,
    as_user: Option<&str>,
    threshold: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::open(root, as_user)?;
    let alerts = session.tracker.eta_alerts(&session.actor, threshold)?;
    if json {
        return print_json(&alerts);
    }
    if alerts.is_empty() {
        println!("No tickets near or past their ETA.");
        return Ok(());
    }
    let rows = alerts
        .iter()
        .map(|a| {
            let kind = match a.kind {
                AlertKind::Approaching => "approaching",
                AlertKind::Exceeded => "EXCEEDED",
            };
            vec![
                a.ticket_id.to_string(),
                kind.to_string(),
                fmt_time(Some(a.eta)),
                fmt_minutes(a.minutes_until_eta),
                a.assigned_to
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                a.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "ALERT", "ETA", "REMAINING", "ASSIGNEE", "TITLE"], rows);
    Ok(())
}
