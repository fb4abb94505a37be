pub mod alerts;
pub mod comment;
pub mod config;
pub mod init;
pub mod serve;
pub mod stats;
pub mod ticket;

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqflow_core::directory::ActorContext;
use reqflow_core::types::Ntid;
use reqflow_core::Tracker;
use std::path::Path;

/// An opened project plus the user the command acts as.
pub struct Session {
    pub tracker: Tracker,
    pub actor: ActorContext,
}

impl Session {
    pub fn open(root: &Path, as_user: Option<&str>) -> anyhow::Result<Self> {
        let raw = as_user
            .context("no acting user: pass --as <NTID> or set REQFLOW_USER")?;
        let tracker = Tracker::open(root)
            .with_context(|| format!("failed to open project at {}", root.display()))?;
        let ntid = Ntid::new(raw)?;
        let actor = tracker.actor(&ntid)?;
        Ok(Self { tracker, actor })
    }
}

/// Accepts RFC 3339 (`2025-04-01T17:00:00Z`) or `YYYY-MM-DD HH:MM` taken as UTC.
pub fn parse_eta(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map(|t| t.and_utc())
        .with_context(|| format!("invalid ETA '{raw}': expected RFC 3339 or 'YYYY-MM-DD HH:MM'"))
}
