use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accepts `IN_PROGRESS`, `in_progress` and `in-progress` alike.
fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace('-', "_")
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map(TicketId)
            .map_err(|_| TrackerError::Validation(format!("invalid ticket id '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(AccountId)
            .map_err(|_| TrackerError::Validation(format!("invalid account id '{s}'")))
    }
}

/// A user handle. Always stored trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ntid(String);

impl Ntid {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TrackerError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        crate::paths::validate_ntid(&normalized)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ntid {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ntid::new(value)
    }
}

impl From<Ntid> for String {
    fn from(value: Ntid) -> Self {
        value.0
    }
}

impl FromStr for Ntid {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ntid::new(s)
    }
}

impl fmt::Display for Ntid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    Assigned,
    InProgress,
    OnHold,
    Completed,
    Delayed,
    Cancelled,
}

impl TicketStatus {
    pub fn all() -> &'static [TicketStatus] {
        &[
            TicketStatus::Open,
            TicketStatus::Assigned,
            TicketStatus::InProgress,
            TicketStatus::OnHold,
            TicketStatus::Completed,
            TicketStatus::Delayed,
            TicketStatus::Cancelled,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::Assigned => "ASSIGNED",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::OnHold => "ON_HOLD",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Delayed => "DELAYED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "OPEN" => Ok(TicketStatus::Open),
            "ASSIGNED" => Ok(TicketStatus::Assigned),
            "IN_PROGRESS" => Ok(TicketStatus::InProgress),
            "ON_HOLD" => Ok(TicketStatus::OnHold),
            "COMPLETED" => Ok(TicketStatus::Completed),
            "DELAYED" => Ok(TicketStatus::Delayed),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            _ => Err(TrackerError::Validation(format!("unknown status '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    ToolEnhancement,
    Adhoc,
    BugFix,
    FeatureRequest,
    Other,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::ToolEnhancement => "TOOL_ENHANCEMENT",
            RequestType::Adhoc => "ADHOC",
            RequestType::BugFix => "BUG_FIX",
            RequestType::FeatureRequest => "FEATURE_REQUEST",
            RequestType::Other => "OTHER",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "TOOL_ENHANCEMENT" => Ok(RequestType::ToolEnhancement),
            "ADHOC" => Ok(RequestType::Adhoc),
            "BUG_FIX" => Ok(RequestType::BugFix),
            "FEATURE_REQUEST" => Ok(RequestType::FeatureRequest),
            "OTHER" => Ok(RequestType::Other),
            _ => Err(TrackerError::Validation(format!(
                "unknown request type '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            _ => Err(TrackerError::Validation(format!("unknown priority '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Developer,
    Manager,
    ScrumMaster,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Developer => "DEVELOPER",
            Role::Manager => "MANAGER",
            Role::ScrumMaster => "SCRUM_MASTER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "USER" => Ok(Role::User),
            "DEVELOPER" => Ok(Role::Developer),
            "MANAGER" => Ok(Role::Manager),
            "SCRUM_MASTER" => Ok(Role::ScrumMaster),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(TrackerError::Validation(format!("unknown role '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
