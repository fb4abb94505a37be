use crate::types::{AccountId, TicketId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("not initialized: run 'reqflow init'")]
    NotInitialized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized to {action}: {reason}")]
    Unauthorized { action: String, reason: String },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Machine-readable error category carried next to every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    InvalidTransition,
    NotFound,
    Conflict,
    StoreUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::NotInitialized | TrackerError::Validation(_) => ErrorKind::Validation,
            TrackerError::Unauthorized { .. } => ErrorKind::Authorization,
            TrackerError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            TrackerError::TicketNotFound(_)
            | TrackerError::AccountNotFound(_)
            | TrackerError::UserNotFound(_) => ErrorKind::NotFound,
            TrackerError::Conflict(_) => ErrorKind::Conflict,
            TrackerError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            TrackerError::Io(_) | TrackerError::Yaml(_) | TrackerError::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Only lost races and transient store failures are worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::StoreUnavailable
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }

    pub(crate) fn store(err: impl fmt::Display) -> Self {
        TrackerError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_and_store_errors_are_retryable() {
        assert!(TrackerError::Conflict("lost race".into()).is_retryable());
        assert!(TrackerError::StoreUnavailable("timeout".into()).is_retryable());
        assert!(!TrackerError::Validation("empty title".into()).is_retryable());
        assert!(!TrackerError::TicketNotFound(TicketId(4)).is_retryable());
        assert!(!TrackerError::Unauthorized {
            action: "delete ticket".into(),
            reason: "not the creator".into(),
        }
        .is_retryable());
    }

    #[test]
    fn kinds_cover_not_found_variants() {
        assert_eq!(TrackerError::TicketNotFound(TicketId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(TrackerError::AccountNotFound(AccountId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(TrackerError::UserNotFound("x".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_transition_message_names_current_state() {
        let err = TrackerError::InvalidTransition {
            from: "COMPLETED".into(),
            to: "IN_PROGRESS".into(),
            reason: "ticket is closed".into(),
        };
        assert!(err.to_string().contains("from COMPLETED"));
        assert_eq!(err.kind().as_str(), "invalid_transition");
    }
}
