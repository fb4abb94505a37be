use crate::error::{Result, TrackerError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const REQFLOW_DIR: &str = ".reqflow";

pub const CONFIG_FILE: &str = ".reqflow/config.yaml";
pub const ACCOUNTS_FILE: &str = ".reqflow/accounts.yaml";
pub const USERS_FILE: &str = ".reqflow/users.yaml";
pub const DEFAULT_STORE_FILE: &str = ".reqflow/tickets.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn reqflow_dir(root: &Path) -> PathBuf {
    root.join(REQFLOW_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn accounts_path(root: &Path) -> PathBuf {
    root.join(ACCOUNTS_FILE)
}

pub fn users_path(root: &Path) -> PathBuf {
    root.join(USERS_FILE)
}

/// Resolve a configured store path; relative paths are taken from the project root.
pub fn store_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

// ---------------------------------------------------------------------------
// Handle validation
// ---------------------------------------------------------------------------

static NTID_RE: OnceLock<Regex> = OnceLock::new();

fn ntid_re() -> &'static Regex {
    NTID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9._\-]*$").unwrap())
}

/// Handles are compared in their normalized (trimmed, lower-case) form.
pub fn validate_ntid(ntid: &str) -> Result<()> {
    if ntid.is_empty() || ntid.len() > 64 || !ntid_re().is_match(ntid) {
        return Err(TrackerError::Validation(format!(
            "invalid user handle '{ntid}': must be alphanumeric with '.', '_' or '-'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_handles() {
        for ntid in ["jdoe", "a", "j.doe", "dev_42", "x-1"] {
            validate_ntid(ntid).unwrap_or_else(|_| panic!("expected valid: {ntid}"));
        }
    }

    #[test]
    fn invalid_handles() {
        for ntid in ["", "-dash", "has space", "UPPER", ".dot"] {
            assert!(validate_ntid(ntid).is_err(), "expected invalid: {ntid}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.reqflow/config.yaml")
        );
        assert_eq!(
            users_path(root),
            PathBuf::from("/tmp/proj/.reqflow/users.yaml")
        );
        assert_eq!(
            store_path(root, Path::new(DEFAULT_STORE_FILE)),
            PathBuf::from("/tmp/proj/.reqflow/tickets.redb")
        );
        assert_eq!(
            store_path(root, Path::new("/var/lib/reqflow.redb")),
            PathBuf::from("/var/lib/reqflow.redb")
        );
    }
}
