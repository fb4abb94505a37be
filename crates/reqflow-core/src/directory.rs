//! Read-only lookups for accounts and users.
//!
//! The tracker never owns accounts or users; it resolves them by id through a
//! [`Directory`]. `YamlDirectory` reads `.reqflow/accounts.yaml` and
//! `.reqflow/users.yaml`, `MemoryDirectory` is built in code.

use crate::error::{Result, TrackerError};
use crate::types::{AccountId, Ntid, Role};
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub ntid: Ntid,
    pub email: String,
    pub role: Role,
    pub account_id: AccountId,
    /// Accounts a scrum master oversees. Empty means "own account only".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handled_accounts: Vec<AccountId>,
    #[serde(default = "default_true")]
    pub active: bool,
}

pub trait Directory: Send + Sync {
    fn account(&self, id: AccountId) -> Result<Option<Account>>;
    fn accounts(&self) -> Result<Vec<Account>>;
    fn user(&self, ntid: &Ntid) -> Result<Option<User>>;
    fn users(&self) -> Result<Vec<User>>;
}

// ---------------------------------------------------------------------------
// ActorContext
// ---------------------------------------------------------------------------

/// The identity every tracker call is made on behalf of.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorContext {
    pub ntid: Ntid,
    pub role: Role,
    pub account_id: AccountId,
    pub overseen_accounts: Vec<AccountId>,
    pub active: bool,
}

impl ActorContext {
    pub fn from_user(user: &User) -> Self {
        let overseen_accounts = if user.handled_accounts.is_empty() {
            vec![user.account_id]
        } else {
            user.handled_accounts.clone()
        };
        Self {
            ntid: user.ntid.clone(),
            role: user.role,
            account_id: user.account_id,
            overseen_accounts,
            active: user.active,
        }
    }

    pub fn oversees(&self, account: AccountId) -> bool {
        self.overseen_accounts.contains(&account)
    }
}

pub fn resolve_actor(dir: &dyn Directory, ntid: &Ntid) -> Result<ActorContext> {
    dir.user(ntid)?
        .map(|u| ActorContext::from_user(&u))
        .ok_or_else(|| TrackerError::UserNotFound(ntid.to_string()))
}

// ---------------------------------------------------------------------------
// MemoryDirectory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    accounts: BTreeMap<AccountId, Account>,
    users: BTreeMap<Ntid, User>,
}

impl MemoryDirectory {
    pub fn new(accounts: Vec<Account>, users: Vec<User>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            users: users.into_iter().map(|u| (u.ntid.clone(), u)).collect(),
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.insert(account.id, account);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.ntid.clone(), user);
        self
    }
}

impl Directory for MemoryDirectory {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.get(&id).cloned())
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.values().cloned().collect())
    }

    fn user(&self, ntid: &Ntid) -> Result<Option<User>> {
        Ok(self.users.get(ntid).cloned())
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// YamlDirectory
// ---------------------------------------------------------------------------

/// Snapshot of the project's directory files, loaded once.
#[derive(Debug, Clone)]
pub struct YamlDirectory {
    inner: MemoryDirectory,
}

impl YamlDirectory {
    pub fn load(root: &Path) -> Result<Self> {
        let accounts: Vec<Account> = io::read_yaml_list(&paths::accounts_path(root))?;
        let users: Vec<User> = io::read_yaml_list(&paths::users_path(root))?;

        let mut seen = std::collections::HashSet::new();
        for user in &users {
            if !seen.insert(user.ntid.clone()) {
                return Err(TrackerError::validation(format!(
                    "duplicate user '{}' in {}",
                    user.ntid,
                    paths::USERS_FILE
                )));
            }
        }

        tracing::debug!(
            accounts = accounts.len(),
            users = users.len(),
            "loaded directory"
        );
        Ok(Self {
            inner: MemoryDirectory::new(accounts, users),
        })
    }
}

impl Directory for YamlDirectory {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        self.inner.account(id)
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        self.inner.accounts()
    }

    fn user(&self, ntid: &Ntid) -> Result<Option<User>> {
        self.inner.user(ntid)
    }

    fn users(&self) -> Result<Vec<User>> {
        self.inner.users()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
