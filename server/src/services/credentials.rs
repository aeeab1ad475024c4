//! Credential store: username to password lookup.
//!
//! The handshake only ever asks one question: "what is the password for this
//! username, if the user exists?". Backing stores implement that single
//! capability so the state machine never knows where accounts live.

use std::collections::HashMap;

/// Accounts every server starts with.
pub const DEFAULT_ACCOUNTS: [(&str, &str); 3] = [("Abdul", "1232abc"), ("Kuze", "1357"), ("Zeyd", "12345")];

pub trait CredentialStore: Send + Sync {
    /// Stored password for `username`, `None` when the user is unknown.
    fn lookup(&self, username: &str) -> Option<String>;
}

/// In-memory accounts keyed by exact username.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    accounts: HashMap<String, String>,
}

impl InMemoryCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with [`DEFAULT_ACCOUNTS`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for (user, pass) in DEFAULT_ACCOUNTS {
            store.insert(user, pass);
        }
        store
    }

    /// Add or replace an account.
    pub fn insert(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.accounts.insert(username.into(), password.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }
}

impl CredentialStore for InMemoryCredentials {
    fn lookup(&self, username: &str) -> Option<String> {
        self.accounts.get(username).cloned()
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
