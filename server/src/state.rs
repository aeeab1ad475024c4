//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is cloned into every connection task. The session registry is
//! the only mutable state shared across connections; credentials and the
//! content provider are read-only collaborators behind trait objects.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::ServerConfig;
use crate::services::credentials::{CredentialStore, InMemoryCredentials};
use crate::services::provider::ContentProvider;
use crate::services::session::{IdleTimeout, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: SessionRegistry,
    pub credentials: Arc<dyn CredentialStore>,
    pub provider: Arc<dyn ContentProvider>,
    /// Signalled on every successful handshake; the query endpoint opens on
    /// the first one.
    pub authenticated: Arc<Notify>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        credentials: Arc<dyn CredentialStore>,
        provider: Arc<dyn ContentProvider>,
    ) -> Self {
        let sessions = match config.session_idle_timeout {
            Some(idle) => SessionRegistry::with_expiry(IdleTimeout(idle)),
            None => SessionRegistry::new(),
        };
        Self { config: Arc::new(config), sessions, credentials, provider, authenticated: Arc::new(Notify::new()) }
    }

    /// Built-in accounts plus any configured extras.
    #[must_use]
    pub fn credentials_from_config(config: &ServerConfig) -> InMemoryCredentials {
        let mut store = InMemoryCredentials::with_defaults();
        for (user, pass) in &config.extra_users {
            store.insert(user.clone(), pass.clone());
        }
        store
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
