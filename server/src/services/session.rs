//! Session registry: token issuance and peer binding.
//!
//! ARCHITECTURE
//! ============
//! A successful handshake issues an opaque token bound to the `(ip, port)`
//! the handshake arrived from. Every query-phase request presents that token
//! and is accepted only from the exact same binding. This is a coarse
//! anti-hijacking check, not a cryptographic one.
//!
//! TRADE-OFFS
//! ==========
//! The registry is a single `Mutex<HashMap>` shared by every connection task.
//! Lookup, binding comparison and expiry check run under one lock
//! acquisition, so a token can never be validated against a binding that is
//! replaced mid-check. Contention is irrelevant at this protocol's scale.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use sha2::{Digest, Sha256};

/// Shortest token ever issued, whatever the username length.
pub const MIN_TOKEN_LEN: usize = 32;

/// Longest token; one hex-encoded SHA-256 digest.
pub const MAX_TOKEN_LEN: usize = 64;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Token length for `username`: `chars * factor`, clamped to
/// [`MIN_TOKEN_LEN`]..=[`MAX_TOKEN_LEN`].
#[must_use]
pub fn token_len(username: &str, factor: usize) -> usize {
    username
        .chars()
        .count()
        .saturating_mul(factor)
        .clamp(MIN_TOKEN_LEN, MAX_TOKEN_LEN)
}

/// Generate a hex token: SHA-256 over the username and 32 random bytes.
#[must_use]
pub fn generate_token(username: &str, factor: usize) -> String {
    let salt: [u8; 32] = rand::rng().random();
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(salt);
    let mut token = bytes_to_hex(&hasher.finalize());
    token.truncate(token_len(username, factor));
    token
}

// =============================================================================
// BINDING / SESSION
// =============================================================================

/// Remote endpoint a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub addr: IpAddr,
    pub port: u16,
}

impl From<SocketAddr> for Binding {
    fn from(peer: SocketAddr) -> Self {
        Self { addr: peer.ip(), port: peer.port() }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.addr, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub binding: Binding,
    pub issued_at: Instant,
    /// Refreshed on every successful validation.
    pub last_seen: Instant,
}

// =============================================================================
// EXPIRY
// =============================================================================

/// Decides whether a stored session is still usable.
pub trait ExpiryPolicy: Send + Sync {
    fn is_expired(&self, session: &Session, now: Instant) -> bool;
}

/// Sessions live until revoked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl ExpiryPolicy for NeverExpire {
    fn is_expired(&self, _session: &Session, _now: Instant) -> bool {
        false
    }
}

/// Sessions expire once idle for longer than the wrapped duration.
#[derive(Debug, Clone, Copy)]
pub struct IdleTimeout(pub Duration);

impl ExpiryPolicy for IdleTimeout {
    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_seen) > self.0
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, Session>>>,
    expiry: Arc<dyn ExpiryPolicy>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_expiry(NeverExpire)
    }

    #[must_use]
    pub fn with_expiry(policy: impl ExpiryPolicy + 'static) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), expiry: Arc::new(policy) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh token for `username`, bind it to `binding` and record it.
    /// Expired sessions are swept first; re-rolls on the (unlikely) collision
    /// with a live token.
    pub fn issue(&self, username: &str, binding: Binding, factor: usize) -> Session {
        self.issue_at(username, binding, factor, Instant::now())
    }

    fn issue_at(&self, username: &str, binding: Binding, factor: usize, now: Instant) -> Session {
        let mut sessions = self.lock();
        sessions.retain(|_, session| !self.expiry.is_expired(session, now));
        let token = loop {
            let candidate = generate_token(username, factor);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Session {
            token: token.clone(),
            username: username.to_string(),
            binding,
            issued_at: now,
            last_seen: now,
        };
        sessions.insert(token, session.clone());
        session
    }

    /// Record a binding for an externally generated token, replacing any
    /// previous one.
    pub fn put(&self, token: impl Into<String>, username: impl Into<String>, binding: Binding) {
        let now = Instant::now();
        let token = token.into();
        let session = Session { token: token.clone(), username: username.into(), binding, issued_at: now, last_seen: now };
        self.lock().insert(token, session);
    }

    /// True only if `token` exists, has not expired, and is bound to exactly
    /// `binding`. An expired session is removed on the way out.
    pub fn validate(&self, token: &str, binding: Binding) -> bool {
        self.validate_at(token, binding, Instant::now())
    }

    fn validate_at(&self, token: &str, binding: Binding, now: Instant) -> bool {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(token) else {
            return false;
        };
        if self.expiry.is_expired(session, now) {
            sessions.remove(token);
            return false;
        }
        if session.binding != binding {
            return false;
        }
        session.last_seen = now;
        true
    }

    #[must_use]
    pub fn session(&self, token: &str) -> Option<Session> {
        self.lock().get(token).cloned()
    }

    /// Most recently issued session bound to `binding`.
    #[must_use]
    pub fn find_by_peer(&self, binding: Binding) -> Option<Session> {
        self.lock()
            .values()
            .filter(|s| s.binding == binding)
            .max_by_key(|s| s.issued_at)
            .cloned()
    }

    pub fn revoke(&self, token: &str) -> Option<Session> {
        self.lock().remove(token)
    }

    /// Drop every session bound to `binding`; returns how many were removed.
    pub fn revoke_binding(&self, binding: Binding) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.binding != binding);
        before - sessions.len()
    }

    /// Live and not-yet-swept sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
