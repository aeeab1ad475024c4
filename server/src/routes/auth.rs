//! Authentication endpoint: server side of the challenge/response handshake.
//!
//! LIFECYCLE
//! =========
//! 1. `AwaitingUsername`: wait up to `password_timeout` for one `Auth/Request`.
//!    Timeout or unknown user -> `Fail`, done.
//! 2. `AwaitingPassword`: send `Challenge`, wait up to `password_timeout` for
//!    the next `Auth/Request`.
//!    - timeout -> `Fail`, drain one more frame, done
//!    - match -> issue token bound to the peer, `Success`, done
//!    - mismatch -> retry with a failure prefix until `max_auth_attempts`
//!
//! Every terminal state closes the connection; a client that failed must
//! reconnect and start again.

use std::net::SocketAddr;

use frames::{AuthType, CodecError, Frame};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::frame::{self, ErrorCode};
use crate::services::session::{Binding, Session};
use crate::state::AppState;

pub const NO_SUCH_USER_MESSAGE: &str = "No such user. Authentication failed";
pub const PASSWORD_PROMPT: &str = "Enter Your password:";
pub const USERNAME_TIMEOUT_MESSAGE: &str = "Disconnected: Username timeout";
pub const PASSWORD_TIMEOUT_MESSAGE: &str = "Disconnected: Password timeout";
pub const TOO_MANY_ATTEMPTS_MESSAGE: &str =
    "Authentication failed: Too many unsuccessful attempts to authenticate connection";
pub const UNEXPECTED_FRAME_MESSAGE: &str = "Authentication failed: Unexpected frame";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No such user")]
    Rejected { username: String },
    #[error("Handshake timeout")]
    Timeout,
    #[error("Too many failed attempts to connect")]
    AttemptsExceeded,
    #[error("Unexpected frame during handshake")]
    UnexpectedFrame,
    #[error("Framing error: {0}")]
    Framing(#[from] CodecError),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "E_AUTH_REJECTED",
            Self::Timeout => "E_AUTH_TIMEOUT",
            Self::AttemptsExceeded => "E_AUTH_ATTEMPTS_EXCEEDED",
            Self::UnexpectedFrame => "E_AUTH_UNEXPECTED_FRAME",
            Self::Framing(_) => "E_FRAMING",
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Run the handshake on one accepted connection and log how it ended.
pub async fn handle_auth_connection<S>(mut stream: S, peer: SocketAddr, state: AppState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "auth: client connected");
    match authenticate(&mut stream, peer, &state).await {
        Ok(session) => {
            info!(
                peer_addr = %peer.ip(),
                peer_port = peer.port(),
                username = %session.username,
                active_sessions = state.sessions.len(),
                "auth: complete"
            );
            state.authenticated.notify_one();
        }
        Err(e) => {
            warn!(
                peer_addr = %peer.ip(),
                peer_port = peer.port(),
                reason = %e,
                code = e.error_code(),
                "auth: client disconnected"
            );
        }
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

enum AuthState {
    AwaitingUsername,
    AwaitingPassword { username: String, password: String, attempts: u32 },
}

/// Drive the handshake to a terminal state. On success the session is
/// already recorded in the registry and the token has been sent.
pub async fn authenticate<S>(stream: &mut S, peer: SocketAddr, state: &AppState) -> Result<Session, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = &state.config;
    let mut current = AuthState::AwaitingUsername;

    loop {
        current = match current {
            AuthState::AwaitingUsername => {
                let Ok(request) = timeout(config.password_timeout, read_request(stream)).await else {
                    frame::send(stream, &frame::auth_fail(USERNAME_TIMEOUT_MESSAGE)).await?;
                    return Err(AuthError::Timeout);
                };
                let username = request?.text();
                let Some(password) = state.credentials.lookup(&username) else {
                    frame::send(stream, &frame::auth_fail(NO_SUCH_USER_MESSAGE)).await?;
                    return Err(AuthError::Rejected { username });
                };
                AuthState::AwaitingPassword { username, password, attempts: 0 }
            }
            AuthState::AwaitingPassword { username, password, attempts } => {
                let prompt = format!("{}{PASSWORD_PROMPT}", failure_prefix(attempts, config.max_auth_attempts));
                frame::send(stream, &frame::challenge(prompt)).await?;

                let Ok(reply) = timeout(config.password_timeout, read_request(stream)).await else {
                    frame::send(stream, &frame::auth_fail(PASSWORD_TIMEOUT_MESSAGE)).await?;
                    // Drain the reply the client may still send to the old prompt.
                    let _ = timeout(config.password_timeout, frames::read_frame(stream)).await;
                    return Err(AuthError::Timeout);
                };

                if reply?.text() == password {
                    let session = state.sessions.issue(&username, Binding::from(peer), config.auth_token_length);
                    frame::send(stream, &frame::auth_success(&session.token)).await?;
                    return Ok(session);
                }

                let attempts = attempts + 1;
                if attempts >= config.max_auth_attempts {
                    frame::send(stream, &frame::auth_fail(TOO_MANY_ATTEMPTS_MESSAGE)).await?;
                    return Err(AuthError::AttemptsExceeded);
                }
                AuthState::AwaitingPassword { username, password, attempts }
            }
        };
    }
}

/// Read the next frame, requiring it to be an `Auth/Request`.
async fn read_request<S>(stream: &mut S) -> Result<Frame, AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = frames::read_frame(stream).await?;
    if request.auth_type() == Some(AuthType::Request) {
        return Ok(request);
    }
    frame::send(stream, &frame::auth_fail(UNEXPECTED_FRAME_MESSAGE)).await?;
    Err(AuthError::UnexpectedFrame)
}

/// `"Incorrect password | N attempt(s) left | "` once at least one attempt
/// has failed, empty before that.
#[must_use]
pub fn failure_prefix(attempts: u32, max_attempts: u32) -> String {
    if attempts == 0 {
        return String::new();
    }
    let left = max_attempts.saturating_sub(attempts);
    let plural = if left == 1 { "" } else { "s" };
    format!("Incorrect password | {left} attempt{plural} left | ")
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
