//! Query endpoint: token-checked request loop.
//!
//! DESIGN
//! ======
//! After a welcome banner, every inbound frame carries the session token
//! (optionally followed by an argument) and is validated against the
//! registry with this connection's peer binding before anything else
//! happens. `dispatch` is pure request handling and returns an `Outcome`;
//! the loop owns all socket writes.
//!
//! ERROR HANDLING
//! ==============
//! - Invalid token: `Exit` frame, connection closed.
//! - Provider failure, timeout or an image too large for one frame: `Fail`
//!   frame, session continues.
//! - Unknown type code: `Fail` frame, session continues.
//! - Framing error: connection closed, nothing else affected.
//!
//! However the connection ends, sessions bound to its peer are revoked.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use frames::{CodecError, Frame, QueryType};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::frame::{self, ErrorCode};
use crate::services::provider::{self, ProviderError};
use crate::services::session::Binding;
use crate::state::AppState;

pub const INVALID_TOKEN_MESSAGE: &str = "INVALID TOKEN, Disconnecting from server...";
pub const DISCONNECT_MESSAGE: &str = "Disconnected from the server.";
pub const UNSUPPORTED_MESSAGE: &str = "Unsupported request type";
pub const MISSING_DATE_MESSAGE: &str = "Missing date";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Framing error: {0}")]
    Framing(#[from] CodecError),
}

impl ErrorCode for QueryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "E_INVALID_TOKEN",
            Self::Framing(_) => "E_FRAMING",
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// What the loop does with a handled request.
enum Outcome {
    /// Send and keep reading.
    Reply(Frame),
    /// Send, then end the session at the client's request.
    Exit(Frame),
    /// Send, then drop the connection.
    Reject(Frame),
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Serve one query connection and log how it ended.
pub async fn handle_query_connection<S>(mut stream: S, peer: SocketAddr, state: AppState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "query: client connected");
    let outcome = serve_queries(&mut stream, peer, &state).await;
    let revoked = state.sessions.revoke_binding(Binding::from(peer));
    let active_sessions = state.sessions.len();
    match outcome {
        Ok(()) => {
            info!(
                peer_addr = %peer.ip(),
                peer_port = peer.port(),
                reason = "Client request",
                revoked,
                active_sessions,
                "query: client disconnected"
            );
        }
        Err(e) => {
            warn!(
                peer_addr = %peer.ip(),
                peer_port = peer.port(),
                reason = %e,
                code = e.error_code(),
                revoked,
                active_sessions,
                "query: client disconnected"
            );
        }
    }
}

/// Welcome, then handle requests until exit, rejection or stream failure.
pub async fn serve_queries<S>(stream: &mut S, peer: SocketAddr, state: &AppState) -> Result<(), QueryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let binding = Binding::from(peer);
    let username = state.sessions.find_by_peer(binding).map(|s| s.username);
    frame::send(stream, &frame::query_success(welcome_message(username.as_deref()))).await?;

    loop {
        let request = frames::read_frame(stream).await?;
        match dispatch(state, binding, &request).await {
            Outcome::Reply(reply) => frame::send(stream, &reply).await?,
            Outcome::Exit(reply) => {
                frame::send(stream, &reply).await?;
                return Ok(());
            }
            Outcome::Reject(reply) => {
                frame::send(stream, &reply).await?;
                return Err(QueryError::InvalidToken);
            }
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

async fn dispatch(state: &AppState, binding: Binding, request: &Frame) -> Outcome {
    let (token, argument) = frames::split_query_payload(&request.payload);
    if !state.sessions.validate(&token, binding) {
        return Outcome::Reject(frame::query_exit(INVALID_TOKEN_MESSAGE));
    }

    let deadline = provider_deadline(state);
    match request.query_type() {
        Some(QueryType::Image) => {
            if argument.is_empty() {
                return Outcome::Reply(frame::query_fail(MISSING_DATE_MESSAGE));
            }
            let image = with_deadline(deadline, state.provider.fetch_image(&argument))
                .await
                .and_then(|bytes| provider::check_image_size(bytes.len()).map(|()| bytes));
            match image {
                Ok(bytes) => Outcome::Reply(frame::query_success(bytes)),
                Err(e) => Outcome::Reply(provider_failure(binding, "image", &e)),
            }
        }
        Some(QueryType::Weather) => match with_deadline(deadline, state.provider.fetch_weather_sample()).await {
            Ok(text) => Outcome::Reply(frame::query_success(text)),
            Err(e) => Outcome::Reply(provider_failure(binding, "weather", &e)),
        },
        Some(QueryType::Exit) => {
            state.sessions.revoke(&token);
            Outcome::Exit(frame::query_exit(DISCONNECT_MESSAGE))
        }
        Some(QueryType::Success | QueryType::Fail) | None => {
            warn!(%binding, phase = ?request.phase, code = request.code, "query: unsupported request type");
            Outcome::Reply(frame::query_fail(UNSUPPORTED_MESSAGE))
        }
    }
}

/// Upper bound on one provider call; an image query makes two upstream
/// requests.
fn provider_deadline(state: &AppState) -> Duration {
    state.config.provider.request_timeout.saturating_mul(2)
}

async fn with_deadline<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout(limit)))
}

fn provider_failure(binding: Binding, query: &'static str, err: &ProviderError) -> Frame {
    warn!(%binding, query, error = %err, code = err.error_code(), retryable = err.retryable(), "query: provider failed");
    frame::query_fail_from(err)
}

/// Banner sent when a query connection opens.
#[must_use]
pub fn welcome_message(username: Option<&str>) -> String {
    let rule = "-".repeat(72);
    let greeting = match username {
        Some(name) => format!("Hello {name}, welcome to the StratoNet server!"),
        None => "Welcome to the StratoNet server!".to_string(),
    };
    format!(
        "{rule}\n| {greeting}\n{rule}\n\
         | You have access to the following queries:\n\
         | 1) To get the weather on Mars type \"weather\"\n\
         | 2) To get the image of the day type its date as yyyy-mm-dd\n\
         | 3) To disconnect from the server type \"disconnect\"\n\
         {rule}"
    )
}

#[cfg(test)]
#[path = "query_test.rs"]
mod tests;
