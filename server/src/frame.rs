//! Frame helpers: server-side constructors over the shared `frames` codec.
//!
//! DESIGN
//! ======
//! Handlers build replies through these constructors so every outbound
//! message carries the right phase/type pair. The wire codec itself lives in
//! the `frames` crate and is shared with the CLI.

use frames::{AuthType, CodecError, Frame, QueryType};
use tokio::io::AsyncWrite;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag, attached to log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// AUTH PHASE
// =============================================================================

#[must_use]
pub fn challenge(prompt: impl Into<String>) -> Frame {
    Frame::auth(AuthType::Challenge, prompt.into())
}

#[must_use]
pub fn auth_success(token: &str) -> Frame {
    Frame::auth(AuthType::Success, token)
}

#[must_use]
pub fn auth_fail(message: impl Into<String>) -> Frame {
    Frame::auth(AuthType::Fail, message.into())
}

// =============================================================================
// QUERY PHASE
// =============================================================================

#[must_use]
pub fn query_success(payload: impl Into<Vec<u8>>) -> Frame {
    Frame::query(QueryType::Success, payload)
}

#[must_use]
pub fn query_fail(message: impl Into<String>) -> Frame {
    Frame::query(QueryType::Fail, message.into())
}

#[must_use]
pub fn query_exit(message: impl Into<String>) -> Frame {
    Frame::query(QueryType::Exit, message.into())
}

/// Failure reply for a typed error: `"<message> [<code>]"`.
#[must_use]
pub fn query_fail_from(err: &(impl ErrorCode + ?Sized)) -> Frame {
    query_fail(format!("Request failed: {err} [{}]", err.error_code()))
}

// =============================================================================
// SEND
// =============================================================================

/// Write one frame to the peer.
pub async fn send<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    frames::write_frame(writer, frame).await
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
