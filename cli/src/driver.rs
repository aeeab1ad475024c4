//! Client side of the StratoNet protocol.
//!
//! LIFECYCLE
//! =========
//! 1. Connect to the auth endpoint, send the username, answer every
//!    `Challenge` with a password line until `Success` or `Fail`.
//! 2. Close the auth connection and reconnect to the query endpoint from the
//!    same local address; the server binds the token to that address.
//! 3. Print the welcome banner, then classify each input line and send it
//!    with the token until the server answers with `Exit`.

use std::net::SocketAddr;
use std::time::Duration;

use frames::{AuthType, Frame, QueryType};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};

use crate::CliError;
use crate::console::{Console, ImageSink};

pub const INVALID_QUERY_MESSAGE: &str = "Invalid query, try again";
pub const REQUEST_PROMPT: &str = "Enter a request:";

/// The server's answer to an accepted `disconnect`. Any other `Exit` reply
/// means the session was refused.
pub const DISCONNECT_REPLY: &str = "Disconnected from the server.";

/// Connection attempts made against the query endpoint, which the server
/// opens only after its first successful handshake.
const QUERY_CONNECT_ATTEMPTS: u32 = 10;
const QUERY_CONNECT_BACKOFF: Duration = Duration::from_millis(100);

/// Where to reach the server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth: SocketAddr,
    pub query: SocketAddr,
}

// =============================================================================
// SESSION
// =============================================================================

/// Authenticate, then run the interactive query loop.
pub async fn run_session<C, I>(endpoints: &Endpoints, console: &mut C, sink: &mut I) -> Result<(), CliError>
where
    C: Console,
    I: ImageSink,
{
    let mut auth = connect(endpoints.auth, None).await?;
    let local = auth.local_addr()?;
    let token = authenticate(&mut auth, console).await?;
    drop(auth);

    let mut query = connect_query(endpoints.query, local).await?;
    run_queries(&mut query, &token, console, sink).await
}

// =============================================================================
// AUTH PHASE
// =============================================================================

/// Drive the handshake and return the issued token.
pub async fn authenticate<S, C>(stream: &mut S, console: &mut C) -> Result<String, CliError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Console,
{
    console.print("Establishing network...");
    console.print("Enter your username:");
    let username = console.read_line().await?.ok_or(CliError::InputClosed)?;
    frames::write_frame(stream, &Frame::auth(AuthType::Request, username)).await?;

    loop {
        let reply = frames::read_frame(stream).await?;
        match reply.auth_type() {
            Some(AuthType::Challenge) => {
                console.print(&reply.text());
                let password = console.read_line().await?.ok_or(CliError::InputClosed)?;
                frames::write_frame(stream, &Frame::auth(AuthType::Request, password)).await?;
            }
            Some(AuthType::Success) => {
                let token = reply.text();
                console.print("Authentication complete!");
                console.print(&format!("Access Token Generated | Your access token is: {token}"));
                return Ok(token);
            }
            Some(AuthType::Fail) => {
                let message = reply.text();
                console.error(&message);
                return Err(CliError::AuthFailed(message));
            }
            Some(AuthType::Request) | None => {
                return Err(CliError::UnexpectedReply { phase: reply.phase, code: reply.code });
            }
        }
    }
}

// =============================================================================
// QUERY PHASE
// =============================================================================

/// Map one input line to the query it requests.
#[must_use]
pub fn classify(line: &str) -> Option<QueryType> {
    let line = line.trim();
    if is_date(line) {
        Some(QueryType::Image)
    } else if line.eq_ignore_ascii_case("weather") {
        Some(QueryType::Weather)
    } else if line.eq_ignore_ascii_case("disconnect") {
        Some(QueryType::Exit)
    } else {
        None
    }
}

/// Strict `YYYY-MM-DD` with month 01-12 and day 01-31.
fn is_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    if !text.is_ascii() || bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| -> Option<u32> {
        let part = &text[range];
        if part.bytes().all(|b| b.is_ascii_digit()) { part.parse().ok() } else { None }
    };
    match (digits(0..4), digits(5..7), digits(8..10)) {
        (Some(_), Some(month), Some(day)) => (1..=12).contains(&month) && (1..=31).contains(&day),
        _ => false,
    }
}

/// Print the banner, then serve input lines until the server sends `Exit`.
/// End of input is treated as `disconnect`. Only the server's disconnect
/// reply to our own `disconnect` ends the loop cleanly.
pub async fn run_queries<S, C, I>(stream: &mut S, token: &str, console: &mut C, sink: &mut I) -> Result<(), CliError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Console,
    I: ImageSink,
{
    let welcome = frames::read_frame(stream).await?;
    console.print(&welcome.text());

    loop {
        let line = console.read_line().await?.unwrap_or_else(|| "disconnect".to_string());
        let Some(kind) = classify(&line) else {
            console.error(INVALID_QUERY_MESSAGE);
            continue;
        };

        let request = Frame::query(kind, frames::query_payload(token, line.trim()));
        frames::write_frame(stream, &request).await?;
        let reply = frames::read_frame(stream).await?;

        match reply.query_type() {
            Some(QueryType::Success) => show_success(kind, &reply, console, sink),
            Some(QueryType::Fail) => console.error(&reply.text()),
            Some(QueryType::Exit) if kind == QueryType::Exit && reply.payload == DISCONNECT_REPLY.as_bytes() => {
                console.print(DISCONNECT_REPLY);
                return Ok(());
            }
            Some(QueryType::Exit) => {
                let message = reply.text();
                console.error(&message);
                return Err(CliError::Disconnected(message));
            }
            Some(QueryType::Image | QueryType::Weather) | None => {
                return Err(CliError::UnexpectedReply { phase: reply.phase, code: reply.code });
            }
        }
        console.print(REQUEST_PROMPT);
    }
}

fn show_success<C, I>(kind: QueryType, reply: &Frame, console: &mut C, sink: &mut I)
where
    C: Console,
    I: ImageSink,
{
    if kind != QueryType::Image {
        console.print(&format!("{}\n", reply.text()));
        return;
    }
    match sink.save(&reply.payload) {
        Ok(path) => console.print(&format!("Image received | saved to {}", path.display())),
        Err(e) => console.error(&format!("Image received but not saved: {e}")),
    }
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Open a TCP connection, optionally from a fixed local address.
pub async fn connect(remote: SocketAddr, local: Option<SocketAddr>) -> Result<TcpStream, CliError> {
    let socket = if remote.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
    socket.set_reuseaddr(true)?;
    if let Some(local) = local {
        socket.bind(local)?;
    }
    Ok(socket.connect(remote).await?)
}

/// Connect to the query endpoint from `local`, retrying while the server has
/// not opened it yet.
pub async fn connect_query(remote: SocketAddr, local: SocketAddr) -> Result<TcpStream, CliError> {
    let mut attempt = 1;
    loop {
        match connect(remote, Some(local)).await {
            Ok(stream) => return Ok(stream),
            Err(CliError::Io(e))
                if e.kind() == std::io::ErrorKind::ConnectionRefused && attempt < QUERY_CONNECT_ATTEMPTS =>
            {
                attempt += 1;
                tokio::time::sleep(QUERY_CONNECT_BACKOFF).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Resolve `host:port` to its first address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, CliError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| CliError::Resolve(format!("{host}:{port}")))
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
