//! Listener assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Two TCP endpoints share one `AppState`. The auth endpoint is bound at
//! startup; the query endpoint is bound only once the first handshake has
//! succeeded. Every accepted connection runs in its own task, so many
//! sessions may be authenticating or querying at the same time.

pub mod auth;
pub mod query;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::state::AppState;

/// Bind both endpoints from config and serve until the process exits.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let auth_addr = SocketAddr::new(state.config.bind, state.config.auth_port);
    let listener = TcpListener::bind(auth_addr).await?;
    serve_with(listener, state).await
}

/// Serve auth on an already-bound listener, then open the query endpoint on
/// the configured port after the first successful handshake.
pub async fn serve_with(auth_listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!(addr = %auth_listener.local_addr()?, "auth: listening");
    tokio::spawn(run_auth_listener(auth_listener, state.clone()));

    state.authenticated.notified().await;

    let query_addr = SocketAddr::new(state.config.bind, state.config.query_port);
    let query_listener = TcpListener::bind(query_addr).await?;
    info!(addr = %query_addr, "query: listening");
    run_query_listener(query_listener, state).await;
    Ok(())
}

/// Pause after a failed `accept` so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept auth connections forever, one handshake task per connection.
pub async fn run_auth_listener(listener: TcpListener, state: AppState) {
    let listener = &listener;
    accept_loop("auth", move || listener.accept(), move |stream: TcpStream, peer| {
        auth::handle_auth_connection(stream, peer, state.clone())
    })
    .await;
}

/// Accept query connections forever, one session task per connection.
pub async fn run_query_listener(listener: TcpListener, state: AppState) {
    let listener = &listener;
    accept_loop("query", move || listener.accept(), move |stream: TcpStream, peer| {
        query::handle_query_connection(stream, peer, state.clone())
    })
    .await;
}

async fn accept_loop<S, A, AcceptFut, H, HandleFut>(endpoint: &'static str, mut accept: A, handle: H)
where
    A: FnMut() -> AcceptFut,
    AcceptFut: Future<Output = std::io::Result<(S, SocketAddr)>>,
    H: Fn(S, SocketAddr) -> HandleFut,
    HandleFut: Future<Output = ()> + Send + 'static,
{
    loop {
        match accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle(stream, peer));
            }
            Err(e) => {
                warn!(endpoint, error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
