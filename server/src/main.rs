mod config;
mod frame;
mod routes;
mod services;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::provider::NasaProvider;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match config::ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let provider = match NasaProvider::new(config.provider.clone()) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "content provider init failed");
            return ExitCode::FAILURE;
        }
    };

    let credentials = Arc::new(state::AppState::credentials_from_config(&config));
    tracing::info!(
        auth_port = config.auth_port,
        query_port = config.query_port,
        accounts = credentials.len(),
        "stratonet starting"
    );
    let state = state::AppState::new(config, credentials, Arc::new(provider));

    match routes::serve(state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
