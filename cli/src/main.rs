mod console;
mod driver;

use std::path::PathBuf;

use clap::Parser;
use frames::Phase;

use crate::console::{FileImageSink, StdConsole};
use crate::driver::Endpoints;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("disconnected by server: {0}")]
    Disconnected(String),
    #[error("unexpected reply: phase {phase:?}, type code {code}")]
    UnexpectedReply { phase: Phase, code: u8 },
    #[error("input closed before the handshake finished")]
    InputClosed,
}

#[derive(Parser, Debug)]
#[command(name = "stratonet", about = "StratoNet interactive client")]
struct Cli {
    #[arg(long, env = "STRATONET_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "AUTH_PORT", default_value_t = 4444)]
    auth_port: u16,

    #[arg(long, env = "QUERY_PORT", default_value_t = 4445)]
    query_port: u16,

    /// Where image-of-the-day bytes are written.
    #[arg(long, env = "STRATONET_IMAGE_PATH", default_value = "image_of_the_day.jpg")]
    image_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let endpoints = Endpoints {
        auth: driver::resolve(&cli.host, cli.auth_port).await?,
        query: driver::resolve(&cli.host, cli.query_port).await?,
    };

    let mut console = StdConsole::new();
    let mut sink = FileImageSink::new(cli.image_path);
    driver::run_session(&endpoints, &mut console, &mut sink).await
}
