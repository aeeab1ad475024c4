//! Terminal and file collaborators for the client driver.
//!
//! The driver never touches stdin, stdout or the filesystem directly; it
//! talks to a `Console` and an `ImageSink` so whole sessions can be scripted
//! in tests.

use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::CliError;

#[async_trait::async_trait]
pub trait Console: Send {
    /// Next line of user input without its line ending, `None` once input
    /// is exhausted.
    async fn read_line(&mut self) -> Result<Option<String>, CliError>;

    fn print(&mut self, text: &str);

    fn error(&mut self, text: &str);
}

/// Stdin / stdout / stderr.
pub struct StdConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl StdConsole {
    #[must_use]
    pub fn new() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Console for StdConsole {
    async fn read_line(&mut self) -> Result<Option<String>, CliError> {
        Ok(self.lines.next_line().await?)
    }

    fn print(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn error(&mut self, text: &str) {
        eprintln!("{text}");
    }
}

// =============================================================================
// IMAGE SINK
// =============================================================================

/// Destination for image-of-the-day bytes.
pub trait ImageSink: Send {
    /// Store one image and return where it went.
    fn save(&mut self, bytes: &[u8]) -> Result<PathBuf, CliError>;
}

/// Writes each image over the same file.
pub struct FileImageSink {
    path: PathBuf,
}

impl FileImageSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageSink for FileImageSink {
    fn save(&mut self, bytes: &[u8]) -> Result<PathBuf, CliError> {
        std::fs::write(&self.path, bytes)?;
        Ok(self.path.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "console_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;
