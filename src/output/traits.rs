//! Output handler traits and error types
//!
//! Every event of a crawl is handed to each configured sink in order. A sink
//! that fails stops the run; the crawl itself never fails.

use crate::crawler::CrawlEvent;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Consumer of crawl events
pub trait EventSink {
    /// Handles one event
    fn handle(&mut self, event: &CrawlEvent) -> OutputResult<()>;

    /// Flushes buffered output once the stream has ended
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}
