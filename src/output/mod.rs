//! Output module for crawl events and run reports
//!
//! This module handles:
//! - Writing the event stream as JSON lines
//! - Recording page results into the result store
//! - Reporting statistics of stored runs

mod jsonl;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesWriter;
pub use sqlite_output::StorageSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{EventSink, OutputError, OutputResult};
