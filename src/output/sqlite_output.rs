//! SQLite-based event sink
//!
//! Records every page result of a run into the storage backend and completes
//! the run when the stream finishes.

use crate::crawler::CrawlEvent;
use crate::output::traits::{EventSink, OutputResult};
use crate::storage::{RunStatus, Storage};
use tracing::debug;

/// Sink that persists results of a single run
pub struct StorageSink<S: Storage> {
    storage: S,
    run_id: i64,
}

impl<S: Storage> StorageSink<S> {
    /// Opens a new run in `storage`
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `seed_url` - The run's seed URL
    /// * `config_hash` - Hash of the configuration that produced the run
    pub fn start(mut storage: S, seed_url: &str, config_hash: &str) -> OutputResult<Self> {
        let run_id = storage.create_run(seed_url, config_hash)?;
        debug!("Started run {} for {}", run_id, seed_url);
        Ok(Self { storage, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Marks the run as ended without a `Finished` event
    pub fn abandon(&mut self, status: RunStatus) -> OutputResult<()> {
        self.storage.update_run_status(self.run_id, status)?;
        debug!("Run {} marked {}", self.run_id, status.to_db_string());
        Ok(())
    }

    /// Returns the storage backend
    pub fn into_storage(self) -> S {
        self.storage
    }
}

impl<S: Storage> EventSink for StorageSink<S> {
    fn handle(&mut self, event: &CrawlEvent) -> OutputResult<()> {
        match event {
            CrawlEvent::Result(result) => {
                self.storage.record_result(self.run_id, result)?;
            }
            CrawlEvent::Finished(summary) => {
                self.storage.complete_run(self.run_id, summary.total)?;
                debug!("Completed run {} ({} pages)", self.run_id, summary.total);
            }
            CrawlEvent::SiteMap(_) | CrawlEvent::Progress(_) => {}
        }
        Ok(())
    }
}
