//! JSON-lines event output
//!
//! One event per line, in the `{"type": ..., "data": ...}` wire format.

use crate::crawler::CrawlEvent;
use crate::output::traits::{EventSink, OutputResult};
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

/// Writes events as JSON lines
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of events written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Consumes the writer, returning the underlying sink
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl JsonLinesWriter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> EventSink for JsonLinesWriter<W> {
    fn handle(&mut self, event: &CrawlEvent) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;

        // progress lines go out with the next result
        if !matches!(event, CrawlEvent::Progress(_)) {
            self.writer.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
