//! File-backed decision stream.
//!
//! One canonical record line per decision, buffered, flushed explicitly at
//! shutdown (and implicitly when the buffer fills). The file holds exactly
//! what replay reconstructs: no headers, no timestamps, no extra lines.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use rgov_core::{DecisionRecord, RecordSink, SinkError};
use thiserror::Error;

/// Errors opening the decision log.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogError {
    /// The log file could not be created.
    #[error("cannot create decision log {path}: {source}")]
    Create {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Append-only JSONL sink over a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Creates (truncating) the decision log at `path`.
    ///
    /// Each run owns its log from the first window; appending across runs
    /// would splice two different decision histories into one stream.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Create`] when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, LogError> {
        let file = File::create(path).map_err(|source| LogError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &DecisionRecord) -> Result<(), SinkError> {
        writeln!(self.writer, "{}", record.canonical_line()).map_err(|err| SinkError::Append {
            reason: format!("{}: {err}", self.path.display()),
        })
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|err| SinkError::Flush {
            reason: format!("{}: {err}", self.path.display()),
        })
    }
}
