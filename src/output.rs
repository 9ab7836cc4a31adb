//! NDJSON output sink
//!
//! One complete JSON record per line, appended as records finish. Opening the
//! sink truncates any pre-existing file of the same name — a fresh run starts
//! from an empty file, which makes runs non-idempotent by construction rather
//! than by accident.

use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Append-only newline-delimited-JSON writer
///
/// Record order reflects completion order within each batch, not input order.
#[derive(Debug)]
pub struct NdjsonWriter {
    file: tokio::fs::File,
    path: PathBuf,
    written: u64,
}

impl NdjsonWriter {
    /// Open the sink at `path`, truncating any existing file
    ///
    /// Parent directories are created if absent.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::File::create(&path).await?;
        Ok(Self {
            file,
            path,
            written: 0,
        })
    }

    /// Append one record as a single line
    ///
    /// Returns the number of records written so far, including this one.
    pub async fn append(&mut self, record: &Value) -> Result<u64> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.written += 1;
        Ok(self.written)
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path this sink writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered data and close the sink, returning the final count
    pub async fn finish(mut self) -> Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.written)
    }
}
